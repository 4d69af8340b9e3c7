mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, RefKind};
use webnexter::assets::{AssetReference, ImageAsset};
use webnexter::config::Config;
use webnexter::content::plain_text;
use webnexter::loader::LoadState;
use webnexter::playback::Presentation;
use webnexter::{Portfolio, Webnexter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let app = Webnexter::connect(config)?;

    match cli.command {
        Commands::Resolve { reference, kind } => {
            let r = match kind {
                RefKind::File => AssetReference::File(reference),
                RefKind::Inline => AssetReference::Inline(reference),
                RefKind::Image => AssetReference::Image(ImageAsset::new(reference)),
            };
            match app.resolver().try_resolve(&r) {
                Ok(url) => println!("{url}"),
                Err(reason) => println!("unresolvable: {reason}"),
            }
        }
        Commands::Services { refresh } => match LoadState::from(app.services(refresh).await) {
            LoadState::Ready(services) => {
                for s in services {
                    let order = s.order.map(|o| o.to_string()).unwrap_or_else(|| "-".into());
                    println!("{:>3}  {:<24} {}", order, s.slug.current, s.title);
                }
            }
            LoadState::Failed(e) => eprintln!("Error fetching services: {e}"),
            LoadState::Loading => {}
        },
        Commands::Service { slug } => {
            let Some(service) = app.service(&slug).await? else {
                println!("No service with slug `{slug}`");
                return Ok(());
            };
            println!("{}", service.title);
            let text = plain_text(&service.description);
            if !text.is_empty() { println!("\n{text}\n"); }
            for f in &service.features {
                match &f.description {
                    Some(d) => println!("- {}: {d}", f.title),
                    None => println!("- {}", f.title),
                }
            }
            match LoadState::from(app.projects_for_service(&service.id).await) {
                LoadState::Ready(projects) => {
                    for proj in projects {
                        let star = if proj.featured { "*" } else { " " };
                        println!("{star} {:<28} {}", proj.slug.current, proj.title);
                    }
                }
                LoadState::Failed(e) => eprintln!("Error fetching projects: {e}"),
                LoadState::Loading => {}
            }
        }
        Commands::Projects { service, refresh } => {
            match LoadState::from(app.portfolio(service.as_deref(), refresh).await) {
                LoadState::Ready(p) if service.is_none() => {
                    let featured = app.featured_projects().await.unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "featured projects unavailable");
                        Vec::new()
                    });
                    for proj in featured {
                        println!("Featured: {}", proj.title);
                    }
                    print_portfolio(p);
                }
                LoadState::Ready(p) => print_portfolio(p),
                LoadState::Failed(e) => eprintln!("Error fetching projects: {e}"),
                LoadState::Loading => {}
            }
        }
        Commands::Project { slug } => {
            let Some(project) = app.project(&slug).await? else {
                println!("No project with slug `{slug}`");
                return Ok(());
            };
            println!("{}", project.title);
            if let Some(client) = &project.client { println!("Client: {client}"); }
            if let Some(url) = &project.project_url { println!("URL: {url}"); }
            if !project.technologies.is_empty() { println!("Tech: {}", project.technologies.join(", ")); }
            let image = app.resolve(project.main_image.as_ref().map(|i| &i.asset));
            if let Some(img) = image { println!("Image: {img}"); }
            let text = plain_text(&project.description);
            if !text.is_empty() { println!("\n{text}\n"); }
            if let Some(video) = project.video.clone() {
                let player = app.player_for(video).await;
                match player.presentation() {
                    Presentation::Poster { thumbnail_url, alt } => println!("Video poster: {thumbnail_url} ({alt})"),
                    Presentation::Player { src, mime } => println!("Video: {src} [{mime}]"),
                    Presentation::Failed { message, .. } => println!("Video unavailable: {message}"),
                    Presentation::Spinner => println!("Video loading"),
                }
            }
            let related = app.related_projects(&project).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "related projects unavailable");
                Vec::new()
            });
            for r in related {
                println!("Related: {} ({})", r.title, r.slug.current);
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&app.config().redacted())?);
        }
    }
    Ok(())
}

fn print_portfolio(p: Portfolio) {
    if let Some(sel) = &p.selected {
        println!("Service: {}", sel.title);
    }
    for proj in p.projects {
        let star = if proj.featured { "*" } else { " " };
        let svc = proj.service.as_ref().map(|s| s.title.as_str()).unwrap_or("-");
        println!("{star} {:<28} {:<20} {}", proj.slug.current, svc, proj.title);
    }
}

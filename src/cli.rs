use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// CLI for inspecting site content and media resolution
#[derive(Parser)]
#[command(name = "webnexter")]
#[command(about = "Query site content and resolve media assets", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RefKind {
    File,
    Inline,
    Image,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve an asset reference to its CDN URL
    Resolve {
        /// Reference string, e.g. file-abc123-mp4
        reference: String,
        #[arg(long, value_enum, default_value = "inline")]
        kind: RefKind,
    },
    /// List services in display order
    Services {
        #[arg(long)]
        refresh: bool,
    },
    /// Show one service and the projects filed under it
    Service {
        slug: String,
    },
    /// List projects, optionally filtered by service slug
    Projects {
        #[arg(short, long)]
        service: Option<String>,
        #[arg(long)]
        refresh: bool,
    },
    /// Show one project and its video state
    Project {
        slug: String,
    },
    /// Print the effective configuration
    Config,
}

//! Portfolio listing helpers: category filter and ordering.

use std::cmp::Reverse;

use crate::content::{Project, Service, ServiceRef};

/// `None` selects everything; otherwise projects whose service id matches.
pub fn filter_by_service<'a>(projects: &'a [Project], selected: Option<&ServiceRef>) -> Vec<&'a Project> {
    match selected {
        None => projects.iter().collect(),
        Some(sel) => projects
            .iter()
            .filter(|p| p.service.as_ref().is_some_and(|s| s.id == sel.id))
            .collect(),
    }
}

/// Look up the service named by a `?service=<slug>` parameter. Unknown slugs select nothing.
pub fn select_service<'a>(services: &'a [Service], slug: Option<&str>) -> Option<&'a Service> {
    let slug = slug.map(str::trim).filter(|s| !s.is_empty())?;
    services.iter().find(|s| s.slug.current == slug)
}

/// Featured first, then newest first. Timestamps are RFC 3339 so string order is time order.
pub fn sort_projects(projects: &mut [Project]) {
    projects.sort_by(|a, b| {
        b.featured
            .cmp(&a.featured)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Ascending display order; services without one go last.
pub fn sort_services(services: &mut [Service]) {
    services.sort_by_key(|s| (s.order.is_none(), s.order, Reverse(s.is_featured)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Slug;

    fn service(id: &str, slug: &str, order: Option<i64>) -> Service {
        serde_json::from_value(serde_json::json!({
            "_id": id, "title": id, "slug": {"current": slug}, "order": order
        }))
        .unwrap()
    }

    fn project(id: &str, service_id: Option<&str>, featured: bool, created: &str) -> Project {
        let service = service_id.map(|s| serde_json::json!({"_id": s, "title": s, "slug": {"current": s}}));
        serde_json::from_value(serde_json::json!({
            "_id": id, "title": id, "slug": {"current": id},
            "service": service, "featured": featured, "_createdAt": created
        }))
        .unwrap()
    }

    #[test]
    fn filter_all_or_by_service() {
        let ps = vec![
            project("a", Some("web"), false, "2025-01-01"),
            project("b", Some("gfx"), false, "2025-01-02"),
            project("c", None, false, "2025-01-03"),
        ];
        assert_eq!(filter_by_service(&ps, None).len(), 3);
        let web = ServiceRef { id: "web".into(), title: "Web".into(), slug: Slug { current: "web".into() } };
        let ids: Vec<_> = filter_by_service(&ps, Some(&web)).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a"]);
    }

    #[test]
    fn select_service_by_slug() {
        let ss = vec![service("s1", "web", Some(1)), service("s2", "graphics", Some(2))];
        assert_eq!(select_service(&ss, Some("graphics")).map(|s| s.id.as_str()), Some("s2"));
        assert!(select_service(&ss, Some("nope")).is_none());
        assert!(select_service(&ss, Some(" ")).is_none());
        assert!(select_service(&ss, None).is_none());
    }

    #[test]
    fn projects_sort_featured_then_newest() {
        let mut ps = vec![
            project("old", None, false, "2024-01-01T00:00:00Z"),
            project("feat-old", None, true, "2023-01-01T00:00:00Z"),
            project("new", None, false, "2025-01-01T00:00:00Z"),
            project("feat-new", None, true, "2025-06-01T00:00:00Z"),
        ];
        sort_projects(&mut ps);
        let ids: Vec<_> = ps.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["feat-new", "feat-old", "new", "old"]);
    }

    #[test]
    fn services_sort_by_order_with_missing_last() {
        let mut ss = vec![service("c", "c", None), service("b", "b", Some(2)), service("a", "a", Some(1))];
        sort_services(&mut ss);
        let ids: Vec<_> = ss.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}

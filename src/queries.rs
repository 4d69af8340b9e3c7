//! GROQ projections used by the site. Parameters are bound as `$name`.

const SERVICE_FIELDS: &str = "_id, title, slug, description, mainImage, features, order, isFeatured, metaDescription";

const SERVICE_REF: &str = "service->{ _id, title, slug }";

const VIDEO_FIELDS: &str = "video { asset { _ref, _type }, title, description, thumbnail { asset { _ref, _type }, alt } }";

pub fn services() -> String {
    format!(r#"*[_type == "service"] | order(order asc) {{ {SERVICE_FIELDS} }}"#)
}

/// Binds `$slug`.
pub fn service_by_slug() -> String {
    format!(r#"*[_type == "service" && slug.current == $slug][0] {{ {SERVICE_FIELDS}, metaKeywords }}"#)
}

pub fn projects() -> String {
    format!(
        r#"*[_type == "project"] | order(featured desc, _createdAt desc) {{ _id, _createdAt, title, slug, description, mainImage, {SERVICE_REF}, technologies, featured, client, projectUrl, completionDate, metaDescription, {VIDEO_FIELDS} }}"#
    )
}

/// Binds `$slug`.
pub fn project_by_slug() -> String {
    format!(
        r#"*[_type == "project" && slug.current == $slug][0] {{ _id, _createdAt, title, slug, description, mainImage, {SERVICE_REF}, technologies, featured, content, gallery, client, projectUrl, completionDate, metaDescription, {VIDEO_FIELDS} }}"#
    )
}

pub fn featured_projects() -> String {
    format!(
        r#"*[_type == "project" && featured == true] | order(_createdAt desc) {{ _id, _createdAt, title, slug, description, mainImage, {SERVICE_REF}, technologies, featured, client, projectUrl, completionDate }}"#
    )
}

/// Binds `$serviceId`.
pub fn projects_by_service() -> String {
    format!(
        r#"*[_type == "project" && references($serviceId)] | order(featured desc, _createdAt desc) {{ _id, _createdAt, title, slug, description, mainImage, {SERVICE_REF}, technologies, featured, client, projectUrl, completionDate, metaDescription }}"#
    )
}

/// Binds `$serviceId` and `$slug` (the project to exclude). At most three results.
pub fn related_projects() -> String {
    format!(
        r#"*[_type == "project" && service._ref == $serviceId && slug.current != $slug] | order(_createdAt desc)[0...3] {{ _id, _createdAt, title, slug, mainImage {{ asset->{{ _id, url }}, alt, caption }}, {SERVICE_REF} }}"#
    )
}

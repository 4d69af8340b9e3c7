//! Typed views of the `service` and `project` documents returned by the content API.
//!
//! Query projections return `null` for absent fields, so collections and flags go through
//! [`null_default`] and embedded assets through [`lenient`]: a malformed asset becomes
//! `None` instead of failing the whole document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::assets::AssetReference;
use crate::playback::MediaRecord;

/// Deserialize an optional value, mapping `null` and anything unparseable to `None`.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

/// `null` becomes `T::default()`.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Drafts may carry a null slug; it reads as an empty `current`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slug {
    #[serde(default, deserialize_with = "null_default")]
    pub current: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageField {
    #[serde(flatten)]
    pub asset: AssetReference,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "null_default")]
    pub marks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub list_item: Option<String>,
    pub children: Vec<Span>,
}

/// A portable-text block. Inline images and files are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Block {
    Text(TextBlock),
    Other(serde_json::Value),
}

impl Block {
    pub fn text(&self) -> Option<String> {
        match self {
            Block::Text(b) => Some(b.children.iter().map(|s| s.text.as_str()).collect()),
            Block::Other(_) => None,
        }
    }
}

/// Text blocks joined by newlines; embedded media is skipped.
pub fn plain_text(blocks: &[Block]) -> String {
    blocks.iter().filter_map(Block::text).collect::<Vec<_>>().join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFeature {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub slug: Slug,
    #[serde(default, deserialize_with = "null_default")]
    pub description: Vec<Block>,
    #[serde(default, deserialize_with = "lenient")]
    pub main_image: Option<ImageField>,
    #[serde(default, deserialize_with = "null_default")]
    pub features: Vec<ServiceFeature>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default, deserialize_with = "null_default")]
    pub is_featured: bool,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub meta_keywords: Vec<String>,
}

/// The `service->{_id, title, slug}` projection embedded in projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub slug: Slug,
}

impl From<&Service> for ServiceRef {
    fn from(s: &Service) -> Self {
        Self { id: s.id.clone(), title: s.title.clone(), slug: s.slug.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub slug: Slug,
    #[serde(default, deserialize_with = "null_default")]
    pub description: Vec<Block>,
    #[serde(default, deserialize_with = "lenient")]
    pub main_image: Option<ImageField>,
    #[serde(default, deserialize_with = "lenient")]
    pub service: Option<ServiceRef>,
    #[serde(default, deserialize_with = "null_default")]
    pub technologies: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub featured: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub content: Vec<Block>,
    #[serde(default, deserialize_with = "null_default")]
    pub gallery: Vec<serde_json::Value>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub project_url: Option<String>,
    #[serde(default)]
    pub completion_date: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub video: Option<MediaRecord>,
    #[serde(rename = "_createdAt", default)]
    pub created_at: Option<String>,
}

impl Project {
    /// Gallery entries that parse as images; anything else is skipped.
    pub fn gallery_images(&self) -> Vec<ImageField> {
        self.gallery
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect()
    }
}

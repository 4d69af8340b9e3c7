//! Asset references as the content API hands them out, and the pure resolver that turns
//! them into CDN URLs.
//!
//! File-style references follow `file-<fileId>-<extension>` and map onto
//! `https://{host}/files/{project}/{dataset}/{fileId}.{extension}`. Image references are
//! delegated to an [`ImageUrlBuilder`]. Anything that doesn't fit is "unresolvable", which
//! callers treat as an ordinary outcome.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use url::Url;

use crate::config::ResolverConfig;

/// Crop rectangle as fractions of the source image trimmed from each edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub bottom: f64,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub right: f64,
}

impl Crop {
    fn is_empty(&self) -> bool {
        self.top == 0.0 && self.bottom == 0.0 && self.left == 0.0 && self.right == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAsset {
    pub reference: String,
    pub crop: Option<Crop>,
    pub hotspot: Option<Hotspot>,
}

impl ImageAsset {
    pub fn new(reference: impl Into<String>) -> Self {
        Self { reference: reference.into(), crop: None, hotspot: None }
    }
}

/// Pointer to a binary stored by the content provider. Exactly one shape per value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawAsset")]
pub enum AssetReference {
    Image(ImageAsset),
    /// `file-<fileId>-<extension>` reached through a `file` typed field.
    File(String),
    /// Same shape, reached through a bare or nested `_ref`.
    Inline(String),
}

impl AssetReference {
    pub fn reference(&self) -> &str {
        match self {
            AssetReference::Image(img) => &img.reference,
            AssetReference::File(r) | AssetReference::Inline(r) => r,
        }
    }
}

// Serialized back into the wire shape so cached records re-parse.
impl Serialize for AssetReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Ref<'a> {
            #[serde(rename = "_ref")]
            reference: &'a str,
        }
        #[derive(Serialize)]
        struct Wire<'a> {
            #[serde(rename = "_type")]
            kind: &'static str,
            #[serde(rename = "_ref", skip_serializing_if = "Option::is_none")]
            reference: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            asset: Option<Ref<'a>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            crop: Option<Crop>,
            #[serde(skip_serializing_if = "Option::is_none")]
            hotspot: Option<Hotspot>,
        }
        let wire = match self {
            AssetReference::Image(img) => Wire {
                kind: "image",
                reference: None,
                asset: Some(Ref { reference: &img.reference }),
                crop: img.crop,
                hotspot: img.hotspot,
            },
            AssetReference::File(r) => Wire { kind: "file", reference: None, asset: Some(Ref { reference: r }), crop: None, hotspot: None },
            AssetReference::Inline(r) => Wire { kind: "reference", reference: Some(r), asset: None, crop: None, hotspot: None },
        };
        wire.serialize(serializer)
    }
}

// Wire shape: either `{_type, asset: {_ref}}` or a bare `{_type?, _ref}`.
#[derive(Deserialize)]
struct RawAsset {
    #[serde(rename = "_type")]
    kind: Option<String>,
    #[serde(rename = "_ref", alias = "_id")]
    reference: Option<String>,
    asset: Option<RawRef>,
    crop: Option<Crop>,
    hotspot: Option<Hotspot>,
}

#[derive(Deserialize)]
struct RawRef {
    #[serde(rename = "_ref", alias = "_id")]
    reference: Option<String>,
}

impl TryFrom<RawAsset> for AssetReference {
    type Error = String;

    fn try_from(raw: RawAsset) -> Result<Self, Self::Error> {
        let reference = raw
            .asset
            .and_then(|a| a.reference)
            .or(raw.reference)
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| "asset has no _ref".to_string())?;
        let image = |reference| AssetReference::Image(ImageAsset { reference, crop: raw.crop, hotspot: raw.hotspot });
        Ok(match raw.kind.as_deref() {
            Some("image") => image(reference),
            Some("file") => AssetReference::File(reference),
            _ if reference.starts_with("image-") => image(reference),
            _ => AssetReference::Inline(reference),
        })
    }
}

/// An absolute URL produced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedUrl(String);

impl ResolvedUrl {
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for ResolvedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for ResolvedUrl {
    fn as_ref(&self) -> &str { &self.0 }
}

/// Why a reference could not be turned into a URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unresolvable {
    #[error("no asset reference provided")]
    Missing,
    #[error("reference `{0}` does not match file-<id>-<extension>")]
    Pattern(String),
    #[error("image URL builder could not handle `{0}`")]
    ImageBuilder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub id: String,
    pub extension: String,
}

/// Everything before the first `?`.
pub fn strip_query(reference: &str) -> &str {
    reference.split_once('?').map_or(reference, |(head, _)| head)
}

/// Match `file-<id>-<extension>`, splitting at the last hyphen so ids may contain hyphens.
pub fn parse_file_reference(reference: &str) -> Result<FileRef, Unresolvable> {
    let mismatch = || Unresolvable::Pattern(reference.to_string());
    let rest = strip_query(reference).strip_prefix("file-").ok_or_else(mismatch)?;
    let (id, extension) = rest.rsplit_once('-').ok_or_else(mismatch)?;
    if id.is_empty() || !id.chars().all(is_id_char) {
        return Err(mismatch());
    }
    if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(mismatch());
    }
    Ok(FileRef { id: id.to_string(), extension: extension.to_ascii_lowercase() })
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

// `abc123.mp4`: one segment, a dot, nothing that would need escaping.
fn looks_like_filename(s: &str) -> bool {
    s.chars().all(|c| is_id_char(c) || c == '.')
        && matches!(s.rsplit_once('.'), Some((stem, ext)) if !stem.is_empty() && !ext.is_empty())
}

/// Lower-cased extension of the URL's last path segment; query and fragment are ignored.
pub fn extension_of(url: &str) -> Option<String> {
    let last = match Url::parse(url) {
        Ok(parsed) => parsed.path_segments()?.last()?.to_string(),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            path.rsplit('/').next().unwrap_or(path).to_string()
        }
    };
    let (_, ext) = last.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// External image CDN URL builder.
pub trait ImageUrlBuilder: Send + Sync {
    fn url(&self, config: &ResolverConfig, image: &ImageAsset) -> Option<String>;
}

/// Builds `https://{host}/images/{project}/{dataset}/{id}-{w}x{h}.{fmt}` from
/// `image-<id>-<w>x<h>-<fmt>` references, with a `rect` parameter for effective crops.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdnImageUrlBuilder;

struct ImageRef<'a> {
    id: &'a str,
    width: u32,
    height: u32,
    format: &'a str,
}

fn parse_image_reference(reference: &str) -> Option<ImageRef<'_>> {
    let rest = reference.strip_prefix("image-")?;
    let (rest, format) = rest.rsplit_once('-')?;
    let (id, dims) = rest.rsplit_once('-')?;
    let (w, h) = dims.split_once('x')?;
    if id.is_empty() || format.is_empty() {
        return None;
    }
    Some(ImageRef { id, width: w.parse().ok()?, height: h.parse().ok()?, format })
}

impl ImageUrlBuilder for CdnImageUrlBuilder {
    fn url(&self, config: &ResolverConfig, image: &ImageAsset) -> Option<String> {
        let img = parse_image_reference(&image.reference)?;
        let mut url = format!(
            "https://{}/images/{}/{}/{}-{}x{}.{}",
            config.provider_host, config.project_id, config.dataset, img.id, img.width, img.height, img.format
        );
        if let Some(crop) = image.crop.filter(|c| !c.is_empty()) {
            let (w, h) = (img.width as f64, img.height as f64);
            let left = crop.left * w;
            let top = crop.top * h;
            let rect = (
                left.round(),
                top.round(),
                (w - crop.right * w - left).round(),
                (h - crop.bottom * h - top).round(),
            );
            if rect != (0.0, 0.0, w, h) {
                url.push_str(&format!("?rect={},{},{},{}", rect.0, rect.1, rect.2, rect.3));
            }
        }
        Some(url)
    }
}

/// Pure mapping from asset references to URLs. Cheap to clone.
#[derive(Clone)]
pub struct AssetUrlResolver {
    config: ResolverConfig,
    images: Arc<dyn ImageUrlBuilder>,
}

impl fmt::Debug for AssetUrlResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetUrlResolver").field("config", &self.config).finish_non_exhaustive()
    }
}

impl AssetUrlResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_image_builder(config, CdnImageUrlBuilder)
    }

    pub fn with_image_builder(config: ResolverConfig, images: impl ImageUrlBuilder + 'static) -> Self {
        Self { config, images: Arc::new(images) }
    }

    pub fn config(&self) -> &ResolverConfig { &self.config }

    /// Resolve or return `None`; the reason is logged at debug level.
    pub fn resolve(&self, reference: Option<&AssetReference>) -> Option<ResolvedUrl> {
        let result = match reference {
            Some(r) => self.try_resolve(r),
            None => Err(Unresolvable::Missing),
        };
        match result {
            Ok(url) => {
                tracing::debug!(url = %url, "resolved asset");
                Some(url)
            }
            Err(reason) => {
                tracing::debug!(%reason, "asset unresolvable");
                None
            }
        }
    }

    pub fn try_resolve(&self, reference: &AssetReference) -> Result<ResolvedUrl, Unresolvable> {
        match reference {
            AssetReference::Image(img) => self
                .images
                .url(&self.config, img)
                .map(ResolvedUrl)
                .ok_or_else(|| Unresolvable::ImageBuilder(img.reference.clone())),
            AssetReference::File(r) => {
                let f = parse_file_reference(r)?;
                Ok(self.file_url(&format!("{}.{}", f.id, f.extension)))
            }
            AssetReference::Inline(r) => match parse_file_reference(r) {
                Ok(f) => Ok(self.file_url(&format!("{}.{}", f.id, f.extension))),
                Err(e) => {
                    let cleaned = strip_query(r);
                    if looks_like_filename(cleaned) { Ok(self.file_url(cleaned)) } else { Err(e) }
                }
            },
        }
    }

    fn file_url(&self, filename: &str) -> ResolvedUrl {
        ResolvedUrl(format!(
            "https://{}/files/{}/{}/{}",
            self.config.provider_host, self.config.project_id, self.config.dataset, filename
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> AssetUrlResolver {
        AssetUrlResolver::new(ResolverConfig::default())
    }

    #[test]
    fn file_reference_builds_cdn_url() {
        let r = AssetReference::File("file-abc123-mp4".into());
        assert_eq!(
            resolver().try_resolve(&r).unwrap().as_str(),
            "https://cdn.sanity.io/files/paoqp1wp/production/abc123.mp4"
        );
    }

    #[test]
    fn hyphenated_ids_split_at_last_hyphen() {
        let f = parse_file_reference("file-a1-b2-c3-webm").unwrap();
        assert_eq!(f, FileRef { id: "a1-b2-c3".into(), extension: "webm".into() });
    }

    #[test]
    fn query_string_is_stripped_before_matching() {
        for r in [AssetReference::File("file-xyz-mov?dl=1".into()), AssetReference::Inline("file-xyz-mov?dl=1".into())] {
            assert_eq!(
                resolver().try_resolve(&r).unwrap().as_str(),
                "https://cdn.sanity.io/files/paoqp1wp/production/xyz.mov"
            );
        }
    }

    #[test]
    fn non_conforming_references_are_unresolvable() {
        let bad = [
            "https://example.com/video.mp4",
            "file-",
            "file--mp4",
            "file-abc-",
            "file-abc",
            "file-a/b-mp4",
            "file-a#b-mp4",
            "file-a b-mp4",
            "file-a%20b-mp4",
            "file-a\tb-mp4",
            "file-abc-mp.4",
            "image-abc-10x10-png",
            "",
        ];
        for b in bad {
            let r = AssetReference::File(b.into());
            assert!(matches!(resolver().try_resolve(&r), Err(Unresolvable::Pattern(_))), "{b}");
            assert_eq!(resolver().resolve(Some(&r)), None);
        }
    }

    #[test]
    fn absent_reference_is_unresolvable() {
        assert_eq!(resolver().resolve(None), None);
    }

    #[test]
    fn inline_composed_filename_passes_through() {
        let r = AssetReference::Inline("abc123.mp4?x=1".into());
        assert_eq!(
            resolver().try_resolve(&r).unwrap().as_str(),
            "https://cdn.sanity.io/files/paoqp1wp/production/abc123.mp4"
        );
        // only inline references get the pass-through
        assert!(resolver().try_resolve(&AssetReference::File("abc123.mp4".into())).is_err());
        assert!(resolver().try_resolve(&AssetReference::Inline("https://example.com/v.mp4".into())).is_err());
        assert!(resolver().try_resolve(&AssetReference::Inline("a#b.mp4".into())).is_err());
    }

    #[test]
    fn extension_is_lower_cased() {
        let r = AssetReference::File("file-abc-MP4".into());
        assert!(resolver().try_resolve(&r).unwrap().as_str().ends_with("/abc.mp4"));
    }

    #[test]
    fn resolution_is_deterministic_and_round_trips_extension() {
        let cfg = ResolverConfig { provider_host: "cdn.example.net".into(), project_id: "p1".into(), dataset: "ds".into() };
        let res = AssetUrlResolver::new(cfg);
        for (id, ext) in [("abc", "mp4"), ("a-b", "webm"), ("9f8e7d", "mov"), ("a_b", "m4v")] {
            let r = AssetReference::Inline(format!("file-{id}-{ext}"));
            let first = res.resolve(Some(&r)).unwrap();
            assert_eq!(first, res.resolve(Some(&r)).unwrap());
            assert_eq!(first.as_str(), format!("https://cdn.example.net/files/p1/ds/{id}.{ext}"));
            assert_eq!(extension_of(first.as_str()).as_deref(), Some(ext));
        }
    }

    #[test]
    fn extension_of_handles_queries_and_plain_strings() {
        assert_eq!(extension_of("https://h/a/b/clip.MOV?t=3#x").as_deref(), Some("mov"));
        assert_eq!(extension_of("clip.webm").as_deref(), Some("webm"));
        assert_eq!(extension_of("https://h/a/b/"), None);
        assert_eq!(extension_of("https://h/noext"), None);
    }

    #[test]
    fn image_reference_uses_builder() {
        let img = AssetReference::Image(ImageAsset::new("image-Tb9Ew8CXIwaY6R1kjMvI0uRR-2000x3000-jpg"));
        assert_eq!(
            resolver().try_resolve(&img).unwrap().as_str(),
            "https://cdn.sanity.io/images/paoqp1wp/production/Tb9Ew8CXIwaY6R1kjMvI0uRR-2000x3000.jpg"
        );
    }

    #[test]
    fn effective_crop_adds_rect() {
        let mut img = ImageAsset::new("image-abc-1000x500-png");
        img.crop = Some(Crop { top: 0.1, bottom: 0.1, left: 0.2, right: 0.0 });
        let url = CdnImageUrlBuilder.url(&ResolverConfig::default(), &img).unwrap();
        assert!(url.ends_with("abc-1000x500.png?rect=200,50,800,400"), "{url}");

        img.crop = Some(Crop { top: 0.0, bottom: 0.0, left: 0.0, right: 0.0 });
        let url = CdnImageUrlBuilder.url(&ResolverConfig::default(), &img).unwrap();
        assert!(!url.contains('?'));
    }

    #[test]
    fn malformed_image_reference_is_unresolvable() {
        let img = AssetReference::Image(ImageAsset::new("image-abc-wide-png"));
        assert_eq!(resolver().try_resolve(&img), Err(Unresolvable::ImageBuilder("image-abc-wide-png".into())));
    }

    struct Refusing;
    impl ImageUrlBuilder for Refusing {
        fn url(&self, _: &ResolverConfig, _: &ImageAsset) -> Option<String> { None }
    }

    #[test]
    fn refusing_builder_yields_unresolvable() {
        let res = AssetUrlResolver::with_image_builder(ResolverConfig::default(), Refusing);
        let img = AssetReference::Image(ImageAsset::new("image-abc-10x10-png"));
        assert_eq!(res.resolve(Some(&img)), None);
    }

    #[test]
    fn wire_shapes_map_to_variants() {
        let file: AssetReference = serde_json::from_str(r#"{"_type":"file","asset":{"_ref":"file-a-mp4","_type":"reference"}}"#).unwrap();
        assert_eq!(file, AssetReference::File("file-a-mp4".into()));

        let inline: AssetReference = serde_json::from_str(r#"{"_ref":"file-a-mp4","_type":"reference"}"#).unwrap();
        assert_eq!(inline, AssetReference::Inline("file-a-mp4".into()));

        let thumb: AssetReference = serde_json::from_str(r#"{"_ref":"image-a-1x1-png","_type":"reference"}"#).unwrap();
        assert!(matches!(thumb, AssetReference::Image(_)));

        let expanded: AssetReference = serde_json::from_str(r#"{"asset":{"_id":"image-a-1x1-png","url":"https://x"}}"#).unwrap();
        assert_eq!(expanded.reference(), "image-a-1x1-png");

        let cropped: AssetReference = serde_json::from_str(
            r#"{"_type":"image","asset":{"_ref":"image-a-10x10-png"},"crop":{"top":0.5,"bottom":0,"left":0,"right":0}}"#,
        )
        .unwrap();
        match cropped {
            AssetReference::Image(img) => assert_eq!(img.crop.map(|c| c.top), Some(0.5)),
            other => panic!("unexpected {other:?}"),
        }

        assert!(serde_json::from_str::<AssetReference>(r#"{"_type":"file"}"#).is_err());
    }

    #[test]
    fn serialized_form_parses_back_to_the_same_variant() {
        let mut img = ImageAsset::new("image-a-10x10-png");
        img.crop = Some(Crop { top: 0.1, bottom: 0.0, left: 0.0, right: 0.0 });
        for r in [AssetReference::Image(img), AssetReference::File("file-a-mp4".into()), AssetReference::Inline("file-b-webm".into())] {
            let json = serde_json::to_string(&r).unwrap();
            assert_eq!(serde_json::from_str::<AssetReference>(&json).unwrap(), r);
        }
    }
}

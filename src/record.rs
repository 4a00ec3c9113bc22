use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_width() -> u32 {
    600
}

fn default_height() -> u32 {
    200
}

/// One image+link creative. This is the canonical shape; legacy field names
/// from older data files are mapped here once via serde aliases and never
/// leak past deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerRecord {
    /// Unique within a store. `0` means not yet assigned; `Store` replaces it
    /// before anything is persisted.
    #[serde(default)]
    pub id: u64,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default)]
    pub href: String,
    #[serde(alias = "img_src", alias = "src")]
    pub image_src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default, alias = "categoria", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Creation payload: the POST /records body and the `add` command both
/// deserialize into this before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBanner {
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default)]
    pub href: String,
    #[serde(default, alias = "img_src")]
    pub image_src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default, alias = "categoria")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for NewBanner {
    fn default() -> Self {
        Self {
            name: String::new(),
            href: String::new(),
            image_src: String::new(),
            alt: String::new(),
            category: None,
            tags: Vec::new(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl NewBanner {
    pub fn into_record(self, id: u64, created_at: DateTime<Utc>) -> BannerRecord {
        BannerRecord {
            id,
            name: self.name,
            href: self.href,
            image_src: self.image_src,
            alt: self.alt,
            category: self.category,
            tags: self.tags,
            width: self.width,
            height: self.height,
            created_at: Some(created_at),
        }
    }
}

/// Minimal publish schema mirrored next to the primary store. Accepts the
/// legacy Spanish field names on the way in, writes camelCase on the way out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorRecord {
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default)]
    pub href: String,
    #[serde(rename = "imageSrc", alias = "img_src", alias = "src")]
    pub image_src: String,
    #[serde(default)]
    pub alt: String,
}

impl From<&BannerRecord> for MirrorRecord {
    fn from(record: &BannerRecord) -> Self {
        Self {
            name: record.name.clone(),
            href: record.href.clone(),
            image_src: record.image_src.clone(),
            alt: record.alt.clone(),
        }
    }
}

/// A read-only row from an external catalog file. Same adapter aliases as the
/// canonical record, but no store id and never persisted locally.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default)]
    pub href: String,
    #[serde(alias = "img_src", alias = "src")]
    pub image_src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default, alias = "categoria")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Where a search candidate came from. Local candidates carry a store id;
/// catalog candidates need a freshly minted one if selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Catalog,
}

/// Merged search-candidate projection over store records and catalog entries.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub origin: Origin,
    pub id: Option<u64>,
    pub name: String,
    pub href: String,
    pub image_src: String,
    pub alt: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&BannerRecord> for Candidate {
    fn from(record: &BannerRecord) -> Self {
        Self {
            origin: Origin::Local,
            id: Some(record.id),
            name: record.name.clone(),
            href: record.href.clone(),
            image_src: record.image_src.clone(),
            alt: record.alt.clone(),
            category: record.category.clone(),
            tags: record.tags.clone(),
            width: record.width,
            height: record.height,
            created_at: record.created_at,
        }
    }
}

impl From<&CatalogEntry> for Candidate {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            origin: Origin::Catalog,
            id: None,
            name: entry.name.clone(),
            href: entry.href.clone(),
            image_src: entry.image_src.clone(),
            alt: entry.alt.clone(),
            category: entry.category.clone(),
            tags: entry.tags.clone(),
            width: entry.width,
            height: entry.height,
            created_at: entry.created_at,
        }
    }
}

impl Candidate {
    /// Turn a candidate into a concrete record, minting an id when the
    /// candidate does not already carry one.
    pub fn materialize(&self, ids: &mut IdGenerator) -> BannerRecord {
        BannerRecord {
            id: self.id.unwrap_or_else(|| ids.next_id()),
            name: self.name.clone(),
            href: self.href.clone(),
            image_src: self.image_src.clone(),
            alt: self.alt.clone(),
            category: self.category.clone(),
            tags: self.tags.clone(),
            width: self.width,
            height: self.height,
            created_at: Some(self.created_at.unwrap_or_else(Utc::now)),
        }
    }
}

/// Millisecond-timestamp + counter id source owned by the store. The counter
/// disambiguates ids minted within the same millisecond; when a burst
/// exhausts the 1000-id space of one millisecond, the generator borrows the
/// next millisecond instead of wrapping into it, so ids stay unique.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last_millis: i64,
    seq: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        let now = Utc::now().timestamp_millis();
        if now > self.last_millis {
            self.last_millis = now;
            self.seq = 0;
        } else {
            self.seq += 1;
            if self.seq == 1000 {
                self.last_millis += 1;
                self.seq = 0;
            }
        }
        (self.last_millis as u64) * 1000 + self.seq
    }
}

//! Precache manifest
//!
//! The manifest is produced by the application build and consumed as JSON: an
//! array whose items are either `{ "url": ..., "revision": ... }` objects or bare
//! URL strings. A bare string names an asset that is content-versioned already
//! (its URL changes when its content does), so it carries no revision.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use url::Url;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawManifestEntry {
    Url(String),
    Entry {
        url: String,
        #[serde(default)]
        revision: Option<String>,
    },
}

impl From<RawManifestEntry> for PrecacheEntry {
    fn from(raw: RawManifestEntry) -> Self {
        match raw {
            RawManifestEntry::Url(url) => PrecacheEntry { url, revision: None },
            RawManifestEntry::Entry { url, revision } => PrecacheEntry { url, revision },
        }
    }
}

/// One asset to precache
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawManifestEntry")]
pub struct PrecacheEntry {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl PrecacheEntry {
    pub fn new(url: impl Into<String>, revision: Option<String>) -> Self {
        Self {
            url: url.into(),
            revision,
        }
    }

    /// Resolve the entry URL (usually origin-relative) against `origin`
    pub fn resolve(&self, origin: &Url) -> Result<Url, String> {
        origin
            .join(&self.url)
            .map_err(|e| format!("invalid precache URL '{}': {}", self.url, e))
    }
}

/// Validated list of precache entries
///
/// Each URL appears once. Declaring a URL twice with the same revision is
/// tolerated and collapsed; declaring it with two different revisions is an
/// error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrecacheManifest {
    entries: Vec<PrecacheEntry>,
}

impl PrecacheManifest {
    pub fn new(entries: Vec<PrecacheEntry>) -> Result<Self, String> {
        let mut manifest = Self::default();
        manifest.extend(entries)?;
        Ok(manifest)
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let entries: Vec<PrecacheEntry> =
            serde_json::from_str(json).map_err(|e| format!("Failed to parse manifest: {}", e))?;
        Self::new(entries)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            format!("Failed to read manifest file '{}': {}", path.display(), e)
        })?;
        Self::from_json(&contents)
    }

    /// Append entries, rejecting conflicting revisions
    pub fn extend(&mut self, entries: impl IntoIterator<Item = PrecacheEntry>) -> Result<(), String> {
        let mut seen: HashMap<String, Option<String>> = self
            .entries
            .iter()
            .map(|entry| (entry.url.clone(), entry.revision.clone()))
            .collect();

        for entry in entries {
            match seen.get(&entry.url) {
                Some(revision) if *revision == entry.revision => continue,
                Some(revision) => {
                    return Err(format!(
                        "precache URL '{}' declared with conflicting revisions {:?} and {:?}",
                        entry.url, revision, entry.revision
                    ));
                }
                None => {
                    seen.insert(entry.url.clone(), entry.revision.clone());
                    self.entries.push(entry);
                }
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[PrecacheEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.entries.iter().any(|entry| entry.url == url)
    }
}

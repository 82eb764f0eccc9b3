//! Precache configuration types.
//!
//! The build manifest is read from `manifest`; `additional_entries` are appended
//! to it (taking `revision` when they carry none), and `critical` lists the URLs
//! whose absence leaves the app without offline support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_DIRECTORY_INDEX, DEFAULT_IGNORED_URL_PARAMETERS, DEFAULT_OFFLINE_URL,
    DEFAULT_PRECACHE_CONCURRENCY, ROOT_DOCUMENT_URL,
};
use crate::precache::{PrecacheEntry, PrecacheManifest};

fn default_critical() -> Vec<String> {
    vec![ROOT_DOCUMENT_URL.to_string(), DEFAULT_OFFLINE_URL.to_string()]
}

fn default_concurrency() -> usize {
    DEFAULT_PRECACHE_CONCURRENCY
}

fn default_ignore_url_parameters() -> Vec<String> {
    DEFAULT_IGNORED_URL_PARAMETERS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_directory_index() -> Option<String> {
    Some(DEFAULT_DIRECTORY_INDEX.to_string())
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecacheConfig {
    /// Path of the JSON manifest produced by the build
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
    /// Deployment revision (e.g. the git commit) for additional entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default)]
    pub additional_entries: Vec<PrecacheEntry>,
    #[serde(default = "default_critical")]
    pub critical: Vec<String>,
    /// Maximum concurrent fetches during install (default: 8)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Query parameter patterns ignored on precache lookup
    #[serde(default = "default_ignore_url_parameters")]
    pub ignore_url_parameters: Vec<String>,
    #[serde(default = "default_directory_index")]
    pub directory_index: Option<String>,
    /// Try `<path>.html` for extensionless URLs
    #[serde(default = "default_true")]
    pub clean_urls: bool,
}

impl Default for PrecacheConfig {
    fn default() -> Self {
        Self {
            manifest: None,
            revision: None,
            additional_entries: Vec::new(),
            critical: default_critical(),
            concurrency: default_concurrency(),
            ignore_url_parameters: default_ignore_url_parameters(),
            directory_index: default_directory_index(),
            clean_urls: true,
        }
    }
}

impl PrecacheConfig {
    /// Additional entries with the deployment revision filled in
    pub fn resolved_additional_entries(&self) -> Vec<PrecacheEntry> {
        self.additional_entries
            .iter()
            .map(|entry| PrecacheEntry {
                url: entry.url.clone(),
                revision: entry.revision.clone().or_else(|| self.revision.clone()),
            })
            .collect()
    }

    /// Build the manifest to install: the file given by `manifest_override`
    /// (or the configured `manifest`), plus the additional entries
    pub fn load_manifest(
        &self,
        manifest_override: Option<&std::path::Path>,
    ) -> Result<PrecacheManifest, String> {
        let path = manifest_override.or(self.manifest.as_deref());
        let mut manifest = match path {
            Some(path) => PrecacheManifest::from_file(path)?,
            None => PrecacheManifest::default(),
        };
        manifest.extend(self.resolved_additional_entries())?;
        Ok(manifest)
    }
}

//! Static asset synchronization.
//!
//! Mirrors the static directory into `<output>/static` and writes an asset
//! manifest mapping every file to its public URL.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Directory under the output root that receives static files.
pub const STATIC_SUBDIR: &str = "static";

/// Name of the generated manifest file.
pub const MANIFEST_FILE: &str = "asset-manifest.json";

/// Asset processing errors.
#[derive(Debug, Error)]
pub enum AssetError {
    /// IO error.
    #[error("asset IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest serialization error.
    #[error("failed to write asset manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl AssetError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for asset operations.
pub type Result<T> = std::result::Result<T, AssetError>;

/// Static files copied by the last sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    /// Public prefix under which assets are served.
    pub static_url: String,

    /// Relative asset path to public URL.
    pub assets: BTreeMap<String, String>,
}

impl AssetManifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new(static_url: impl Into<String>) -> Self {
        Self {
            static_url: static_url.into(),
            assets: BTreeMap::new(),
        }
    }

    /// Record an asset by its `/`-separated relative path.
    pub fn add(&mut self, relative: impl Into<String>) {
        let relative = relative.into();
        let url = format!("{}/{relative}", self.static_url.trim_end_matches('/'));
        self.assets.insert(relative, url);
    }

    /// Public URL of an asset.
    #[must_use]
    pub fn get(&self, relative: &str) -> Option<&str> {
        self.assets.get(relative).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Serialize manifest to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Copies static files into the output tree.
#[derive(Debug, Clone)]
pub struct AssetSync {
    static_url: String,
}

impl AssetSync {
    #[must_use]
    pub fn new(static_url: impl Into<String>) -> Self {
        Self {
            static_url: static_url.into(),
        }
    }

    /// Replace `<output_dir>/static` with a copy of `static_dir` and write the
    /// manifest to `<output_dir>/asset-manifest.json`.
    ///
    /// A missing static directory produces an empty manifest.
    pub fn sync(&self, static_dir: &Path, output_dir: &Path) -> Result<AssetManifest> {
        let dest = output_dir.join(STATIC_SUBDIR);
        info!(
            source = %static_dir.display(),
            dest = %dest.display(),
            "syncing static assets"
        );

        if dest.exists() {
            fs::remove_dir_all(&dest).map_err(|e| AssetError::io(&dest, e))?;
        }

        let mut manifest = AssetManifest::new(&self.static_url);
        if static_dir.is_dir() {
            self.copy_tree(static_dir, &dest, &mut manifest)?;
        } else {
            debug!(dir = %static_dir.display(), "static directory does not exist, skipping");
        }

        let manifest_path = output_dir.join(MANIFEST_FILE);
        fs::write(&manifest_path, manifest.to_json()?)
            .map_err(|e| AssetError::io(&manifest_path, e))?;

        info!(count = manifest.len(), "assets synced");
        Ok(manifest)
    }

    fn copy_tree(&self, source: &Path, dest: &Path, manifest: &mut AssetManifest) -> Result<()> {
        let walker = WalkDir::new(source)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| source.to_path_buf(), Path::to_path_buf);
                AssetError::Io {
                    path,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(source) else {
                continue;
            };
            let target = dest.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| AssetError::io(entry.path(), e))?;

            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            debug!(asset = %key, "copied asset");
            manifest.add(key);
        }

        Ok(())
    }
}

pub(crate) fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

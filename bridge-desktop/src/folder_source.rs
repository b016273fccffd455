//! Local Folder Library Source using Tokio
//!
//! Presents a directory tree as a library: directories are containers and
//! audio files are tracks. Identifiers are absolute paths.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    source::{ChildListing, Container, Identifier, LibrarySource, Resource, Track},
};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tracing::{debug, warn};

/// File extensions listed as tracks by default
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "aac", "aif", "aiff", "ape", "flac", "m4a", "mp3", "mp4", "mpc", "oga", "ogg", "opus", "wav",
    "wma", "wv",
];

/// Directory-backed library source
///
/// Tracks carry their absolute path as the single resource and an
/// `mtime:size` revision, so unchanged files are skipped on rescans.
/// Hidden entries (leading `.`) are ignored.
pub struct LocalFolderSource {
    source_id: String,
    extensions: HashSet<String>,
}

impl LocalFolderSource {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            extensions: AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Replace the recognised audio extensions (case-insensitive, no dot)
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// The platform music directory, used when no root is configured
    pub fn default_root() -> Option<PathBuf> {
        dirs::audio_dir()
    }

    /// Container identifier for a directory path
    pub fn identifier_for(path: &Path) -> Option<Identifier> {
        path.to_str().map(Identifier::new)
    }

    fn is_audio(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    fn revision(metadata: &std::fs::Metadata) -> String {
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("{}:{}", mtime, metadata.len())
    }
}

#[async_trait]
impl LibrarySource for LocalFolderSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn list_children(&self, container: &Identifier) -> Result<ChildListing> {
        let dir = Path::new(container.as_str());
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BridgeError::ContainerNotFound(container.to_string()))
            }
            Err(e) => return Err(BridgeError::Io(e)),
        };

        let mut found: Vec<(PathBuf, std::fs::Metadata)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            // Follows symlinks; cycles are caught by the crawler
            match fs::metadata(&path).await {
                Ok(metadata) => found.push((path, metadata)),
                Err(e) => warn!(path = ?path, error = %e, "Skipping unreadable entry"),
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut listing = ChildListing::empty();
        for (path, metadata) in found {
            let Some(id) = Self::identifier_for(&path) else {
                warn!(path = ?path, "Skipping non UTF-8 path");
                continue;
            };

            if metadata.is_dir() {
                listing.containers.push(Container::new(id, container.clone()));
            } else if metadata.is_file() && self.is_audio(&path) {
                let resource = Resource::new(id.as_str());
                listing.tracks.push(
                    Track::new(id, container.clone())
                        .with_resource(resource)
                        .with_revision(Self::revision(&metadata)),
                );
            }
        }

        debug!(
            container = %container,
            tracks = listing.tracks.len(),
            containers = listing.containers.len(),
            "Listed folder"
        );
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root_id(dir: &TempDir) -> Identifier {
        LocalFolderSource::identifier_for(dir.path()).unwrap()
    }

    #[tokio::test]
    async fn test_lists_audio_files_and_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("Album")).unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("a.FLAC"), b"xy").unwrap();
        std::fs::write(dir.path().join("cover.jpg"), b"img").unwrap();
        std::fs::write(dir.path().join(".hidden.mp3"), b"x").unwrap();

        let source = LocalFolderSource::new("local");
        let root = root_id(&dir);
        let listing = source.list_children(&root).await.unwrap();

        let tracks: Vec<_> = listing.tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            tracks,
            vec![
                dir.path().join("a.FLAC").to_str().unwrap(),
                dir.path().join("b.mp3").to_str().unwrap(),
            ]
        );
        assert_eq!(listing.containers.len(), 1);
        assert_eq!(listing.containers[0].parent, root);

        let track = &listing.tracks[0];
        assert_eq!(track.parent, root);
        assert_eq!(track.resources[0].location, track.id.as_str());
        assert!(track.revision.as_deref().unwrap().ends_with(":2"));
    }

    #[tokio::test]
    async fn test_revision_changes_with_content() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("song.mp3");
        std::fs::write(&file, b"x").unwrap();

        let source = LocalFolderSource::new("local");
        let before = source.list_children(&root_id(&dir)).await.unwrap();
        std::fs::write(&file, b"longer").unwrap();
        let after = source.list_children(&root_id(&dir)).await.unwrap();

        assert_ne!(before.tracks[0].revision, after.tracks[0].revision);
    }

    #[tokio::test]
    async fn test_custom_extensions() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("b.dsf"), b"x").unwrap();

        let source = LocalFolderSource::new("local").with_extensions([".DSF"]);
        let listing = source.list_children(&root_id(&dir)).await.unwrap();

        assert_eq!(listing.tracks.len(), 1);
        assert!(listing.tracks[0].id.as_str().ends_with("b.dsf"));
    }

    #[tokio::test]
    async fn test_empty_directory_is_empty_listing() {
        let dir = TempDir::new().unwrap();
        let listing = LocalFolderSource::new("local")
            .list_children(&root_id(&dir))
            .await
            .unwrap();
        assert!(listing.is_empty());
    }

    #[tokio::test]
    async fn test_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = Identifier::new(dir.path().join("gone").to_str().unwrap());

        let result = LocalFolderSource::new("local").list_children(&missing).await;
        assert!(matches!(result, Err(BridgeError::ContainerNotFound(_))));
    }

    #[test]
    fn test_local_source_needs_no_network() {
        assert!(!LocalFolderSource::new("local").requires_network());
    }
}

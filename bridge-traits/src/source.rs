//! Library Source Abstraction
//!
//! Describes the browsable shape of a music library as reported by a host
//! source (local folders, a media server, a content provider) and the
//! resolver used to open host-managed content handles.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{BridgeError, Result};

/// Opaque, source-scoped reference to a container or track.
///
/// Two identifiers are equal iff their string forms are equal. Top-level
/// roots use [`Identifier::none`] as their parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Parent marker for top-level containers.
    pub fn none() -> Self {
        Self(String::new())
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "<none>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Location class of a [`Resource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Absolute path or `file://` URI
    File,
    /// Host-resolved `content://` handle
    Content,
    /// `http://` or `https://` URL, fetched with the resource headers
    Remote,
}

/// Playable location of a track plus transport headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub location: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Resource {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Classify the location by scheme.
    ///
    /// A location without a `scheme://` prefix is a direct file path, which
    /// covers Unix, Windows (`C:\...`, `\\?\...`) and relative paths.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnsupportedResource`] for an empty location or
    /// any scheme other than `file`, `content`, `http` or `https`.
    pub fn kind(&self) -> Result<ResourceKind> {
        if self.location.is_empty() {
            return Err(BridgeError::UnsupportedResource(self.location.clone()));
        }

        let Some(scheme) = self
            .location
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .filter(|scheme| is_url_scheme(scheme))
        else {
            return Ok(ResourceKind::File);
        };

        match scheme.to_ascii_lowercase().as_str() {
            "file" => Ok(ResourceKind::File),
            "content" => Ok(ResourceKind::Content),
            "http" | "https" => Ok(ResourceKind::Remote),
            _ => Err(BridgeError::UnsupportedResource(self.location.clone())),
        }
    }
}

/// RFC 3986 scheme: a letter followed by letters, digits, `+`, `-` or `.`
fn is_url_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Leaf node referring to one playable audio item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: Identifier,
    pub parent: Identifier,
    pub resources: Vec<Resource>,
    /// Opaque content version (mtime, etag, ...) used to skip unchanged tracks
    pub revision: Option<String>,
}

impl Track {
    pub fn new(id: impl Into<Identifier>, parent: impl Into<Identifier>) -> Self {
        Self {
            id: id.into(),
            parent: parent.into(),
            resources: Vec::new(),
            revision: None,
        }
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

/// Node that can have children (folder, album, artist, playlist).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Container {
    pub id: Identifier,
    pub parent: Identifier,
}

impl Container {
    pub fn new(id: impl Into<Identifier>, parent: impl Into<Identifier>) -> Self {
        Self {
            id: id.into(),
            parent: parent.into(),
        }
    }
}

/// Direct children of one container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildListing {
    pub tracks: Vec<Track>,
    pub containers: Vec<Container>,
}

impl ChildListing {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.containers.is_empty()
    }
}

/// Library source trait
///
/// A source answers "children of container" queries. Implementations must
/// return only direct children and must report an empty container as an
/// empty listing rather than an error.
///
/// # Platform Support
///
/// - **Desktop**: local directories (`bridge-desktop::LocalFolderSource`)
/// - **Mobile/Web**: host content providers or media servers
///
/// # Example
///
/// ```ignore
/// use bridge_traits::source::{Identifier, LibrarySource};
///
/// async fn count_roots(source: &dyn LibrarySource, root: &Identifier) -> usize {
///     source
///         .list_children(root)
///         .await
///         .map(|listing| listing.containers.len())
///         .unwrap_or(0)
/// }
/// ```
#[async_trait]
pub trait LibrarySource: Send + Sync {
    /// Stable identifier of this source, used to scope persisted roots
    fn source_id(&self) -> &str;

    /// Whether browsing this source needs network connectivity
    fn requires_network(&self) -> bool {
        false
    }

    /// List the direct children of `container`
    async fn list_children(&self, container: &Identifier) -> Result<ChildListing>;
}

/// Resolves host-managed `content://` handles to their bytes.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn open(&self, handle: &str) -> Result<Bytes>;
}

//! Audio Tag Extraction
//!
//! This module reads tags from a track [`Resource`] using the `lofty` crate.
//! It supports ID3v2, Vorbis Comments, MP4 atoms, APE and RIFF INFO tags.
//!
//! ## Overview
//!
//! - Loads the resource bytes: local paths and `file://` URIs from disk,
//!   `content://` handles through a [`ContentResolver`], and `http(s)://`
//!   URLs through an [`HttpClient`] with the resource's headers
//! - Reads the primary tag (falling back to the first tag present)
//! - Repairs mojibake and normalizes whitespace in free-text fields
//! - Keeps only the leading number of "N/total" track and disc values
//! - Derives mime type, bitrate and duration from the audio properties
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::source::Resource;
//! use core_metadata::{Extractor, MetadataExtractor};
//!
//! # async fn example() -> core_metadata::Result<()> {
//! let extractor = MetadataExtractor::new();
//! let metadata = extractor.extract(&Resource::new("/music/song.flac")).await?;
//!
//! println!("Artist: {}", metadata.artist.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::source::{ContentResolver, Resource, ResourceKind, Track};
use bytes::Bytes;
use core_library::models::TrackMetadata;
use core_runtime::logging::{redact_url, strip_path};
use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::io::{Cursor, ErrorKind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::error::{MetadataError, Result};
use crate::text::{clean_text, parse_leading_number};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads tag metadata for one resource.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract metadata from a single resource.
    ///
    /// # Errors
    ///
    /// Fails when the resource cannot be opened or decoded. Failures are
    /// per-track; callers count them and move on.
    async fn extract(&self, resource: &Resource) -> Result<TrackMetadata>;

    /// Extract from the first resource of `track` that succeeds.
    ///
    /// Returns the last failure when every resource fails, and
    /// [`MetadataError::NoResources`] when the track has none.
    async fn extract_track(&self, track: &Track) -> Result<TrackMetadata> {
        let mut last_error = MetadataError::NoResources;

        for resource in &track.resources {
            match self.extract(resource).await {
                Ok(metadata) => return Ok(metadata),
                Err(e) => {
                    debug!(
                        track = %track.id,
                        location = %display_location(&resource.location),
                        error = %e,
                        "Resource extraction failed"
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// `lofty`-backed [`Extractor`].
///
/// Remote and content-handle resources need the matching bridge; without it
/// they fail with [`MetadataError::MissingCapability`].
pub struct MetadataExtractor {
    parse_options: ParseOptions,
    http_client: Option<Arc<dyn HttpClient>>,
    content_resolver: Option<Arc<dyn ContentResolver>>,
    request_timeout: Duration,
}

impl MetadataExtractor {
    /// Create an extractor for local files only
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
            http_client: None,
            content_resolver: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create an extractor with custom parse options
    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self {
            parse_options,
            ..Self::new()
        }
    }

    /// Enable `http(s)://` resources
    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Enable `content://` resources
    pub fn with_content_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.content_resolver = Some(resolver);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Parse tags from an in-memory copy of an audio file.
    ///
    /// # Errors
    ///
    /// [`MetadataError::UnsupportedFormat`] when the container format is not
    /// recognised, [`MetadataError::CorruptedFile`] when it cannot be parsed.
    pub fn extract_from_bytes(&self, data: &[u8]) -> Result<TrackMetadata> {
        let probe = Probe::new(Cursor::new(data))
            .options(self.parse_options)
            .guess_file_type()?;

        if probe.file_type().is_none() {
            return Err(MetadataError::UnsupportedFormat(
                "unrecognised audio container".to_string(),
            ));
        }

        let tagged_file = probe
            .read()
            .map_err(|e| MetadataError::CorruptedFile(e.to_string()))?;

        let properties = tagged_file.properties();
        let mut metadata = TrackMetadata {
            mime_type: Some(file_type_to_mime_type(tagged_file.file_type()).to_string()),
            bitrate: properties.audio_bitrate().map(|kbps| i64::from(kbps) * 1000),
            duration_ms: duration_ms(properties.duration()),
            ..Default::default()
        };

        match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            Some(tag) => read_tag(tag, &mut metadata),
            None => debug!("No tags present, keeping audio properties only"),
        }

        Ok(metadata)
    }

    async fn load(&self, resource: &Resource) -> Result<Bytes> {
        match resource.kind()? {
            ResourceKind::File => {
                let path = file_path(&resource.location);
                match fs::read(&path).await {
                    Ok(data) => Ok(Bytes::from(data)),
                    Err(e) if e.kind() == ErrorKind::NotFound => Err(MetadataError::FileNotFound(
                        strip_path(&resource.location).to_string(),
                    )),
                    Err(e) => Err(MetadataError::Io(e)),
                }
            }
            ResourceKind::Content => {
                let resolver = self.content_resolver.as_ref().ok_or_else(|| {
                    MetadataError::MissingCapability {
                        capability: "content resolver",
                        location: redact_url(&resource.location),
                    }
                })?;
                Ok(resolver.open(&resource.location).await?)
            }
            ResourceKind::Remote => {
                let client =
                    self.http_client
                        .as_ref()
                        .ok_or_else(|| MetadataError::MissingCapability {
                            capability: "HTTP client",
                            location: redact_url(&resource.location),
                        })?;

                let request = HttpRequest::get(resource.location.as_str())
                    .headers(&resource.headers)
                    .timeout(self.request_timeout);
                let response = client.execute(request).await?;
                Ok(response.into_body()?)
            }
        }
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for MetadataExtractor {
    async fn extract(&self, resource: &Resource) -> Result<TrackMetadata> {
        debug!(
            location = %display_location(&resource.location),
            "Extracting metadata"
        );

        let data = self.load(resource).await?;
        self.extract_from_bytes(&data)
    }
}

fn read_tag(tag: &Tag, metadata: &mut TrackMetadata) {
    metadata.title = tag.title().map(|v| clean_text(&v));
    metadata.artist = tag.artist().map(|v| clean_text(&v));
    metadata.album = tag.album().map(|v| clean_text(&v));
    metadata.genre = tag.genre().map(|v| clean_text(&v));
    metadata.album_artist = tag.get_string(&ItemKey::AlbumArtist).map(clean_text);
    metadata.track_number = tag
        .get_string(&ItemKey::TrackNumber)
        .and_then(parse_leading_number);
    metadata.disc_number = tag
        .get_string(&ItemKey::DiscNumber)
        .and_then(parse_leading_number);
    metadata.is_compilation = tag
        .get_string(&ItemKey::FlagCompilation)
        .and_then(parse_leading_number);
}

/// Filesystem path for a local location (absolute path or `file://` URI).
fn duration_ms(duration: Duration) -> Option<i64> {
    i64::try_from(duration.as_millis()).ok()
}

fn file_path(location: &str) -> PathBuf {
    let Some(rest) = location
        .get(..7)
        .filter(|scheme| scheme.eq_ignore_ascii_case("file://"))
        .map(|_| &location[7..])
    else {
        return PathBuf::from(location);
    };

    // `file://host/path` keeps only the path
    let path = match rest.find('/') {
        Some(idx) => &rest[idx..],
        None => rest,
    };

    match urlencoding::decode(path) {
        Ok(decoded) => PathBuf::from(decoded.into_owned()),
        Err(_) => PathBuf::from(path),
    }
}

fn display_location(location: &str) -> String {
    if location.starts_with('/') || location.to_ascii_lowercase().starts_with("file://") {
        strip_path(location).to_string()
    } else {
        redact_url(location)
    }
}

/// Convert a lofty file type to a MIME type string
fn file_type_to_mime_type(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Aac => "audio/aac",
        FileType::Aiff => "audio/aiff",
        FileType::Ape => "audio/ape",
        FileType::Flac => "audio/flac",
        FileType::Mpeg => "audio/mpeg",
        FileType::Mp4 => "audio/mp4",
        FileType::Mpc => "audio/musepack",
        FileType::Opus => "audio/opus",
        FileType::Vorbis => "audio/vorbis",
        FileType::Speex => "audio/speex",
        FileType::Wav => "audio/wav",
        FileType::WavPack => "audio/wavpack",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    mock! {
        Resolver {}

        #[async_trait]
        impl ContentResolver for Resolver {
            async fn open(&self, handle: &str) -> BridgeResult<Bytes>;
        }
    }

    #[test]
    fn test_file_path_variants() {
        assert_eq!(file_path("/music/a.mp3"), PathBuf::from("/music/a.mp3"));
        assert_eq!(
            file_path("file:///music/My%20Song.mp3"),
            PathBuf::from("/music/My Song.mp3")
        );
        assert_eq!(
            file_path("FILE://localhost/music/a.mp3"),
            PathBuf::from("/music/a.mp3")
        );
    }

    #[test]
    fn test_duration_conversion_is_checked() {
        assert_eq!(duration_ms(Duration::from_millis(215_500)), Some(215_500));
        assert_eq!(duration_ms(Duration::ZERO), Some(0));
        assert_eq!(duration_ms(Duration::MAX), None);
    }

    #[test]
    fn test_mime_type_mapping() {
        assert_eq!(file_type_to_mime_type(FileType::Mpeg), "audio/mpeg");
        assert_eq!(file_type_to_mime_type(FileType::Flac), "audio/flac");
        assert_eq!(file_type_to_mime_type(FileType::Wav), "audio/wav");
    }

    #[test]
    fn test_display_location_hides_private_parts() {
        assert_eq!(display_location("/home/jane/Music/a.mp3"), "a.mp3");
        assert_eq!(
            display_location("https://user:pw@cdn.example.com/a.mp3?token=x"),
            "https://cdn.example.com/a.mp3"
        );
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let extractor = MetadataExtractor::new();
        assert!(extractor
            .extract_from_bytes(b"This is not a valid audio file")
            .is_err());
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let extractor = MetadataExtractor::new();
        let result = extractor.extract(&Resource::new("ftp://host/a.mp3")).await;

        assert!(matches!(
            result,
            Err(MetadataError::Bridge(BridgeError::UnsupportedResource(_)))
        ));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let extractor = MetadataExtractor::new();
        let result = extractor
            .extract(&Resource::new("/nonexistent/dir/missing.mp3"))
            .await;

        match result {
            Err(MetadataError::FileNotFound(name)) => assert_eq!(name, "missing.mp3"),
            other => panic!("expected FileNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_schemeless_locations_are_read_from_disk() {
        let extractor = MetadataExtractor::new();

        for location in [r"C:\Music\missing.mp3", "no/such/dir/missing.mp3"] {
            match extractor.extract(&Resource::new(location)).await {
                Err(MetadataError::FileNotFound(name)) => assert_eq!(name, "missing.mp3"),
                other => panic!("expected FileNotFound for {}, got {:?}", location, other),
            }
        }
    }

    #[tokio::test]
    async fn test_remote_without_client_is_missing_capability() {
        let extractor = MetadataExtractor::new();
        let result = extractor
            .extract(&Resource::new("https://example.com/a.mp3?sig=secret"))
            .await;

        match result {
            Err(MetadataError::MissingCapability { location, .. }) => {
                assert_eq!(location, "https://example.com/a.mp3")
            }
            other => panic!("expected MissingCapability, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_content_without_resolver_is_missing_capability() {
        let extractor = MetadataExtractor::new();
        let result = extractor
            .extract(&Resource::new("content://media/external/audio/7"))
            .await;

        assert!(matches!(
            result,
            Err(MetadataError::MissingCapability {
                capability: "content resolver",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_remote_request_carries_resource_headers() {
        let mut client = MockHttpClient::new();
        client
            .expect_execute()
            .withf(|request| {
                request.url == "https://example.com/a.mp3"
                    && request.headers.get("Authorization").map(String::as_str)
                        == Some("Bearer t")
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse {
                    status: 403,
                    headers: HashMap::new(),
                    body: Bytes::new(),
                })
            });

        let extractor = MetadataExtractor::new().with_http_client(Arc::new(client));
        let resource =
            Resource::new("https://example.com/a.mp3").with_header("Authorization", "Bearer t");

        let result = extractor.extract(&resource).await;
        assert!(matches!(
            result,
            Err(MetadataError::Bridge(BridgeError::OperationFailed(_)))
        ));
    }

    #[tokio::test]
    async fn test_content_handle_goes_through_resolver() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_open()
            .withf(|handle| handle == "content://media/7")
            .times(1)
            .returning(|_| Ok(Bytes::from_static(b"not audio")));

        let extractor = MetadataExtractor::new().with_content_resolver(Arc::new(resolver));
        let result = extractor.extract(&Resource::new("content://media/7")).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_extract_track_without_resources() {
        let extractor = MetadataExtractor::new();
        let track = Track::new("t1", "root");

        assert!(matches!(
            extractor.extract_track(&track).await,
            Err(MetadataError::NoResources)
        ));
    }
}

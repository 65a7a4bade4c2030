//! Input resolution: turn a user-supplied path or URL into a `SourceDocument`.
//!
//! The extraction service receives the document inline, so the whole file is
//! read into memory here. The media type is sniffed from the magic bytes
//! rather than trusted from the file extension; the orchestrator's pre-flight
//! check then decides whether the document is acceptable.

use crate::config::PDF_MEDIA_TYPE;
use crate::error::Pdf2OfficeError;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Media type assigned when the magic bytes are not recognised.
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// A document held in memory, ready to hand to the orchestrator.
#[derive(Clone)]
pub struct SourceDocument {
    /// Original file name; only used to derive the output filename.
    pub name: String,
    /// Declared media type.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// Wrap in-memory bytes, sniffing the media type.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: sniff_media_type(&bytes).to_string(),
            bytes,
        }
    }

    /// Wrap in-memory bytes with an explicitly declared media type.
    pub fn with_media_type(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// Identify the media type from leading magic bytes.
pub fn sniff_media_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF") {
        PDF_MEDIA_TYPE
    } else {
        UNKNOWN_MEDIA_TYPE
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory document.
///
/// URLs are downloaded; anything else is treated as a local path.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<SourceDocument, Pdf2OfficeError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Read a local file, mapping I/O failures to input errors.
async fn read_local(path: &Path) -> Result<SourceDocument, Pdf2OfficeError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2OfficeError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Pdf2OfficeError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = file_name_of(path);
    debug!("Read local document {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceDocument::from_bytes(name, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, Pdf2OfficeError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2OfficeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2OfficeError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2OfficeError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2OfficeError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2OfficeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(SourceDocument::from_bytes(filename_from_url(url), bytes.to_vec()))
}

/// Last path segment of a URL when it looks like a file name.
pub fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn sniffs_pdf_magic() {
        assert_eq!(sniff_media_type(b"%PDF-1.7\n..."), PDF_MEDIA_TYPE);
        assert_eq!(sniff_media_type(b"PK\x03\x04"), UNKNOWN_MEDIA_TYPE);
        assert_eq!(sniff_media_type(b""), UNKNOWN_MEDIA_TYPE);
    }

    #[test]
    fn url_filename_extraction() {
        assert_eq!(filename_from_url("https://x.org/files/report.pdf"), "report.pdf");
        assert_eq!(filename_from_url("https://x.org/pdf/1706.03762"), "1706.03762");
        assert_eq!(filename_from_url("https://x.org/"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn reads_local_file() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"%PDF-1.4 body").unwrap();
        let doc = resolve_input(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.media_type, PDF_MEDIA_TYPE);
        assert_eq!(doc.len(), 13);
        assert!(doc.name.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, Pdf2OfficeError::FileNotFound { .. }));
    }
}

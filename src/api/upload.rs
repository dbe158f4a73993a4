//! Article images sent inline as base64 data URLs
//!
//! Images are decoded and written under the configured upload directory,
//! which the router serves at `/images`.

use data_encoding::BASE64;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tokio::fs;

use crate::config::UploadConfig;

static DATA_URL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^data:image/([A-Za-z\-+/]+);base64,(.+)$").ok());

/// URL prefix the upload directory is served under
pub const IMAGES_ROUTE: &str = "/images";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid base64 image format")]
    InvalidFormat,
    #[error("Image exceeds {max} bytes")]
    TooLarge { max: u64 },
    #[error("Failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// Keep ASCII letters and digits, replace the rest, cap at 50 chars
fn safe_name(title: &str) -> String {
    title
        .chars()
        .take(50)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Decode a `data:image/<type>;base64,<payload>` URL.
///
/// Returns the file extension and the raw bytes.
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>), UploadError> {
    let regex = DATA_URL.as_ref().ok_or(UploadError::InvalidFormat)?;
    let captures = regex.captures(data_url.trim()).ok_or(UploadError::InvalidFormat)?;
    let ext = safe_name(&captures[1]);
    let bytes = BASE64
        .decode(captures[2].as_bytes())
        .map_err(|_| UploadError::InvalidFormat)?;
    Ok((ext, bytes))
}

/// Write the image and return its public URL
pub async fn save_base64_image(
    config: &UploadConfig,
    title: &str,
    data_url: &str,
) -> Result<String, UploadError> {
    let (ext, bytes) = decode_data_url(data_url)?;
    if bytes.len() as u64 > config.max_file_size {
        return Err(UploadError::TooLarge {
            max: config.max_file_size,
        });
    }

    ensure_upload_dir(&config.path).await?;
    let filename = format!(
        "article_{}_{}.{}",
        safe_name(title),
        chrono::Utc::now().timestamp_millis(),
        ext
    );
    fs::write(config.path.join(&filename), &bytes).await?;
    tracing::debug!(filename = %filename, size = bytes.len(), "Image stored");

    Ok(format!("{}/{}", IMAGES_ROUTE, filename))
}

async fn ensure_upload_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // 1x1 transparent PNG
    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("Mi artículo #1"), "Mi_art_culo__1");
        assert_eq!(safe_name(&"x".repeat(80)).len(), 50);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(decode_data_url("not a data url"), Err(UploadError::InvalidFormat)));
        assert!(matches!(
            decode_data_url("data:text/plain;base64,aGVsbG8="),
            Err(UploadError::InvalidFormat)
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,%%%"),
            Err(UploadError::InvalidFormat)
        ));
        let (ext, _) = decode_data_url("data:image/svg+xml;base64,aGVsbG8=").unwrap();
        assert_eq!(ext, "svg_xml");
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let dir = TempDir::new().unwrap();
        let config = UploadConfig {
            path: dir.path().join("images"),
            max_file_size: 1024,
        };
        let data_url = format!("data:image/png;base64,{}", PIXEL);
        let url = save_base64_image(&config, "Cover photo", &data_url)
            .await
            .unwrap();
        assert!(url.starts_with("/images/article_Cover_photo_"));
        assert!(url.ends_with(".png"));

        let filename = url.trim_start_matches("/images/");
        let written = std::fs::read(config.path.join(filename)).unwrap();
        assert_eq!(&written[1..4], b"PNG");
    }

    #[tokio::test]
    async fn test_size_limit() {
        let dir = TempDir::new().unwrap();
        let config = UploadConfig {
            path: dir.path().to_path_buf(),
            max_file_size: 10,
        };
        let data_url = format!("data:image/png;base64,{}", PIXEL);
        let result = save_base64_image(&config, "Big", &data_url).await;
        assert!(matches!(result, Err(UploadError::TooLarge { max: 10 })));
    }
}

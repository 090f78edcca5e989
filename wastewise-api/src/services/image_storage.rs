//! Article image storage
//!
//! Uploads are validated (type sniffed from magic bytes, size capped),
//! downscaled to at most 1920 px wide, re-encoded as JPEG and written under a
//! generated name. Nothing touches the disk until validation has passed.

use axum::extract::multipart::{Field, MultipartError};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use rand::RngCore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use wastewise_common::db::articles::CoverImage;

/// Maximum accepted upload size (10 MiB)
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Accepted MIME types
pub const ALLOWED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// Images wider than this are downscaled
pub const MAX_WIDTH: u32 = 1920;

pub const JPEG_QUALITY: u8 = 80;

/// Image storage errors
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("No file uploaded")]
    Missing,

    #[error("Invalid file type: {0}. Only PNG, JPG, and GIF are allowed")]
    InvalidType(String),

    #[error("File too large: {0} bytes. Maximum size is 10MB")]
    TooLarge(usize),

    #[error("Invalid image filename: {0}")]
    InvalidFilename(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image task failed: {0}")]
    Task(String),
}

impl ImageError {
    /// Caller-side problems (400) as opposed to server faults
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ImageError::Missing
                | ImageError::InvalidType(_)
                | ImageError::TooLarge(_)
                | ImageError::InvalidFilename(_)
        )
    }
}

/// The shapes an incoming image can take
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Bytes held in memory
    Buffer {
        bytes: Vec<u8>,
        filename: Option<String>,
        content_type: Option<String>,
    },
    /// A file already spooled to disk
    TempPath {
        path: PathBuf,
        filename: Option<String>,
        content_type: Option<String>,
    },
    /// A previously stored image, by URL or bare filename
    Existing(String),
}

impl ImageSource {
    /// Drain a multipart field into a buffer
    ///
    /// Returns `None` for a field with no filename and no content, which is
    /// how browsers send an empty file input.
    pub async fn from_field(field: Field<'_>) -> Result<Option<Self>, MultipartError> {
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        if bytes.is_empty() && filename.as_deref().map(str::is_empty).unwrap_or(true) {
            return Ok(None);
        }

        Ok(Some(ImageSource::Buffer {
            bytes: bytes.to_vec(),
            filename,
            content_type,
        }))
    }
}

/// Metadata of a stored image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredImage {
    pub filename: String,
    pub originalname: String,
    pub mimetype: String,
    /// Bytes on disk (0 for `ImageSource::Existing`)
    pub size: u64,
}

impl StoredImage {
    pub fn to_cover(&self) -> CoverImage {
        CoverImage {
            filename: self.filename.clone(),
            original_name: Some(self.originalname.clone()),
            size: self.size as i64,
            mime_type: self.mimetype.clone(),
        }
    }
}

/// Upload directory handle
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if missing
    pub async fn ensure_dir(&self) -> Result<(), ImageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Validate, process and persist an image
    pub async fn store(&self, source: ImageSource) -> Result<StoredImage, ImageError> {
        let (bytes, original_name, declared) = match source {
            ImageSource::Existing(reference) => return Ok(existing_image(&reference)),
            ImageSource::Buffer {
                bytes,
                filename,
                content_type,
            } => (bytes, filename, content_type),
            ImageSource::TempPath {
                path,
                filename,
                content_type,
            } => {
                let len = tokio::fs::metadata(&path).await?.len() as usize;
                if len > MAX_FILE_SIZE {
                    return Err(ImageError::TooLarge(len));
                }
                let name = filename.or_else(|| {
                    path.file_name().map(|n| n.to_string_lossy().into_owned())
                });
                (tokio::fs::read(&path).await?, name, content_type)
            }
        };

        let original_name = original_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "image.jpg".to_string());
        let mime = validate(&bytes, declared.as_deref())?;

        self.ensure_dir().await?;

        // Decode/encode is CPU-bound
        let processed = tokio::task::spawn_blocking(move || {
            let encoded = process(&bytes);
            (bytes, encoded)
        })
        .await
        .map_err(|e| ImageError::Task(e.to_string()))?;

        let (data, mimetype, filename) = match processed {
            (_, Some(jpeg)) => (jpeg, "image/jpeg".to_string(), generate_filename(".jpg")),
            (raw, None) => {
                warn!(original = %original_name, "Image decode failed, storing original bytes");
                let ext = extension_for(&original_name, &mime);
                (raw, mime, generate_filename(&ext))
            }
        };

        let path = self.dir.join(&filename);
        tokio::fs::write(&path, &data).await?;

        info!(filename = %filename, bytes = data.len(), "Stored article image");

        Ok(StoredImage {
            filename,
            originalname: original_name,
            mimetype,
            size: data.len() as u64,
        })
    }

    /// Remove a stored image
    ///
    /// Only bare filenames are accepted. Returns `false` when the file was
    /// already gone.
    pub async fn delete(&self, filename: &str) -> Result<bool, ImageError> {
        if !is_bare_filename(filename) {
            return Err(ImageError::InvalidFilename(filename.to_string()));
        }

        match tokio::fs::remove_file(self.dir.join(filename)).await {
            Ok(()) => {
                debug!(filename = %filename, "Deleted article image");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(filename = %filename, "Image to delete was not found");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Check size and type, returning the effective MIME type
///
/// The type is sniffed from magic bytes; the declared type is only used
/// when sniffing finds nothing.
pub fn validate(bytes: &[u8], declared: Option<&str>) -> Result<String, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Missing);
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ImageError::TooLarge(bytes.len()));
    }

    let mime = match infer::get(bytes) {
        Some(kind) => kind.mime_type().to_string(),
        None => declared
            .map(|d| d.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    };

    if ALLOWED_TYPES.contains(&mime.as_str()) {
        Ok(mime)
    } else {
        Err(ImageError::InvalidType(mime))
    }
}

/// Downscale to `MAX_WIDTH` (never enlarging) and encode as JPEG
///
/// `None` when the bytes cannot be decoded.
pub fn process(bytes: &[u8]) -> Option<Vec<u8>> {
    let img = image::load_from_memory(bytes).ok()?;

    let img = if img.width() > MAX_WIDTH {
        let height = ((img.height() as u64 * MAX_WIDTH as u64) / img.width() as u64).max(1) as u32;
        img.resize_exact(MAX_WIDTH, height, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder.encode_image(&rgb).ok()?;
    Some(out)
}

/// `<unix-millis>-<16 hex chars><ext>`
pub fn generate_filename(ext: &str) -> String {
    let mut random = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut random);
    format!(
        "{}-{}{}",
        chrono::Utc::now().timestamp_millis(),
        hex::encode(random),
        ext
    )
}

fn extension_for(original_name: &str, mime: &str) -> String {
    match Path::new(original_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!(".{}", ext),
        _ => match mime {
            "image/png" => ".png".to_string(),
            "image/gif" => ".gif".to_string(),
            _ => ".jpg".to_string(),
        },
    }
}

fn mime_for_name(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".png") {
        "image/png"
    } else {
        "image/gif"
    }
}

fn existing_image(reference: &str) -> StoredImage {
    let filename = reference
        .rsplit('/')
        .next()
        .unwrap_or(reference)
        .to_string();

    StoredImage {
        mimetype: mime_for_name(&filename).to_string(),
        originalname: filename.clone(),
        filename,
        size: 0,
    }
}

fn is_bare_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 200, 30, 128]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_filename_format() {
        let name = generate_filename(".jpg");
        let (millis, rest) = name.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(rest.len(), 16 + 4);
        assert!(rest[..16].chars().all(|c| c.is_ascii_hexdigit()));
        assert!(rest.ends_with(".jpg"));
        assert_ne!(generate_filename(".jpg"), generate_filename(".jpg"));
    }

    #[test]
    fn test_validate_sniffs_real_type() {
        let png = png_bytes(4, 4);
        // Declared type is ignored when magic bytes are recognised
        assert_eq!(validate(&png, Some("image/gif")).unwrap(), "image/png");

        let pdf = b"%PDF-1.4 fake".to_vec();
        assert!(matches!(
            validate(&pdf, Some("image/png")),
            Err(ImageError::InvalidType(_))
        ));

        assert!(matches!(validate(&[], None), Err(ImageError::Missing)));
    }

    #[test]
    fn test_validate_rejects_oversize() {
        let big = vec![0u8; MAX_FILE_SIZE + 1];
        assert!(matches!(validate(&big, Some("image/jpeg")), Err(ImageError::TooLarge(_))));
    }

    #[test]
    fn test_process_downscales_wide_images() {
        let wide = png_bytes(2400, 1200);
        let jpeg = process(&wide).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 1920);
        assert_eq!(decoded.height(), 960);
    }

    #[test]
    fn test_process_never_enlarges() {
        let img = RgbImage::from_pixel(300, 200, image::Rgb([1, 2, 3]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();

        let jpeg = process(&buf.into_inner()).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (300, 200));
    }

    #[test]
    fn test_process_undecodable_is_none() {
        // Valid JPEG magic, garbage body
        let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x01, 0x02];
        assert!(process(&bytes).is_none());
    }

    #[tokio::test]
    async fn test_store_buffer_writes_jpeg() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().join("articles"));

        let stored = store
            .store(ImageSource::Buffer {
                bytes: png_bytes(10, 10),
                filename: Some("leaf.png".to_string()),
                content_type: Some("image/png".to_string()),
            })
            .await
            .unwrap();

        assert!(stored.filename.ends_with(".jpg"));
        assert_eq!(stored.mimetype, "image/jpeg");
        assert_eq!(stored.originalname, "leaf.png");
        let on_disk = std::fs::metadata(store.dir().join(&stored.filename)).unwrap();
        assert_eq!(on_disk.len(), stored.size);
    }

    #[tokio::test]
    async fn test_store_undecodable_keeps_original_bytes() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path());
        let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x01, 0x02];

        let stored = store
            .store(ImageSource::Buffer {
                bytes: bytes.clone(),
                filename: Some("broken.jpeg".to_string()),
                content_type: None,
            })
            .await
            .unwrap();

        assert!(stored.filename.ends_with(".jpeg"));
        let written = std::fs::read(dir.path().join(&stored.filename)).unwrap();
        assert_eq!(written, bytes);
    }

    #[tokio::test]
    async fn test_rejected_upload_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().join("articles"));

        let err = store
            .store(ImageSource::Buffer {
                bytes: b"plain text".to_vec(),
                filename: Some("notes.txt".to_string()),
                content_type: Some("text/plain".to_string()),
            })
            .await
            .unwrap_err();

        assert!(err.is_rejection());
        assert!(!store.dir().exists());
    }

    #[tokio::test]
    async fn test_store_from_temp_path() {
        let dir = TempDir::new().unwrap();
        let temp = dir.path().join("upload.tmp");
        std::fs::write(&temp, png_bytes(8, 8)).unwrap();

        let store = ImageStore::new(dir.path().join("out"));
        let stored = store
            .store(ImageSource::TempPath {
                path: temp,
                filename: Some("photo.png".to_string()),
                content_type: None,
            })
            .await
            .unwrap();

        assert_eq!(stored.originalname, "photo.png");
        assert!(store.dir().join(&stored.filename).exists());
    }

    #[tokio::test]
    async fn test_existing_reference_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().join("never"));

        let stored = store
            .store(ImageSource::Existing("/uploads/articles/123-abc.png".to_string()))
            .await
            .unwrap();

        assert_eq!(stored.filename, "123-abc.png");
        assert_eq!(stored.mimetype, "image/png");
        assert_eq!(stored.size, 0);
        assert!(!store.dir().exists());
    }

    #[tokio::test]
    async fn test_delete_rejects_paths_and_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path());

        assert!(matches!(
            store.delete("../secret").await,
            Err(ImageError::InvalidFilename(_))
        ));
        assert!(!store.delete("missing.jpg").await.unwrap());

        std::fs::write(dir.path().join("present.jpg"), b"x").unwrap();
        assert!(store.delete("present.jpg").await.unwrap());
        assert!(!dir.path().join("present.jpg").exists());
    }
}

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info};

/// 5 MiB per image
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Identify the format from the file's magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// Upload presets, one storage area per use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePreset {
    Listing,
    ListingThumbnail,
    Avatar,
}

impl ImagePreset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Listing => "bidhub_listing",
            Self::ListingThumbnail => "bidhub_listing_thumbnail",
            Self::Avatar => "bidhub_user_avatar",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub url: String,
}

/// Image storage. Only called with images that already passed validation.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, bytes: &[u8], preset: ImagePreset) -> Result<UploadedImage>;
}

/// Stores images on local disk at `{dir}/{preset}/{sha256}.{ext}`, so the
/// same file uploaded twice lands on the same path.
pub struct DiskImageStore {
    dir: PathBuf,
    public_base: String,
}

impl DiskImageStore {
    /// `public_base` is the URL prefix under which `dir` is served.
    pub async fn new(dir: PathBuf, public_base: &str) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Image storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base: public_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageStore for DiskImageStore {
    async fn upload(&self, bytes: &[u8], preset: ImagePreset) -> Result<UploadedImage> {
        let extension = ImageKind::sniff(bytes).map_or("bin", ImageKind::extension);
        let digest = hex::encode(Sha256::digest(bytes));
        let file_name = format!("{}.{}", digest, extension);

        let preset_dir = self.dir.join(preset.as_str());
        fs::create_dir_all(&preset_dir).await?;
        let path = preset_dir.join(&file_name);
        if fs::try_exists(&path).await? {
            debug!("Image {} already stored", path.display());
        } else {
            fs::write(&path, bytes).await?;
        }

        Ok(UploadedImage {
            url: format!("{}/{}/{}", self.public_base, preset.as_str(), file_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn sniffs_known_formats() {
        assert_eq!(ImageKind::sniff(PNG_BYTES), Some(ImageKind::Png));
        assert_eq!(ImageKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::sniff(b"GIF89a...."), Some(ImageKind::Gif));
        assert_eq!(ImageKind::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(ImageKind::sniff(b"%PDF-1.7"), None);
        assert_eq!(ImageKind::from_content_type("Image/PNG"), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_content_type("application/pdf"), None);
    }

    #[tokio::test]
    async fn disk_store_writes_under_preset() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskImageStore::new(dir.path().to_path_buf(), "http://localhost:3000/uploads/")
            .await
            .unwrap();

        let first = store.upload(PNG_BYTES, ImagePreset::Listing).await.unwrap();
        let again = store.upload(PNG_BYTES, ImagePreset::Listing).await.unwrap();
        let thumb = store.upload(PNG_BYTES, ImagePreset::ListingThumbnail).await.unwrap();

        assert_eq!(first, again);
        assert!(first.url.starts_with("http://localhost:3000/uploads/bidhub_listing/"));
        assert!(first.url.ends_with(".png"));
        assert_ne!(first.url, thumb.url);

        let file_name = first.url.rsplit('/').next().unwrap();
        let stored = std::fs::read(dir.path().join("bidhub_listing").join(file_name)).unwrap();
        assert_eq!(stored, PNG_BYTES);
    }
}

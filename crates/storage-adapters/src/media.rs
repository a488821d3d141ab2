//! # Local media store
//!
//! Raw uploads land in `<board>/src/`, thumbnails in `<board>/thumb/`.
//! Decoding and encoding run on the blocking pool. Video files are kept
//! without a thumbnail.

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use domains::{
    thumbnail_extension, DomainError, IncomingFile, MediaStore, Result, SiteFilesystem, StoredMedia,
    ThumbnailKind, ThumbnailSize, Upload,
};
use image::{DynamicImage, ImageFormat, ImageReader};
use uuid::Uuid;

use crate::fs::LocalSiteFilesystem;

const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "webm"];

/// Name an upload is stored under: upload time in milliseconds plus a short
/// random suffix, keeping the original extension.
pub fn stored_filename(ext: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}.{}", Utc::now().timestamp_millis(), &suffix[..4], ext)
}

#[derive(Debug)]
struct Thumbnail {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct Thumbnails {
    width: u32,
    height: u32,
    inline: Thumbnail,
    catalog: Option<Thumbnail>,
}

#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    site: LocalSiteFilesystem,
}

impl LocalMediaStore {
    pub fn new(site: LocalSiteFilesystem) -> Self {
        Self { site }
    }

    /// Best-effort cleanup after a failed store.
    async fn discard(&self, written: &[String]) {
        for path in written {
            if let Err(e) = self.site.remove_file(path).await {
                tracing::warn!(path, error = %e, "failed to remove partial upload");
            }
        }
    }

    async fn write_thumbnails(
        &self,
        upload: &mut Upload,
        board_dir: &str,
        thumbs: Thumbnails,
        written: &mut Vec<String>,
    ) -> Result<()> {
        upload.width = i64::from(thumbs.width);
        upload.height = i64::from(thumbs.height);
        upload.thumbnail_width = i64::from(thumbs.inline.width);
        upload.thumbnail_height = i64::from(thumbs.inline.height);

        let outputs = [
            (ThumbnailKind::Inline, Some(thumbs.inline)),
            (ThumbnailKind::Catalog, thumbs.catalog),
        ];
        for (kind, thumb) in outputs {
            let (Some(thumb), Some(path)) = (thumb, upload.thumbnail_path(board_dir, kind)) else {
                continue;
            };
            self.site.write_artifact(&path, Bytes::from(thumb.bytes)).await?;
            written.push(path);
        }
        Ok(())
    }
}

fn encode(image: &DynamicImage, ext: &str) -> image::ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    if ext == "jpg" {
        DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buf, ImageFormat::Jpeg)?;
        return Ok(buf.into_inner());
    }

    image.write_to(&mut buf, ImageFormat::Png)?;
    let png = buf.into_inner();
    match oxipng::optimize_from_memory(&png, &oxipng::Options::default()) {
        Ok(optimized) => Ok(optimized),
        Err(e) => {
            tracing::debug!(error = %e, "png optimisation failed, keeping unoptimised thumbnail");
            Ok(png)
        }
    }
}

fn shrink(image: &DynamicImage, size: ThumbnailSize, ext: &str) -> image::ImageResult<Thumbnail> {
    let fits = image.width() <= size.width && image.height() <= size.height;
    let scaled = if fits { image.clone() } else { image.thumbnail(size.width, size.height) };
    Ok(Thumbnail {
        width: scaled.width(),
        height: scaled.height(),
        bytes: encode(&scaled, ext)?,
    })
}

fn make_thumbnails(
    data: &[u8],
    ext: &str,
    inline: ThumbnailSize,
    catalog: Option<ThumbnailSize>,
) -> image::ImageResult<Thumbnails> {
    let image = ImageReader::new(Cursor::new(data)).with_guessed_format()?.decode()?;
    Ok(Thumbnails {
        width: image.width(),
        height: image.height(),
        inline: shrink(&image, inline, ext)?,
        catalog: catalog.map(|size| shrink(&image, size, ext)).transpose()?,
    })
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn store_upload(
        &self,
        board_dir: &str,
        file: IncomingFile,
        checksum: String,
        thumbnail: ThumbnailSize,
        catalog_thumbnail: Option<ThumbnailSize>,
    ) -> Result<StoredMedia> {
        let ext = file
            .original_filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .ok_or_else(|| DomainError::validation("Uploaded file has no extension"))?;

        let mut upload = Upload {
            id: 0,
            post_id: 0,
            file_order: 0,
            original_filename: file.original_filename.clone(),
            filename: stored_filename(&ext),
            checksum,
            file_size: i64::try_from(file.data.len()).unwrap_or(i64::MAX),
            is_spoilered: file.is_spoilered,
            thumbnail_width: 0,
            thumbnail_height: 0,
            width: 0,
            height: 0,
        };

        let src = upload.src_path(board_dir);
        self.site.write_artifact(&src, file.data.clone()).await?;
        let mut written = vec![src];

        let thumb_ext = thumbnail_extension(&upload.filename);
        if let (Some(thumb_ext), false) = (thumb_ext, VIDEO_EXTENSIONS.contains(&ext.as_str())) {
            let data = file.data.clone();
            let decoded =
                tokio::task::spawn_blocking(move || make_thumbnails(&data, thumb_ext, thumbnail, catalog_thumbnail))
                    .await;

            let thumbs = match decoded {
                Ok(Ok(thumbs)) => thumbs,
                Ok(Err(e)) => {
                    tracing::info!(file = %upload.original_filename, error = %e, "upload is not a readable image");
                    self.discard(&written).await;
                    return Err(DomainError::validation("Uploaded image could not be read"));
                }
                Err(e) => {
                    self.discard(&written).await;
                    return Err(DomainError::Internal(format!("thumbnail task failed: {e}")));
                }
            };

            if let Err(e) = self.write_thumbnails(&mut upload, board_dir, thumbs, &mut written).await {
                self.discard(&written).await;
                return Err(e);
            }
        }

        tracing::debug!(board = board_dir, file = %upload.filename, "stored upload");
        Ok(StoredMedia { upload, written })
    }

    async fn remove_upload(&self, board_dir: &str, upload: &Upload) -> Result<()> {
        self.site.remove_file(&upload.src_path(board_dir)).await?;
        for kind in [ThumbnailKind::Inline, ThumbnailKind::Catalog] {
            if let Some(path) = upload.thumbnail_path(board_dir, kind) {
                self.site.remove_file(&path).await?;
            }
        }
        Ok(())
    }

    async fn remove_paths(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            self.site.remove_file(path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Bytes {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        Bytes::from(buf.into_inner())
    }

    fn incoming(name: &str, data: Bytes) -> IncomingFile {
        IncomingFile {
            original_filename: name.into(),
            data,
            is_spoilered: false,
        }
    }

    const INLINE: ThumbnailSize = ThumbnailSize { width: 100, height: 100 };
    const CATALOG: ThumbnailSize = ThumbnailSize { width: 40, height: 40 };

    #[test]
    fn stored_names_keep_the_extension() {
        let name = stored_filename("png");
        let (stem, ext) = name.rsplit_once('.').unwrap();
        assert_eq!(ext, "png");
        assert!(stem.len() > 4);
        assert_ne!(stored_filename("png"), name);
    }

    #[tokio::test]
    async fn images_get_scaled_thumbnails() {
        let root = tempfile::tempdir().unwrap();
        let media = LocalMediaStore::new(LocalSiteFilesystem::new(root.path()));

        let stored = media
            .store_upload("b", incoming("cat.png", png(400, 200)), "sum".into(), INLINE, Some(CATALOG))
            .await
            .unwrap();

        let upload = &stored.upload;
        assert_eq!((upload.width, upload.height), (400, 200));
        assert_eq!((upload.thumbnail_width, upload.thumbnail_height), (100, 50));
        assert!(!upload.is_attached());
        assert_eq!(stored.written.len(), 3);
        for path in &stored.written {
            assert!(root.path().join(path).is_file(), "{path} missing");
        }

        media.remove_upload("b", upload).await.unwrap();
        for path in &stored.written {
            assert!(!root.path().join(path).exists());
        }
    }

    #[tokio::test]
    async fn small_images_are_not_upscaled() {
        let root = tempfile::tempdir().unwrap();
        let media = LocalMediaStore::new(LocalSiteFilesystem::new(root.path()));
        let stored = media
            .store_upload("b", incoming("dot.png", png(10, 8)), "sum".into(), INLINE, None)
            .await
            .unwrap();
        assert_eq!((stored.upload.thumbnail_width, stored.upload.thumbnail_height), (10, 8));
        assert_eq!(stored.written.len(), 2);
    }

    #[tokio::test]
    async fn unreadable_images_leave_nothing_behind() {
        let root = tempfile::tempdir().unwrap();
        let media = LocalMediaStore::new(LocalSiteFilesystem::new(root.path()));

        let err = media
            .store_upload("b", incoming("fake.png", Bytes::from_static(b"not a png")), "sum".into(), INLINE, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
        let site = LocalSiteFilesystem::new(root.path());
        assert!(site.list_dir("b/src").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn videos_are_stored_without_thumbnails() {
        let root = tempfile::tempdir().unwrap();
        let media = LocalMediaStore::new(LocalSiteFilesystem::new(root.path()));
        let stored = media
            .store_upload("b", incoming("clip.webm", Bytes::from_static(b"\x1a\x45\xdf\xa3")), "sum".into(), INLINE, None)
            .await
            .unwrap();
        assert_eq!(stored.written.len(), 1);
        assert_eq!(stored.upload.thumbnail_width, 0);
    }
}

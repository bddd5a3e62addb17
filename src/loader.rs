use std::path::Path;

use image::{DynamicImage, ImageReader};

use crate::error::{CollectionError, Result};

/// 根据 uri 读取记录对应的数据
pub trait DataLoader: Send + Sync {
    /// 检查 uri 指向可解码的图片，返回 (宽, 高)
    fn probe(&self, uri: &Path) -> Result<(u32, u32)>;

    /// 解码 uri 指向的图片
    fn load(&self, uri: &Path) -> Result<DynamicImage>;
}

/// 从本地文件读取图片
#[derive(Debug, Clone, Default)]
pub struct ImageLoader {
    /// 宽高**均**超过该尺寸时等比缩小
    max_size: Option<(u32, u32)>,
}

impl ImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_size(mut self, width: u32, height: u32) -> Self {
        self.max_size = Some((width, height));
        self
    }

    fn reader(uri: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>> {
        let reader = ImageReader::open(uri).map_err(|e| load_error(uri, e.into()))?;
        reader.with_guessed_format().map_err(|e| load_error(uri, e.into()))
    }
}

impl DataLoader for ImageLoader {
    fn probe(&self, uri: &Path) -> Result<(u32, u32)> {
        Self::reader(uri)?.into_dimensions().map_err(|e| load_error(uri, e))
    }

    fn load(&self, uri: &Path) -> Result<DynamicImage> {
        let image = Self::reader(uri)?.decode().map_err(|e| load_error(uri, e))?;
        match self.max_size {
            Some((width, height)) if image.width() > width && image.height() > height => {
                Ok(image.resize(width, height, image::imageops::FilterType::Triangle))
            }
            _ => Ok(image),
        }
    }
}

fn load_error(uri: &Path, source: image::ImageError) -> CollectionError {
    CollectionError::Load { uri: uri.to_path_buf(), source }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;

    fn write_png(dir: &TempDir, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.path().join(name);
        RgbImage::from_pixel(width, height, Rgb([200, 30, 30])).save(&path).unwrap();
        path
    }

    #[test]
    fn probe_reads_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "red.png", 12, 7);
        assert_eq!(ImageLoader::new().probe(&path).unwrap(), (12, 7));
    }

    #[test]
    fn load_shrinks_large_images() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "big.png", 64, 32);
        let image = ImageLoader::new().max_size(16, 16).load(&path).unwrap();
        assert!(image.width() <= 16 && image.height() <= 16);

        // 只有一边超出时保持原样
        let path = write_png(&dir, "wide.png", 64, 8);
        let image = ImageLoader::new().max_size(16, 16).load(&path).unwrap();
        assert_eq!((image.width(), image.height()), (64, 8));
    }

    #[test]
    fn missing_and_corrupt_files_fail() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.jpg");
        assert!(matches!(ImageLoader::new().probe(&missing), Err(CollectionError::Load { .. })));

        let corrupt = dir.path().join("corrupt.png");
        std::fs::write(&corrupt, b"definitely not an image").unwrap();
        assert!(matches!(ImageLoader::new().load(&corrupt), Err(CollectionError::Load { .. })));
    }
}

use std::io::Cursor;

use bytes::Bytes;
use image::{ImageDecoder, ImageFormat, ImageReader, metadata::Orientation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("画像形式を判別できません")]
    UnknownFormat,

    #[error("画像ヘッダの読み込みに失敗: {0}")]
    HeaderError(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// 取得試行1回分の生画像
///
/// 寸法はヘッダから一度だけ読み取り、以後変更しない。
#[derive(Debug)]
pub struct CandidateImage {
    data: Bytes,
    dimensions: Dimensions,
    format: ImageFormat,
    orientation: Orientation,
}

impl CandidateImage {
    /// ヘッダのみをデコードして形式・寸法・向きを取得する
    pub fn from_bytes(data: Bytes) -> Result<Self, CandidateError> {
        let reader = ImageReader::new(Cursor::new(&data[..]))
            .with_guessed_format()
            .map_err(|e| CandidateError::HeaderError(e.to_string()))?;
        let format = reader.format().ok_or(CandidateError::UnknownFormat)?;

        let mut decoder = reader
            .into_decoder()
            .map_err(|e| CandidateError::HeaderError(e.to_string()))?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let (width, height) = decoder.dimensions();
        drop(decoder);

        if width == 0 || height == 0 {
            return Err(CandidateError::HeaderError(format!(
                "画像の寸法が不正です: {}x{}",
                width, height
            )));
        }

        Ok(Self {
            data,
            dimensions: Dimensions::new(width, height),
            format,
            orientation,
        })
    }

    pub fn from_parts(
        data: Bytes,
        dimensions: Dimensions,
        format: ImageFormat,
        orientation: Orientation,
    ) -> Self {
        Self {
            data,
            dimensions,
            format,
            orientation,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// 向き情報を適用した後の寸法
    pub fn oriented_dimensions(&self) -> Dimensions {
        match self.orientation {
            Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH => {
                Dimensions::new(self.dimensions.height, self.dimensions.width)
            }
            _ => self.dimensions,
        }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_util::{encode_jpeg_with_orientation, encode_test_image};

    #[test]
    fn test_from_bytes_reads_header() {
        let png = encode_test_image(64, 32, ImageFormat::Png);
        let candidate = CandidateImage::from_bytes(Bytes::from(png)).unwrap();

        assert_eq!(candidate.dimensions(), Dimensions::new(64, 32));
        assert_eq!(candidate.format(), ImageFormat::Png);
        assert_eq!(candidate.orientation(), Orientation::NoTransforms);
        assert_eq!(candidate.oriented_dimensions(), Dimensions::new(64, 32));
    }

    #[test]
    fn test_from_bytes_detects_jpeg() {
        let jpeg = encode_test_image(20, 10, ImageFormat::Jpeg);
        let candidate = CandidateImage::from_bytes(Bytes::from(jpeg)).unwrap();
        assert_eq!(candidate.format(), ImageFormat::Jpeg);
        assert_eq!(candidate.dimensions(), Dimensions::new(20, 10));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let result = CandidateImage::from_bytes(Bytes::from_static(b"not an image at all"));
        assert!(
            matches!(result, Err(CandidateError::UnknownFormat)),
            "不正なデータが受理されました: {:?}",
            result
        );
    }

    #[test]
    fn test_from_bytes_rejects_truncated_png() {
        let png = encode_test_image(16, 16, ImageFormat::Png);
        let result = CandidateImage::from_bytes(Bytes::copy_from_slice(&png[..12]));
        assert!(result.is_err());
    }

    #[test]
    fn test_oriented_dimensions_swap_on_rotation() {
        let candidate = CandidateImage::from_parts(
            Bytes::new(),
            Dimensions::new(4000, 1000),
            ImageFormat::Jpeg,
            Orientation::Rotate90,
        );
        assert_eq!(candidate.dimensions(), Dimensions::new(4000, 1000));
        assert_eq!(candidate.oriented_dimensions(), Dimensions::new(1000, 4000));

        let flipped = CandidateImage::from_parts(
            Bytes::new(),
            Dimensions::new(4000, 1000),
            ImageFormat::Jpeg,
            Orientation::FlipHorizontal,
        );
        assert_eq!(flipped.oriented_dimensions(), Dimensions::new(4000, 1000));
    }

    #[test]
    fn test_from_bytes_reads_exif_orientation() {
        // Orientation 6 は時計回り 90 度
        let jpeg = encode_jpeg_with_orientation(40, 20, 6);
        let candidate = CandidateImage::from_bytes(Bytes::from(jpeg)).unwrap();

        assert_eq!(candidate.format(), ImageFormat::Jpeg);
        assert_eq!(candidate.orientation(), Orientation::Rotate90);
        assert_eq!(candidate.dimensions(), Dimensions::new(40, 20));
        assert_eq!(candidate.oriented_dimensions(), Dimensions::new(20, 40));
    }
}

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use image::{
    DynamicImage, ImageDecoder, ImageReader, Rgba, RgbaImage,
    imageops::{self, FilterType},
    metadata::Orientation,
};
use tracing::debug;

use crate::{
    model::{Canvas, OutputFormat},
    ports::{ImageTransformError, ImageTransformer},
};

/// 画像で覆われない領域の塗りつぶし色
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

const WEBP_QUALITY: f32 = 80.0;

/// デコードして埋め込みの向き情報を画素に反映する
///
/// 反映後の画像は向き情報を持たないため、再度適用しても変化しない。
pub fn decode_oriented(image_data: &[u8]) -> Result<DynamicImage, ImageTransformError> {
    let reader = ImageReader::new(Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| ImageTransformError::DecodeError(e.to_string()))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| ImageTransformError::DecodeError(e.to_string()))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|e| ImageTransformError::DecodeError(e.to_string()))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// 画像をキャンバスの寸法・形式に正規化する
pub fn transform(image_data: &[u8], canvas: &Canvas) -> Result<Vec<u8>, ImageTransformError> {
    let img = decode_oriented(image_data)?;
    let (box_width, box_height) = canvas.effective_box();

    let scaled = if canvas.crop() {
        img.resize_to_fill(box_width, box_height, FilterType::Lanczos3)
    } else {
        img.resize(box_width, box_height, FilterType::Lanczos3)
    };
    drop(img);

    let composed = compose(&scaled.to_rgba8(), canvas.width(), canvas.height());
    debug!(
        "画像を変換しました: {}x{} -> {}x{} ({})",
        scaled.width(),
        scaled.height(),
        composed.width(),
        composed.height(),
        canvas.format()
    );

    encode(composed, canvas.format())
}

fn compose(scaled: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
    let x = width.saturating_sub(scaled.width()) / 2;
    let y = height.saturating_sub(scaled.height()) / 2;
    imageops::overlay(&mut canvas, scaled, x as i64, y as i64);
    canvas
}

fn encode(image: RgbaImage, format: OutputFormat) -> Result<Vec<u8>, ImageTransformError> {
    let dynamic = match format {
        OutputFormat::WebP => {
            let dynamic = DynamicImage::ImageRgba8(image);
            let encoder = webp::Encoder::from_image(&dynamic)
                .map_err(|e| ImageTransformError::EncodeError(e.to_string()))?;
            return Ok(encoder.encode(WEBP_QUALITY).to_vec());
        }
        // JPEG はアルファを持てない
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image).to_rgb8()),
        _ => DynamicImage::ImageRgba8(image),
    };

    let mut out = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut out, format.image_format())
        .map_err(|e| ImageTransformError::EncodeError(e.to_string()))?;
    Ok(out.into_inner())
}

/// 変換処理をブロッキングスレッドで実行する
#[derive(Clone, Debug, Default)]
pub struct CanvasImageTransformer;

#[async_trait]
impl ImageTransformer for CanvasImageTransformer {
    async fn transform(
        &self,
        image_data: Bytes,
        canvas: &Canvas,
    ) -> Result<Vec<u8>, ImageTransformError> {
        let canvas = *canvas;
        tokio::task::spawn_blocking(move || transform(&image_data, &canvas))
            .await
            .map_err(|e| ImageTransformError::TaskError(e.to_string()))?
    }
}

//! テスト用のメモリ上画像

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

/// グラデーション画像を指定形式でエンコードする
pub fn encode_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut img = RgbaImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255]);
    }
    encode(img, format)
}

/// 単色画像を指定形式でエンコードする
pub fn encode_solid_image(width: u32, height: u32, rgba: [u8; 4], format: ImageFormat) -> Vec<u8> {
    encode(RgbaImage::from_pixel(width, height, Rgba(rgba)), format)
}

fn encode(img: RgbaImage, format: ImageFormat) -> Vec<u8> {
    let dynamic = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8()),
        _ => DynamicImage::ImageRgba8(img),
    };
    let mut data = Vec::new();
    dynamic
        .write_to(&mut Cursor::new(&mut data), format)
        .expect("Failed to write test image");
    data
}

/// EXIF の Orientation タグ付き JPEG を生成する
///
/// 画素は `width`x`height` のまま格納し、向きはタグでのみ指定する。
pub fn encode_jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let jpeg = encode_test_image(width, height, ImageFormat::Jpeg);
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "JPEG の SOI がありません");

    // ビッグエンディアンの TIFF ヘッダと、Orientation だけを持つ IFD0
    let mut payload = Vec::new();
    payload.extend_from_slice(b"Exif\0\0");
    payload.extend_from_slice(b"MM\0\x2A");
    payload.extend_from_slice(&8u32.to_be_bytes());
    payload.extend_from_slice(&1u16.to_be_bytes());
    payload.extend_from_slice(&0x0112u16.to_be_bytes());
    payload.extend_from_slice(&3u16.to_be_bytes());
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(&orientation.to_be_bytes());
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(&0u32.to_be_bytes());

    let segment_length = u16::try_from(payload.len() + 2).expect("APP1 が長すぎます");
    let mut data = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    data.extend_from_slice(&jpeg[..2]);
    data.extend_from_slice(&[0xFF, 0xE1]);
    data.extend_from_slice(&segment_length.to_be_bytes());
    data.extend_from_slice(&payload);
    data.extend_from_slice(&jpeg[2..]);
    data
}

use std::{fmt, str::FromStr};

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CANVAS_WIDTH: u32 = 1200;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 800;
/// 一辺の上限
pub const MAX_CANVAS_SIDE: u32 = 8192;
/// 総画素数の上限。RGBA で約 128 MiB
pub const MAX_CANVAS_PIXELS: u64 = 32 * 1024 * 1024;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CanvasError {
    #[error("キャンバスの寸法が0です: {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },

    #[error("キャンバスが大きすぎます: {width}x{height}")]
    TooLarge { width: u32, height: u32 },

    #[error("余白({padding}px)がキャンバス({width}x{height})に収まりません")]
    PaddingTooLarge { padding: u32, width: u32, height: u32 },

    #[error("未対応の出力形式です: {0}")]
    UnsupportedFormat(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    WebP,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Png,
        OutputFormat::Jpeg,
        OutputFormat::Gif,
        OutputFormat::Bmp,
        OutputFormat::Tiff,
        OutputFormat::WebP,
    ];

    pub fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Gif => ImageFormat::Gif,
            OutputFormat::Bmp => ImageFormat::Bmp,
            OutputFormat::Tiff => ImageFormat::Tiff,
            OutputFormat::WebP => ImageFormat::WebP,
        }
    }

    pub fn content_type(self) -> &'static str {
        self.image_format().to_mime_type()
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Gif => "gif",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::WebP => "webp",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "gif" => Ok(OutputFormat::Gif),
            "bmp" => Ok(OutputFormat::Bmp),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            "webp" => Ok(OutputFormat::WebP),
            _ => Err(CanvasError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 変換後の出力形状
///
/// 生成後は不変。余白はキャンバス幅・高さのどちらよりも小さい。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    format: OutputFormat,
    crop: bool,
    padding: u32,
}

impl Canvas {
    pub fn new(
        width: u32,
        height: u32,
        format: OutputFormat,
        crop: bool,
        padding: u32,
    ) -> Result<Self, CanvasError> {
        if width == 0 || height == 0 {
            return Err(CanvasError::ZeroDimension { width, height });
        }
        if width > MAX_CANVAS_SIDE
            || height > MAX_CANVAS_SIDE
            || u64::from(width) * u64::from(height) > MAX_CANVAS_PIXELS
        {
            return Err(CanvasError::TooLarge { width, height });
        }
        if padding >= width || padding >= height {
            return Err(CanvasError::PaddingTooLarge {
                padding,
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            format,
            crop,
            padding,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn crop(&self) -> bool {
        self.crop
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// 余白を差し引いた配置領域
    pub fn effective_box(&self) -> (u32, u32) {
        (self.width - self.padding, self.height - self.padding)
    }
}

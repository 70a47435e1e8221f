use crate::model::{CandidateImage, Dimensions};

pub const DEFAULT_SCREEN_WIDTH: u32 = 800;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 1200;
pub const DEFAULT_MAX_DEVIATION: f64 = 0.7;

/// 画面に対して候補画像のアスペクト比が許容範囲か判定する
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitPolicy {
    screen: Dimensions,
    max_deviation: f64,
}

impl FitPolicy {
    pub fn new(screen: Dimensions, max_deviation: f64) -> Self {
        Self {
            screen,
            max_deviation,
        }
    }

    /// 全ての候補を受理するポリシー
    pub fn unrestricted() -> Self {
        Self::new(
            Dimensions::new(DEFAULT_SCREEN_WIDTH, DEFAULT_SCREEN_HEIGHT),
            f64::INFINITY,
        )
    }

    pub fn screen(&self) -> Dimensions {
        self.screen
    }

    pub fn max_deviation(&self) -> f64 {
        self.max_deviation
    }

    /// 画面内判定は格納時の寸法、比率判定は向きを反映した寸法で行う
    pub fn fits(&self, candidate: &CandidateImage) -> bool {
        self.within_screen(candidate.dimensions())
            || self.ratio_fits(candidate.oriented_dimensions())
    }

    pub fn fits_dimensions(&self, image: Dimensions) -> bool {
        self.within_screen(image) || self.ratio_fits(image)
    }

    // 画面内に収まる画像は比率に関係なく表示できる
    fn within_screen(&self, image: Dimensions) -> bool {
        image.width <= self.screen.width && image.height <= self.screen.height
    }

    fn ratio_fits(&self, image: Dimensions) -> bool {
        if image.width == 0 || image.height == 0 || self.screen.height == 0 {
            return false;
        }
        let deviation = (self.screen.aspect_ratio() - image.aspect_ratio()).abs();
        deviation < self.max_deviation
    }
}

impl Default for FitPolicy {
    fn default() -> Self {
        Self::new(
            Dimensions::new(DEFAULT_SCREEN_WIDTH, DEFAULT_SCREEN_HEIGHT),
            DEFAULT_MAX_DEVIATION,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use image::{ImageFormat, metadata::Orientation};

    fn candidate(width: u32, height: u32, orientation: Orientation) -> CandidateImage {
        CandidateImage::from_parts(
            Bytes::new(),
            Dimensions::new(width, height),
            ImageFormat::Png,
            orientation,
        )
    }

    #[test]
    fn test_exact_screen_size_always_fits() {
        for max_deviation in [0.0, 0.001, 0.7, 10.0] {
            let policy = FitPolicy::new(Dimensions::new(800, 1200), max_deviation);
            assert!(
                policy.fits_dimensions(Dimensions::new(800, 1200)),
                "画面と同じ寸法が拒否されました: max_deviation={}",
                max_deviation
            );
        }
    }

    #[test]
    fn test_small_image_fits_regardless_of_ratio() {
        let policy = FitPolicy::new(Dimensions::new(800, 1200), 0.0);
        assert!(policy.fits_dimensions(Dimensions::new(800, 10)));
        assert!(policy.fits_dimensions(Dimensions::new(1, 1200)));
    }

    #[test]
    fn test_wide_image_rejected() {
        let policy = FitPolicy::default();
        assert!(!policy.fits_dimensions(Dimensions::new(4000, 1000)));
    }

    #[test]
    fn test_large_image_with_similar_ratio_fits() {
        let policy = FitPolicy::default();
        // 比率 0.75、画面 0.667 との差は 0.083
        assert!(policy.fits_dimensions(Dimensions::new(1500, 2000)));
        // 比率 1.5、差は 0.833
        assert!(!policy.fits_dimensions(Dimensions::new(1800, 1200)));
    }

    #[test]
    fn test_deviation_is_strict() {
        // 画面比 1.0、候補比 2.0 で差は丁度 1.0
        let policy = FitPolicy::new(Dimensions::new(100, 100), 1.0);
        assert!(!policy.fits_dimensions(Dimensions::new(400, 200)));
        let policy = FitPolicy::new(Dimensions::new(100, 100), 1.0001);
        assert!(policy.fits_dimensions(Dimensions::new(400, 200)));
    }

    #[test]
    fn test_orientation_is_applied_before_ratio_check() {
        let policy = FitPolicy::default();
        assert!(!policy.fits(&candidate(3000, 2000, Orientation::NoTransforms)));
        assert!(policy.fits(&candidate(3000, 2000, Orientation::Rotate90)));
        assert!(policy.fits(&candidate(3000, 2000, Orientation::Rotate270FlipH)));
    }

    #[test]
    fn test_screen_check_uses_stored_dimensions() {
        let policy = FitPolicy::default();
        // 格納時は 700x1000 で画面内、回転後の 1000x700 は比率が合わない
        assert!(policy.fits(&candidate(700, 1000, Orientation::Rotate90)));
        assert!(!policy.fits_dimensions(Dimensions::new(1000, 700)));
    }

    #[test]
    fn test_unrestricted_accepts_everything() {
        let policy = FitPolicy::unrestricted();
        assert!(policy.fits_dimensions(Dimensions::new(100_000, 1)));
        assert!(policy.fits_dimensions(Dimensions::new(1, 100_000)));
    }
}

use std::path::PathBuf;

pub const DEFAULT_POOL_ROOT: &str = "data";
pub const DEFAULT_CATALOG_URL: &str = "https://xkcd.com";

/// 画像ソースが参照する外部状態の場所
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub pool_root: PathBuf,
    pub catalog_url: String,
}

impl ProviderConfig {
    pub fn new(pool_root: impl Into<PathBuf>, catalog_url: &str) -> Self {
        Self {
            pool_root: pool_root.into(),
            catalog_url: catalog_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_ROOT, DEFAULT_CATALOG_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_removed() {
        let config = ProviderConfig::new("pool", "https://example.com/");
        assert_eq!(config.catalog_url, "https://example.com");
        assert_eq!(config.pool_root, PathBuf::from("pool"));
    }
}

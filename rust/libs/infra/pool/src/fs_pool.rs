use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use domain::ports::{PoolDirectory, PoolDirectoryError};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, warn};

/// 書き込み途中のファイルに付ける接頭辞。一覧には含めない
pub const STAGING_PREFIX: &str = ".ink-";

#[derive(Clone, Debug)]
pub struct FsPoolDirectory {
    root: PathBuf,
}

impl FsPoolDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// プールのディレクトリを作成し、前回残った書き込み途中のファイルを削除する
    pub async fn prepare(&self) -> Result<(), PoolDirectoryError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| PoolDirectoryError::ListError(format!("{}: {}", self.root.display(), e)))?;

        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| PoolDirectoryError::ListError(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PoolDirectoryError::ListError(e.to_string()))?
        {
            let is_staging = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(STAGING_PREFIX));
            if is_staging {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => info!("書き込み途中のファイルを削除しました: {:?}", entry.path()),
                    Err(e) => warn!("書き込み途中のファイルを削除できません: {:?}: {}", entry.path(), e),
                }
            }
        }
        Ok(())
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf, PoolDirectoryError> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.starts_with(STAGING_PREFIX)
            || name.contains(['/', '\\', '\0']);
        if invalid {
            return Err(PoolDirectoryError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// 書き込みごとに一意な一時ファイル名
    fn staging_path(&self, name: &str) -> PathBuf {
        self.root.join(format!(
            "{}{}.{:016x}.part",
            STAGING_PREFIX,
            name,
            rand::random::<u64>()
        ))
    }
}

async fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(data).await?;
    file.sync_all().await
}

#[async_trait]
impl PoolDirectory for FsPoolDirectory {
    async fn list_entries(&self) -> Result<Vec<String>, PoolDirectoryError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| PoolDirectoryError::ListError(format!("{}: {}", self.root.display(), e)))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PoolDirectoryError::ListError(e.to_string()))?
        {
            match entry.file_name().into_string() {
                Ok(name) if name.starts_with(STAGING_PREFIX) => {}
                Ok(name) => names.push(name),
                Err(name) => warn!("UTF-8 でないファイル名を無視します: {:?}", name),
            }
        }
        debug!("画像プールのエントリ数: {}", names.len());
        Ok(names)
    }

    async fn read_entry(&self, name: &str) -> Result<Bytes, PoolDirectoryError> {
        let path = self.entry_path(name)?;
        fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| PoolDirectoryError::ReadError {
                name: name.to_string(),
                message: e.to_string(),
            })
    }

    async fn store_entry(&self, name: &str, data: Bytes) -> Result<(), PoolDirectoryError> {
        let path = self.entry_path(name)?;
        let staging = self.staging_path(name);

        let result = match write_file(&staging, &data).await {
            Ok(()) => fs::rename(&staging, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            if let Err(remove_error) = fs::remove_file(&staging).await {
                debug!("一時ファイルの削除に失敗: {:?}: {}", staging, remove_error);
            }
            return Err(PoolDirectoryError::WriteError {
                name: name.to_string(),
                message: e.to_string(),
            });
        }

        debug!("画像プールに保存しました: {:?} ({} bytes)", path, data.len());
        Ok(())
    }
}

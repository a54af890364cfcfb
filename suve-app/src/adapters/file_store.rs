//! Stash 文件仓库
//!
//! 每个 service 一个 JSON 文件，设置 passphrase 时整个文件加密。
//! 实现 suve-core 的 `StateStore` / `FileStore` trait

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use suve_core::crypto;
use suve_core::error::{CoreError, CoreResult, CryptoError};
use suve_core::traits::{FileStore, StateStore};
use suve_core::types::{Entry, Service, State, TagEntry, STATE_VERSION};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::config::{document_path_in, AppConfig};

/// Serializes every stash read and write of this process
static FILE_LOCK: Mutex<()> = Mutex::const_new(());

/// On-disk document of one service
#[derive(Debug, Serialize, Deserialize)]
struct Document {
    version: u32,
    service: Service,
    #[serde(default)]
    entries: BTreeMap<String, Entry>,
    #[serde(default)]
    tags: BTreeMap<String, TagEntry>,
}

/// Single-service stash document store
pub struct FileStateStore {
    path: PathBuf,
    service: Service,
    passphrase: Option<String>,
}

impl FileStateStore {
    /// Store of `service` inside the configured scope directory
    #[must_use]
    pub fn new(config: &AppConfig, service: Service) -> Self {
        Self::with_path(
            config.document_path(service),
            service,
            config.passphrase.clone(),
        )
    }

    /// Store of `service` at an explicit document path
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>, service: Service, passphrase: Option<String>) -> Self {
        Self {
            path: path.into(),
            service,
            passphrase: passphrase.filter(|p| !p.is_empty()),
        }
    }

    /// Store of `service` inside `dir`
    #[must_use]
    pub fn in_dir(dir: &Path, service: Service, passphrase: Option<String>) -> Self {
        Self::with_path(document_path_in(dir, service), service, passphrase)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn service(&self) -> Service {
        self.service
    }

    /// Whether a call scoped to `service` concerns this store
    fn covers(&self, service: Option<Service>) -> bool {
        service.map_or(true, |s| s == self.service)
    }

    async fn read_bytes(&self) -> CoreResult<Option<Vec<u8>>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("read", &self.path, &e)),
        }
    }

    /// 从文件加载
    async fn load(&self) -> CoreResult<Option<State>> {
        let Some(bytes) = self.read_bytes().await? else {
            return Ok(None);
        };

        let plaintext = if crypto::is_encrypted(&bytes) {
            let Some(passphrase) = self.passphrase.clone() else {
                return Err(CryptoError::DecryptionFailed.into());
            };
            tokio::task::spawn_blocking(move || crypto::decrypt(&bytes, &passphrase))
                .await
                .map_err(|e| CoreError::StorageError(format!("Task join error: {e}")))??
        } else {
            bytes
        };

        let document: Document = serde_json::from_slice(&plaintext)
            .map_err(|e| CoreError::SerializationError(e.to_string()))?;
        if document.version != STATE_VERSION {
            return Err(CoreError::StorageError(format!(
                "{}: unsupported document version {}",
                self.path.display(),
                document.version
            )));
        }
        if document.service != self.service {
            return Err(CoreError::StorageError(format!(
                "{}: document belongs to {}, expected {}",
                self.path.display(),
                document.service,
                self.service
            )));
        }

        let mut state = State::new();
        *state.entries.get_mut(self.service) = document.entries;
        *state.tags.get_mut(self.service) = document.tags;
        Ok(Some(state))
    }

    /// 保存到文件；空 state 删除文件
    async fn save(&self, state: &State) -> CoreResult<()> {
        let entries = state.entries.get(self.service);
        let tags = state.tags.get(self.service);
        if entries.is_empty() && tags.is_empty() {
            return self.remove().await;
        }

        let document = Document {
            version: STATE_VERSION,
            service: self.service,
            entries: entries.clone(),
            tags: tags.clone(),
        };
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| CoreError::SerializationError(e.to_string()))?;

        let content = match self.passphrase.clone() {
            Some(passphrase) => {
                tokio::task::spawn_blocking(move || crypto::encrypt(&json, &passphrase))
                    .await
                    .map_err(|e| CoreError::StorageError(format!("Task join error: {e}")))??
            }
            None => json,
        };

        self.ensure_dir().await?;
        self.replace(&content).await?;
        log::info!(
            "Wrote {} stash ({} entries, {} tags) to {}",
            self.service,
            entries.len(),
            tags.len(),
            self.path.display()
        );
        Ok(())
    }

    /// 确保目录存在
    async fn ensure_dir(&self) -> CoreResult<()> {
        let Some(dir) = self.path.parent() else {
            return Ok(());
        };
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);
        builder
            .create(dir)
            .await
            .map_err(|e| storage_error("create directory", dir, &e))
    }

    /// Write to a sibling temporary file, then rename over the document
    async fn replace(&self, content: &[u8]) -> CoreResult<()> {
        let tmp = self.temp_path();

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let written: std::io::Result<()> = async {
            let mut file = options.open(&tmp).await?;
            file.write_all(content).await?;
            file.sync_all().await?;
            fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(storage_error("write", &self.path, &e));
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.json", self.service));
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    async fn remove(&self) -> CoreResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                log::info!("Removed {} stash {}", self.service, self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &self.path, &e)),
        }
    }
}

fn storage_error(action: &str, path: &Path, e: &std::io::Error) -> CoreError {
    CoreError::StorageError(format!("failed to {action} {}: {e}", path.display()))
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn drain(&self, service: Option<Service>, keep: bool) -> CoreResult<State> {
        if !self.covers(service) {
            return Ok(State::new());
        }
        let _guard = FILE_LOCK.lock().await;

        let Some(state) = self.load().await? else {
            return Ok(State::new());
        };
        if !keep {
            self.remove().await?;
        }
        Ok(state)
    }

    async fn write_state(&self, service: Option<Service>, state: &State) -> CoreResult<()> {
        if !self.covers(service) {
            return Ok(());
        }
        let _guard = FILE_LOCK.lock().await;
        self.save(state).await
    }
}

#[async_trait]
impl FileStore for FileStateStore {
    async fn exists(&self) -> CoreResult<bool> {
        fs::try_exists(&self.path)
            .await
            .map_err(|e| storage_error("stat", &self.path, &e))
    }

    async fn is_encrypted(&self) -> CoreResult<bool> {
        let _guard = FILE_LOCK.lock().await;
        Ok(self
            .read_bytes()
            .await?
            .is_some_and(|bytes| crypto::is_encrypted(&bytes)))
    }

    async fn delete(&self) -> CoreResult<()> {
        let _guard = FILE_LOCK.lock().await;
        self.remove().await
    }
}

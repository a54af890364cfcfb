//! 应用配置
//!
//! Resolves where stash documents live and which passphrase protects them.

use std::path::{Path, PathBuf};

use suve_core::error::{CoreError, CoreResult};
use suve_core::types::Service;

/// Base directory override
pub const HOME_ENV: &str = "SUVE_HOME";
/// Stash passphrase; empty means plaintext documents
pub const PASSPHRASE_ENV: &str = "SUVE_PASSPHRASE";

const DEFAULT_DIR_NAME: &str = ".suve";

/// Staging area identity: one per cloud account and region
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub account_id: String,
    pub region: String,
}

impl Scope {
    /// 创建并校验 scope
    ///
    /// # Errors
    /// `ValidationError` when a component is empty, `.`/`..`, or contains a
    /// path separator
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> CoreResult<Self> {
        let scope = Self {
            account_id: account_id.into(),
            region: region.into(),
        };
        validate_component("account id", &scope.account_id)?;
        validate_component("region", &scope.region)?;
        Ok(scope)
    }
}

fn validate_component(what: &str, value: &str) -> CoreResult<()> {
    if value.is_empty() {
        return Err(CoreError::ValidationError(format!("{what} must not be empty")));
    }
    if value == "." || value == ".." || value.contains(['/', '\\']) || value.contains('\0') {
        return Err(CoreError::ValidationError(format!(
            "{what} is not a valid path component: {value:?}"
        )));
    }
    Ok(())
}

/// File store configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Root of all staging areas
    pub base_dir: PathBuf,
    pub scope: Scope,
    /// Encrypts stash documents when set
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("base_dir", &self.base_dir)
            .field("scope", &self.scope)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AppConfig {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, scope: Scope, passphrase: Option<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            scope,
            passphrase: passphrase.filter(|p| !p.is_empty()),
        }
    }

    /// 从环境变量读取配置
    ///
    /// `SUVE_HOME` overrides the base directory (default `~/.suve`);
    /// `SUVE_PASSPHRASE` enables encryption when non-empty.
    ///
    /// # Errors
    /// `StorageError` when neither `SUVE_HOME` nor a home directory is available
    pub fn from_env(scope: Scope) -> CoreResult<Self> {
        let base_dir = match std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => default_base_dir()?,
        };
        let passphrase = std::env::var(PASSPHRASE_ENV).ok();
        Ok(Self::new(base_dir, scope, passphrase))
    }

    /// `{base_dir}/{account_id}/{region}`
    #[must_use]
    pub fn scope_dir(&self) -> PathBuf {
        self.base_dir
            .join(&self.scope.account_id)
            .join(&self.scope.region)
    }

    /// `{scope_dir}/{service}.json`
    #[must_use]
    pub fn document_path(&self, service: Service) -> PathBuf {
        document_path_in(&self.scope_dir(), service)
    }
}

pub(crate) fn document_path_in(dir: &Path, service: Service) -> PathBuf {
    dir.join(format!("{service}.json"))
}

/// 获取默认目录路径
fn default_base_dir() -> CoreResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_DIR_NAME))
        .ok_or_else(|| CoreError::StorageError("cannot determine home directory".to_string()))
}

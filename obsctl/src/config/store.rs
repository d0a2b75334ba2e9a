use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::BaseDirs;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::Span;
use url::Url;

use super::{ApiEntry, ApiName, Config, ContextRef, TenantContext, TenantName, Token};
use crate::error::{Error, Result};

const CONFIG_DIR: &str = "obsctl";
const CONFIG_FILE: &str = "config.json";

/// Store handle shared between the command and the clients it builds.
pub type SharedStore = Arc<Mutex<ConfigStore>>;

/// `<user config dir>/obsctl/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Owns the on-disk config document. Every mutation is staged on a copy, written
/// out atomically, and only then becomes the in-memory state.
pub struct ConfigStore {
    pub(super) path: PathBuf,
    config: Config,
    span: Span,
}

impl ConfigStore {
    /// Loads the document at `path`, or an empty one when the file does not exist yet.
    pub fn load(path: impl Into<PathBuf>, span: Span) -> Result<Self> {
        let path = path.into();
        let config = span.in_scope(|| Self::read(&path))?;
        Ok(Self { path, config, span })
    }

    pub fn read(path: &Path) -> Result<Config> {
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file yet, starting empty");
                return Ok(Config::default());
            }
            Err(err) => return Err(Error::io(path, err)),
        };

        let config: Config = serde_json::from_slice(&content).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), apis = config.apis.len(), "loaded config");
        Ok(config)
    }

    /// Atomically replaces the file at `path`. The temporary file lives next to the
    /// target so the final rename never crosses filesystems; it is removed on drop
    /// unless the rename succeeded.
    pub fn write(path: &Path, config: &Config) -> Result<()> {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        create_private_dir(dir)?;

        let mut file = NamedTempFile::new_in(dir).map_err(|err| Error::io(dir, err))?;
        serde_json::to_writer_pretty(&mut file, config)
            .map_err(|err| Error::io(file.path(), err.into()))?;
        file.write_all(b"\n")
            .and_then(|_| file.as_file().sync_all())
            .map_err(|err| Error::io(file.path(), err))?;
        file.persist(path).map_err(|err| Error::io(path, err.error))?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Writes `config` to disk and adopts it. On failure the previous document stays in place.
    pub fn save(&mut self, config: Config) -> Result<()> {
        let _enter = self.span.enter();
        Self::write(&self.path, &config)?;
        tracing::debug!(path = %self.path.display(), "saved config");
        self.config = config;
        Ok(())
    }

    /// Applies `f` to a staged copy and saves it. Nothing changes if `f` or the save fails.
    pub fn update<T>(&mut self, f: impl FnOnce(&mut Config) -> Result<T>) -> Result<T> {
        let mut staged = self.config.clone();
        let out = f(&mut staged)?;
        if staged != self.config {
            self.save(staged)?;
        }
        Ok(out)
    }

    pub fn add_api(&mut self, name: ApiName, url: Url) -> Result<()> {
        self.update(|config| config.add_api(name, url))
    }

    pub fn remove_api(&mut self, name: &ApiName) -> Result<()> {
        self.update(|config| config.remove_api(name.as_str()))
    }

    #[cfg(test)]
    pub fn add_tenant(
        &mut self,
        tenant: TenantName,
        api: &ApiName,
        oidc: Option<super::OidcConfig>,
        ca_file: Option<Vec<u8>>,
    ) -> Result<()> {
        self.update(|config| {
            let context = TenantContext::new(tenant.clone(), oidc, ca_file);
            config.add_tenant(tenant, api.as_str(), context)
        })
    }

    pub fn remove_tenant(&mut self, tenant: &TenantName, api: &ApiName) -> Result<()> {
        self.update(|config| config.remove_tenant(tenant.as_str(), api.as_str()))
    }

    pub fn set_current(&mut self, selected: &ContextRef) -> Result<()> {
        self.update(|config| config.set_current(selected))
    }

    pub fn get_current(&self) -> Result<(ContextRef, &ApiEntry, &TenantContext)> {
        self.config.get_current()
    }

    pub fn update_token(&mut self, selected: &ContextRef, token: Token) -> Result<()> {
        self.span
            .in_scope(|| tracing::debug!(context = %selected, "persisting refreshed token"));
        self.update(|config| {
            config.update_token(selected.api.as_str(), selected.tenant.as_str(), token)
        })
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|err| Error::io(dir, err))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|err| Error::io(dir, err))
}

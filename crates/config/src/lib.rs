use std::fs::{read_to_string, write};

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{Result as EyreResult, WrapErr};
use merklesync_service::ServiceConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_JOURNAL_FILE: &str = "blocks.jsonl";

#[derive(Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServiceConfig,

    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct JournalConfig {
    /// Relative paths resolve against the home directory.
    pub path: Utf8PathBuf,
}

impl JournalConfig {
    #[must_use]
    pub const fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self::new(DEFAULT_JOURNAL_FILE.into())
    }
}

impl ConfigFile {
    #[must_use]
    pub const fn new(server: ServiceConfig, journal: JournalConfig) -> Self {
        Self { server, journal }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        toml::from_str(&content).wrap_err_with(|| format!("invalid configuration in {path:?}"))
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }

    /// Location of the block journal for a node rooted at `dir`.
    #[must_use]
    pub fn journal_path(&self, dir: &Utf8Path) -> Utf8PathBuf {
        dir.join(&self.journal.path)
    }
}

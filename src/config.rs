use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment prefix: `TIMETABLE_DB_PATH`, `TIMETABLE_LOG`.
pub const ENV_PREFIX: &str = "TIMETABLE_";

/// Runtime settings for the binary. Layered as defaults, then `TIMETABLE_*`
/// environment variables, then explicit overrides (command-line flags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableConfig {
    /// `None` keeps everything in memory for the life of the process.
    #[serde(rename = "db_path", default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    #[serde(rename = "log", default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TimetableConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_level: default_log_level(),
        }
    }
}

impl TimetableConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(TimetableConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_env() -> Result<Self, figment::Error> {
        Self::from_figment(&Self::figment())
    }

    /// Blank values count as unset.
    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        let mut config: TimetableConfig = figment.extract()?;
        if config
            .database_path
            .as_ref()
            .is_some_and(|path| path.as_os_str().to_string_lossy().trim().is_empty())
        {
            config.database_path = None;
        }
        if config.log_level.trim().is_empty() {
            config.log_level = default_log_level();
        }
        Ok(config)
    }

    pub fn with_overrides(
        mut self,
        database_path: Option<PathBuf>,
        log_level: Option<String>,
    ) -> Self {
        if database_path.is_some() {
            self.database_path = database_path;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
        self
    }

    /// Opens the configured SQLite file, creating the schema when missing.
    #[cfg(feature = "sqlite")]
    pub fn open_sqlite(&self) -> crate::PersistenceResult<Option<crate::SqliteTimetableStore>> {
        self.database_path
            .as_ref()
            .map(crate::SqliteTimetableStore::new)
            .transpose()
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use entidesc::{DdlOptions, DescriptorLoader, EntityBinding, FsDescriptorCache};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

pub const CONFIG_DIR: &str = ".entidesc";
pub const CONFIG_FILE: &str = "config.toml";

static ENV_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env reference pattern is valid"));

/// Project context for entidesc operations
pub struct ProjectContext {
    /// Directory holding `.entidesc/`
    pub project_root: PathBuf,
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    /// Directory of the entity declaration files
    pub entities_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Loaded configuration, `None` before `entidesc init`
    pub config: Option<EntidescConfig>,
}

/// Configuration stored in .entidesc/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntidescConfig {
    #[serde(default)]
    pub entidesc: EntidescSettings,
    #[serde(default)]
    pub mysql: MySqlSettings,
    /// Per-entity overrides, keyed by entity name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, EntityBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntidescSettings {
    #[serde(default = "default_entities_dir")]
    pub entities_dir: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Rebuild descriptors on every run instead of reading the cache
    #[serde(default)]
    pub always_reload: bool,
}

impl Default for EntidescSettings {
    fn default() -> Self {
        Self {
            entities_dir: default_entities_dir(),
            cache_dir: default_cache_dir(),
            always_reload: false,
        }
    }
}

fn default_entities_dir() -> String {
    "entities".to_string()
}

fn default_cache_dir() -> String {
    ".entidesc/cache".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MySqlSettings {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_charset")]
    pub charset: String,
}

impl Default for MySqlSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            engine: default_engine(),
            charset: default_charset(),
        }
    }
}

fn default_database_url() -> String {
    "${DATABASE_URL}".to_string()
}

fn default_engine() -> String {
    "MyISAM".to_string()
}

fn default_charset() -> String {
    "utf8".to_string()
}

impl ProjectContext {
    /// Find and load project context from current directory or ancestors
    pub fn find() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        match Self::find_from(&current_dir)? {
            Some(ctx) => Ok(ctx),
            None => Self::from_root(current_dir),
        }
    }

    /// Walk up from `start` to the first directory holding `.entidesc/config.toml`.
    pub fn find_from(start: &Path) -> Result<Option<Self>> {
        let mut current = start.to_path_buf();
        loop {
            if current.join(CONFIG_DIR).join(CONFIG_FILE).exists() {
                return Self::from_root(current).map(Some);
            }
            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// Create context from a known project root
    pub fn from_root(project_root: PathBuf) -> Result<Self> {
        let config_dir = project_root.join(CONFIG_DIR);
        let config_path = config_dir.join(CONFIG_FILE);

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let config: EntidescConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?;
            Some(config)
        } else {
            None
        };

        let settings = config.as_ref().map(|c| c.entidesc.clone()).unwrap_or_default();
        Ok(Self {
            entities_dir: project_root.join(&settings.entities_dir),
            cache_dir: project_root.join(&settings.cache_dir),
            project_root,
            config_dir,
            config_path,
            config,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> EntidescConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Database URL with `${VAR}` references expanded
    pub fn database_url(&self) -> Result<String> {
        expand_env(&self.config().mysql.url)
    }

    pub fn ddl_options(&self) -> DdlOptions {
        let mysql = self.config().mysql;
        DdlOptions {
            engine: mysql.engine,
            charset: mysql.charset,
        }
    }

    /// Descriptor loader over the entities directory, cached on disk
    pub fn loader(&self) -> DescriptorLoader {
        let config = self.config();
        DescriptorLoader::new(&self.entities_dir)
            .with_cache(Arc::new(FsDescriptorCache::new(&self.cache_dir)))
            .with_bindings(config.entities.into_iter().collect())
            .always_reload(config.entidesc.always_reload)
    }
}

/// Replace every `${VAR}` with the value of the environment variable.
pub fn expand_env(value: &str) -> Result<String> {
    let mut missing = None;
    let expanded = ENV_REFERENCE.replace_all(value, |captures: &Captures<'_>| {
        let name = &captures[1];
        std::env::var(name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });
    match missing {
        Some(name) => anyhow::bail!("Environment variable {name} not set"),
        None => Ok(expanded.into_owned()),
    }
}

use std::env;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

pub const CONFIG_FILE_NAME: &str = "conveyor.toml";
const ENV_CONFIG_PATH: &str = "CONVEYOR_CONFIG";

/// Pipeline description: which nodes exist, which inputs are constants and
/// how outputs are wired. Maps keep file order and reject repeated keys, so
/// a node, constant or link source can only be declared once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(deserialize_with = "unique_keys")]
    pub nodes: IndexMap<String, String>,
    #[serde(default, deserialize_with = "unique_keys")]
    pub constants: IndexMap<String, serde_json::Value>,
    #[serde(default, deserialize_with = "unique_keys")]
    pub links: IndexMap<String, LinkTargets>,
}

fn unique_keys<'de, D, V>(deserializer: D) -> Result<IndexMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct UniqueKeys<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueKeys<V> {
        type Value = IndexMap<String, V>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map with unique keys")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut map = IndexMap::new();
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                if map.contains_key(&key) {
                    return Err(de::Error::custom(format!(
                        "'{key}' is declared more than once"
                    )));
                }
                map.insert(key, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(UniqueKeys(PhantomData))
}

/// A link value is either one `"node.input"` or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkTargets {
    One(String),
    Many(Vec<String>),
}

impl LinkTargets {
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        match self {
            LinkTargets::One(target) => std::slice::from_ref(target).iter(),
            LinkTargets::Many(targets) => targets.iter(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("failed to parse pipeline JSON")
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read pipeline file: {}", path.display()))?;

        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse pipeline JSON: {}", path.display()))
    }
}

/// Host settings read from `conveyor.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on full passes; `None` runs until a fixpoint.
    pub max_passes: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl EngineConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config TOML: {}", path.display()))
    }
}

/// Resolve the config file with 3-tier priority:
/// 1. CLI override if provided
/// 2. CONVEYOR_CONFIG environment variable
/// 3. Default: ./conveyor.toml
pub fn config_path(cli_override: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_override {
        return path.to_path_buf();
    }

    if let Some(env_path) = env::var_os(ENV_CONFIG_PATH) {
        return PathBuf::from(env_path);
    }

    PathBuf::from(CONFIG_FILE_NAME)
}

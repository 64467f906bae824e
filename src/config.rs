use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::storage::{BackendLocal, StorageManager};

/// Directory inside the vault that holds config, caches and snapshots.
pub const DATA_DIR_NAME: &str = ".gapfill";

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default minimum cosine similarity for two notes to be linked
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;
/// Default number of similarity hops from the seed note
const DEFAULT_DEPTH: usize = 1;

const DEFAULT_LLM_BASE_URL: &str = "http://localhost:1234";
const DEFAULT_COMPLETION_MODEL: &str = "local-model";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-nomic-embed-text-v1.5";
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// How the active partition is computed for bridge synthesis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStrategy {
    /// Greedy similarity clusters over the seed's shallow subgraph
    #[default]
    Similarity,
    /// Connected components of the authored link graph
    Structural,
}

/// Connection settings for the completion/embedding server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base url of an OpenAI-compatible server
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }
}

fn default_llm_base_url() -> String {
    DEFAULT_LLM_BASE_URL.to_string()
}

fn default_completion_model() -> String {
    DEFAULT_COMPLETION_MODEL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_llm_timeout_secs() -> u64 {
    DEFAULT_LLM_TIMEOUT_SECS
}

/// Force-layout hints. Never interpreted here, only forwarded with graph snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub link_distance: f32,
    pub link_strength: f32,
    pub charge_strength: f32,
    pub center_strength: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            link_distance: 400.0,
            link_strength: 1.0,
            charge_strength: -400.0,
            center_strength: 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_depth")]
    pub depth: usize,
    #[serde(default)]
    pub strategy: ClusterStrategy,
    /// Write merged bridges back into the vault as markdown notes
    #[serde(default)]
    pub write_bridge_notes: bool,
    /// Vault-relative folder for written bridge notes
    #[serde(default)]
    pub bridge_folder: String,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub view: ViewConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            depth: DEFAULT_DEPTH,
            strategy: ClusterStrategy::default(),
            write_bridge_notes: false,
            bridge_folder: String::new(),
            llm: LlmConfig::default(),
            view: ViewConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_depth() -> usize {
    DEFAULT_DEPTH
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            bail!(
                "similarity_threshold must be between 0.0 and 1.0, got {}",
                self.similarity_threshold
            );
        }

        if self.depth == 0 {
            bail!("depth must be greater than 0");
        }

        if self.llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be greater than 0");
        }

        if url::Url::parse(&self.llm.base_url).is_err() {
            bail!("llm.base_url is not a valid url: {}", self.llm.base_url);
        }

        Ok(())
    }

    /// Data directory for a vault root.
    pub fn data_dir(vault: &Path) -> PathBuf {
        vault.join(DATA_DIR_NAME)
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults when missing.
    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        let store = BackendLocal::new(base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE_NAME) {
            store.write(
                CONFIG_FILE_NAME,
                serde_yml::to_string(&Self::default())?.as_bytes(),
            )?;
        }

        let config_str = String::from_utf8(store.read(CONFIG_FILE_NAME)?)
            .context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE_NAME, config_str.as_bytes())?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

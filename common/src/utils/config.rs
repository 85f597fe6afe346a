use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::AppError;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_surrealdb_address")]
    pub surrealdb_address: String,
    #[serde(default = "default_surrealdb_credential")]
    pub surrealdb_username: String,
    #[serde(default = "default_surrealdb_credential")]
    pub surrealdb_password: String,
    #[serde(default = "default_surrealdb_namespace")]
    pub surrealdb_namespace: String,
    #[serde(default = "default_surrealdb_database")]
    pub surrealdb_database: String,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub dataset: Vec<DatasetConfig>,
}

fn default_project() -> String {
    "knowledge_base".to_string()
}

fn default_surrealdb_address() -> String {
    "ws://127.0.0.1:8000".to_string()
}

fn default_surrealdb_credential() -> String {
    "root".to_string()
}

fn default_surrealdb_namespace() -> String {
    "garner".to_string()
}

fn default_surrealdb_database() -> String {
    "knowledge".to_string()
}

#[derive(Clone, Deserialize, Debug)]
pub struct EmbeddingSettings {
    #[serde(default = "default_embedding_backend")]
    pub backend: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: u32,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: default_embedding_backend(),
            model: None,
            dimensions: default_embedding_dimensions(),
            api_key: None,
            base_url: default_openai_base_url(),
        }
    }
}

fn default_embedding_backend() -> String {
    "fastembed".to_string()
}

fn default_embedding_dimensions() -> u32 {
    384
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// One dataset entry from the configuration file.
#[derive(Clone, Deserialize, Debug)]
pub struct DatasetConfig {
    pub id: String,
    pub loader: ProviderConfig,
    #[serde(default)]
    pub transformer: Option<OneOrMany<ProviderConfig>>,
    #[serde(default)]
    pub splitter: Option<ProviderConfig>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub output: Option<OutputConfig>,
    #[serde(default)]
    pub text_template: Option<String>,
    #[serde(default)]
    pub index: IndexSetting,
}

/// A provider tag plus the provider-specific parameter bag. Known fields are
/// validated eagerly by the provider factory; the bag itself is passed
/// through opaquely.
#[derive(Clone, Deserialize, Debug)]
pub struct ProviderConfig {
    pub provider: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Deserialize, Debug)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
#[serde(untagged)]
pub enum OutputConfig {
    Folder(String),
    Detailed {
        folder: String,
        #[serde(default = "default_output_varname")]
        varname: String,
    },
}

fn default_output_varname() -> String {
    "id".to_string()
}

impl OutputConfig {
    pub fn folder(&self) -> &str {
        match self {
            Self::Folder(folder) => folder,
            Self::Detailed { folder, .. } => folder,
        }
    }

    pub fn varname(&self) -> &str {
        match self {
            Self::Folder(_) => "id",
            Self::Detailed { varname, .. } => varname,
        }
    }
}

/// The `index` field accepts `false`, the string `"cache"`, or a settings
/// table; anything else is rejected when datasets are built.
#[derive(Clone, Deserialize, Debug)]
#[serde(untagged)]
pub enum IndexSetting {
    Enabled(bool),
    Mode(String),
    Settings(IndexSettings),
}

impl Default for IndexSetting {
    fn default() -> Self {
        Self::Settings(IndexSettings::default())
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct IndexSettings {
    #[serde(default = "default_source_id_key")]
    pub source_id_key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cleanup: Option<CleanupMode>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            source_id_key: default_source_id_key(),
            name: None,
            cleanup: None,
        }
    }
}

fn default_source_id_key() -> String {
    "source".to_string()
}

/// Retirement strategy for ledger-backed reconciliation. The absence of a
/// mode (`cleanup = null`) means add/skip only, no retirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupMode {
    Full,
    Incremental,
}

impl std::fmt::Display for CleanupMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

impl IndexSetting {
    /// Normalizes the raw setting, rejecting shapes the configuration schema
    /// does not allow (`true` is the implicit default table, any string other
    /// than `"cache"` is an error).
    pub fn validate(&self, dataset_id: &str) -> Result<(), AppError> {
        match self {
            Self::Enabled(_) => Ok(()),
            Self::Mode(mode) if mode == "cache" => Ok(()),
            Self::Mode(other) => Err(AppError::Validation(format!(
                "Invalid 'index' parameter value '{other}' in {dataset_id} dataset"
            ))),
            Self::Settings(_) => Ok(()),
        }
    }
}

pub fn get_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let builder = match path {
        Some(path) => Config::builder().add_source(File::with_name(path)),
        None => Config::builder().add_source(File::with_name("config").required(false)),
    };

    let config = builder.add_source(Environment::default()).build()?;

    config.try_deserialize()
}

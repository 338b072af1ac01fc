use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(alias = "import_folder")]
    pub import_folder: PathBuf,
    #[serde(alias = "export_folder")]
    pub export_folder: PathBuf,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs", alias = "timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent", alias = "user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_user_agent() -> String {
    format!("m3u-curator/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// One origin pair (playlist + optional guide) and the playlist variants built from it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub name: String,
    pub m3u: String,
    #[serde(default)]
    pub epg: Option<String>,
    /// Model whose retained tvg-ids scope the guide; the first model when unset
    #[serde(default, alias = "epg_model")]
    pub epg_model: Option<String>,
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub filters: Option<Vec<FilterSpec>>,
    #[serde(default)]
    pub transformations: Option<Vec<TransformationSpec>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSpec {
    pub field: String,
    #[serde(alias = "regex")]
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationSpec {
    pub field: String,
    #[serde(alias = "regex")]
    pub pattern: String,
    #[serde(default, alias = "substitution")]
    pub replacement: String,
}

/// Input and output locations for one source, following the
/// `{folder}/{source}{model}.{ext}` naming convention.
#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub m3u_input: PathBuf,
    pub epg_input: PathBuf,
    pub epg_output: PathBuf,
    export_folder: PathBuf,
    source_name: String,
}

impl SourcePaths {
    pub fn new(config: &Config, source: &SourceConfig) -> Self {
        Self {
            m3u_input: config.import_folder.join(format!("{}.m3u", source.name)),
            epg_input: config.import_folder.join(format!("{}.xml", source.name)),
            epg_output: config.export_folder.join(format!("{}.xml", source.name)),
            export_folder: config.export_folder.clone(),
            source_name: source.name.clone(),
        }
    }

    pub fn m3u_output(&self, model: &ModelConfig) -> PathBuf {
        self.export_folder
            .join(format!("{}{}.m3u", self.source_name, model.name))
    }
}

impl SourceConfig {
    /// The model designated to scope this source's guide
    pub fn epg_model(&self) -> Option<&ModelConfig> {
        match &self.epg_model {
            Some(name) => self.models.iter().find(|m| &m.name == name),
            None => self.models.first(),
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::configuration("source name must not be empty"));
        }
        if self.models.is_empty() {
            return Err(AppError::configuration(format!(
                "source '{}' has no models",
                self.name
            )));
        }

        // Model names only need to be unique, an empty suffix is a valid variant
        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.name.as_str()) {
                return Err(AppError::configuration(format!(
                    "source '{}' declares model '{}' more than once",
                    self.name, model.name
                )));
            }
        }

        if let Some(name) = &self.epg_model {
            if self.epg_model().is_none() {
                return Err(AppError::configuration(format!(
                    "source '{}' references unknown epg model '{}'",
                    self.name, name
                )));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a JSON (`.json`) or TOML file and validate it
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> AppResult<Self> {
        let path = config_file.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config = if is_json {
            Self::from_json(&contents)?
        } else {
            Self::from_toml(&contents)?
        };

        info!(
            "Loaded {} source(s) from {}",
            config.sources.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_json(contents: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(contents)
            .map_err(|e| AppError::configuration(format!("invalid JSON config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| AppError::configuration(format!("invalid TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        let mut names = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !names.insert(source.name.as_str()) {
                return Err(AppError::configuration(format!(
                    "source '{}' is declared more than once",
                    source.name
                )));
            }
        }
        Ok(())
    }

    pub fn source_paths(&self, source: &SourceConfig) -> SourcePaths {
        SourcePaths::new(self, source)
    }
}

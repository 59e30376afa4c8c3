//! JSON configuration: OAuth credentials, remote folder ids and the
//! spreadsheet id of each region.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::auth::AuthContext;
use crate::layout::SheetLayout;

/// Regions with their own fiscal assignment spreadsheet.
pub const DEFAULT_REGIONS: &[&str] = &["Centro-Oeste", "Nordeste", "Sudeste", "Sul", "Norte"];

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("unknown region: {0}")]
    UnknownRegion(String),
    #[error("no spreadsheet id configured for region {0}")]
    RegionNotConfigured(String),
}

/// On-disk configuration document.
///
/// Key names match the existing `config.json` files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "CLIENT_ID", default)]
    pub client_id: String,
    #[serde(rename = "CLIENT_SECRET", default)]
    pub client_secret: String,
    #[serde(rename = "REFRESH_TOKEN", default)]
    pub refresh_token: String,
    /// Folder holding the fiscal assignment spreadsheets.
    #[serde(rename = "PASTA_ID_FISCAIS", default)]
    pub assignments_folder: String,
    /// Region name → spreadsheet file id.
    #[serde(rename = "PLANILHAS_FISCAIS", default = "default_region_sheets")]
    pub region_sheets: BTreeMap<String, String>,
    /// Folder holding the budget spreadsheets.
    #[serde(rename = "PASTA_ID_ORCAMENTO", default)]
    pub budget_folder: String,
    #[serde(rename = "LAYOUT", default)]
    pub layout: SheetLayout,
}

fn default_region_sheets() -> BTreeMap<String, String> {
    DEFAULT_REGIONS
        .iter()
        .map(|r| (r.to_string(), String::new()))
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            assignments_folder: String::new(),
            region_sheets: default_region_sheets(),
            budget_folder: String::new(),
            layout: SheetLayout::default(),
        }
    }
}

impl AppConfig {
    /// Load the config at `path`, writing a default document first if the
    /// file does not exist yet.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!(path = %path.display(), "created default config");
            return Ok(config);
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Spreadsheet file id of `region`.
    pub fn sheet_for_region(&self, region: &str) -> Result<&str, ConfigError> {
        match self.region_sheets.get(region) {
            None => Err(ConfigError::UnknownRegion(region.to_string())),
            Some(id) if id.trim().is_empty() => {
                Err(ConfigError::RegionNotConfigured(region.to_string()))
            }
            Some(id) => Ok(id.as_str()),
        }
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.region_sheets.keys().map(String::as_str)
    }

    /// Copy with the secret values masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |s: &str| {
            if s.is_empty() {
                String::new()
            } else {
                "********".to_string()
            }
        };
        Self {
            client_secret: mask(&self.client_secret),
            refresh_token: mask(&self.refresh_token),
            ..self.clone()
        }
    }
}

/// Editing access to a config file. Only obtainable with an [`AuthContext`].
pub struct ConfigEditor<'a> {
    _auth: &'a AuthContext,
    path: PathBuf,
    config: AppConfig,
}

impl<'a> ConfigEditor<'a> {
    pub fn open(auth: &'a AuthContext, path: &Path) -> Result<Self, ConfigError> {
        let config = AppConfig::load_or_init(path)?;
        Ok(Self {
            _auth: auth,
            path: path.to_path_buf(),
            config,
        })
    }

    /// Full, unmasked configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Set one key. Region spreadsheets are addressed as
    /// `PLANILHAS_FISCAIS.<region>`; only existing regions can be set.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim().to_string();
        match key {
            "CLIENT_ID" => self.config.client_id = value,
            "CLIENT_SECRET" => self.config.client_secret = value,
            "REFRESH_TOKEN" => self.config.refresh_token = value,
            "PASTA_ID_FISCAIS" => self.config.assignments_folder = value,
            "PASTA_ID_ORCAMENTO" => self.config.budget_folder = value,
            _ => {
                let region = key
                    .strip_prefix("PLANILHAS_FISCAIS.")
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let slot = self
                    .config
                    .region_sheets
                    .get_mut(region)
                    .ok_or_else(|| ConfigError::UnknownRegion(region.to_string()))?;
                *slot = value;
            }
        }
        info!(key, "config value updated");
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.config.save(&self.path)?;
        info!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use mv_promotion::{ComparisonMode, MissingMetricPolicy};
use serde::{Deserialize, Serialize};

use crate::LoadedConfig;

pub const DEFAULT_STORE_ROOT_ENV: &str = "MV_STORE_ROOT";

/// Typed view of the merged config. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionerConfig {
    pub store: StoreSettings,
    pub promotion: PromotionSettings,
    pub report: ReportSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub root: PathBuf,
    pub project: String,
    /// NAME of the env var that overrides `root` when set. Not a path.
    pub root_env: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./mv-store"),
            project: "default".to_string(),
            root_env: DEFAULT_STORE_ROOT_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionSettings {
    pub artifact_type: String,
    pub comparison_metric: String,
    pub promotion_alias: String,
    /// Parsed on use so an unknown name surfaces as `InvalidArgument`.
    pub comparison: String,
    pub on_missing_metric: String,
}

impl Default for PromotionSettings {
    fn default() -> Self {
        Self {
            artifact_type: "model".to_string(),
            comparison_metric: "val_metric".to_string(),
            promotion_alias: "production".to_string(),
            comparison: ComparisonMode::default().as_str().to_string(),
            on_missing_metric: MissingMetricPolicy::default().as_str().to_string(),
        }
    }
}

impl PromotionSettings {
    pub fn comparison_mode(&self) -> Result<ComparisonMode> {
        self.comparison
            .parse::<ComparisonMode>()
            .context("promotion.comparison")
    }

    pub fn missing_metric_policy(&self) -> Result<MissingMetricPolicy> {
        self.on_missing_metric
            .parse::<MissingMetricPolicy>()
            .context("promotion.on_missing_metric")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Where `promotion_report.json` goes. No report when unset.
    pub out_dir: Option<PathBuf>,
}

impl VersionerConfig {
    /// Deserialize and validate the enumerated settings.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        let cfg: VersionerConfig = serde_json::from_value(loaded.config_json.clone())
            .context("config does not match the versioner settings schema")?;
        cfg.promotion.comparison_mode()?;
        cfg.promotion.missing_metric_policy()?;
        Ok(cfg)
    }

    /// `store.root`, unless the env var named by `store.root_env` is set
    /// and non-empty. `lookup` is `std::env::var(..).ok()` outside tests.
    pub fn resolve_store_root(&self, lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
        let name = self.store.root_env.trim();
        if name.is_empty() {
            return self.store.root.clone();
        }
        match lookup(name) {
            Some(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
            _ => self.store.root.clone(),
        }
    }
}

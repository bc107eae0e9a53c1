use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the ledger tables are read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// Directory holding `transactions.csv` and `payments.csv`.
    Csv { dir: PathBuf },
    /// SQLite ledger database with `transactions` and `payments` tables.
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    pub n_init: usize,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    /// None grows every tree until its leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// None considers sqrt(n_features) features per split.
    pub max_features: Option<usize>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceConfig {
    pub base_url: String,
    pub budget_path: String,
    pub timeout_secs: u64,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4000".into(),
            budget_path: "/api/total_budget".into(),
            timeout_secs: 30,
        }
    }
}

impl FinanceConfig {
    pub fn budget_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.budget_path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_source: DataSource,
    pub seed: u64,
    pub segment_count: usize,
    /// Applied to the 0–1 payment ratio, before percentage scaling.
    pub label_threshold: f64,
    pub test_fraction: f64,
    pub kmeans: KMeansConfig,
    pub forest: ForestConfig,
    pub finance: FinanceConfig,
    pub default_horizon: u32,
    pub max_horizon: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_source: DataSource::Csv {
                dir: PathBuf::from("./csv_exports"),
            },
            seed: 42,
            segment_count: 3,
            label_threshold: 0.7,
            test_fraction: 0.2,
            kmeans: KMeansConfig::default(),
            forest: ForestConfig::default(),
            finance: FinanceConfig::default(),
            default_horizon: 12,
            max_horizon: 120,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON config file. Missing keys fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let mut config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Default config reading CSV exports from `dir`.
    pub fn for_csv_dir(dir: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            data_source: DataSource::Csv { dir: dir.into() },
            ..Self::default()
        };
        config.apply_env_overrides();
        config
    }

    /// `LEDGERLENS_FINANCE_URL` overrides the finance collaborator base URL.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("LEDGERLENS_FINANCE_URL") {
            if !url.trim().is_empty() {
                self.finance.base_url = url;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.segment_count >= 1, "segment_count must be >= 1");
        anyhow::ensure!(
            self.test_fraction > 0.0 && self.test_fraction < 1.0,
            "test_fraction must be in (0, 1), got {}",
            self.test_fraction
        );
        anyhow::ensure!(self.forest.n_trees >= 1, "forest.n_trees must be >= 1");
        anyhow::ensure!(self.kmeans.n_init >= 1, "kmeans.n_init must be >= 1");
        anyhow::ensure!(
            self.default_horizon >= 1 && self.default_horizon <= self.max_horizon,
            "default_horizon must be within 1..={}",
            self.max_horizon
        );
        Ok(())
    }

    /// Config with small, fast defaults for use in tests.
    pub fn default_test() -> Self {
        Self {
            forest: ForestConfig {
                n_trees: 25,
                ..ForestConfig::default()
            },
            kmeans: KMeansConfig {
                n_init: 4,
                ..KMeansConfig::default()
            },
            ..Self::default()
        }
    }
}

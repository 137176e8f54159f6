//! # Configuration
//!
//! Optional TOML file with the tier catalog and scheduler switch.
//!
//! ```toml
//! [scheduler]
//! enabled = true
//!
//! [[tiers]]
//! name = "Bronze"
//! icon = "images/bronze.png"
//! ```
//!
//! Tier order is the position in the `[[tiers]]` list. A missing file means
//! defaults: the ten-tier ladder and the scheduler switched on.

use league_core::{LeagueError, Tier, TierCatalog};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default ladder, lowest first.
const DEFAULT_TIERS: [&str; 10] = [
    "Bronze", "Silver", "Gold", "Platinum", "Diamond", "Sapphire", "Ruby", "Emerald", "Onyx",
    "Obsidian",
];

/// One entry of the `[[tiers]]` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: String,
    /// Defaults to `images/<lowercase name>.png`.
    #[serde(default)]
    pub icon: Option<String>,
}

/// `[scheduler]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueConfig {
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_true() -> bool {
    true
}

fn default_tiers() -> Vec<TierConfig> {
    DEFAULT_TIERS
        .iter()
        .map(|name| TierConfig {
            name: (*name).to_string(),
            icon: None,
        })
        .collect()
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl LeagueConfig {
    /// Load from `path`, or defaults if `path` is `None` or does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, LeagueError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| LeagueError::Config(format!("Read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse TOML content and validate the tier list.
    pub fn parse(content: &str) -> Result<Self, LeagueError> {
        let config: Self =
            toml::from_str(content).map_err(|e| LeagueError::Config(e.to_string()))?;
        config.catalog()?;
        Ok(config)
    }

    /// Tiers with dense orders and resolved icons.
    pub fn tiers(&self) -> Vec<Tier> {
        self.tiers
            .iter()
            .enumerate()
            .map(|(order, t)| {
                let icon = t
                    .icon
                    .clone()
                    .unwrap_or_else(|| format!("images/{}.png", t.name.to_lowercase()));
                Tier::new(t.name.clone(), icon, order as u32)
            })
            .collect()
    }

    /// Validated catalog built from [`Self::tiers`].
    pub fn catalog(&self) -> Result<TierCatalog, LeagueError> {
        TierCatalog::new(self.tiers())
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::DAY;

/// User-configurable tracker options, loadable from a JSON file.
///
/// Missing fields fall back to their defaults, so a partial config file
/// (or an empty `{}`) is always valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Days a non-subscribed record is retained after its last update.
    pub clean_comments: u32,

    /// Days a subscription stays active before it expires.
    pub subscription_length: u32,

    /// Track comment counts for visited threads at all.
    pub monitor_posts_visited: bool,

    /// Also track visits made from a private browsing context.
    pub monitor_posts_visited_incognito: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            clean_comments: 7,
            subscription_length: 2,
            monitor_posts_visited: true,
            monitor_posts_visited_incognito: false,
        }
    }
}

impl TrackerConfig {
    /// Load config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: TrackerConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.clean_comments > 0,
            "cleanComments must be at least 1 day"
        );
        anyhow::ensure!(
            self.subscription_length > 0,
            "subscriptionLength must be at least 1 day"
        );
        Ok(())
    }

    /// How long a non-subscribed record is kept, in ms.
    pub fn retention_window(&self) -> u64 {
        u64::from(self.clean_comments) * DAY
    }

    /// How long a subscription lasts, in ms.
    pub fn subscription_window(&self) -> u64 {
        u64::from(self.subscription_length) * DAY
    }
}

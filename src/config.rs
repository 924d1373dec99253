//! Search pipeline configuration.
//!
//! Loaded from TOML; every key is optional and falls back to the defaults
//! below. Resolution order for [`SearchConfig::load`]:
//!
//! 1. `AGENT_SESSION_SEARCH_CONFIG` environment variable
//! 2. `<config dir>/agent-session-search/config.toml`
//!
//! A missing file is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_ENV_VAR: &str = "AGENT_SESSION_SEARCH_CONFIG";

/// Character budgets for search documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentBudget {
    /// Cap applied to every individual field
    pub per_field_chars: usize,
    /// Cap for the whole document
    pub total_chars: usize,
    /// Tool outputs at or above this length are left out
    pub tool_output_ceiling: usize,
}

impl Default for DocumentBudget {
    fn default() -> Self {
        Self { per_field_chars: 4_000, total_chars: 200_000, tool_output_ceiling: 20_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Sessions at or above this size are scanned one at a time
    pub large_session_threshold_bytes: u64,
    pub small_batch_size: usize,
    /// Maximum ids requested from the full-text index per query
    pub index_result_cap: usize,
    /// Scan tool outputs of indexed sessions that the index may not cover
    pub deep_tool_output_scan: bool,
    /// Query the secondary tool-I/O index when the main index returns few hits
    pub recent_tool_io_index: bool,
    pub throttle_ui_updates: bool,
    pub throttle_interval_ms: u64,
    /// Buffer result appends and publish them with the throttled flush
    pub coalesce_results: bool,
    /// Yield between units of heavy background work
    pub lower_background_priority: bool,
    pub include_system_probes: bool,
    /// Prewarming is skipped while the last keystroke is this recent
    pub typing_quiet_period_ms: u64,
    pub document: DocumentBudget,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            large_session_threshold_bytes: 10 * 1024 * 1024,
            small_batch_size: 64,
            index_result_cap: 500,
            deep_tool_output_scan: true,
            recent_tool_io_index: true,
            throttle_ui_updates: true,
            throttle_interval_ms: 100,
            coalesce_results: true,
            lower_background_priority: false,
            include_system_probes: false,
            typing_quiet_period_ms: 400,
            document: DocumentBudget::default(),
        }
    }
}

impl SearchConfig {
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: SearchConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "loaded search config");
        Ok(config.sanitized())
    }

    pub fn default_path() -> Option<PathBuf> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(explicit));
        }
        dirs::config_dir().map(|dir| dir.join("agent-session-search").join("config.toml"))
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    pub fn typing_quiet_period(&self) -> Duration {
        Duration::from_millis(self.typing_quiet_period_ms)
    }

    /// Clamp values that would stall the pipeline
    pub(crate) fn sanitized(mut self) -> Self {
        self.small_batch_size = self.small_batch_size.max(1);
        self.index_result_cap = self.index_result_cap.max(1);
        self
    }
}

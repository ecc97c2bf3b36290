/// Configuration module for lrag.
///
/// Handles loading, validating, and providing default configuration values
/// for indexing, incremental updates and watch sessions.
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::indexer::loader::Loader;
use crate::paths;

// ── Default value functions ──────────────────────────────────────────

fn default_extensions() -> Vec<String> {
    vec![".md".to_string()]
}

fn default_chunk_size() -> usize {
    1500
}

fn default_checkpoint_interval() -> usize {
    100
}

fn default_embed_delay_ms() -> u64 {
    50
}

fn default_max_file_size() -> u64 {
    100 * 1024
}

fn default_search_top_k() -> usize {
    5
}

fn default_debounce_ms() -> u64 {
    500
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Directory holding index files; `None` means the XDG data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_dir: Option<PathBuf>,

    /// Extension allow-list shared by scans and change detection.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chunks embedded between checkpoint writes.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    #[serde(default = "default_embed_delay_ms")]
    pub embed_delay_ms: u64,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default)]
    pub split_large_files: bool,

    #[serde(default)]
    pub include_tests: bool,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default)]
    pub show_progress: bool,

    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Mark indexes committed by the watch loop as review sessions.
    #[serde(default)]
    pub review: bool,

    /// Reload the shared store handle after every committed batch.
    #[serde(default)]
    pub reload_handle: bool,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            index_dir: None,
            extensions: default_extensions(),
            chunk_size: default_chunk_size(),
            checkpoint_interval: default_checkpoint_interval(),
            embed_delay_ms: default_embed_delay_ms(),
            max_file_size: default_max_file_size(),
            split_large_files: false,
            include_tests: false,
            search_top_k: default_search_top_k(),
            show_progress: false,
            watch: WatchConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            review: false,
            reload_handle: false,
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults. Invalid JSON is reported and the
    /// defaults are used instead.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        let mut cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {}: {e}", path.display());
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {}", path.display());

        // Accept "go" as well as ".go"
        for ext in &mut cfg.extensions {
            if !ext.starts_with('.') {
                ext.insert(0, '.');
            }
        }

        if cfg.extensions.is_empty() {
            cfg.extensions = default_extensions();
        }

        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.checkpoint_interval > 0,
            "checkpoint_interval must be positive"
        );
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(self.max_file_size > 0, "max_file_size must be positive");
        anyhow::ensure!(
            !self.extensions.is_empty(),
            "at least one extension must be specified"
        );
        for ext in &self.extensions {
            anyhow::ensure!(
                ext.starts_with('.') && ext.len() > 1,
                "extension {ext:?} must start with '.'"
            );
        }
        Ok(())
    }

    /// Resolved index directory.
    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        self.index_dir
            .clone()
            .unwrap_or_else(paths::default_index_dir)
    }

    #[must_use]
    pub fn embed_delay(&self) -> Duration {
        Duration::from_millis(self.embed_delay_ms)
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.watch.debounce_ms)
    }

    /// Loader configured with this config's scan rules.
    #[must_use]
    pub fn loader(&self) -> Loader {
        Loader {
            extensions: self.extensions.clone(),
            max_file_size: self.max_file_size,
            split_large_files: self.split_large_files,
            include_tests: self.include_tests,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

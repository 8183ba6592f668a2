//! Configuration loading and parsing.
//!
//! Parses `lineedit.toml` (or an override path provided by the binary) with two
//! sections, `[buffer]` and `[history]`. Every field has a default, so a missing
//! file, a missing section or a parse failure all yield the stock configuration.
//! Unknown fields are ignored to allow forward evolution.
//!
//! The raw parsed values are retained in `Config::file`; `Config::effective`
//! clamps them into the ranges the editing core accepts and logs each clamp at
//! target `config`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use core_state::{COALESCE_GAP, COALESCE_MAX_RUN, HISTORY_MAX_DEPTH, TrackerOptions};
use core_text::BufferOptions;
use core_text::gap::{DEFAULT_CAPACITY, MIN_CAPACITY};
use serde::Deserialize;
use tracing::{info, warn};

pub const FILE_NAME: &str = "lineedit.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    #[serde(default = "BufferConfig::default_initial_capacity")]
    pub initial_capacity: usize,
    /// 0 means unlimited.
    #[serde(default)]
    pub max_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: Self::default_initial_capacity(),
            max_capacity: 0,
        }
    }
}

impl BufferConfig {
    const fn default_initial_capacity() -> usize {
        DEFAULT_CAPACITY
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "HistoryConfig::default_coalesce_max_run")]
    pub coalesce_max_run: usize,
    #[serde(default = "HistoryConfig::default_coalesce_gap_ms")]
    pub coalesce_gap_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::default_max_depth(),
            coalesce_max_run: Self::default_coalesce_max_run(),
            coalesce_gap_ms: Self::default_coalesce_gap_ms(),
        }
    }
}

impl HistoryConfig {
    const fn default_max_depth() -> usize {
        HISTORY_MAX_DEPTH
    }
    const fn default_coalesce_max_run() -> usize {
        COALESCE_MAX_RUN
    }
    const fn default_coalesce_gap_ms() -> u64 {
        COALESCE_GAP.as_millis() as u64
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Config path: `lineedit.toml` in the working directory, then the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("lineedit").join(FILE_NAME);
    }
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config {
            raw: Some(content),
            file,
        }),
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// The parsed values clamped into accepted ranges.
    pub fn effective(&self) -> ConfigFile {
        let mut out = self.file.clone();
        clamp_min(
            &mut out.buffer.initial_capacity,
            MIN_CAPACITY,
            "buffer_initial_capacity_clamped",
        );
        if out.buffer.max_capacity != 0 && out.buffer.max_capacity < out.buffer.initial_capacity {
            info!(
                target: "config",
                raw = out.buffer.max_capacity,
                clamped = out.buffer.initial_capacity,
                "buffer_max_capacity_clamped"
            );
            out.buffer.max_capacity = out.buffer.initial_capacity;
        }
        clamp_min(&mut out.history.max_depth, 1, "history_max_depth_clamped");
        clamp_min(
            &mut out.history.coalesce_max_run,
            1,
            "history_coalesce_max_run_clamped",
        );
        out
    }

    pub fn buffer_options(&self) -> BufferOptions {
        let buffer = self.effective().buffer;
        BufferOptions {
            initial_capacity: buffer.initial_capacity,
            max_capacity: (buffer.max_capacity != 0).then_some(buffer.max_capacity),
        }
    }

    pub fn tracker_options(&self) -> TrackerOptions {
        let history = self.effective().history;
        TrackerOptions {
            max_depth: history.max_depth,
            coalesce_max_run: history.coalesce_max_run,
            coalesce_gap: Duration::from_millis(history.coalesce_gap_ms),
        }
    }
}

fn clamp_min(value: &mut usize, min: usize, event: &'static str) {
    if *value < min {
        info!(target: "config", raw = *value, clamped = min, kind = event, "value_clamped");
        *value = min;
    }
}

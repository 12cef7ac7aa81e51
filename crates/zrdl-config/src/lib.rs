//! Configuration loading for the drawlist builder and the worker's `init`
//! message (spec §4.6 "init{ config: { max_event_bytes, fps_cap,
//! frame_transport, …engine keys } }").
//!
//! Parsing is best-effort and resilient: a missing or malformed `zrdl.toml`
//! falls back to defaults rather than failing startup, mirroring the
//! teacher's own config loader.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use tracing::{info, warn};

use zrdl_builder::BuildCaps;

/// `BuildCaps` mirror with per-field defaults, since `BuildCaps` itself
/// lives in `zrdl-builder` and stays free of a serde dependency.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct BuildCapsFile {
    pub max_drawlist_bytes: i32,
    pub max_cmd_count: i32,
    pub max_blob_bytes: i32,
    pub max_blobs: i32,
    pub max_string_bytes: i32,
    pub max_strings: i32,
    pub validate_params: bool,
    pub reuse_output_buffer: bool,
    pub encoded_string_cache_cap: i32,
}

impl Default for BuildCapsFile {
    fn default() -> Self {
        BuildCaps::default().into()
    }
}

impl From<BuildCaps> for BuildCapsFile {
    fn from(c: BuildCaps) -> Self {
        Self {
            max_drawlist_bytes: c.max_drawlist_bytes,
            max_cmd_count: c.max_cmd_count,
            max_blob_bytes: c.max_blob_bytes,
            max_blobs: c.max_blobs,
            max_string_bytes: c.max_string_bytes,
            max_strings: c.max_strings,
            validate_params: c.validate_params,
            reuse_output_buffer: c.reuse_output_buffer,
            encoded_string_cache_cap: c.encoded_string_cache_cap,
        }
    }
}

impl From<BuildCapsFile> for BuildCaps {
    fn from(c: BuildCapsFile) -> Self {
        Self {
            max_drawlist_bytes: c.max_drawlist_bytes,
            max_cmd_count: c.max_cmd_count,
            max_blob_bytes: c.max_blob_bytes,
            max_blobs: c.max_blobs,
            max_string_bytes: c.max_string_bytes,
            max_strings: c.max_strings,
            validate_params: c.validate_params,
            reuse_output_buffer: c.reuse_output_buffer,
            encoded_string_cache_cap: c.encoded_string_cache_cap,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrameTransportMode {
    Transfer,
    #[default]
    SabV1,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct FrameTransportConfig {
    pub mode: FrameTransportMode,
    pub slot_count: u32,
    pub slot_bytes: u32,
}

impl Default for FrameTransportConfig {
    fn default() -> Self {
        Self {
            mode: FrameTransportMode::default(),
            slot_count: 4,
            slot_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerInitConfig {
    pub max_event_bytes: u32,
    pub fps_cap: u32,
    pub frame_transport: FrameTransportConfig,
}

impl Default for WorkerInitConfig {
    fn default() -> Self {
        Self {
            max_event_bytes: 4096,
            fps_cap: 60,
            frame_transport: FrameTransportConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigFile {
    pub build_caps: BuildCapsFile,
    pub worker: WorkerInitConfig,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub file: ConfigFile,
}

impl RuntimeConfig {
    pub fn build_caps(&self) -> BuildCaps {
        self.file.build_caps.into()
    }

    pub fn worker(&self) -> WorkerInitConfig {
        self.file.worker
    }
}

/// Best-effort config path: a local `zrdl.toml` takes precedence over the
/// platform config directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("zrdl.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("zrdl").join("zrdl.toml");
    }
    PathBuf::from("zrdl.toml")
}

/// Load config from `path` (or the discovered default location). A missing
/// or malformed file falls back to defaults rather than failing startup.
pub fn load_from(path: Option<PathBuf>) -> Result<RuntimeConfig> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(RuntimeConfig::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "zrdl.config", path = %path.display(), "loaded config");
            Ok(RuntimeConfig { file })
        }
        Err(err) => {
            warn!(target: "zrdl.config", path = %path.display(), error = %err, "failed to parse config, using defaults");
            Ok(RuntimeConfig::default())
        }
    }
}

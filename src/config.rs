//! Daemon configuration.
//!
//! Layered the usual way: optional JSON config file (path in
//! `TARGETD_CONFIG`), then environment overrides, then validation. CLI
//! flags are applied on top by the binary.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_DEVICE: &str = "stub://camera";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_STREAM_PORT: u16 = 8080;
const DEFAULT_STREAM_BACKLOG: u32 = 150;
const DEFAULT_TEMPLATE_PATH: &str = "target.png";
const DEFAULT_CAPTURE_DIR: &str = ".";

#[derive(Debug, Deserialize, Default)]
struct TargetdConfigFile {
    camera: Option<CameraConfigFile>,
    stream: Option<StreamConfigFile>,
    template_path: Option<PathBuf>,
    capture_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    port: Option<u16>,
    backlog: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TargetdConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub stream_port: u16,
    pub stream_backlog: u32,
    pub template_path: PathBuf,
    pub capture_dir: PathBuf,
}

impl Default for TargetdConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            stream_port: DEFAULT_STREAM_PORT,
            stream_backlog: DEFAULT_STREAM_BACKLOG,
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            capture_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
        }
    }
}

impl TargetdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TARGETD_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(Path::new(path))?,
            None => TargetdConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TargetdConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            device: file
                .camera
                .as_ref()
                .and_then(|c| c.device.clone())
                .unwrap_or(defaults.device),
            width: file
                .camera
                .as_ref()
                .and_then(|c| c.width)
                .unwrap_or(defaults.width),
            height: file
                .camera
                .as_ref()
                .and_then(|c| c.height)
                .unwrap_or(defaults.height),
            stream_port: file
                .stream
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(defaults.stream_port),
            stream_backlog: file
                .stream
                .as_ref()
                .and_then(|s| s.backlog)
                .unwrap_or(defaults.stream_backlog),
            template_path: file.template_path.unwrap_or(defaults.template_path),
            capture_dir: file.capture_dir.unwrap_or(defaults.capture_dir),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("TARGETD_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device;
            }
        }
        if let Ok(port) = std::env::var("TARGETD_STREAM_PORT") {
            self.stream_port = port
                .parse()
                .map_err(|_| anyhow!("TARGETD_STREAM_PORT must be a port number"))?;
        }
        if let Ok(path) = std::env::var("TARGETD_TEMPLATE") {
            if !path.trim().is_empty() {
                self.template_path = PathBuf::from(path);
            }
        }
        if let Ok(dir) = std::env::var("TARGETD_CAPTURE_DIR") {
            if !dir.trim().is_empty() {
                self.capture_dir = PathBuf::from(dir);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("capture geometry must be non-zero"));
        }
        if self.template_path.as_os_str().is_empty() {
            return Err(anyhow!("template_path is required"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<TargetdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

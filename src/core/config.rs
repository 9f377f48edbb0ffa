use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::user::CODE_LEN;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportSource {
    /// Serial port opened with the configured line settings
    Device,
    Stdin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialParity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_transport_source")]
    pub source: TransportSource,
    #[serde(default = "default_device")]
    pub device: PathBuf,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// 5 to 8
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// 1 or 2
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default = "default_parity")]
    pub parity: SerialParity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
    #[serde(default = "default_compact_ratio")]
    pub compact_ratio: usize,
    pub seed: Option<SeedUserConfig>,
}

/// Record upserted at startup, in provisioning text form
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUserConfig {
    pub id: String,
    pub hash: String,
    pub code: String,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// An external process writes the frame to `image_path`
    StillFile,
    /// Run `program` with `args` to write the frame
    Command,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_capture_mode")]
    pub mode: CaptureMode,
    #[serde(default = "default_capture_path")]
    pub image_path: PathBuf,
    /// How long still-file mode waits for a new frame
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,
    pub program: Option<String>,
    /// `{output}` is replaced with `image_path`
    #[serde(default)]
    pub args: Vec<String>,
}

/// Calibration of the marker reader
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_crop_x")]
    pub crop_x: u32,
    #[serde(default = "default_crop_y")]
    pub crop_y: u32,
    #[serde(default = "default_crop_size")]
    pub crop_width: u32,
    #[serde(default = "default_crop_size")]
    pub crop_height: u32,
    /// Gaussian kernel edge, odd
    #[serde(default = "default_blur_kernel")]
    pub blur_kernel: u32,
    /// Pixels at or above become white
    #[serde(default = "default_binarize_threshold")]
    pub binarize_threshold: u8,
    #[serde(default = "default_grid")]
    pub grid_rows: u32,
    #[serde(default = "default_grid")]
    pub grid_cols: u32,
    /// Cells with a mean above this read as '1'
    #[serde(default = "default_cell_threshold")]
    pub cell_threshold: u8,
    #[serde(default = "default_annotate")]
    pub annotate: bool,
    #[serde(default = "default_annotated_path")]
    pub annotated_path: PathBuf,
    #[serde(default = "default_annotation_scale")]
    pub annotation_scale: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_console")]
    pub console: bool,
}

// Default value functions
fn default_transport_source() -> TransportSource {
    TransportSource::Device
}

fn default_device() -> PathBuf {
    PathBuf::from("/dev/ttyACM0")
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_parity() -> SerialParity {
    SerialParity::None
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("data/users.wal")
}

fn default_compact_ratio() -> usize {
    4
}

fn default_capture_mode() -> CaptureMode {
    CaptureMode::StillFile
}

fn default_capture_path() -> PathBuf {
    PathBuf::from("pictures/captured.jpg")
}

fn default_frame_timeout_ms() -> u64 {
    2000
}

fn default_crop_x() -> u32 {
    310
}

fn default_crop_y() -> u32 {
    280
}

/// Width and height of the region, not its far corner
fn default_crop_size() -> u32 {
    25
}

fn default_blur_kernel() -> u32 {
    15
}

fn default_binarize_threshold() -> u8 {
    200
}

fn default_grid() -> u32 {
    4
}

fn default_cell_threshold() -> u8 {
    15
}

fn default_annotate() -> bool {
    true
}

fn default_annotated_path() -> PathBuf {
    PathBuf::from("pictures/output.jpg")
}

fn default_annotation_scale() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_console() -> bool {
    false
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            source: default_transport_source(),
            device: default_device(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: default_parity(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            compact_ratio: default_compact_ratio(),
            seed: None,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: default_capture_mode(),
            image_path: default_capture_path(),
            frame_timeout_ms: default_frame_timeout_ms(),
            program: None,
            args: Vec::new(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            crop_x: default_crop_x(),
            crop_y: default_crop_y(),
            crop_width: default_crop_size(),
            crop_height: default_crop_size(),
            blur_kernel: default_blur_kernel(),
            binarize_threshold: default_binarize_threshold(),
            grid_rows: default_grid(),
            grid_cols: default_grid(),
            cell_threshold: default_cell_threshold(),
            annotate: default_annotate(),
            annotated_path: default_annotated_path(),
            annotation_scale: default_annotation_scale(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            console: default_console(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.auth.secret.is_empty() {
            bail!("auth.secret must not be empty");
        }

        if self.transport.baud_rate == 0 {
            bail!("transport.baud_rate must be greater than 0");
        }

        if !(5..=8).contains(&self.transport.data_bits) {
            bail!("transport.data_bits must be 5, 6, 7 or 8, got {}", self.transport.data_bits);
        }

        if !matches!(self.transport.stop_bits, 1 | 2) {
            bail!("transport.stop_bits must be 1 or 2, got {}", self.transport.stop_bits);
        }

        if self.registry.compact_ratio == 0 {
            bail!("compact_ratio must be greater than 0");
        }

        if self.capture.mode == CaptureMode::Command
            && self.capture.program.as_deref().map_or(true, str::is_empty)
        {
            bail!("capture.program must be set when capture.mode is \"command\"");
        }

        self.vision.validate()?;

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.logging.format
            );
        }

        Ok(())
    }
}

impl VisionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.crop_width == 0 || self.crop_height == 0 {
            bail!("crop_width and crop_height must be greater than 0");
        }

        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            bail!("blur_kernel must be a positive odd number, got {}", self.blur_kernel);
        }

        if self.grid_rows == 0 || self.grid_cols == 0 {
            bail!("grid_rows and grid_cols must be greater than 0");
        }

        let cells = self.grid_rows * self.grid_cols;
        if cells as usize != CODE_LEN * 8 {
            bail!(
                "grid {}x{} yields {} bits but stored codes are {} bits",
                self.grid_rows,
                self.grid_cols,
                cells,
                CODE_LEN * 8
            );
        }

        if self.grid_rows > self.crop_height || self.grid_cols > self.crop_width {
            bail!(
                "grid {}x{} is finer than the {}x{} crop",
                self.grid_rows,
                self.grid_cols,
                self.crop_width,
                self.crop_height
            );
        }

        if self.annotation_scale == 0 {
            bail!("annotation_scale must be greater than 0");
        }

        Ok(())
    }
}

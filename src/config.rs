//! Scan configuration. A `ScanConfig` is immutable for the lifetime of one scan session and is
//! validated when the session begins.

use crate::noise::NoisePolicy;
use crate::{Point3, Result, ScanError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A swept angular range in degrees, sampled from `min` in increments of `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngularRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl AngularRange {
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// Number of samples across the range, `floor((max - min) / step)`. Only meaningful for a
    /// range which passes `validate`.
    pub fn count(&self) -> usize {
        self.steps() as usize
    }

    fn steps(&self) -> f64 {
        ((self.max - self.min) / self.step).floor()
    }

    /// The angle of the sample at `index`
    pub fn angle_at(&self, index: usize) -> f64 {
        self.min + index as f64 * self.step
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.step > 0.0) {
            return Err(ScanError::config(format!(
                "{name} step must be positive, got {}",
                self.step
            )));
        }
        if !(self.max > self.min) {
            return Err(ScanError::config(format!(
                "{name} max ({}) must be greater than min ({})",
                self.max, self.min
            )));
        }
        if !self.steps().is_finite() || self.steps() > MAX_GRID_CELLS as f64 {
            return Err(ScanError::config(format!(
                "{name} step {} is too fine for the range {}..{}",
                self.step, self.min, self.max
            )));
        }
        if self.count() == 0 {
            return Err(ScanError::config(format!(
                "{name} step {} is larger than the range {}..{}",
                self.step, self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseSettings {
    /// Absolute error in metres, or a fraction of the range for the proportional policy. Zero
    /// disables noise entirely.
    pub amplitude: f64,
    pub policy: NoisePolicy,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            amplitude: 0.03,
            policy: NoisePolicy::Absolute,
        }
    }
}

/// Lighting/weather condition under which one set of exposures is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lighting {
    Night,
    Cloudy,
    Day,
}

/// The camera exposures taken after sampling: every lighting condition is captured at each of
/// `rotations` evenly spaced camera yaws. Points are labeled against the rotations, so the
/// rotation index is the exposure index recorded in a cell's projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposurePlan {
    pub conditions: Vec<Lighting>,
    pub rotations: usize,
}

impl ExposurePlan {
    /// Yaw offset in degrees, relative to the sensor heading, of the given rotation
    pub fn yaw_offset(&self, rotation: usize) -> f64 {
        rotation as f64 * 360.0 / self.rotations as f64
    }
}

impl Default for ExposurePlan {
    fn default() -> Self {
        Self {
            conditions: vec![Lighting::Night, Lighting::Cloudy, Lighting::Day],
            rotations: 3,
        }
    }
}

/// Where the sensor sits for a scan. Horizontal sample angles are relative to `heading_deg`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorPose {
    pub origin: Point3,
    pub heading_deg: f64,
}

impl SensorPose {
    pub fn new(origin: Point3, heading_deg: f64) -> Self {
        Self {
            origin,
            heading_deg,
        }
    }
}

/// Upper bound on the number of cells in one scan grid
pub const MAX_GRID_CELLS: usize = 1 << 24;

fn default_frame_budget() -> usize {
    4
}

fn default_pixel_scale() -> f64 {
    1.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub horizontal: AngularRange,
    pub vertical: AngularRange,

    /// Maximum ray distance in metres
    pub range: f64,

    #[serde(default)]
    pub noise: NoiseSettings,

    /// Number of host ticks over which the grid rows are spread
    #[serde(default = "default_frame_budget")]
    pub frame_budget: usize,

    /// Where the persistence layer should write this scan's files. Never touched by the core.
    #[serde(default)]
    pub output_path: PathBuf,

    /// Display scaling applied when converting normalized screen coordinates to pixels
    #[serde(default = "default_pixel_scale")]
    pub pixel_scale: f64,

    #[serde(default)]
    pub exposures: ExposurePlan,

    /// Seed for the noise generator, for reproducible scans
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            horizontal: AngularRange::new(0.0, 360.0, 0.5),
            vertical: AngularRange::new(-15.0, 12.0, 0.5),
            range: 120.0,
            noise: NoiseSettings::default(),
            frame_budget: default_frame_budget(),
            output_path: PathBuf::from("LiDAR_PointCloud"),
            pixel_scale: default_pixel_scale(),
            exposures: ExposurePlan::default(),
            seed: None,
        }
    }
}

impl ScanConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: ScanConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Number of grid rows, one per elevation step
    pub fn rows(&self) -> usize {
        self.vertical.count()
    }

    /// Number of grid columns, one per azimuth step
    pub fn cols(&self) -> usize {
        self.horizontal.count()
    }

    pub fn validate(&self) -> Result<()> {
        self.horizontal.validate("horizontal")?;
        self.vertical.validate("vertical")?;
        match self.rows().checked_mul(self.cols()) {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => {
                return Err(ScanError::config(format!(
                    "a {}x{} grid exceeds the {} cell limit",
                    self.rows(),
                    self.cols(),
                    MAX_GRID_CELLS
                )));
            }
        }

        if !(self.range > 0.0) {
            return Err(ScanError::config(format!(
                "range must be positive, got {}",
                self.range
            )));
        }
        if !(self.noise.amplitude >= 0.0) {
            return Err(ScanError::config(format!(
                "noise amplitude must be non-negative, got {}",
                self.noise.amplitude
            )));
        }
        if self.frame_budget == 0 {
            return Err(ScanError::config("frame budget must be at least 1"));
        }
        if !(self.pixel_scale > 0.0) {
            return Err(ScanError::config("pixel scale must be positive"));
        }
        if self.exposures.rotations == 0 || self.exposures.conditions.is_empty() {
            return Err(ScanError::config(
                "exposure plan needs at least one rotation and one condition",
            ));
        }
        Ok(())
    }
}

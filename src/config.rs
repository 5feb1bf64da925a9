// src/config.rs
use crate::error::SimError;
use crate::mock_hand::MotionType;
use crate::DOF;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Motion loop rates accepted from a config file.
pub const TICK_RATE_RANGE_HZ: RangeInclusive<f64> = 1.0..=10_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
}

impl JointSpec {
    pub fn new(name: &str, lower: f64, upper: f64) -> Self {
        Self {
            name: name.to_string(),
            lower,
            upper,
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }
}

/// SO-101 joints in chain order, limits taken from the arm's URDF.
pub fn so101_joints() -> [JointSpec; DOF] {
    [
        JointSpec::new("shoulder_pan", -1.91986, 1.91986),
        JointSpec::new("shoulder_lift", -1.74533, 1.74533),
        JointSpec::new("elbow_flex", -1.69, 1.69),
        JointSpec::new("wrist_flex", -1.65806, 1.65806),
        JointSpec::new("wrist_roll", -2.74385, 2.84121),
        JointSpec::new("gripper", -0.174533, 1.74533),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    pub enabled: bool,
    /// Gripper frame offset from the wrist roll joint (meters).
    pub tool_offset: [f64; 3],
    pub ik_max_iterations: usize,
    pub ik_position_tolerance: f64,
    pub ik_orientation_tolerance: f64,
    pub ik_damping: f64,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tool_offset: [0.0, 0.0, 0.098],
            ik_max_iterations: 200,
            ik_position_tolerance: 1e-4,
            ik_orientation_tolerance: 1e-3,
            ik_damping: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub robot_name: String,
    /// Exponential approach rate toward targets (1/s).
    pub smoothing_rate: f64,
    pub tick_rate_hz: f64,
    pub joints: [JointSpec; DOF],
    pub kinematics: KinematicsConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            robot_name: "SO-101".to_string(),
            smoothing_rate: 10.0,
            tick_rate_hz: 60.0,
            joints: so101_joints(),
            kinematics: KinematicsConfig::default(),
        }
    }
}

impl SimulatorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: SimulatorConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.smoothing_rate.is_finite() && self.smoothing_rate > 0.0) {
            return Err(SimError::Config(format!(
                "smoothing_rate must be positive, got {}",
                self.smoothing_rate
            )));
        }
        if !TICK_RATE_RANGE_HZ.contains(&self.tick_rate_hz) {
            return Err(SimError::Config(format!(
                "tick_rate_hz must be within {}..={} Hz, got {}",
                TICK_RATE_RANGE_HZ.start(),
                TICK_RATE_RANGE_HZ.end(),
                self.tick_rate_hz
            )));
        }

        let mut seen = HashSet::new();
        for joint in &self.joints {
            if !seen.insert(joint.name.as_str()) {
                return Err(SimError::Config(format!("duplicate joint name '{}'", joint.name)));
            }
            if !(joint.lower.is_finite() && joint.upper.is_finite()) || joint.lower > joint.upper {
                return Err(SimError::Config(format!(
                    "joint '{}' has invalid limits [{}, {}]",
                    joint.name, joint.lower, joint.upper
                )));
            }
        }

        let k = &self.kinematics;
        if k.ik_max_iterations == 0 || k.ik_damping < 0.0 {
            return Err(SimError::Config("IK iterations must be > 0 and damping >= 0".to_string()));
        }

        Ok(())
    }

    pub fn tick_period(&self) -> Result<Duration, SimError> {
        Duration::try_from_secs_f64(1.0 / self.tick_rate_hz)
            .ok()
            .filter(|period| !period.is_zero())
            .ok_or_else(|| {
                SimError::Config(format!("tick_rate_hz {} has no usable period", self.tick_rate_hz))
            })
    }
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub config: SimulatorConfig,
    pub output_directory: PathBuf,
    pub run_duration: Duration,
    pub motion: MotionType,
    pub motion_speed: f64,
    /// Hand samples fed per second by the mock tracker.
    pub hand_rate_hz: f64,
    pub record_trajectory: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            config: SimulatorConfig::default(),
            output_directory: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("SO101Sim")))
                .unwrap_or_else(|| PathBuf::from("./output")),
            run_duration: Duration::from_secs(10),
            motion: MotionType::Wave,
            motion_speed: 1.0,
            hand_rate_hz: 30.0,
            record_trajectory: false,
        }
    }
}

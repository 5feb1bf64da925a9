// src/simulation.rs
use crate::config::{JointSpec, SimulatorConfig};
use crate::error::SimError;
use crate::kinematics::{KinematicsProvider, Pose, SerialChainKinematics, UnavailableKinematics};
use crate::landmarks::HandLandmarkSample;
use crate::DOF;

use nalgebra::Vector6;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Immutable copy of the joint vector taken under the state lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointState {
    pub joint_names: Vec<String>,
    pub positions: [f64; DOF],
    pub targets: [f64; DOF],
    pub velocities: [f64; DOF],
    /// Simulated seconds accumulated by `advance`.
    pub sim_time: f64,
    pub tick: u64,
}

impl JointState {
    pub fn max_tracking_error(&self) -> f64 {
        self.positions
            .iter()
            .zip(self.targets.iter())
            .map(|(p, t)| (t - p).abs())
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JointLimitInfo {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RobotInfo {
    pub name: String,
    pub dof: usize,
    pub joint_names: Vec<String>,
    pub joint_limits: Vec<JointLimitInfo>,
    pub kinematics_available: bool,
    pub kinematics_provider: String,
}

struct MotionState {
    positions: Vector6<f64>,
    targets: Vector6<f64>,
    velocities: Vector6<f64>,
    sim_time: f64,
    tick: u64,
}

impl MotionState {
    fn new() -> Self {
        Self {
            positions: Vector6::zeros(),
            targets: Vector6::zeros(),
            velocities: Vector6::zeros(),
            sim_time: 0.0,
            tick: 0,
        }
    }
}

pub struct JointStateSimulator {
    config: SimulatorConfig,
    kinematics: Arc<dyn KinematicsProvider>,
    state: Mutex<MotionState>,
}

impl JointStateSimulator {
    pub fn new(config: SimulatorConfig, kinematics: Arc<dyn KinematicsProvider>) -> Result<Self, SimError> {
        config.validate()?;

        tracing::info!(
            robot = %config.robot_name,
            kinematics = kinematics.name(),
            available = kinematics.is_available(),
            "joint simulator initialized"
        );

        Ok(Self {
            config,
            kinematics,
            state: Mutex::new(MotionState::new()),
        })
    }

    /// Picks the serial-chain solver when kinematics are enabled in `config`,
    /// otherwise runs in joint space only.
    pub fn from_config(config: SimulatorConfig) -> Result<Self, SimError> {
        let kinematics: Arc<dyn KinematicsProvider> = if config.kinematics.enabled {
            Arc::new(SerialChainKinematics::so101(&config.joints, &config.kinematics))
        } else {
            tracing::warn!("kinematics disabled, running in joint space only");
            Arc::new(UnavailableKinematics)
        };
        Self::new(config, kinematics)
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn joints(&self) -> &[JointSpec; DOF] {
        &self.config.joints
    }

    fn lock(&self) -> MutexGuard<'_, MotionState> {
        // State is plain numbers, a panic mid-update cannot leave it unusable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clamp_to_limits(&self, values: &Vector6<f64>) -> Vector6<f64> {
        Vector6::from_fn(|i, _| self.config.joints[i].clamp(values[i]))
    }

    /// Out-of-range values are clamped. A wrong-length or non-finite vector is
    /// rejected and leaves the state untouched.
    pub fn set_targets(&self, positions: &[f64], smooth: bool) -> Result<(), SimError> {
        if positions.len() != DOF {
            tracing::debug!(got = positions.len(), "rejected joint targets");
            return Err(SimError::InvalidInput {
                expected: DOF,
                got: positions.len(),
            });
        }
        if let Some(index) = positions.iter().position(|p| !p.is_finite()) {
            return Err(SimError::NonFinite { index });
        }

        let clamped = self.clamp_to_limits(&Vector6::from_column_slice(positions));

        let mut state = self.lock();
        state.targets = clamped;
        if !smooth {
            state.positions = clamped;
        }
        Ok(())
    }

    /// One smoothing step toward the targets. `dt <= 0` holds position and zeroes velocity.
    pub fn advance(&self, dt: f64) {
        let dt = if dt.is_finite() { dt } else { 0.0 };
        let alpha = (dt * self.config.smoothing_rate).clamp(0.0, 1.0);

        let mut state = self.lock();
        let diff = state.targets - state.positions;

        state.velocities = if dt > 0.0 { diff / dt } else { Vector6::zeros() };

        let next = if alpha >= 1.0 {
            state.targets
        } else {
            state.positions + diff * alpha
        };
        state.positions = self.clamp_to_limits(&next);

        if dt > 0.0 {
            state.sim_time += dt;
        }
        state.tick += 1;
    }

    pub fn snapshot(&self) -> JointState {
        let state = self.lock();
        JointState {
            joint_names: self.config.joints.iter().map(|j| j.name.clone()).collect(),
            positions: state.positions.into(),
            targets: state.targets.into(),
            velocities: state.velocities.into(),
            sim_time: state.sim_time,
            tick: state.tick,
        }
    }

    /// Heuristic hand-to-joint mapping. The coefficients are placeholders kept
    /// as-is for compatibility with existing clients, not a calibrated transform.
    pub fn map_hand_landmarks_to_targets(&self, landmarks: &HandLandmarkSample) -> Option<[f64; DOF]> {
        let wrist = landmarks.wrist();
        let middle_tip = landmarks.middle_tip();
        let span = landmarks.pinch_span();

        let raw = [
            // shoulder pan follows wrist x
            (wrist.x - 0.5) * 2.0,
            // shoulder lift follows wrist height
            (0.5 - wrist.y) * 1.5,
            // elbow opens with the pinch
            (span - 0.1) * 3.0,
            (middle_tip.y - wrist.y) * 2.0,
            wrist.z,
            (span * 5.0).clamp(0.0, 1.5),
        ];

        let mut angles = [0.0; DOF];
        for (i, value) in raw.iter().enumerate() {
            if !value.is_finite() {
                return None;
            }
            angles[i] = self.config.joints[i].clamp(*value);
        }
        Some(angles)
    }

    /// Same as [`map_hand_landmarks_to_targets`](Self::map_hand_landmarks_to_targets)
    /// on raw points; `None` when fewer than 21 are given.
    pub fn map_hand_points_to_targets(&self, points: &[[f64; 3]]) -> Option<[f64; DOF]> {
        let sample = HandLandmarkSample::from_arrays(points)?;
        self.map_hand_landmarks_to_targets(&sample)
    }

    pub fn kinematics_available(&self) -> bool {
        self.kinematics.is_available()
    }

    pub fn forward_kinematics(&self) -> Option<Pose> {
        let positions = self.lock().positions;
        match self.kinematics.forward(&positions) {
            Ok(pose) => Some(pose),
            Err(e) => {
                tracing::debug!("FK computation failed: {}", e);
                None
            }
        }
    }

    /// IK seeded with the current joint positions. The result is clamped to limits
    /// but not applied.
    pub fn inverse_kinematics(&self, target: &Pose) -> Option<[f64; DOF]> {
        let seed = self.lock().positions;
        match self.kinematics.inverse(&seed, target) {
            Ok(solution) => Some(self.clamp_to_limits(&solution).into()),
            Err(e) => {
                tracing::debug!("IK computation failed: {}", e);
                None
            }
        }
    }

    pub fn robot_info(&self) -> RobotInfo {
        RobotInfo {
            name: self.config.robot_name.clone(),
            dof: DOF,
            joint_names: self.config.joints.iter().map(|j| j.name.clone()).collect(),
            joint_limits: self
                .config
                .joints
                .iter()
                .map(|j| JointLimitInfo {
                    name: j.name.clone(),
                    lower: j.lower,
                    upper: j.upper,
                })
                .collect(),
            kinematics_available: self.kinematics.is_available(),
            kinematics_provider: self.kinematics.name().to_string(),
        }
    }
}

// src/lib.rs
pub mod config;
pub mod control;
pub mod data;
pub mod error;
pub mod kinematics;
pub mod landmarks;
pub mod mock_hand;
pub mod motion_loop;
pub mod simulation;

/// Joint count of the SO-101 arm, gripper included.
pub const DOF: usize = 6;

pub use config::{AppSettings, JointSpec, KinematicsConfig, SimulatorConfig};
pub use error::{KinematicsError, SimError};
pub use kinematics::{KinematicsProvider, Pose, SerialChainKinematics, UnavailableKinematics};
pub use landmarks::{HandLandmarkSample, Landmark};
pub use simulation::{JointState, JointStateSimulator, RobotInfo};

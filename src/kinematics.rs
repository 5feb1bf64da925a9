// src/kinematics.rs
//! End-effector poses and the providers that compute them.
//!
//! The simulator never depends on a concrete solver. It is handed a
//! [`KinematicsProvider`] at construction: either [`SerialChainKinematics`]
//! for the SO-101 chain or [`UnavailableKinematics`] when no model is present,
//! in which case the arm keeps running in pure joint space.

use crate::config::{JointSpec, KinematicsConfig};
use crate::error::KinematicsError;
use crate::DOF;

use nalgebra::{
    Isometry3, Matrix3, Matrix4, Matrix6, Rotation3, SMatrix, Translation3, Unit, UnitQuaternion,
    Vector3, Vector6,
};
use serde::{Deserialize, Serialize};

/// Number of joints that move the end effector. The gripper is excluded.
pub const ARM_JOINTS: usize = 5;

const JACOBIAN_STEP: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PoseRepr", into = "PoseRepr")]
pub struct Pose {
    pub position: Vector3<f64>,
    pub rotation: Rotation3<f64>,
}

/// Wire form: position plus a row-major 3x3 rotation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PoseRepr {
    position: [f64; 3],
    rotation: [[f64; 3]; 3],
}

impl From<PoseRepr> for Pose {
    fn from(repr: PoseRepr) -> Self {
        let r = repr.rotation;
        let m = Matrix3::new(
            r[0][0], r[0][1], r[0][2],
            r[1][0], r[1][1], r[1][2],
            r[2][0], r[2][1], r[2][2],
        );
        Pose::new(Vector3::from(repr.position), Rotation3::from_matrix(&m))
    }
}

impl From<Pose> for PoseRepr {
    fn from(pose: Pose) -> Self {
        let m = pose.rotation.matrix();
        PoseRepr {
            position: [pose.position.x, pose.position.y, pose.position.z],
            rotation: [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ],
        }
    }
}

impl Pose {
    pub fn new(position: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self { position, rotation }
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self {
            position: iso.translation.vector,
            rotation: iso.rotation.to_rotation_matrix(),
        }
    }

    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        let mut m = self.rotation.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.position);
        m
    }

    pub fn from_homogeneous(m: &Matrix4<f64>) -> Self {
        let rotation: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
        let position: Vector3<f64> = m.fixed_view::<3, 1>(0, 3).into_owned();
        Self::new(position, Rotation3::from_matrix(&rotation))
    }

    /// Stacked [position; orientation] error that takes `self` to `target`.
    pub fn error_to(&self, target: &Pose) -> Vector6<f64> {
        let dp = target.position - self.position;
        let dr = rotation_log(&self.rotation.rotation_to(&target.rotation));
        Vector6::new(dp.x, dp.y, dp.z, dr.x, dr.y, dr.z)
    }
}

/// Axis-angle vector of `rotation`, finite for every proper rotation.
///
/// Goes through the quaternion and `atan2`, so matrices that drifted slightly
/// off orthonormal (trace a hair above 3) still give a near-zero error.
fn rotation_log(rotation: &Rotation3<f64>) -> Vector3<f64> {
    let q = UnitQuaternion::from_rotation_matrix(rotation);
    // shortest arc
    let (w, v) = if q.w < 0.0 { (-q.w, -q.imag()) } else { (q.w, q.imag()) };
    let s = v.norm();
    if s == 0.0 {
        return Vector3::zeros();
    }
    v * (2.0 * s.atan2(w) / s)
}

pub trait KinematicsProvider: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    fn forward(&self, joints: &Vector6<f64>) -> Result<Pose, KinematicsError>;

    /// Solve for joints reaching `target`, starting the search at `seed`.
    fn inverse(&self, seed: &Vector6<f64>, target: &Pose) -> Result<Vector6<f64>, KinematicsError>;
}

/// Stand-in used when no kinematic model could be built.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableKinematics;

impl KinematicsProvider for UnavailableKinematics {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn forward(&self, _joints: &Vector6<f64>) -> Result<Pose, KinematicsError> {
        Err(KinematicsError::Unavailable)
    }

    fn inverse(&self, _seed: &Vector6<f64>, _target: &Pose) -> Result<Vector6<f64>, KinematicsError> {
        Err(KinematicsError::Unavailable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointAxis {
    Y,
    Z,
}

impl JointAxis {
    fn unit(self) -> Unit<Vector3<f64>> {
        match self {
            JointAxis::Y => Vector3::y_axis(),
            JointAxis::Z => Vector3::z_axis(),
        }
    }
}

/// Revolute joint: translate to `origin` in the parent frame, then rotate about `axis`.
#[derive(Debug, Clone)]
pub struct ChainJoint {
    pub name: String,
    pub axis: JointAxis,
    pub origin: Vector3<f64>,
}

impl ChainJoint {
    fn new(name: &str, axis: JointAxis, origin: [f64; 3]) -> Self {
        Self {
            name: name.to_string(),
            axis,
            origin: Vector3::from(origin),
        }
    }
}

/// SO-101 arm joints (pan through wrist roll), zero pose pointing straight up.
pub fn so101_chain() -> Vec<ChainJoint> {
    vec![
        ChainJoint::new("shoulder_pan", JointAxis::Z, [0.0, 0.0, 0.0624]),
        ChainJoint::new("shoulder_lift", JointAxis::Y, [0.0, 0.0, 0.0542]),
        ChainJoint::new("elbow_flex", JointAxis::Y, [0.028, 0.0, 0.1126]),
        ChainJoint::new("wrist_flex", JointAxis::Y, [0.0, 0.0, 0.1349]),
        ChainJoint::new("wrist_roll", JointAxis::Z, [0.0, 0.0, 0.0611]),
    ]
}

/// Forward kinematics over a serial chain and damped least squares IK.
pub struct SerialChainKinematics {
    joints: Vec<ChainJoint>,
    limits: [(f64, f64); ARM_JOINTS],
    tool: Vector3<f64>,
    max_iterations: usize,
    position_tolerance: f64,
    orientation_tolerance: f64,
    damping: f64,
}

impl SerialChainKinematics {
    pub fn so101(joint_specs: &[JointSpec; DOF], config: &KinematicsConfig) -> Self {
        let mut limits = [(0.0, 0.0); ARM_JOINTS];
        for (limit, spec) in limits.iter_mut().zip(joint_specs.iter()) {
            *limit = (spec.lower, spec.upper);
        }

        Self {
            joints: so101_chain(),
            limits,
            tool: Vector3::from(config.tool_offset),
            max_iterations: config.ik_max_iterations,
            position_tolerance: config.ik_position_tolerance,
            orientation_tolerance: config.ik_orientation_tolerance,
            damping: config.ik_damping,
        }
    }

    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    fn end_effector(&self, joints: &Vector6<f64>) -> Isometry3<f64> {
        let mut current = Isometry3::identity();
        for (i, joint) in self.joints.iter().enumerate() {
            let translation = Isometry3::from_parts(
                Translation3::from(joint.origin),
                UnitQuaternion::identity(),
            );
            let rotation = Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&joint.axis.unit(), joints[i]),
            );
            current = current * translation * rotation;
        }
        current * Translation3::from(self.tool)
    }

    /// Numerical 6x5 jacobian of the end-effector pose w.r.t. the arm joints.
    fn jacobian(&self, joints: &Vector6<f64>, at: &Pose) -> SMatrix<f64, 6, ARM_JOINTS> {
        let mut j = SMatrix::<f64, 6, ARM_JOINTS>::zeros();
        for col in 0..ARM_JOINTS {
            let mut perturbed = *joints;
            perturbed[col] += JACOBIAN_STEP;
            let moved = Pose::from_isometry(&self.end_effector(&perturbed));
            let delta = at.error_to(&moved) / JACOBIAN_STEP;
            j.set_column(col, &delta);
        }
        j
    }

    fn converged(&self, error: &Vector6<f64>) -> bool {
        error.fixed_rows::<3>(0).norm() < self.position_tolerance
            && error.fixed_rows::<3>(3).norm() < self.orientation_tolerance
    }
}

impl KinematicsProvider for SerialChainKinematics {
    fn name(&self) -> &str {
        "so101-serial-chain"
    }

    fn forward(&self, joints: &Vector6<f64>) -> Result<Pose, KinematicsError> {
        Ok(Pose::from_isometry(&self.end_effector(joints)))
    }

    fn inverse(&self, seed: &Vector6<f64>, target: &Pose) -> Result<Vector6<f64>, KinematicsError> {
        let mut q = *seed;
        let damping_sq = Matrix6::identity() * (self.damping * self.damping);

        for _ in 0..self.max_iterations {
            let current = Pose::from_isometry(&self.end_effector(&q));
            let error = current.error_to(target);
            if self.converged(&error) {
                return Ok(q);
            }

            let j = self.jacobian(&q, &current);
            let inv = (j * j.transpose() + damping_sq)
                .try_inverse()
                .ok_or(KinematicsError::Singular)?;
            let dq = j.transpose() * inv * error;

            for (i, (lower, upper)) in self.limits.iter().enumerate() {
                q[i] = (q[i] + dq[i]).clamp(*lower, *upper);
            }
        }

        let error = Pose::from_isometry(&self.end_effector(&q)).error_to(target);
        if self.converged(&error) {
            return Ok(q);
        }

        Err(KinematicsError::NoConvergence {
            iterations: self.max_iterations,
            residual: error.norm(),
        })
    }
}

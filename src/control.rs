// src/control.rs
//! JSON control messages shared by every transport (WebSocket, HTTP, stdin).
//!
//! A transport decodes a text frame with [`handle_text`] and writes the
//! returned [`Reply`] back. Nothing here knows about sockets.

use crate::error::SimError;
use crate::kinematics::Pose;
use crate::landmarks::{HandLandmarkSample, Landmark};
use crate::simulation::{JointState, JointStateSimulator, RobotInfo};
use crate::DOF;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    SetJoints {
        positions: Vec<f64>,
        #[serde(default = "default_smooth")]
        smooth: bool,
    },
    HandPose {
        /// Decoded point by point in the handler; a malformed point fails the
        /// conversion, not the frame.
        #[serde(default)]
        hand_landmarks: Vec<Value>,
    },
    GetInfo,
    GetState,
    ForwardKinematics,
    InverseKinematics {
        target: Pose,
        /// Apply the solution as a smooth target when one is found.
        #[serde(default)]
        apply: bool,
    },
    Ping,
}

fn default_smooth() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    JointResponse {
        success: bool,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        joint_state: Option<JointState>,
    },
    HandPoseResponse {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        joint_angles: Option<[f64; DOF]>,
        message: String,
    },
    RobotInfo {
        data: RobotInfo,
    },
    RobotState {
        data: JointState,
    },
    Pose {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pose: Option<Pose>,
    },
    IkSolution {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        joint_angles: Option<[f64; DOF]>,
    },
    Pong,
    Error {
        message: String,
    },
}

impl ControlResponse {
    pub fn is_success(&self) -> bool {
        match self {
            ControlResponse::JointResponse { success, .. }
            | ControlResponse::HandPoseResponse { success, .. }
            | ControlResponse::Pose { success, .. }
            | ControlResponse::IkSolution { success, .. } => *success,
            ControlResponse::Error { .. } => false,
            _ => true,
        }
    }
}

/// A response stamped with local wall-clock time.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    #[serde(flatten)]
    pub response: ControlResponse,
    pub timestamp: String,
}

impl Reply {
    pub fn new(response: ControlResponse) -> Self {
        Self {
            response,
            timestamp: Local::now().to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"serialization failed: {}"}}"#, e)
        })
    }
}

pub fn handle_request(sim: &JointStateSimulator, request: ControlRequest) -> ControlResponse {
    match request {
        ControlRequest::SetJoints { positions, smooth } => match sim.set_targets(&positions, smooth) {
            Ok(()) => ControlResponse::JointResponse {
                success: true,
                message: "Joints updated".to_string(),
                joint_state: Some(sim.snapshot()),
            },
            Err(SimError::InvalidInput { expected, .. }) => ControlResponse::JointResponse {
                success: false,
                message: format!("Must provide exactly {} joint positions", expected),
                joint_state: None,
            },
            Err(e) => ControlResponse::JointResponse {
                success: false,
                message: format!("Invalid joint positions: {}", e),
                joint_state: None,
            },
        },

        ControlRequest::HandPose { hand_landmarks } => {
            let angles = decode_landmarks(&hand_landmarks)
                .and_then(|landmarks| HandLandmarkSample::from_landmarks(&landmarks))
                .and_then(|sample| sim.map_hand_landmarks_to_targets(&sample));

            match angles {
                Some(angles) => match sim.set_targets(&angles, true) {
                    Ok(()) => ControlResponse::HandPoseResponse {
                        success: true,
                        joint_angles: Some(angles),
                        message: "Hand pose converted and applied".to_string(),
                    },
                    Err(e) => ControlResponse::HandPoseResponse {
                        success: false,
                        joint_angles: None,
                        message: e.to_string(),
                    },
                },
                None => ControlResponse::HandPoseResponse {
                    success: false,
                    joint_angles: None,
                    message: "Failed to convert hand pose".to_string(),
                },
            }
        }

        ControlRequest::GetInfo => ControlResponse::RobotInfo {
            data: sim.robot_info(),
        },

        ControlRequest::GetState => ControlResponse::RobotState {
            data: sim.snapshot(),
        },

        ControlRequest::ForwardKinematics => {
            let pose = sim.forward_kinematics();
            ControlResponse::Pose {
                success: pose.is_some(),
                pose,
            }
        }

        ControlRequest::InverseKinematics { target, apply } => {
            let solution = sim.inverse_kinematics(&target);
            if let (Some(angles), true) = (solution, apply) {
                if let Err(e) = sim.set_targets(&angles, true) {
                    tracing::warn!("IK solution rejected: {}", e);
                }
            }
            ControlResponse::IkSolution {
                success: solution.is_some(),
                joint_angles: solution,
            }
        }

        ControlRequest::Ping => ControlResponse::Pong,
    }
}

fn decode_landmarks(values: &[Value]) -> Option<Vec<Landmark>> {
    values
        .iter()
        .map(|value| Landmark::deserialize(value).ok())
        .collect()
}

/// Decode one text frame and dispatch it. Malformed input becomes an `error` reply.
pub fn handle_text(sim: &JointStateSimulator, text: &str) -> Reply {
    let response = match serde_json::from_str::<ControlRequest>(text) {
        Ok(request) => handle_request(sim, request),
        Err(e) if e.is_syntax() || e.is_eof() => ControlResponse::Error {
            message: "Invalid JSON format".to_string(),
        },
        Err(e) => ControlResponse::Error {
            message: format!("Processing error: {}", e),
        },
    };
    Reply::new(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatorConfig;
    use crate::mock_hand::{MockHandGenerator, MotionType};
    use serde_json::{json, Value};

    fn simulator() -> JointStateSimulator {
        JointStateSimulator::from_config(SimulatorConfig::default()).unwrap()
    }

    fn reply_json(sim: &JointStateSimulator, text: &str) -> Value {
        serde_json::from_str(&handle_text(sim, text).to_json()).unwrap()
    }

    #[test]
    fn set_joints_defaults_to_smooth() {
        let sim = simulator();
        let reply = reply_json(&sim, r#"{"type":"set_joints","positions":[0.1,0.2,0.3,0.4,0.5,0.6]}"#);
        assert_eq!(reply["type"], "joint_response");
        assert_eq!(reply["success"], true);
        assert!(reply["timestamp"].is_string());

        let state = sim.snapshot();
        assert_eq!(state.targets, [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(state.positions, [0.0; DOF]);
    }

    #[test]
    fn set_joints_without_smoothing_jumps() {
        let sim = simulator();
        let reply = reply_json(
            &sim,
            r#"{"type":"set_joints","positions":[0.1,0.2,0.3,0.4,0.5,0.6],"smooth":false}"#,
        );
        assert_eq!(reply["joint_state"]["positions"], json!([0.1, 0.2, 0.3, 0.4, 0.5, 0.6]));
    }

    #[test]
    fn wrong_length_reports_failure() {
        let sim = simulator();
        let reply = reply_json(&sim, r#"{"type":"set_joints","positions":[0.1,0.2]}"#);
        assert_eq!(reply["success"], false);
        assert_eq!(reply["message"], "Must provide exactly 6 joint positions");
        assert!(reply.get("joint_state").is_none());
    }

    #[test]
    fn hand_pose_is_mapped_and_applied() {
        let sim = simulator();
        let hand = MockHandGenerator::new().sample(MotionType::Static, 0.0);
        let request = json!({ "type": "hand_pose", "hand_landmarks": hand.to_landmarks() });

        let reply = reply_json(&sim, &request.to_string());
        assert_eq!(reply["type"], "hand_pose_response");
        assert_eq!(reply["success"], true);

        let expected = sim.map_hand_landmarks_to_targets(&hand).unwrap();
        let targets = sim.snapshot().targets;
        for i in 0..DOF {
            assert!((targets[i] - expected[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn hand_pose_without_hand_is_not_an_error() {
        let sim = simulator();
        let reply = reply_json(&sim, r#"{"type":"hand_pose","hand_landmarks":[{"x":0.5,"y":0.5}]}"#);
        assert_eq!(reply["type"], "hand_pose_response");
        assert_eq!(reply["success"], false);
        assert_eq!(reply["message"], "Failed to convert hand pose");
        assert_eq!(sim.snapshot().targets, [0.0; DOF]);
    }

    #[test]
    fn malformed_landmark_fails_conversion() {
        let sim = simulator();
        let mut landmarks: Vec<Value> = MockHandGenerator::new()
            .sample(MotionType::Static, 0.0)
            .to_landmarks()
            .iter()
            .map(|lm| serde_json::to_value(lm).unwrap())
            .collect();
        landmarks[3] = json!({ "y": 0.4, "z": 0.1 });

        let request = json!({ "type": "hand_pose", "hand_landmarks": landmarks });
        let reply = reply_json(&sim, &request.to_string());
        assert_eq!(reply["type"], "hand_pose_response");
        assert_eq!(reply["success"], false);
        assert_eq!(reply["message"], "Failed to convert hand pose");

        let reply = reply_json(&sim, r#"{"type":"hand_pose"}"#);
        assert_eq!(reply["type"], "hand_pose_response");
        assert_eq!(reply["success"], false);
        assert_eq!(sim.snapshot().targets, [0.0; DOF]);
    }

    #[test]
    fn inverse_kinematics_at_current_pose() {
        let sim = simulator();
        let joints = [0.3, 0.5, -0.6, 0.4, 0.2, 0.0];
        sim.set_targets(&joints, false).unwrap();

        let fk = reply_json(&sim, r#"{"type":"forward_kinematics"}"#);
        let request = json!({ "type": "inverse_kinematics", "target": fk["pose"] });
        let ik = reply_json(&sim, &request.to_string());
        assert_eq!(ik["success"], true, "reply = {}", ik);

        let returned: Vec<f64> = serde_json::from_value(ik["joint_angles"].clone()).unwrap();
        for i in 0..DOF {
            assert!((returned[i] - joints[i]).abs() < 1e-6);
        }
        // not applied without the flag
        assert_eq!(sim.snapshot().targets, joints);
    }

    #[test]
    fn info_state_and_ping() {
        let sim = simulator();
        assert_eq!(reply_json(&sim, r#"{"type":"get_info"}"#)["data"]["dof"], 6);
        assert_eq!(reply_json(&sim, r#"{"type":"get_state"}"#)["data"]["tick"], 0);
        assert_eq!(reply_json(&sim, r#"{"type":"ping"}"#)["type"], "pong");
    }

    #[test]
    fn forward_then_inverse_kinematics() {
        let sim = simulator();
        sim.set_targets(&[0.3, 0.5, -0.6, 0.4, 0.2, 0.0], false).unwrap();

        let fk = reply_json(&sim, r#"{"type":"forward_kinematics"}"#);
        assert_eq!(fk["type"], "pose");
        assert_eq!(fk["success"], true);

        sim.set_targets(&[0.4, 0.6, -0.5, 0.5, 0.3, 0.0], false).unwrap();
        let request = json!({ "type": "inverse_kinematics", "target": fk["pose"], "apply": true });
        let ik = reply_json(&sim, &request.to_string());
        assert_eq!(ik["type"], "ik_solution");
        assert_eq!(ik["success"], true);

        let applied = sim.snapshot().targets;
        let returned: Vec<f64> = serde_json::from_value(ik["joint_angles"].clone()).unwrap();
        assert_eq!(returned.len(), DOF);
        for i in 0..DOF {
            assert!((applied[i] - returned[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn malformed_input_yields_error_reply() {
        let sim = simulator();
        let reply = reply_json(&sim, "{not json");
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["message"], "Invalid JSON format");

        let reply = reply_json(&sim, r#"{"type":"launch_rockets"}"#);
        assert_eq!(reply["type"], "error");
        assert!(!handle_text(&sim, r#"{"type":"launch_rockets"}"#).response.is_success());
    }
}

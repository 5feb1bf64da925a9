// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("expected {expected} joint values, got {got}")]
    InvalidInput { expected: usize, got: usize },

    #[error("joint value {index} is not a finite number")]
    NonFinite { index: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KinematicsError {
    #[error("kinematics provider unavailable")]
    Unavailable,

    #[error("IK did not converge after {iterations} iterations (residual {residual:.6})")]
    NoConvergence { iterations: usize, residual: f64 },

    #[error("jacobian is singular")]
    Singular,
}

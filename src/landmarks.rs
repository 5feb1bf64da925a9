// src/landmarks.rs
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

// MediaPipe hand landmark indices
pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_TIP: usize = 12;

pub const HAND_LANDMARK_COUNT: usize = 21;

/// Depth assumed for a landmark reported without `z`.
pub const DEFAULT_DEPTH: f64 = 0.5;

/// One landmark as a hand-pose estimator reports it, in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    pub fn to_point(self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z.unwrap_or(DEFAULT_DEPTH))
    }
}

/// A single detected hand. Holds exactly 21 points; anything shorter is rejected at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarkSample {
    points: Vec<Point3<f64>>,
}

impl HandLandmarkSample {
    /// Returns `None` when fewer than 21 points are given. Extra points are dropped.
    pub fn from_points(points: &[Point3<f64>]) -> Option<Self> {
        if points.len() < HAND_LANDMARK_COUNT {
            return None;
        }
        Some(Self {
            points: points[..HAND_LANDMARK_COUNT].to_vec(),
        })
    }

    /// Caller guarantees the 21-point layout.
    pub(crate) fn from_full_hand(points: Vec<Point3<f64>>) -> Self {
        debug_assert_eq!(points.len(), HAND_LANDMARK_COUNT);
        Self { points }
    }

    pub fn from_landmarks(landmarks: &[Landmark]) -> Option<Self> {
        let points: Vec<Point3<f64>> = landmarks.iter().map(|lm| lm.to_point()).collect();
        Self::from_points(&points)
    }

    pub fn from_arrays(landmarks: &[[f64; 3]]) -> Option<Self> {
        let points: Vec<Point3<f64>> = landmarks
            .iter()
            .map(|lm| Point3::new(lm[0], lm[1], lm[2]))
            .collect();
        Self::from_points(&points)
    }

    /// `None` past the last of the 21 landmarks.
    pub fn point(&self, index: usize) -> Option<Point3<f64>> {
        self.points.get(index).copied()
    }

    pub fn wrist(&self) -> Point3<f64> {
        self.points[WRIST]
    }

    pub fn thumb_tip(&self) -> Point3<f64> {
        self.points[THUMB_TIP]
    }

    pub fn index_tip(&self) -> Point3<f64> {
        self.points[INDEX_TIP]
    }

    pub fn middle_tip(&self) -> Point3<f64> {
        self.points[MIDDLE_TIP]
    }

    /// Thumb-to-index distance in the image plane (depth ignored).
    pub fn pinch_span(&self) -> f64 {
        let thumb = self.thumb_tip();
        let index = self.index_tip();
        ((thumb.x - index.x).powi(2) + (thumb.y - index.y).powi(2)).sqrt()
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn to_landmarks(&self) -> Vec<Landmark> {
        self.points
            .iter()
            .map(|p| Landmark::new(p.x, p.y, p.z))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_hand() -> Vec<[f64; 3]> {
        (0..HAND_LANDMARK_COUNT)
            .map(|i| [i as f64 * 0.01, 0.5, 0.0])
            .collect()
    }

    #[test]
    fn short_sample_is_rejected() {
        let mut lms = flat_hand();
        lms.truncate(20);
        assert!(HandLandmarkSample::from_arrays(&lms).is_none());
        assert!(HandLandmarkSample::from_arrays(&[]).is_none());
    }

    #[test]
    fn extra_points_are_dropped() {
        let mut lms = flat_hand();
        lms.push([9.0, 9.0, 9.0]);
        let sample = HandLandmarkSample::from_arrays(&lms).unwrap();
        assert_eq!(sample.points().len(), HAND_LANDMARK_COUNT);
    }

    #[test]
    fn missing_depth_defaults() {
        let json = r#"{ "x": 0.25, "y": 0.75 }"#;
        let lm: Landmark = serde_json::from_str(json).unwrap();
        assert_eq!(lm.z, None);
        assert_eq!(lm.to_point().z, DEFAULT_DEPTH);
    }

    #[test]
    fn pinch_span_ignores_depth() {
        let mut lms = flat_hand();
        lms[THUMB_TIP] = [0.0, 0.0, 0.0];
        lms[INDEX_TIP] = [0.3, 0.4, 5.0];
        let sample = HandLandmarkSample::from_arrays(&lms).unwrap();
        assert!((sample.pinch_span() - 0.5).abs() < 1e-12);
    }
}

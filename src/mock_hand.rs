// src/mock_hand.rs - Synthetic hand tracking for running without a camera
use crate::landmarks::{HandLandmarkSample, HAND_LANDMARK_COUNT, WRIST};

use nalgebra::Point3;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionType {
    Static,
    Wave,
    Point,
    Grab,
}

impl FromStr for MotionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(MotionType::Static),
            "wave" => Ok(MotionType::Wave),
            "point" => Ok(MotionType::Point),
            "grab" => Ok(MotionType::Grab),
            other => Err(format!("unknown motion type '{}'", other)),
        }
    }
}

impl fmt::Display for MotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotionType::Static => "static",
            MotionType::Wave => "wave",
            MotionType::Point => "point",
            MotionType::Grab => "grab",
        };
        f.write_str(name)
    }
}

pub struct MockHandGenerator {
    base: Vec<Point3<f64>>,
    speed: f64,
}

impl Default for MockHandGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandGenerator {
    pub fn new() -> Self {
        Self {
            base: base_hand(),
            speed: 1.0,
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Clamped to [0.1, 5.0]. A non-finite speed leaves the current one in place.
    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() {
            self.speed = speed.clamp(0.1, 5.0);
        }
    }

    pub fn base_landmarks(&self) -> &[Point3<f64>] {
        &self.base
    }

    /// Hand pose at `elapsed` seconds into the animation.
    pub fn sample(&self, motion: MotionType, elapsed: f64) -> HandLandmarkSample {
        let t = elapsed * self.speed;
        let points = match motion {
            MotionType::Static => self.base.clone(),
            MotionType::Wave => self.wave(t),
            MotionType::Point => self.point(t),
            MotionType::Grab => self.grab(t),
        };
        HandLandmarkSample::from_full_hand(points)
    }

    fn wave(&self, t: f64) -> Vec<Point3<f64>> {
        let wrist_x = 0.5 + 0.1 * (t * 2.0).sin();
        let wrist_y = 0.5 + 0.05 * (t * 1.5).cos();

        self.base
            .iter()
            .enumerate()
            .map(|(i, base)| {
                if i == WRIST {
                    return Point3::new(wrist_x, wrist_y, 0.02 * (t * 3.0).sin());
                }
                let mut p = Point3::new(base.x + (wrist_x - 0.5), base.y + (wrist_y - 0.5), base.z);

                let finger = ((i - 1) / 4) as f64;
                let segment = ((i - 1) % 4) as f64;
                let curl = 0.5 + 0.3 * (t * 2.0 + finger * 0.5).sin();
                if segment > 0.0 {
                    let amount = segment * 0.02 * curl;
                    p.y += amount;
                    p.z += amount * 0.5;
                }
                p
            })
            .collect()
    }

    fn point(&self, t: f64) -> Vec<Point3<f64>> {
        let angle = t.sin() * PI / 4.0;

        self.base
            .iter()
            .enumerate()
            .map(|(i, base)| match i {
                WRIST => Point3::new(0.5 + 0.05 * angle.sin(), 0.5, 0.0),
                5..=8 => {
                    let segment = (i - 5) as f64;
                    let extension = 1.0 + segment * 0.1;
                    Point3::new(
                        base.x + 0.05 * angle.sin() * extension,
                        base.y - 0.05 * segment,
                        base.z,
                    )
                }
                i if i >= 9 => {
                    let segment = ((i - 9) % 4) as f64;
                    let curl = segment * 0.03 * 0.8;
                    Point3::new(base.x, base.y + curl, base.z + curl * 0.3)
                }
                _ => *base,
            })
            .collect()
    }

    fn grab(&self, t: f64) -> Vec<Point3<f64>> {
        let strength = 0.5 + 0.5 * (t * 3.0).sin();
        let (center_x, center_y) = (0.5, 0.45);

        self.base
            .iter()
            .enumerate()
            .map(|(i, base)| {
                if i == WRIST {
                    return Point3::new(base.x, 0.5 + 0.02 * strength, base.z);
                }
                let segment = ((i - 1) % 4) as f64;
                if segment == 0.0 {
                    return *base;
                }
                let amount = segment * 0.04 * strength;
                let dx = base.x - center_x;
                let dy = base.y - center_y;
                Point3::new(
                    base.x - dx * amount,
                    base.y - dy * amount * 0.5,
                    base.z + amount * 0.2,
                )
            })
            .collect()
    }
}

/// Neutral open hand, MediaPipe ordering.
fn base_hand() -> Vec<Point3<f64>> {
    let points = vec![
        Point3::new(0.5, 0.5, 0.0),
        // thumb
        Point3::new(0.45, 0.45, 0.02),
        Point3::new(0.42, 0.42, 0.04),
        Point3::new(0.40, 0.40, 0.06),
        Point3::new(0.38, 0.38, 0.08),
        // index
        Point3::new(0.48, 0.35, 0.02),
        Point3::new(0.48, 0.30, 0.04),
        Point3::new(0.48, 0.25, 0.06),
        Point3::new(0.48, 0.20, 0.08),
        // middle
        Point3::new(0.50, 0.35, 0.02),
        Point3::new(0.50, 0.28, 0.04),
        Point3::new(0.50, 0.22, 0.06),
        Point3::new(0.50, 0.16, 0.08),
        // ring
        Point3::new(0.52, 0.35, 0.02),
        Point3::new(0.52, 0.29, 0.04),
        Point3::new(0.52, 0.24, 0.06),
        Point3::new(0.52, 0.19, 0.08),
        // pinky
        Point3::new(0.54, 0.37, 0.02),
        Point3::new(0.54, 0.32, 0.04),
        Point3::new(0.54, 0.28, 0.06),
        Point3::new(0.54, 0.25, 0.08),
    ];
    debug_assert_eq!(points.len(), HAND_LANDMARK_COUNT);
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{INDEX_TIP, THUMB_TIP};

    #[test]
    fn every_motion_has_full_hand() {
        let gen = MockHandGenerator::new();
        for motion in [MotionType::Static, MotionType::Wave, MotionType::Point, MotionType::Grab] {
            for step in 0..20 {
                let sample = gen.sample(motion, step as f64 * 0.1);
                assert_eq!(sample.points().len(), HAND_LANDMARK_COUNT);
                assert!(sample.points().iter().all(|p| p.x.is_finite() && p.y.is_finite() && p.z.is_finite()));
            }
        }
    }

    #[test]
    fn static_hand_is_time_invariant() {
        let gen = MockHandGenerator::new();
        let a = gen.sample(MotionType::Static, 0.0);
        let b = gen.sample(MotionType::Static, 42.0);
        assert_eq!(a, b);
        assert_eq!(a.thumb_tip(), Point3::new(0.38, 0.38, 0.08));
        assert_eq!(a.point(INDEX_TIP), Some(Point3::new(0.48, 0.20, 0.08)));
        assert_eq!(a.point(THUMB_TIP), Some(a.thumb_tip()));
        assert_eq!(a.point(HAND_LANDMARK_COUNT), None);
    }

    #[test]
    fn wave_moves_the_wrist() {
        let gen = MockHandGenerator::new();
        let a = gen.sample(MotionType::Wave, 0.0).wrist();
        let b = gen.sample(MotionType::Wave, 0.7).wrist();
        assert!((a.x - b.x).abs() > 1e-3);
    }

    #[test]
    fn speed_is_clamped() {
        let mut gen = MockHandGenerator::new();
        gen.set_speed(100.0);
        assert_eq!(gen.speed(), 5.0);
        gen.set_speed(0.0);
        assert_eq!(gen.speed(), 0.1);
        gen.set_speed(f64::NAN);
        assert_eq!(gen.speed(), 0.1);
        assert!(gen.sample(MotionType::Wave, 1.0).wrist().x.is_finite());
    }

    #[test]
    fn motion_type_parses() {
        assert_eq!("Wave".parse::<MotionType>(), Ok(MotionType::Wave));
        assert_eq!("grab".parse::<MotionType>(), Ok(MotionType::Grab));
        assert!("jazz-hands".parse::<MotionType>().is_err());
        assert_eq!(MotionType::Point.to_string(), "point");
    }
}

// src/data.rs
use crate::error::SimError;
use crate::simulation::JointState;
use crate::DOF;

use chrono::Local;
use csv::Writer;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct JointSummary {
    pub name: String,
    pub peak_velocity: f64,
    pub final_error: f64,
}

pub struct TrajectoryRecorder {
    output_dir: PathBuf,
    session_name: String,
    samples: Vec<JointState>,
}

impl TrajectoryRecorder {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            samples: Vec::new(),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn add_sample(&mut self, state: JointState) {
        self.samples.push(state);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn export_csv(&self) -> Result<PathBuf, SimError> {
        let csv_path = self.session_dir().join("trajectory.csv");
        std::fs::create_dir_all(self.session_dir())?;

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);

        let names: Vec<String> = match self.samples.first() {
            Some(first) => first.joint_names.clone(),
            None => (0..DOF).map(|i| format!("joint_{}", i)).collect(),
        };

        let mut header = vec!["sim_time".to_string(), "tick".to_string()];
        for suffix in ["pos", "target", "vel"] {
            header.extend(names.iter().map(|n| format!("{}_{}", n, suffix)));
        }
        writer.write_record(&header)?;

        for sample in &self.samples {
            let mut row = Vec::with_capacity(2 + 3 * DOF);
            row.push(format!("{:.6}", sample.sim_time));
            row.push(sample.tick.to_string());
            for values in [&sample.positions, &sample.targets, &sample.velocities] {
                row.extend(values.iter().map(|v| format!("{:.6}", v)));
            }
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(csv_path)
    }

    pub fn joint_summaries(&self) -> Vec<JointSummary> {
        let Some(last) = self.samples.last() else {
            return Vec::new();
        };

        (0..DOF)
            .map(|i| JointSummary {
                name: last.joint_names.get(i).cloned().unwrap_or_default(),
                peak_velocity: self
                    .samples
                    .iter()
                    .map(|s| s.velocities[i].abs())
                    .fold(0.0, f64::max),
                final_error: (last.targets[i] - last.positions[i]).abs(),
            })
            .collect()
    }

    pub fn generate_report(&self) -> Result<PathBuf, SimError> {
        let report_path = self.session_dir().join("report.html");
        std::fs::create_dir_all(self.session_dir())?;

        std::fs::write(&report_path, self.create_html_report())?;
        Ok(report_path)
    }

    fn create_html_report(&self) -> String {
        let duration = match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.sim_time - first.sim_time,
            _ => 0.0,
        };

        let rows: String = self
            .joint_summaries()
            .iter()
            .map(|j| {
                format!(
                    "        <tr><td>{}</td><td>{:.3}</td><td>{:.5}</td></tr>\n",
                    j.name, j.peak_velocity, j.final_error
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <title>Joint Trajectory Report - {session}</title>
    <style>
        body {{ font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 40px; background: #f5f5f5; }}
        table {{ background: white; border-collapse: collapse; }}
        td, th {{ padding: 6px 14px; border-bottom: 1px solid #ddd; }}
    </style>
</head>
<body>
    <h1>Joint Trajectory Report</h1>
    <h2>Session: {session}</h2>
    <p>Samples: {samples}</p>
    <p>Simulated duration: {duration:.2} s</p>
    <table>
        <tr><th>Joint</th><th>Peak |velocity| (rad/s)</th><th>Final error (rad)</th></tr>
{rows}    </table>
</body>
</html>
"#,
            session = self.session_name,
            samples = self.samples.len(),
            duration = duration,
            rows = rows,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatorConfig;
    use crate::simulation::JointStateSimulator;

    fn temp_output() -> PathBuf {
        std::env::temp_dir().join(format!("so101_sim_{}", uuid::Uuid::new_v4()))
    }

    fn recorded_run(recorder: &mut TrajectoryRecorder, ticks: usize) {
        let sim = JointStateSimulator::from_config(SimulatorConfig::default()).unwrap();
        sim.set_targets(&[0.5, -0.5, 0.2, 0.0, 1.0, 0.8], true).unwrap();
        for _ in 0..ticks {
            sim.advance(1.0 / 60.0);
            recorder.add_sample(sim.snapshot());
        }
    }

    #[test]
    fn default_session_name_is_timestamped() {
        let recorder = TrajectoryRecorder::new("/tmp", None);
        assert!(recorder.session_name().starts_with("session_"));
        assert!(recorder.is_empty());
    }

    #[test]
    fn csv_has_header_and_one_row_per_sample() {
        let out = temp_output();
        let mut recorder = TrajectoryRecorder::new(&out, Some("run".to_string()));
        recorded_run(&mut recorder, 12);

        let path = recorder.export_csv().unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 2 + 3 * DOF);
        assert_eq!(&headers[2], "shoulder_pan_pos");
        assert_eq!(&headers[2 + DOF], "shoulder_pan_target");
        assert_eq!(&headers[2 + 2 * DOF + 5], "gripper_vel");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 12);
        assert_eq!(&rows[11][1], "12");

        std::fs::remove_dir_all(&out).unwrap();
    }

    #[test]
    fn summaries_track_peak_velocity() {
        let mut recorder = TrajectoryRecorder::new(temp_output(), None);
        recorded_run(&mut recorder, 5);

        let summaries = recorder.joint_summaries();
        assert_eq!(summaries.len(), DOF);
        assert_eq!(summaries[4].name, "wrist_roll");
        // first tick has the largest gap to the target
        assert!((summaries[4].peak_velocity - 60.0).abs() < 1e-9);
        assert!(summaries[4].final_error > 0.0);
        assert_eq!(summaries[3].peak_velocity, 0.0);
    }

    #[test]
    fn report_is_written() {
        let out = temp_output();
        let mut recorder = TrajectoryRecorder::new(&out, Some("report".to_string()));
        recorded_run(&mut recorder, 3);

        let path = recorder.generate_report().unwrap();
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("Session: report"));
        assert!(html.contains("<td>elbow_flex</td>"));

        std::fs::remove_dir_all(&out).unwrap();
    }
}

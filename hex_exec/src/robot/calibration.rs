//! # Servo calibration data
//!
//! Calibrated pulse ranges are stored as JSON keyed by leg (`leg_0` .. `leg_5`) then joint name.
//! Loading never leaves a joint half-configured: an entry outside the controller's pulse range is
//! skipped with a warning, and a missing or unreadable file leaves every joint as it was.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::hexapod::Hexapod;
use super::joint::{Joint, SERVO_INPUT_MAX, SERVO_INPUT_MIN, SERVO_UNIT_MULTIPLIER};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Calibration of every leg, keyed by `leg_<index>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationData(pub BTreeMap<String, LegCalibration>);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegCalibration {
    #[serde(default)]
    pub coxa: Option<ServoRange>,
    #[serde(default)]
    pub femur: Option<ServoRange>,
    #[serde(default)]
    pub tibia: Option<ServoRange>,
}

/// Pulse widths at a joint's minimum and maximum angles.
///
/// Units: quarter-microseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServoRange {
    pub servo_min: u16,
    pub servo_max: u16,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("Cannot access the calibration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse the calibration file: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ServoRange {
    /// The full pulse range the controller accepts.
    pub fn default_range() -> Self {
        Self {
            servo_min: SERVO_INPUT_MIN * SERVO_UNIT_MULTIPLIER,
            servo_max: SERVO_INPUT_MAX * SERVO_UNIT_MULTIPLIER,
        }
    }

    pub fn is_valid(&self) -> bool {
        let range = Self::default_range();
        let in_range = |v: u16| (range.servo_min..=range.servo_max).contains(&v);

        in_range(self.servo_min) && in_range(self.servo_max) && self.servo_min < self.servo_max
    }
}

impl CalibrationData {
    /// Read calibration data from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Write calibration data to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        info!("Calibration saved to {:?}", path.as_ref());
        Ok(())
    }

    /// Capture the current calibration of every joint.
    pub fn from_hexapod(hexapod: &Hexapod) -> Self {
        let range = |j: &Joint| {
            let (servo_min, servo_max) = j.calibration();
            Some(ServoRange {
                servo_min,
                servo_max,
            })
        };

        Self(
            hexapod
                .legs()
                .iter()
                .enumerate()
                .map(|(i, leg)| {
                    (
                        leg_key(i),
                        LegCalibration {
                            coxa: range(&leg.coxa),
                            femur: range(&leg.femur),
                            tibia: range(&leg.tibia),
                        },
                    )
                })
                .collect(),
        )
    }

    /// Apply the calibration to the hexapod's joints.
    ///
    /// Joints with no entry or an invalid entry keep their configured range.
    /// Returns the number of joints updated with valid calibration values.
    pub fn apply(&self, hexapod: &mut Hexapod) -> usize {
        let mut num_applied = 0;

        for (i, leg) in hexapod.legs_mut().iter_mut().enumerate() {
            let cal = match self.0.get(&leg_key(i)) {
                Some(c) => c,
                None => continue,
            };

            let joints = [
                ("coxa", &mut leg.coxa, cal.coxa),
                ("femur", &mut leg.femur, cal.femur),
                ("tibia", &mut leg.tibia, cal.tibia),
            ];

            for (name, joint, range) in joints {
                let range = match range {
                    Some(r) => r,
                    None => continue,
                };

                if range.is_valid() {
                    joint.update_calibration(range.servo_min, range.servo_max);
                    debug!(
                        "Loaded calibration for leg {} {}: {:?}",
                        i, name, range
                    );
                    num_applied += 1;
                } else {
                    warn!(
                        "Calibration for leg {} {} is invalid ({:?}), keeping {:?}",
                        i,
                        name,
                        range,
                        joint.calibration()
                    );
                }
            }
        }

        num_applied
    }
}

/// Load calibration from `path` and apply it, keeping the current values on any error.
pub fn load_and_apply<P: AsRef<Path>>(hexapod: &mut Hexapod, path: P) -> usize {
    match CalibrationData::load(path.as_ref()) {
        Ok(data) => {
            let n = data.apply(hexapod);
            info!("Applied calibration to {} joints from {:?}", n, path.as_ref());
            n
        }
        Err(e) => {
            warn!(
                "Calibration from {:?} not loaded, using defaults: {}",
                path.as_ref(),
                e
            );
            0
        }
    }
}

fn leg_key(index: usize) -> String {
    format!("leg_{}", index)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::robot::test_util::test_hexapod;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_parse_and_apply() -> TestResult {
        let (mut hexapod, _sim) = test_hexapod()?;
        hexapod.legs_mut()[0].femur.update_calibration(4400, 7600);

        let data: CalibrationData = serde_json::from_str(
            r#"{
                "leg_0": {
                    "coxa": { "servo_min": 4100, "servo_max": 7900 },
                    "femur": { "servo_min": 100, "servo_max": 7900 }
                },
                "leg_3": {
                    "tibia": { "servo_min": 5000, "servo_max": 4500 }
                }
            }"#,
        )?;

        assert_eq!(data.apply(&mut hexapod), 1);

        let legs = hexapod.legs();
        assert_eq!(legs[0].coxa.calibration(), (4100, 7900));
        // Out of range and inverted entries leave the configured range alone
        assert_eq!(legs[0].femur.calibration(), (4400, 7600));
        assert_eq!(legs[3].tibia.calibration(), (3968, 8000));

        Ok(())
    }

    #[test]
    fn test_save_and_load() -> TestResult {
        let (mut hexapod, _sim) = test_hexapod()?;
        hexapod.legs_mut()[2].femur.update_calibration(4200, 7800);

        let path = std::env::temp_dir().join(format!(
            "hexapod_calibration_test_{}.json",
            std::process::id()
        ));

        CalibrationData::from_hexapod(&hexapod).save(&path)?;
        let loaded = CalibrationData::load(&path)?;
        std::fs::remove_file(&path)?;

        assert_eq!(loaded, CalibrationData::from_hexapod(&hexapod));
        assert_eq!(
            loaded.0["leg_2"].femur,
            Some(ServoRange {
                servo_min: 4200,
                servo_max: 7800
            })
        );

        Ok(())
    }

    #[test]
    fn test_missing_file_keeps_defaults() -> TestResult {
        let (mut hexapod, _sim) = test_hexapod()?;

        assert_eq!(load_and_apply(&mut hexapod, "/no/such/calibration.json"), 0);
        assert_eq!(hexapod.legs()[0].coxa.calibration(), (3968, 8000));

        Ok(())
    }
}

//! # Hexapod
//!
//! The robot aggregate: six legs sharing one servo controller, plus the last commanded foot
//! positions which the gaits plan from.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use util::maths::{clamp, lin_map};
use util::time::seconds_to_std;

use super::leg::{JointAngles, Leg, LegError};
use super::params::HexapodParams;
use super::{LegPositionSource, LegPositions, NUM_LEGS};
use crate::geometry::Vector3D;
use crate::servo_ctrl::{ServoDriver, ServoError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The robot.
pub struct Hexapod {
    legs: Vec<Leg>,
    driver: Box<dyn ServoDriver>,

    current_leg_positions: LegPositions,
    current_leg_angles: [JointAngles; NUM_LEGS],

    predefined_positions: HashMap<PredefinedPosition, LegPositions>,

    speed_pct: u8,
    accel_pct: u8,

    /// Profile last sent to every channel as `(speed, accel)`, `None` before the first move.
    sent_profile: Option<(u16, u16)>,

    num_channels: u8,
    hexagon_side_length_mm: f64,

    motion_start_timeout: Duration,
    motion_poll_period: Duration,
    motion_timeout: Duration,
}

/// Handle to a hexapod shared between the foreground and a gait generator.
///
/// While a gait is active the generator is the only writer: [`SharedHexapod::lock`] rejects
/// direct access until the gait stops.
#[derive(Clone)]
pub struct SharedHexapod {
    inner: Arc<Mutex<Hexapod>>,
    gait_active: Arc<AtomicBool>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Stances every leg can be sent to at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredefinedPosition {
    Zero,
    LowProfile,
    HighProfile,
}

#[derive(Debug, thiserror::Error)]
pub enum HexapodError {
    #[error("Invalid hexapod configuration: {0}")]
    InvalidConfig(String),

    #[error("Leg index {0} is out of range")]
    InvalidLegIndex(usize),

    #[error("Leg {leg}: {source}")]
    LegError { leg: usize, source: LegError },

    #[error("Servo controller error: {0}")]
    ServoError(#[from] ServoError),

    #[error("Motion did not complete within {0:?}")]
    MotionTimeout(Duration),

    #[error("A gait is running, stop it before moving the legs directly")]
    GaitActive,

    #[error("Unknown predefined position \"{0}\"")]
    UnknownPosition(String),

    #[error("Hexapod lock is poisoned")]
    PoisonError,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Hexapod {
    /// Build the robot from its parameters and a servo driver.
    ///
    /// No commands are sent until the first move.
    pub fn new(params: &HexapodParams, driver: Box<dyn ServoDriver>) -> Result<Self, HexapodError> {
        if params.legs.len() != NUM_LEGS {
            return Err(HexapodError::InvalidConfig(format!(
                "expected {} legs, found {}",
                NUM_LEGS,
                params.legs.len()
            )));
        }

        // Every joint needs its own channel on the board
        let mut channels = BTreeSet::new();
        for leg in params.legs.iter() {
            for &channel in leg.channels.iter() {
                if channel >= params.controller.num_channels {
                    return Err(HexapodError::InvalidConfig(format!(
                        "channel {} exceeds the controller's {} channels",
                        channel, params.controller.num_channels
                    )));
                }
                if !channels.insert(channel) {
                    return Err(HexapodError::InvalidConfig(format!(
                        "channel {} is used by more than one joint",
                        channel
                    )));
                }
            }
        }

        let legs: Vec<Leg> = params
            .legs
            .iter()
            .map(|l| {
                Leg::new(
                    l,
                    &params.coxa,
                    &params.femur,
                    &params.tibia,
                    params.coxa_z_offset_mm,
                )
            })
            .collect();

        let to_positions = |p: &[[f64; 3]; NUM_LEGS]| {
            let mut positions = [Vector3D::zeros(); NUM_LEGS];
            for (dst, [x, y, z]) in positions.iter_mut().zip(p.iter()) {
                *dst = Vector3D::new(*x, *y, *z);
            }
            positions
        };

        let mut predefined_positions = HashMap::new();
        predefined_positions.insert(
            PredefinedPosition::Zero,
            to_positions(&params.predefined_positions.zero),
        );
        predefined_positions.insert(
            PredefinedPosition::LowProfile,
            to_positions(&params.predefined_positions.low_profile),
        );
        predefined_positions.insert(
            PredefinedPosition::HighProfile,
            to_positions(&params.predefined_positions.high_profile),
        );

        let mut hexapod = Self {
            legs,
            driver,
            current_leg_positions: [Vector3D::zeros(); NUM_LEGS],
            current_leg_angles: [JointAngles::default(); NUM_LEGS],
            predefined_positions,
            speed_pct: 0,
            accel_pct: 0,
            sent_profile: None,
            num_channels: params.controller.num_channels,
            hexagon_side_length_mm: params.hexagon_side_length_mm,
            motion_start_timeout: seconds_to_std(params.motion_start_timeout_s),
            motion_poll_period: seconds_to_std(params.motion_poll_period_s),
            motion_timeout: seconds_to_std(params.motion_timeout_s),
        };
        hexapod.set_speed(params.speed_pct);
        hexapod.set_accel(params.accel_pct);

        // Angles matching the zero stance, so the angle state is consistent before any move
        for i in 0..NUM_LEGS {
            hexapod.current_leg_angles[i] = hexapod.legs[i]
                .solve(&Vector3D::zeros())
                .map_err(|source| HexapodError::LegError { leg: i, source })?;
        }

        Ok(hexapod)
    }

    /// Last commanded foot position of every leg.
    pub fn current_leg_positions(&self) -> &LegPositions {
        &self.current_leg_positions
    }

    /// Joint angles of every leg at the last commanded positions.
    pub fn current_leg_angles(&self) -> &[JointAngles; NUM_LEGS] {
        &self.current_leg_angles
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn legs_mut(&mut self) -> &mut [Leg] {
        &mut self.legs
    }

    /// Radius from the body centre to a foot with the femur level.
    ///
    /// Units: millimeters
    pub fn end_effector_radius(&self) -> f64 {
        match self.legs.first() {
            Some(leg) => {
                self.hexagon_side_length_mm + leg.coxa.length_mm() + leg.femur.length_mm()
            }
            None => self.hexagon_side_length_mm,
        }
    }

    /// Set the default speed of every servo as a percentage, 0 for unlimited.
    pub fn set_speed(&mut self, speed_pct: u8) {
        self.speed_pct = speed_pct.min(100);
    }

    /// Set the default acceleration of every servo as a percentage, 0 for unlimited.
    pub fn set_accel(&mut self, accel_pct: u8) {
        self.accel_pct = accel_pct.min(100);
    }

    /// Move a single leg to `(x, y, z)` in its local frame.
    ///
    /// `speed` and `accel` are percentages overriding the defaults for this move.
    pub fn move_leg(
        &mut self,
        leg_index: usize,
        x: f64,
        y: f64,
        z: f64,
        speed: Option<u8>,
        accel: Option<u8>,
    ) -> Result<(), HexapodError> {
        let (speed, accel) = self.motion_profile(speed, accel);

        let leg = self
            .legs
            .get_mut(leg_index)
            .ok_or(HexapodError::InvalidLegIndex(leg_index))?;
        leg.set_motion_profile(speed, accel);

        let target = Vector3D::new(x, y, z);
        let angles = leg
            .move_to(self.driver.as_mut(), &target, true)
            .map_err(|source| HexapodError::LegError {
                leg: leg_index,
                source,
            })?;

        // The joints were sent this leg's own profile
        if self.sent_profile != Some((speed, accel)) {
            self.sent_profile = None;
        }

        self.current_leg_positions[leg_index] = target;
        self.current_leg_angles[leg_index] = angles;

        debug!("Leg {} moved to ({:.1}, {:.1}, {:.1})", leg_index, x, y, z);
        Ok(())
    }

    /// Move every leg at once with a single batched controller command.
    ///
    /// All six targets are solved and validated before anything is sent, so an unreachable
    /// target leaves the robot untouched.
    pub fn move_all_legs(
        &mut self,
        positions: &LegPositions,
        speed: Option<u8>,
        accel: Option<u8>,
    ) -> Result<(), HexapodError> {
        let mut angles = [JointAngles::default(); NUM_LEGS];
        let mut targets: Vec<(u8, u16)> = Vec::with_capacity(self.num_channels as usize);

        for (i, (leg, position)) in self.legs.iter().zip(positions.iter()).enumerate() {
            let leg_err = |source| HexapodError::LegError { leg: i, source };

            angles[i] = leg.solve(position).map_err(leg_err)?;
            targets.extend_from_slice(&leg.servo_targets(&angles[i], true).map_err(leg_err)?);
        }

        // Unused channels are switched off
        let used: BTreeSet<u8> = targets.iter().map(|(c, _)| *c).collect();
        for channel in 0..self.num_channels {
            if !used.contains(&channel) {
                targets.push((channel, 0));
            }
        }
        targets.sort_by_key(|(c, _)| *c);

        self.send_motion_profile(speed, accel, &used)?;

        trace!("Batch targets: {:?}", targets);
        self.driver.set_multiple_targets(&targets)?;

        self.current_leg_positions = *positions;
        self.current_leg_angles = angles;

        debug!("All legs moved");
        Ok(())
    }

    /// Move every leg to one of the predefined stances.
    pub fn move_to_position(&mut self, position: PredefinedPosition) -> Result<(), HexapodError> {
        info!("Moving to predefined position {:?}", position);

        let positions = self
            .predefined_positions
            .get(&position)
            .copied()
            .ok_or_else(|| HexapodError::UnknownPosition(format!("{:?}", position)))?;

        self.move_all_legs(&positions, None, None)
    }

    /// Block until the servos have finished moving.
    ///
    /// Waits up to the motion start timeout for motion to be reported at all, since the
    /// controller may not have started the move when first asked. Fails if motion is still
    /// reported after the motion timeout.
    pub fn wait_until_motion_complete(&mut self) -> Result<(), HexapodError> {
        let start = Instant::now();

        loop {
            if self.driver.get_moving_state()? {
                trace!("Motion started after {:?}", start.elapsed());
                break;
            }
            if start.elapsed() >= self.motion_start_timeout {
                trace!("No motion reported, assuming servos already at target");
                return Ok(());
            }
            thread::sleep(self.motion_poll_period);
        }

        loop {
            if !self.driver.get_moving_state()? {
                trace!("Motion complete after {:?}", start.elapsed());
                return Ok(());
            }
            if start.elapsed() >= self.motion_timeout {
                return Err(HexapodError::MotionTimeout(self.motion_timeout));
            }
            thread::sleep(self.motion_poll_period);
        }
    }

    /// Resolve optional percentage overrides into controller units.
    fn motion_profile(&self, speed: Option<u8>, accel: Option<u8>) -> (u16, u16) {
        (
            pct_to_servo_units(speed.unwrap_or(self.speed_pct)),
            pct_to_servo_units(accel.unwrap_or(self.accel_pct)),
        )
    }

    /// Send the motion profile to every used channel if it differs from the last one sent.
    fn send_motion_profile(
        &mut self,
        speed: Option<u8>,
        accel: Option<u8>,
        channels: &BTreeSet<u8>,
    ) -> Result<(), HexapodError> {
        let profile = self.motion_profile(speed, accel);
        if self.sent_profile == Some(profile) {
            return Ok(());
        }

        for &channel in channels.iter() {
            self.driver.set_speed(channel, profile.0)?;
            self.driver.set_acceleration(channel, profile.1)?;
        }
        for leg in self.legs.iter_mut() {
            leg.set_motion_profile(profile.0, profile.1);
        }
        self.sent_profile = Some(profile);

        debug!("Motion profile set to speed {} accel {}", profile.0, profile.1);
        Ok(())
    }
}

impl LegPositionSource for Hexapod {
    fn leg_position(&self, leg_index: usize) -> Vector3D {
        self.current_leg_positions
            .get(leg_index)
            .copied()
            .unwrap_or_else(Vector3D::zeros)
    }
}

impl SharedHexapod {
    pub fn new(hexapod: Hexapod) -> Self {
        Self {
            inner: Arc::new(Mutex::new(hexapod)),
            gait_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Lock the hexapod for direct commands.
    ///
    /// Rejected with [`HexapodError::GaitActive`] while a gait generator owns the robot.
    pub fn lock(&self) -> Result<MutexGuard<'_, Hexapod>, HexapodError> {
        if self.is_gait_active() {
            return Err(HexapodError::GaitActive);
        }
        self.inner.lock().map_err(|_| HexapodError::PoisonError)
    }

    /// Copy of the last commanded foot positions, available even while a gait runs.
    pub fn current_leg_positions(&self) -> Result<LegPositions, HexapodError> {
        Ok(*self
            .inner
            .lock()
            .map_err(|_| HexapodError::PoisonError)?
            .current_leg_positions())
    }

    pub fn is_gait_active(&self) -> bool {
        self.gait_active.load(Ordering::SeqCst)
    }

    /// Claim the robot for a gait. Returns false if another gait already holds it.
    pub(crate) fn claim_for_gait(&self) -> bool {
        self.gait_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn release_from_gait(&self) {
        self.gait_active.store(false, Ordering::SeqCst);
    }

    /// Lock the hexapod from the gait that holds the claim.
    pub(crate) fn lock_for_gait(&self) -> Result<MutexGuard<'_, Hexapod>, HexapodError> {
        self.inner.lock().map_err(|_| HexapodError::PoisonError)
    }
}

impl FromStr for PredefinedPosition {
    type Err = HexapodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(&['-', ' '][..], "_").as_str() {
            "zero" => Ok(Self::Zero),
            "low_profile" => Ok(Self::LowProfile),
            "high_profile" | "upright" => Ok(Self::HighProfile),
            _ => Err(HexapodError::UnknownPosition(s.into())),
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a 0-100 percentage onto the controller's 1-255 speed/accel units, 0 stays unlimited.
pub fn pct_to_servo_units(pct: u8) -> u16 {
    if pct == 0 {
        return 0;
    }

    let pct = clamp(pct as f64, 1.0, 100.0);
    lin_map((1.0, 100.0), (1.0, 255.0), pct).round() as u16
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

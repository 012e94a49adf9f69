//! Execution loop driving a gait through its phase graph.
//!
//! Runs on the generator's worker thread, or on the caller's thread for a blocking run.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};
use util::time::seconds_to_std;

use super::{GaitGenError, Shared};
use crate::gait::{Gait, GaitCore, GaitState};
use crate::robot::imu::is_stable;
use crate::robot::HexapodError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Optional bounds on a run, it ends cleanly when either is reached.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct RunLimits {
    pub max_cycles: Option<u64>,
    pub max_duration: Option<Duration>,
}

/// Holds the hexapod claim and the running flag for as long as a run lasts.
///
/// Dropping the guard releases both, including when the worker unwinds.
pub(super) struct RunGuard {
    shared: Arc<Shared>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum WorkerSignal {
    /// Lower the legs currently moving and exit.
    Stop,
}

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RunOutcome {
    Cancelled,
    LimitReached,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RunGuard {
    pub(super) fn acquire(shared: &Arc<Shared>) -> Result<Self, GaitGenError> {
        if shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GaitGenError::AlreadyRunning);
        }

        if !shared.hexapod.claim_for_gait() {
            shared.running.store(false, Ordering::SeqCst);
            return Err(HexapodError::GaitActive.into());
        }

        Ok(Self {
            shared: shared.clone(),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.shared.hexapod.release_from_gait();
        if let Ok(mut state) = self.shared.current_state.write() {
            *state = None;
        }
        self.shared.running.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

pub(super) fn worker_thread(
    shared: Arc<Shared>,
    mut gait: Box<dyn Gait>,
    limits: RunLimits,
    signals: Receiver<WorkerSignal>,
    guard: RunGuard,
) {
    if let Err(e) = run(&shared, gait.as_mut(), limits, &signals) {
        match shared.last_error.lock() {
            Ok(mut slot) => *slot = Some(e),
            Err(_) => error!("Cannot record gait error, the error slot is poisoned: {}", e),
        }
    }

    // The error must be visible before the generator reports itself idle
    drop(guard);
}

/// Run the gait until stopped, a limit is reached or something fails.
///
/// On failure the legs are driven to the recovery stance before the error is returned.
pub(super) fn run(
    shared: &Shared,
    gait: &mut dyn Gait,
    limits: RunLimits,
    signals: &Receiver<WorkerSignal>,
) -> Result<RunOutcome, GaitGenError> {
    info!("Starting {} gait", gait.name());

    match run_phases(shared, gait, limits, signals) {
        Ok(outcome) => {
            info!("{} gait finished ({:?})", gait.name(), outcome);
            Ok(outcome)
        }
        Err(e) => {
            error!("{} gait aborted: {}", gait.name(), e);
            recover(shared);
            Err(e)
        }
    }
}

fn run_phases(
    shared: &Shared,
    gait: &mut dyn Gait,
    limits: RunLimits,
    signals: &Receiver<WorkerSignal>,
) -> Result<RunOutcome, GaitGenError> {
    let start_time = Instant::now();
    let settle_delay = seconds_to_std(shared.params.settle_delay_s);

    let initial_phase = gait.initial_phase();
    let mut phase = initial_phase;
    let mut cycles: u64 = 0;

    loop {
        if limits.max_cycles.map_or(false, |max| cycles >= max)
            || limits
                .max_duration
                .map_or(false, |max| start_time.elapsed() >= max)
        {
            return Ok(RunOutcome::LimitReached);
        }

        if let Some((direction, rotation)) = shared.pending_direction.lock()?.take() {
            gait.set_direction(direction, rotation);
        }

        let state = gait.get_state(phase)?;
        debug!(
            "Phase {}: swing {:?} stance {:?}",
            state.phase, state.swing_legs, state.stance_legs
        );
        *shared.current_state.write()? = Some(state.clone());

        let positions = shared.hexapod.current_leg_positions()?;
        let core = gait.core_mut();
        core.plan_phase(&positions, &state)?;

        // A stop during the swing still lowers the swing legs, but the stance group is skipped
        let mut cancelled = execute_group(shared, core, &state.swing_legs, settle_delay, signals)?;
        if !cancelled {
            cancelled = execute_group(shared, core, &state.stance_legs, settle_delay, signals)?;
        }

        shared.stats.write()?.phases_executed += 1;

        if cancelled || dwell(shared, &state, signals)? {
            return Ok(RunOutcome::Cancelled);
        }

        phase = gait.next_phase(phase)?;
        if phase == initial_phase {
            cycles += 1;
            shared.stats.write()?.cycles_completed += 1;
            debug!("Cycle {} complete", cycles);
        }
    }
}

/// Step a group of legs through their paths together, one grouped move per waypoint index.
///
/// Waypoint 0 is where each foot already is, so stepping starts from waypoint 1. Legs whose path
/// is shorter than the longest hold their final waypoint, legs outside the group hold their last
/// commanded position. Returns true if a stop was requested, in which case the remaining
/// waypoints are still driven but without the settle delays.
fn execute_group(
    shared: &Shared,
    core: &mut GaitCore,
    legs: &BTreeSet<usize>,
    settle_delay: Duration,
    signals: &Receiver<WorkerSignal>,
) -> Result<bool, GaitGenError> {
    let num_steps = legs
        .iter()
        .filter_map(|&leg| core.leg_path(leg))
        .map(|path| path.len())
        .max()
        .unwrap_or(0);

    for &leg in legs.iter() {
        if let Some(path) = core.leg_path_mut(leg) {
            path.reset();
            path.advance();
        }
    }

    let mut cancelled = false;

    for step in 1..num_steps {
        let mut positions = shared.hexapod.current_leg_positions()?;

        for &leg in legs.iter() {
            if let Some(path) = core.leg_path_mut(leg) {
                if !path.is_empty() {
                    positions[leg] = path.current_target();
                    path.advance();
                }
            }
        }

        {
            let mut hexapod = shared.hexapod.lock_for_gait()?;
            hexapod.move_all_legs(&positions, None, None)?;
            hexapod.wait_until_motion_complete()?;
        }
        trace!("Waypoint {}/{} reached by legs {:?}", step, num_steps - 1, legs);

        if !cancelled {
            let delay = if step + 1 < num_steps {
                settle_delay
            } else {
                Duration::default()
            };
            cancelled = wait_for_stop(signals, delay);
        }
    }

    Ok(cancelled)
}

/// Hold for the phase's dwell time, counting only time spent stable.
///
/// Returns true if a stop was requested. Fails with [`GaitGenError::Unstable`] if the body stays
/// unstable for longer than the unstable timeout.
fn dwell(
    shared: &Shared,
    state: &GaitState,
    signals: &Receiver<WorkerSignal>,
) -> Result<bool, GaitGenError> {
    let poll_period = seconds_to_std(shared.params.poll_period_s);
    let dwell_time = seconds_to_std(state.dwell_time_s);
    let unstable_timeout = seconds_to_std(shared.params.unstable_timeout_s);

    let mut stable_time = Duration::default();
    let mut unstable_since: Option<Instant> = None;

    loop {
        if check_stability(shared, state.stability_threshold)? {
            if let Some(since) = unstable_since.take() {
                info!("Stable again after {:.2} s", since.elapsed().as_secs_f64());
            }
            if stable_time >= dwell_time {
                return Ok(false);
            }
        } else {
            let since = *unstable_since.get_or_insert_with(|| {
                warn!("Unstable during phase {}, holding", state.phase);
                Instant::now()
            });
            if since.elapsed() >= unstable_timeout {
                return Err(GaitGenError::Unstable(unstable_timeout));
            }
        }

        let tick = Instant::now();
        if wait_for_stop(signals, poll_period) {
            return Ok(true);
        }
        if unstable_since.is_none() {
            stable_time += tick.elapsed();
        }
    }
}

/// Without an IMU the body is always considered stable.
fn check_stability(shared: &Shared, threshold: f64) -> Result<bool, GaitGenError> {
    let mut imu = shared.imu.lock()?;

    match imu.as_mut() {
        Some(imu) => {
            let accel = imu.get_acceleration()?;
            let gyro = imu.get_gyroscope()?;
            let stable = is_stable(&accel, &gyro, threshold);

            if !stable {
                trace!(
                    "Unstable: |accel| {:.3} m/s^2, |gyro| {:.3} rad/s",
                    accel.norm(),
                    gyro.norm()
                );
            }
            Ok(stable)
        }
        None => Ok(true),
    }
}

/// Wait up to `timeout` for a stop signal. A disconnected channel counts as a stop.
fn wait_for_stop(signals: &Receiver<WorkerSignal>, timeout: Duration) -> bool {
    match signals.recv_timeout(timeout) {
        Ok(WorkerSignal::Stop) => {
            debug!("Stop requested");
            true
        }
        Err(RecvTimeoutError::Timeout) => false,
        Err(RecvTimeoutError::Disconnected) => {
            warn!("Gait generator handle dropped, stopping");
            true
        }
    }
}

/// Drive every leg to the recovery stance, logging rather than returning any failure.
fn recover(shared: &Shared) {
    let position = shared.params.recovery_position;
    warn!("Recovering to {:?}", position);

    let result = shared.hexapod.lock_for_gait().and_then(|mut hexapod| {
        hexapod.move_to_position(position)?;
        hexapod.wait_until_motion_complete()
    });

    match result {
        Ok(()) => info!("Recovered to {:?}", position),
        Err(e) => error!("Recovery to {:?} failed: {}", position, e),
    }
}

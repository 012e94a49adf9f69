//! # Gait Generator
//!
//! Drives a gait through its phase graph on a dedicated worker thread.
//!
//! Each phase is executed as:
//!
//! 1. Plan a target and path for every leg from the last commanded positions.
//! 2. Step the swing group along its paths, then the stance group, one grouped move per
//!    waypoint index with a settle delay in between.
//! 3. Dwell, polling for a stop and checking the body is stable.
//! 4. Move to the next phase in the graph.
//!
//! While a gait runs the generator owns the hexapod: direct moves through
//! [`SharedHexapod::lock`] are rejected until the gait stops.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
mod worker;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::Serialize;
use util::time::seconds_to_std;

use crate::gait::{Direction, Gait, GaitError, GaitState};
use crate::robot::{HexapodError, Imu, ImuError, SharedHexapod};

pub use self::params::GaitGenParams;
use self::worker::{worker_thread, RunGuard, RunLimits, WorkerSignal};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Runs gaits on the hexapod, one at a time.
pub struct GaitGenerator {
    shared: Arc<Shared>,

    worker: Option<Worker>,
}

/// Counters for the current, or last, run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GaitGenStats {
    /// Number of times the gait returned to its initial phase.
    pub cycles_completed: u64,

    pub phases_executed: u64,
}

struct Worker {
    jh: JoinHandle<()>,
    sender: Sender<WorkerSignal>,
}

/// State shared between the generator handle and its worker.
struct Shared {
    params: GaitGenParams,

    hexapod: SharedHexapod,
    imu: Mutex<Option<Box<dyn Imu>>>,

    running: AtomicBool,

    /// Movement change to apply at the next phase boundary.
    pending_direction: Mutex<Option<(Direction, f64)>>,

    current_state: RwLock<Option<GaitState>>,
    stats: RwLock<GaitGenStats>,
    last_error: Mutex<Option<GaitGenError>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GaitGenError {
    #[error("A gait is already running, stop it first")]
    AlreadyRunning,

    #[error("Hexapod error: {0}")]
    HexapodError(#[from] HexapodError),

    #[error("Gait error: {0}")]
    GaitError(#[from] GaitError),

    #[error("IMU error: {0}")]
    ImuError(#[from] ImuError),

    #[error("Body remained unstable for {0:?}")]
    Unstable(Duration),

    #[error("Sync primitive is poisoned")]
    PoisonError,

    #[error("Cannot spawn the gait worker thread: {0}")]
    SpawnError(std::io::Error),

    #[error("The gait worker thread panicked")]
    WorkerPanicked,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GaitGenerator {
    /// Create an idle generator. Without an IMU every dwell is considered stable.
    pub fn new(hexapod: SharedHexapod, imu: Option<Box<dyn Imu>>, params: GaitGenParams) -> Self {
        Self {
            shared: Arc::new(Shared {
                params,
                hexapod,
                imu: Mutex::new(imu),
                running: AtomicBool::new(false),
                pending_direction: Mutex::new(None),
                current_state: RwLock::new(None),
                stats: RwLock::new(GaitGenStats::default()),
                last_error: Mutex::new(None),
            }),
            worker: None,
        }
    }

    /// Run the gait in the background until [`GaitGenerator::stop`] is called.
    pub fn start(&mut self, gait: Box<dyn Gait>) -> Result<(), GaitGenError> {
        self.start_with_limits(gait, None, None)
    }

    /// Run the gait in the background, ending cleanly after `max_cycles` full cycles or once
    /// `max_duration` has passed, whichever comes first.
    pub fn start_with_limits(
        &mut self,
        gait: Box<dyn Gait>,
        max_cycles: Option<u64>,
        max_duration: Option<Duration>,
    ) -> Result<(), GaitGenError> {
        if self.is_running() {
            return Err(GaitGenError::AlreadyRunning);
        }
        self.reap_worker();

        let guard = RunGuard::acquire(&self.shared)?;
        self.reset_run()?;

        let name = gait.name();
        let limits = RunLimits {
            max_cycles,
            max_duration,
        };

        let (sender, receiver) = channel();
        let shared = self.shared.clone();

        // If the spawn fails the closure, and the guard with it, is dropped
        let jh = thread::Builder::new()
            .name("gait_gen::worker".into())
            .spawn(move || worker_thread(shared, gait, limits, receiver, guard))
            .map_err(GaitGenError::SpawnError)?;

        self.worker = Some(Worker { jh, sender });

        info!("Gait generator started with the {} gait", name);
        Ok(())
    }

    /// Run exactly `cycles` full cycles of the gait on the calling thread.
    ///
    /// Failures are handled as in a background run: the legs are driven to the recovery stance
    /// and the error is returned.
    pub fn execute_cycles(
        &mut self,
        gait: &mut dyn Gait,
        cycles: u64,
    ) -> Result<GaitGenStats, GaitGenError> {
        if self.is_running() {
            return Err(GaitGenError::AlreadyRunning);
        }
        self.reap_worker();

        let _guard = RunGuard::acquire(&self.shared)?;
        self.reset_run()?;

        // Nothing can send a stop, the sender only keeps the channel connected
        let (_sender, receiver) = channel();
        worker::run(
            &self.shared,
            gait,
            RunLimits {
                max_cycles: Some(cycles),
                max_duration: None,
            },
            &receiver,
        )?;

        self.stats()
    }

    /// Stop the running gait, waiting at most the stop timeout for it to lower its legs.
    ///
    /// Does nothing if no gait is running. A worker that does not exit in time is detached and
    /// keeps the hexapod claimed until it does.
    pub fn stop(&mut self) -> Result<(), GaitGenError> {
        let worker = match self.worker.take() {
            Some(w) => w,
            None => return Ok(()),
        };

        // A worker that has already exited has dropped its receiver
        if worker.sender.send(WorkerSignal::Stop).is_err() {
            debug!("Gait worker already exited");
        }

        let timeout = seconds_to_std(self.shared.params.stop_timeout_s);
        let poll_period = seconds_to_std(self.shared.params.poll_period_s);
        let start = Instant::now();

        while self.is_running() {
            if start.elapsed() >= timeout {
                warn!(
                    "Gait worker did not stop within {:?}, detaching it",
                    timeout
                );
                return Ok(());
            }
            thread::sleep(poll_period);
        }

        if worker.jh.join().is_err() {
            error!("Gait worker panicked");
            return Err(GaitGenError::WorkerPanicked);
        }

        info!("Gait generator stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Change the movement of the running gait at its next phase boundary.
    ///
    /// A change made while idle is applied at the start of the next run.
    pub fn set_direction(&self, direction: Direction, rotation: f64) -> Result<(), GaitGenError> {
        *self.shared.pending_direction.lock()? = Some((direction, rotation));
        debug!("Queued direction {:?} rotation {}", direction, rotation);
        Ok(())
    }

    /// The state of the phase being executed, `None` while idle.
    pub fn current_state(&self) -> Result<Option<GaitState>, GaitGenError> {
        Ok(self.shared.current_state.read()?.clone())
    }

    pub fn stats(&self) -> Result<GaitGenStats, GaitGenError> {
        Ok(*self.shared.stats.read()?)
    }

    /// Take the error that ended the last background run, if it failed.
    pub fn take_error(&self) -> Option<GaitGenError> {
        match self.shared.last_error.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => Some(GaitGenError::PoisonError),
        }
    }

    fn reset_run(&self) -> Result<(), GaitGenError> {
        *self.shared.stats.write()? = GaitGenStats::default();

        if let Some(e) = self.shared.last_error.lock()?.take() {
            debug!("Discarding error from the previous run: {}", e);
        }
        Ok(())
    }

    /// Join a worker which has exited on its own.
    fn reap_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.jh.join().is_err() {
                error!("Previous gait worker panicked");
            }
        }
    }
}

impl Drop for GaitGenerator {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Gait generator did not stop cleanly: {}", e);
        }
    }
}

impl<T> From<PoisonError<T>> for GaitGenError {
    fn from(_: PoisonError<T>) -> Self {
        Self::PoisonError
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

//! Main hexapod executable entry point.
//!
//! # Architecture
//!
//! - Initialise the session, logging and parameters
//! - Connect to the servo controller, or a simulated one
//! - Apply the servo calibration
//! - Stand up, run the requested gait, then lower the body again

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use hex_lib::{
    gait::{create_gait, GaitKind, GaitParams, NamedDirection},
    gait_gen::{GaitGenParams, GaitGenerator},
    robot::{calibration, Hexapod, HexapodParams, PredefinedPosition, SharedHexapod},
    servo_ctrl::{Maestro, ServoDriver, SimServo},
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
    time::seconds_to_std,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period at which a timed run is checked for early failure.
const RUN_POLL_PERIOD: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "hex_exec", about = "Walk the hexapod with a chosen gait")]
struct Opts {
    /// Gait to walk with, tripod or wave.
    #[structopt(long, default_value = "tripod")]
    gait: GaitKind,

    /// Travel direction, e.g. forward, left or diagonal-fr.
    #[structopt(long, default_value = "forward")]
    direction: NamedDirection,

    /// Rotation demand in [-1, 1], positive is clockwise.
    #[structopt(long, default_value = "0", allow_hyphen_values = true)]
    rotation: f64,

    /// Number of full gait cycles to walk. Defaults to one if no duration is given.
    #[structopt(long, conflicts_with = "duration")]
    cycles: Option<u64>,

    /// Walk in the background for this many seconds, then stop.
    #[structopt(long)]
    duration: Option<f64>,

    /// Use the simulated servo controller instead of the serial one.
    #[structopt(long)]
    sim: bool,

    /// Servo calibration file.
    #[structopt(long, parse(from_os_str))]
    calibration: Option<PathBuf>,

    /// Minimum log level, at least as verbose as info.
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("hex_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(opts.log_level, &session).wrap_err("Failed to initialise logging")?;

    info!("Hexapod Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let hexapod_params: HexapodParams = load_params_or_default("hexapod.toml");
    let gait_params: GaitParams = load_params_or_default("gait.toml");
    let gait_gen_params: GaitGenParams = load_params_or_default("gait_gen.toml");

    info!("Exec parameters loaded");

    // ---- INITIALISE THE ROBOT ----

    let driver: Box<dyn ServoDriver> = if opts.sim {
        info!("Using the simulated servo controller");
        Box::new(SimServo::new(hexapod_params.controller.num_channels))
    } else {
        let c = &hexapod_params.controller;
        Box::new(
            Maestro::open(
                &c.device,
                c.baud_rate,
                c.num_channels,
                seconds_to_std(c.read_timeout_s),
            )
            .wrap_err_with(|| format!("Failed to open the servo controller on {}", c.device))?,
        )
    };

    let mut hexapod =
        Hexapod::new(&hexapod_params, driver).wrap_err("Failed to initialise the hexapod")?;

    if let Some(path) = &opts.calibration {
        calibration::load_and_apply(&mut hexapod, path);
    }

    let hexapod = SharedHexapod::new(hexapod);

    move_to(&hexapod, PredefinedPosition::LowProfile)?;
    move_to(&hexapod, PredefinedPosition::HighProfile)?;

    // ---- RUN THE GAIT ----

    let mut gait = create_gait(opts.gait, gait_params);
    gait.set_direction(opts.direction.into(), opts.rotation);

    info!(
        "Walking {} with the {} gait, rotation {}",
        opts.direction.name(),
        gait.name(),
        opts.rotation
    );

    let mut generator = GaitGenerator::new(hexapod.clone(), None, gait_gen_params);

    match opts.duration {
        Some(duration_s) => {
            generator
                .start(gait)
                .wrap_err("Failed to start the gait")?;

            let end = Instant::now() + seconds_to_std(duration_s);
            while Instant::now() < end && generator.is_running() {
                thread::sleep(RUN_POLL_PERIOD);
            }

            generator.stop().wrap_err("Failed to stop the gait")?;

            if let Some(e) = generator.take_error() {
                return Err(e).wrap_err("The gait failed");
            }
        }
        None => {
            generator
                .execute_cycles(gait.as_mut(), opts.cycles.unwrap_or(1))
                .wrap_err("The gait failed")?;
        }
    }

    let stats = generator.stats()?;
    info!(
        "Walked {} cycles ({} phases)",
        stats.cycles_completed, stats.phases_executed
    );
    session.save("gait_stats.json", stats);

    // ---- SHUTDOWN ----

    move_to(&hexapod, PredefinedPosition::LowProfile)?;

    session.exit();

    Ok(())
}

/// Load a parameter file, falling back to the defaults if it cannot be read.
fn load_params_or_default<P>(file: &str) -> P
where
    P: DeserializeOwned + Default,
{
    match util::params::load(file) {
        Ok(p) => p,
        Err(e) => {
            warn!("Could not load {}, using defaults: {}", file, e);
            P::default()
        }
    }
}

/// Move to a predefined stance and wait for the servos to get there.
fn move_to(hexapod: &SharedHexapod, position: PredefinedPosition) -> Result<(), Report> {
    let mut hexapod = hexapod.lock()?;

    hexapod
        .move_to_position(position)
        .wrap_err_with(|| format!("Failed to move to {:?}", position))?;
    hexapod
        .wait_until_motion_complete()
        .wrap_err_with(|| format!("Motion to {:?} did not complete", position))?;

    Ok(())
}

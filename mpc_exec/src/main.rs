//! Main controller executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and the MPC module
//!     - Bind the telemetry server
//!     - Main loop, per accepted simulator connection:
//!         - Receive a telemetry message
//!         - Latency compensation, reference fit and MPC solve
//!         - Send the steer command, then hold for the actuation delay
//!
//! The loop is deliberately single threaded: messages are processed strictly
//! in arrival order, one solve per message, and a new message is not handled
//! until the previous response has been sent and the actuation delay has
//! elapsed.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use mpc_lib::latency::LatencyClock;
use mpc_lib::mpc_ctrl::{MpcCtrl, Params};
use mpc_lib::telem_proc::{self, TelemProcError};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use std::env;
use std::thread;
use std::time::Duration;

// Internal
use sim_if::net::{SimConnection, SimServer, SimServerError};
use sim_if::telemetry::{self, SimEvent};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// TCP port the telemetry server listens on.
const TELEMETRY_PORT: u16 = 4567;

/// Hold time after each command, modelling the real actuation latency.
///
/// Do not remove this for speed: the latency compensation is tuned against
/// it, and the simulator expects commands no faster than the real car could
/// act on them.
///
/// Units: seconds
const ACTUATION_DELAY_S: f64 = 0.1;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("mpc_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("MPC Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    // Weights may be overridden positionally from the command line
    let mut params = Params::default();
    params
        .apply_cli_overrides(&args[1..])
        .wrap_err("Could not parse the weight arguments")?;

    info!("Cost weights: {:?}", params.weights());

    // ---- INITIALISE MODULES ----

    let mut mpc = MpcCtrl::default();
    mpc.init(params, &session)
        .wrap_err("Failed to initialise MpcCtrl")?;
    info!("MpcCtrl init complete");

    // ---- INITIALISE NETWORK ----

    let server = SimServer::bind(TELEMETRY_PORT)
        .wrap_err("Failed to start the telemetry server")?;

    info!("Listening on port {}\n", TELEMETRY_PORT);

    // ---- MAIN LOOP ----

    loop {
        let mut connection = match server.accept() {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not accept a connection: {}", e);
                continue;
            }
        };

        info!("Simulator connected");

        serve_connection(&mut connection, &mut mpc);

        info!("Simulator disconnected");
    }
}

/// Serve one simulator connection until it drops.
fn serve_connection(connection: &mut SimConnection, mpc: &mut MpcCtrl) {
    let mut latency = LatencyClock::start();

    loop {
        let msg = match connection.recv() {
            Ok(Some(msg)) => msg,
            Ok(None) => continue,
            Err(SimServerError::Disconnected) => return,
            Err(e) => {
                warn!("Receive failed: {}", e);
                return;
            }
        };

        match telemetry::parse_event(&msg) {
            Ok(SimEvent::Telemetry(tm)) => {
                // Measure the delay since the previous message was handled,
                // then immediately mark this one
                let latency_s = latency.measure();
                latency.restart();

                match telem_proc::exec(mpc, &tm, latency_s) {
                    Ok(cmd) => {
                        match telemetry::steer_message(&cmd) {
                            Ok(reply) => send(connection, &reply),
                            Err(e) => warn!("Could not serialise the command: {}", e),
                        }

                        // Hold for the modelled actuation latency
                        thread::sleep(Duration::from_secs_f64(ACTUATION_DELAY_S));
                    }
                    Err(TelemProcError::Fit(e)) => {
                        // Without a usable reference curve the defensive
                        // reply is manual control
                        warn!("{}, replying manual", e);
                        send(connection, &telemetry::manual_message());
                    }
                    Err(e) => warn!("Error during telemetry processing: {}", e),
                }
            }

            // The simulator is between telemetry bursts, answer manual
            Ok(SimEvent::NoData) => send(connection, &telemetry::manual_message()),

            // Well-formed events of no interest and non-event frames get no
            // reply
            Ok(SimEvent::Ignored) | Ok(SimEvent::NotAnEvent) => (),

            Err(e) => debug!("Unparseable frame ignored: {}", e),
        }
    }
}

/// Send a reply, logging rather than propagating failures.
fn send(connection: &mut SimConnection, msg: &str) {
    if let Err(e) = connection.send(msg) {
        warn!("Could not send the reply: {}", e);
    }
}

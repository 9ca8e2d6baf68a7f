//! # Telemetry module
//!
//! This module provides the message types exchanged with the simulator and
//! the codec for the socket.io-style envelope the simulator speaks.
//!
//! Every message is a text frame. Frames carrying an event are prefixed with
//! `42` (`4` - message, `2` - event) followed by a two-element JSON array of
//! event name and payload object.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use serde_json::{self, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Prefix identifying an event frame.
const EVENT_PREFIX: &str = "42";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Telemetry sent by the simulator on every tick.
#[derive(Debug, Clone, Deserialize)]
pub struct Telemetry {
    /// Upcoming waypoint x coordinates.
    ///
    /// Units: meters,
    /// Frame: world
    pub ptsx: Vec<f64>,

    /// Upcoming waypoint y coordinates.
    ///
    /// Units: meters,
    /// Frame: world
    pub ptsy: Vec<f64>,

    /// Vehicle x position.
    ///
    /// Units: meters,
    /// Frame: world
    pub x: f64,

    /// Vehicle y position.
    ///
    /// Units: meters,
    /// Frame: world
    pub y: f64,

    /// Vehicle heading.
    ///
    /// Units: radians,
    /// Frame: world
    pub psi: f64,

    /// Forward speed, in the simulator's speed units.
    pub speed: f64,

    /// The last commanded steering angle.
    ///
    /// Units: radians
    pub steering_angle: f64,

    /// The last commanded throttle, between -1 and +1.
    pub throttle: f64,
}

/// Command returned to the simulator in response to telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct SteerCmd {
    /// Normalised steering demand between -1 and +1.
    ///
    /// Positive values steer right in the simulator's convention.
    pub steering_angle: f64,

    /// Throttle demand between -1 and +1.
    pub throttle: f64,

    /// Predicted trajectory x coordinates, vehicle frame.
    pub mpc_x: Vec<f64>,

    /// Predicted trajectory y coordinates, vehicle frame.
    pub mpc_y: Vec<f64>,

    /// Reference line sample x coordinates, vehicle frame.
    pub next_x: Vec<f64>,

    /// Reference line sample y coordinates, vehicle frame.
    pub next_y: Vec<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An event recieved from the simulator.
#[derive(Debug)]
pub enum SimEvent {
    /// A telemetry event carrying the vehicle state.
    Telemetry(Telemetry),

    /// An event frame with no JSON payload (or a `null` payload), which the
    /// simulator sends while under manual control.
    NoData,

    /// A well-formed event the controller has no interest in.
    Ignored,

    /// A frame which is not an event at all. No reply is expected.
    NotAnEvent,
}

/// Possible envelope/payload parsing errors.
#[derive(Debug, Error)]
pub enum TelemetryParseError {
    #[error("Event frame contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Expected a two element [\"<event>\", <payload>] array")]
    MalformedEvent,

    #[error("Could not parse the telemetry payload: {0}")]
    InvalidPayload(serde_json::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Parse a raw text frame from the simulator into a [`SimEvent`].
pub fn parse_event(msg: &str) -> Result<SimEvent, TelemetryParseError> {
    // Frames which don't carry the event prefix are transport chatter
    if !msg.starts_with(EVENT_PREFIX) || !msg[EVENT_PREFIX.len()..].starts_with('[') {
        return Ok(SimEvent::NotAnEvent);
    }

    // Extract the JSON array from the envelope. Frames without one carry no
    // data and are answered with the manual reply by the caller.
    let json_str = match extract_json(msg) {
        Some(s) => s,
        None => return Ok(SimEvent::NoData),
    };

    let val: Value = serde_json::from_str(json_str)
        .map_err(TelemetryParseError::InvalidJson)?;

    let event = match val.get(0).and_then(Value::as_str) {
        Some(e) => e,
        None => return Err(TelemetryParseError::MalformedEvent),
    };

    if event != "telemetry" {
        return Ok(SimEvent::Ignored);
    }

    let payload = match val.get(1) {
        Some(p) => p,
        None => return Err(TelemetryParseError::MalformedEvent),
    };

    serde_json::from_value(payload.clone())
        .map(SimEvent::Telemetry)
        .map_err(TelemetryParseError::InvalidPayload)
}

/// Frame a steer command as an outbound event.
pub fn steer_message(cmd: &SteerCmd) -> Result<String, serde_json::Error> {
    Ok(format!("{}[\"steer\",{}]", EVENT_PREFIX, serde_json::to_string(cmd)?))
}

/// The reply sent when there is no telemetry to act on.
pub fn manual_message() -> String {
    format!("{}[\"manual\",{{}}]", EVENT_PREFIX)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Extract the JSON event array from an envelope frame.
///
/// Returns `None` if the frame contains the literal `null` or does not hold
/// a `[... }]` span.
fn extract_json(msg: &str) -> Option<&str> {
    if msg.contains("null") {
        return None;
    }

    let start = msg.find('[')?;
    let end = msg.rfind("}]")?;

    msg.get(start..end + 2)
}

#[cfg(test)]
mod test {
    use super::*;

    const TELEMETRY_FRAME: &str = concat!(
        "42[\"telemetry\",{\"ptsx\":[0.0,10.0],\"ptsy\":[0.0,0.0],",
        "\"x\":1.5,\"y\":-0.5,\"psi\":0.1,\"speed\":20.0,",
        "\"steering_angle\":0.05,\"throttle\":0.3}]"
    );

    #[test]
    fn test_parse_telemetry() {
        let tm = match parse_event(TELEMETRY_FRAME) {
            Ok(SimEvent::Telemetry(tm)) => tm,
            other => panic!("expected telemetry, got {:?}", other),
        };

        assert_eq!(tm.ptsx, vec![0.0, 10.0]);
        assert_eq!(tm.ptsy, vec![0.0, 0.0]);
        assert_eq!(tm.x, 1.5);
        assert_eq!(tm.y, -0.5);
        assert_eq!(tm.psi, 0.1);
        assert_eq!(tm.speed, 20.0);
        assert_eq!(tm.steering_angle, 0.05);
        assert_eq!(tm.throttle, 0.3);
    }

    #[test]
    fn test_non_event_frames_are_silent() {
        assert!(matches!(parse_event("2"), Ok(SimEvent::NotAnEvent)));
        assert!(matches!(parse_event("41[\"x\"]"), Ok(SimEvent::NotAnEvent)));
        assert!(matches!(parse_event(""), Ok(SimEvent::NotAnEvent)));
    }

    #[test]
    fn test_null_payload_is_no_data() {
        assert!(matches!(parse_event("42[\"telemetry\",null]"), Ok(SimEvent::NoData)));
        assert!(matches!(parse_event("42[]"), Ok(SimEvent::NoData)));
        assert!(matches!(parse_event("42"), Ok(SimEvent::NotAnEvent)));
        assert!(matches!(parse_event("42xyz"), Ok(SimEvent::NotAnEvent)));
    }

    #[test]
    fn test_other_events_are_ignored() {
        assert!(matches!(
            parse_event("42[\"connected\",{}]"),
            Ok(SimEvent::Ignored)
        ));
    }

    #[test]
    fn test_steer_message_framing() {
        let cmd = SteerCmd {
            steering_angle: -0.25,
            throttle: 0.7,
            mpc_x: vec![1.0],
            mpc_y: vec![2.0],
            next_x: vec![0.0],
            next_y: vec![0.5],
        };

        let msg = steer_message(&cmd).unwrap();

        assert!(msg.starts_with("42[\"steer\",{"));
        assert!(msg.ends_with("}]"));
        assert!(msg.contains("\"steering_angle\":-0.25"));
        assert!(msg.contains("\"throttle\":0.7"));
    }

    #[test]
    fn test_manual_message_framing() {
        assert_eq!(manual_message(), "42[\"manual\",{}]");
    }
}

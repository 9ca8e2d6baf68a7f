//! # Network Module
//!
//! This module provides the WebSocket server the simulator connects to. The
//! transport is deliberately blocking: the controller processes telemetry
//! strictly in arrival order, one solve per message, so there is nothing to
//! gain from an async stack here.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use std::net::{TcpListener, TcpStream};
use tungstenite::{accept, Message, WebSocket};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A listening server which accepts simulator connections.
pub struct SimServer {
    listener: TcpListener,
}

/// A single accepted simulator connection.
pub struct SimConnection {
    socket: WebSocket<TcpStream>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SimServerError {
    #[error("Could not bind to port {0}: {1}")]
    BindFailure(u16, std::io::Error),

    #[error("Could not accept an incoming connection: {0}")]
    AcceptError(std::io::Error),

    #[error("WebSocket handshake failed: {0}")]
    HandshakeError(String),

    #[error("The simulator closed the connection")]
    Disconnected,

    #[error("WebSocket error: {0}")]
    SocketError(tungstenite::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimServer {
    /// Bind the server to the given TCP port on all interfaces.
    pub fn bind(port: u16) -> Result<Self, SimServerError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|e| SimServerError::BindFailure(port, e))?;

        Ok(Self { listener })
    }

    /// Block until a simulator connects, completing the WebSocket handshake.
    pub fn accept(&self) -> Result<SimConnection, SimServerError> {
        let (stream, addr) = self
            .listener
            .accept()
            .map_err(SimServerError::AcceptError)?;

        let socket =
            accept(stream).map_err(|e| SimServerError::HandshakeError(e.to_string()))?;

        debug!("WebSocket handshake complete for {}", addr);

        Ok(SimConnection { socket })
    }
}

impl SimConnection {
    /// Block until the next text frame arrives.
    ///
    /// Returns `Ok(None)` for frames which carry no application data (pings
    /// and binary frames). Control frames are answered by the socket itself.
    pub fn recv(&mut self) -> Result<Option<String>, SimServerError> {
        match self.socket.read_message() {
            Ok(Message::Text(s)) => Ok(Some(s)),
            Ok(Message::Close(_)) => Err(SimServerError::Disconnected),
            Ok(_) => Ok(None),
            Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Err(SimServerError::Disconnected),
            Err(e) => Err(SimServerError::SocketError(e)),
        }
    }

    /// Send a text frame to the simulator.
    pub fn send(&mut self, msg: &str) -> Result<(), SimServerError> {
        match self.socket.write_message(Message::Text(msg.to_owned())) {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Err(SimServerError::Disconnected),
            Err(e) => Err(SimServerError::SocketError(e)),
        }
    }
}

#![deny(unsafe_code)]

//! # noise-ws-session
//!
//! A role-aware driver for the [`noise-ws-handshake`] Noise XXpsk3 engine,
//! meant for message-oriented transports such as WebSocket: every Noise
//! message travels as one binary frame.
//!
//! This crate provides:
//!
//! - [`NoiseStateMachine`], the per-connection session
//! - [`SessionBuilder`] for configuring it
//! - [`Sink`], implemented for closures and `mpsc::Sender<Vec<u8>>`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use noise_ws_session::{Input, PreSharedKey, Role, SessionBuilder};
//!
//! let psk = PreSharedKey::from(*b"Random 32 characters long secret");
//! let mut session = SessionBuilder::new(Role::Initiator, psk)
//!     .build(
//!         |plaintext: &[u8]| println!("received {} bytes", plaintext.len()),
//!         |frame: &[u8]| { /* write `frame` to the socket */ },
//!     )
//!     .unwrap();
//!
//! // Emits handshake message 1 through the `down` sink.
//! session.handle_connection(Input::Advance).unwrap();
//! ```

pub mod session;
pub mod sink;

pub use noise_ws_handshake::{
    Error, KeyPair, MAX_MESSAGE_LEN, MAX_TRANSPORT_PAYLOAD_LEN, PROTOCOL_NAME, PreSharedKey,
    ProtocolName, PublicKey, Role, StaticSecret,
};
pub use session::{HandshakeStatus, Input, MAX_PENDING_SENDS, NoiseStateMachine};
pub use sink::Sink;

use rand_core::OsRng;

use crate::session::SessionConfig;

/// Builder for [`NoiseStateMachine`].
///
/// # Example
///
/// ```rust,no_run
/// use noise_ws_session::{KeyPair, PreSharedKey, Role, SessionBuilder};
/// use rand_core::OsRng;
/// use std::sync::mpsc;
///
/// let server = KeyPair::generate(&mut OsRng);
/// let (up_tx, up_rx) = mpsc::channel::<Vec<u8>>();
/// let (down_tx, down_rx) = mpsc::channel::<Vec<u8>>();
///
/// let session = SessionBuilder::new(Role::Responder, PreSharedKey::from([7u8; 32]))
///     .with_local_keypair(server)
///     .with_prologue(b"my-app v1".to_vec())
///     .build(up_tx, down_tx)
///     .unwrap();
/// ```
pub struct SessionBuilder {
    role: Role,
    psk: PreSharedKey,
    local_keypair: Option<KeyPair>,
    remote_public: Option<PublicKey>,
    prologue: Option<Vec<u8>>,
    protocol_name: Option<String>,
}

impl SessionBuilder {
    pub fn new(role: Role, psk: PreSharedKey) -> Self {
        Self {
            role,
            psk,
            local_keypair: None,
            remote_public: None,
            prologue: None,
            protocol_name: None,
        }
    }

    /// Set the local static key pair. A fresh one is generated if unset.
    pub fn with_local_keypair(mut self, keypair: KeyPair) -> Self {
        self.local_keypair = Some(keypair);
        self
    }

    /// Only accept a peer presenting this static key.
    ///
    /// Optional for both roles; XX transmits the static keys in-band.
    pub fn with_remote_public(mut self, key: PublicKey) -> Self {
        self.remote_public = Some(key);
        self
    }

    /// Set a custom prologue for the handshake.
    ///
    /// Both sides must use the same prologue for the handshake to succeed.
    /// Defaults to empty.
    pub fn with_prologue(mut self, prologue: Vec<u8>) -> Self {
        self.prologue = Some(prologue);
        self
    }

    /// Override the protocol name. Only [`PROTOCOL_NAME`] is accepted;
    /// anything else fails `build` with [`Error::ProtocolMismatch`].
    pub fn with_protocol_name(mut self, name: impl Into<String>) -> Self {
        self.protocol_name = Some(name.into());
        self
    }

    /// Build the session with its `up` (plaintext) and `down` (wire) sinks.
    pub fn build<U: Sink, D: Sink>(self, up: U, down: D) -> Result<NoiseStateMachine<U, D>, Error> {
        let protocol = match &self.protocol_name {
            Some(name) => ProtocolName::parse(name)?,
            None => ProtocolName::default(),
        };
        let config = SessionConfig {
            role: self.role,
            protocol,
            local_keypair: self
                .local_keypair
                .unwrap_or_else(|| KeyPair::generate(&mut OsRng)),
            remote_public: self.remote_public,
            psk: self.psk,
            prologue: self.prologue.unwrap_or_default(),
        };
        Ok(NoiseStateMachine::new(config, up, down))
    }
}

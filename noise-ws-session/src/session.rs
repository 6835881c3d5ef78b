//! Role-aware Noise XXpsk3 session driver.
//!
//! `NoiseStateMachine` drives a [`Handshake`] through the three-message
//! XXpsk3 pattern, replying automatically whenever the pattern requires it,
//! and switches to the split transport ciphers once the handshake is done.
//! All output leaves through the two [`Sink`]s given at construction.

use std::fmt;
use std::mem;

use noise_ws_handshake::{
    Error, Handshake, HandshakeAction, KeyPair, MAX_MESSAGE_LEN, MAX_TRANSPORT_PAYLOAD_LEN,
    PreSharedKey, ProtocolName, PublicKey, Role, TransportState,
};
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use crate::sink::Sink;

/// Payloads that may wait for the handshake before `Send` fails with
/// [`Error::SendQueueFull`].
pub const MAX_PENDING_SENDS: usize = 64;

/// One call into [`NoiseStateMachine::handle_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    /// Move the handshake forward without application data.
    Advance,
    /// Application plaintext to send. May be empty.
    Send(&'a [u8]),
    /// A wire message received from the peer.
    Receive(&'a [u8]),
}

impl<'a> Input<'a> {
    /// Map the `(bytes, send_mode)` pair used by callback-style bindings.
    ///
    /// Absent bytes always mean [`Input::Advance`].
    pub fn from_parts(bytes: Option<&'a [u8]>, send_mode: bool) -> Self {
        match (bytes, send_mode) {
            (None, _) => Input::Advance,
            (Some(bytes), true) => Input::Send(bytes),
            (Some(bytes), false) => Input::Receive(bytes),
        }
    }
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeStatus {
    Uninitialized,
    HandshakeInProgress,
    HandshakeCompleted,
    /// Terminal. Entered on any fatal error.
    Failed,
}

impl HandshakeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeStatus::Uninitialized => "Uninitialized",
            HandshakeStatus::HandshakeInProgress => "HandshakeInProgress",
            HandshakeStatus::HandshakeCompleted => "HandshakeCompleted",
            HandshakeStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for HandshakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal state: the handshake until completion, then only the transport.
enum SessionState {
    /// No handshake message sent or received yet.
    Uninitialized(Box<Handshake>),
    InProgress(Box<Handshake>),
    Completed(Box<TransportState>),
    /// Session is dead; all key material has been dropped.
    Failed,
}

impl SessionState {
    fn status(&self) -> HandshakeStatus {
        match self {
            SessionState::Uninitialized(_) => HandshakeStatus::Uninitialized,
            SessionState::InProgress(_) => HandshakeStatus::HandshakeInProgress,
            SessionState::Completed(_) => HandshakeStatus::HandshakeCompleted,
            SessionState::Failed => HandshakeStatus::Failed,
        }
    }
}

/// Everything fixed at construction.
pub(crate) struct SessionConfig {
    pub(crate) role: Role,
    pub(crate) protocol: ProtocolName,
    pub(crate) local_keypair: KeyPair,
    pub(crate) remote_public: Option<PublicKey>,
    pub(crate) psk: PreSharedKey,
    pub(crate) prologue: Vec<u8>,
}

/// A single Noise XXpsk3 session over a message-oriented transport.
///
/// `up` receives decrypted plaintext, `down` receives wire messages. Calls
/// must be serialized per session; independent sessions share nothing.
pub struct NoiseStateMachine<U, D> {
    role: Role,
    local_public: PublicKey,
    state: SessionState,
    /// Plaintext submitted before the handshake completed, in order.
    pending: Vec<Zeroizing<Vec<u8>>>,
    up: U,
    down: D,
}

impl<U: Sink, D: Sink> NoiseStateMachine<U, D> {
    pub(crate) fn new(config: SessionConfig, up: U, down: D) -> Self {
        let mut handshake = Handshake::new(
            config.protocol,
            config.role,
            &config.local_keypair,
            &config.psk,
            &config.prologue,
        );
        if let Some(remote) = config.remote_public {
            handshake = handshake.expect_remote_static(remote);
        }
        debug!(role = ?config.role, protocol = %config.protocol, "session created");

        Self {
            role: config.role,
            local_public: config.local_keypair.public,
            state: SessionState::Uninitialized(Box::new(handshake)),
            pending: Vec::new(),
            up,
            down,
        }
    }

    /// Single entry point for inbound wire bytes and outbound plaintext.
    ///
    /// Fatal errors move the session to [`HandshakeStatus::Failed`], after
    /// which every call returns [`Error::SessionFailed`].
    /// [`Error::MessageTooLarge`] and [`Error::SendQueueFull`] reject only
    /// the offending payload.
    pub fn handle_connection(&mut self, input: Input<'_>) -> Result<(), Error> {
        if matches!(self.state, SessionState::Failed) {
            return Err(Error::SessionFailed);
        }

        let result = match input {
            Input::Advance => self.advance(),
            Input::Send(payload) => self.send(payload),
            Input::Receive(message) => self.receive(message),
        }
        .and_then(|()| self.settle());

        if let Err(err) = result {
            if err.is_fatal() {
                self.fail(err);
            }
        }
        result
    }

    pub fn state(&self) -> HandshakeStatus {
        self.state.status()
    }

    /// The state name: `"Uninitialized"`, `"HandshakeInProgress"`,
    /// `"HandshakeCompleted"` or `"Failed"`.
    pub fn get_handshake_state(&self) -> &'static str {
        self.state.status().as_str()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn local_public(&self) -> &PublicKey {
        &self.local_public
    }

    /// The peer's authenticated static key, once the handshake completed.
    pub fn remote_static(&self) -> Option<&PublicKey> {
        match &self.state {
            SessionState::Completed(transport) => Some(transport.remote_static()),
            _ => None,
        }
    }

    /// Channel binding value, once the handshake completed.
    pub fn handshake_hash(&self) -> Option<&[u8; 32]> {
        match &self.state {
            SessionState::Completed(transport) => Some(transport.handshake_hash()),
            _ => None,
        }
    }

    /// Number of plaintexts waiting for the handshake to complete.
    pub fn pending_sends(&self) -> usize {
        self.pending.len()
    }

    /// Tear the session down. Key material is zeroized as it is dropped.
    pub fn free(self) {
        debug!(role = ?self.role, state = %self.state.status(), "session freed");
    }

    fn advance(&mut self) -> Result<(), Error> {
        let Self { state, down, .. } = self;
        match state {
            SessionState::Uninitialized(handshake) | SessionState::InProgress(handshake) => {
                if handshake.next_action() == HandshakeAction::WriteMessage {
                    write_handshake(handshake, down)
                } else {
                    debug!(cursor = handshake.cursor(), "waiting for peer, nothing to send");
                    Ok(())
                }
            }
            SessionState::Completed(_) => Ok(()),
            SessionState::Failed => Err(Error::SessionFailed),
        }
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), Error> {
        if payload.len() > MAX_TRANSPORT_PAYLOAD_LEN {
            return Err(Error::MessageTooLarge);
        }

        let Self {
            state,
            pending,
            down,
            ..
        } = self;
        match state {
            SessionState::Completed(transport) => write_transport(transport, payload, down),
            SessionState::Uninitialized(handshake) | SessionState::InProgress(handshake) => {
                if pending.len() >= MAX_PENDING_SENDS {
                    return Err(Error::SendQueueFull);
                }
                pending.push(Zeroizing::new(payload.to_vec()));
                debug!(pending = pending.len(), "handshake running, payload queued");
                if handshake.next_action() == HandshakeAction::WriteMessage {
                    write_handshake(handshake, down)?;
                }
                Ok(())
            }
            SessionState::Failed => Err(Error::SessionFailed),
        }
    }

    fn receive(&mut self, message: &[u8]) -> Result<(), Error> {
        if message.len() > MAX_MESSAGE_LEN {
            return Err(Error::MalformedMessage);
        }

        let Self {
            state, up, down, ..
        } = self;
        match state {
            SessionState::Uninitialized(handshake) | SessionState::InProgress(handshake) => {
                let mut payload = Zeroizing::new(vec![0u8; message.len()]);
                let len = handshake.read_message(message, &mut payload)?;
                debug!(
                    cursor = handshake.cursor(),
                    len = message.len(),
                    "received handshake message"
                );
                if len > 0 {
                    up.deliver(&payload[..len])?;
                }
                if handshake.next_action() == HandshakeAction::WriteMessage {
                    write_handshake(handshake, down)?;
                }
                Ok(())
            }
            SessionState::Completed(transport) => {
                let mut plaintext = Zeroizing::new(vec![0u8; message.len()]);
                let len = transport.read_message(message, &mut plaintext)?;
                trace!(len, "decrypted transport message");
                up.deliver(&plaintext[..len])
            }
            SessionState::Failed => Err(Error::SessionFailed),
        }
    }

    /// Apply state transitions after a handshake message moved the cursor.
    fn settle(&mut self) -> Result<(), Error> {
        let state = mem::replace(&mut self.state, SessionState::Failed);
        let (next, completed) = match state {
            SessionState::Uninitialized(handshake) | SessionState::InProgress(handshake)
                if handshake.is_complete() =>
            {
                let transport = (*handshake).into_transport()?;
                debug!(role = ?self.role, "handshake completed");
                (SessionState::Completed(Box::new(transport)), true)
            }
            SessionState::Uninitialized(handshake) if handshake.cursor() > 0 => {
                debug!(role = ?self.role, "handshake started");
                (SessionState::InProgress(handshake), false)
            }
            other => (other, false),
        };
        self.state = next;

        if completed {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<(), Error> {
        let pending = mem::take(&mut self.pending);
        let Self { state, down, .. } = self;
        let SessionState::Completed(transport) = state else {
            return Err(Error::HandshakeOrderViolation);
        };
        if !pending.is_empty() {
            debug!(count = pending.len(), "flushing queued payloads");
        }
        for payload in &pending {
            write_transport(transport, payload, down)?;
        }
        Ok(())
    }

    fn fail(&mut self, err: Error) {
        warn!(role = ?self.role, state = %self.state.status(), error = %err, "session failed");
        self.state = SessionState::Failed;
        self.pending.clear();
    }
}

fn write_handshake(handshake: &mut Handshake, down: &mut impl Sink) -> Result<(), Error> {
    let mut wire = vec![0u8; handshake.next_message_overhead()];
    let len = handshake.write_message(&[], &mut wire)?;
    debug!(cursor = handshake.cursor(), len, "sent handshake message");
    down.deliver(&wire[..len])
}

fn write_transport(
    transport: &mut TransportState,
    payload: &[u8],
    down: &mut impl Sink,
) -> Result<(), Error> {
    let mut wire = vec![0u8; payload.len() + transport.overhead()];
    let len = transport.write_message(payload, &mut wire)?;
    trace!(len, "encrypted transport message");
    down.deliver(&wire[..len])
}

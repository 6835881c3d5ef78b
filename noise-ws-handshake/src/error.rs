use thiserror::Error;

/// Errors that can occur during the Noise handshake or transport phase.
///
/// Every variant except [`Error::BufferTooSmall`], [`Error::MessageTooLarge`]
/// and [`Error::SendQueueFull`] is fatal to the session that produced it:
/// the only recovery is a fresh handshake with new ephemeral keys.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An AEAD tag did not verify.
    #[error("authentication failed")]
    AuthenticationFailure,
    /// The handshake or transport message is malformed or truncated.
    #[error("malformed message")]
    MalformedMessage,
    /// An operation was attempted out of sequence or by the wrong role.
    #[error("handshake operation out of order")]
    HandshakeOrderViolation,
    /// The protocol name does not describe the supported Noise suite.
    #[error("protocol name does not match Noise_XXpsk3_25519_ChaChaPoly_BLAKE2s")]
    ProtocolMismatch,
    /// The nonce counter reached the reserved value 2^64-1.
    #[error("nonce counter exhausted")]
    NonceExhausted,
    /// A public key is invalid (low-order point).
    #[error("invalid public key")]
    InvalidKey,
    /// The peer's static key differs from the one expected ahead of time.
    #[error("remote static key does not match the expected identity")]
    RemoteIdentityMismatch,
    /// The provided output buffer is too small.
    #[error("output buffer too small")]
    BufferTooSmall,
    /// The payload does not fit in a single Noise message.
    #[error("payload exceeds the maximum Noise message size")]
    MessageTooLarge,
    /// The session already failed and must be torn down.
    #[error("session has failed and cannot be used")]
    SessionFailed,
    /// An output sink can no longer accept bytes.
    #[error("output sink closed")]
    SinkClosed,
    /// Too many payloads are already waiting for the handshake to complete.
    #[error("send queue full")]
    SendQueueFull,
}

impl Error {
    /// Whether the error leaves the producing state unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::BufferTooSmall | Error::MessageTooLarge | Error::SendQueueFull
        )
    }
}

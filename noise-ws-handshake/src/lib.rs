#![deny(unsafe_code)]

//! # noise-ws-handshake
//!
//! A pure, sans-IO implementation of the Noise XXpsk3 handshake pattern
//! with a fixed ciphersuite: `Noise_XXpsk3_25519_ChaChaPoly_BLAKE2s`.
//!
//! Both peers hold a static X25519 key pair and a shared 32-byte pre-shared
//! key. Static keys are exchanged encrypted during the handshake; the PSK is
//! mixed in on the final message.
//!
//! ## Security Properties
//!
//! - X25519 low-order point rejection
//! - Key material zeroized on drop
//! - Constant-time comparisons of secret-dependent values
//! - No panics on network input
//! - Fixed ciphersuite (no algorithm negotiation)

pub mod crypto;
pub mod error;
pub mod keys;
pub mod protocol;

mod cipher_state;
mod handshake;
mod symmetric_state;
mod transport;

/// Largest Noise message, handshake or transport, in bytes.
pub const MAX_MESSAGE_LEN: usize = 65535;

pub use error::Error;
pub use handshake::{Handshake, HandshakeAction, Role};
pub use keys::{KeyPair, PSK_LEN, PreSharedKey, PublicKey, StaticSecret};
pub use protocol::{PROTOCOL_NAME, ProtocolName};
pub use transport::{MAX_TRANSPORT_PAYLOAD_LEN, TransportState};

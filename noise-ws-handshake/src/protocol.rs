//! Noise protocol name parsing.
//!
//! The protocol name is hashed into the initial handshake state, so both
//! peers must agree on it byte for byte. Only one suite is implemented; any
//! other name is refused up front instead of failing later at the first
//! authentication check.

use core::fmt;
use core::str::FromStr;

use crate::error::Error;

/// The only supported suite.
pub const PROTOCOL_NAME: &str = "Noise_XXpsk3_25519_ChaChaPoly_BLAKE2s";

const PATTERN: &str = "XXpsk3";
const DH: &str = "25519";
const CIPHER: &str = "ChaChaPoly";
const HASH: &str = "BLAKE2s";

/// A validated Noise protocol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolName {
    name: &'static str,
}

impl ProtocolName {
    /// Parse `Noise_<pattern>_<dh>_<cipher>_<hash>`, accepting only the
    /// supported suite.
    pub fn parse(name: &str) -> Result<Self, Error> {
        let mut parts = name.split('_');
        let fields = [
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ];
        if parts.next().is_some() {
            return Err(Error::ProtocolMismatch);
        }
        match fields {
            [Some("Noise"), Some(PATTERN), Some(DH), Some(CIPHER), Some(HASH)] => Ok(Self::default()),
            _ => Err(Error::ProtocolMismatch),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.name
    }
}

impl Default for ProtocolName {
    fn default() -> Self {
        Self {
            name: PROTOCOL_NAME,
        }
    }
}

impl FromStr for ProtocolName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProtocolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

//! Static key material and the pre-shared key.

use rand_core::CryptoRngCore;
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret as DalekStaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::x25519::DH_LEN;

/// Length of the pre-shared key in bytes.
pub const PSK_LEN: usize = 32;

/// An X25519 secret key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct StaticSecret(DalekStaticSecret);

impl StaticSecret {
    pub fn from_bytes(bytes: [u8; DH_LEN]) -> Self {
        Self(DalekStaticSecret::from(bytes))
    }

    pub(crate) fn from_dalek(secret: DalekStaticSecret) -> Self {
        Self(secret)
    }

    pub fn to_bytes(&self) -> [u8; DH_LEN] {
        self.0.to_bytes()
    }

    pub(crate) fn inner(&self) -> &DalekStaticSecret {
        &self.0
    }

    /// The public key belonging to this secret.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(DalekPublicKey::from(&self.0).to_bytes())
    }
}

impl core::fmt::Debug for StaticSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("StaticSecret(..)")
    }
}

/// An X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; DH_LEN]);

impl PublicKey {
    pub const LEN: usize = DH_LEN;

    pub fn from_bytes(bytes: [u8; DH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DH_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = crate::Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; DH_LEN]>::try_from(bytes)
            .map(Self)
            .map_err(|_| crate::Error::InvalidKey)
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PublicKey({:02x?})", &self.0[..4])
    }
}

/// A long-lived static keypair.
#[derive(Clone)]
pub struct KeyPair {
    pub secret: StaticSecret,
    pub public: PublicKey,
}

impl KeyPair {
    pub fn generate(rng: &mut impl CryptoRngCore) -> Self {
        Self::from_secret(StaticSecret(DalekStaticSecret::random_from_rng(rng)))
    }

    pub fn from_secret(secret: StaticSecret) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Rebuild a keypair from raw secret bytes, deriving the public half.
    pub fn from_secret_bytes(bytes: [u8; DH_LEN]) -> Self {
        Self::from_secret(StaticSecret::from_bytes(bytes))
    }
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// A 32-byte secret shared out-of-band by both peers.
///
/// Mixed into the handshake at the final message and never transmitted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PreSharedKey([u8; PSK_LEN]);

impl PreSharedKey {
    pub fn from_bytes(bytes: [u8; PSK_LEN]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; PSK_LEN] {
        &self.0
    }
}

impl From<[u8; PSK_LEN]> for PreSharedKey {
    fn from(bytes: [u8; PSK_LEN]) -> Self {
        Self(bytes)
    }
}

impl core::fmt::Debug for PreSharedKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PreSharedKey(..)")
    }
}

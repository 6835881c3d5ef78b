use rand_core::CryptoRngCore;
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret as DalekStaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;

/// DH public key and output length in bytes.
pub const DH_LEN: usize = 32;

/// Output of an X25519 agreement, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; DH_LEN]);

impl core::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; DH_LEN] {
        &self.0
    }
}

/// Fresh X25519 secret plus its public key bytes.
pub fn generate_keypair(rng: &mut impl CryptoRngCore) -> (DalekStaticSecret, [u8; DH_LEN]) {
    let secret = DalekStaticSecret::random_from_rng(rng);
    let public = DalekPublicKey::from(&secret).to_bytes();
    (secret, public)
}

/// X25519 agreement between a local secret and raw remote public key bytes.
///
/// An all-zero result means the peer sent a low-order point; that is
/// rejected with [`Error::InvalidKey`] (RFC 7748 §6.1).
pub fn dh(local: &DalekStaticSecret, remote: &[u8; DH_LEN]) -> Result<SharedSecret, Error> {
    let shared = local.diffie_hellman(&DalekPublicKey::from(*remote));
    if bool::from(shared.as_bytes().ct_eq(&[0u8; DH_LEN])) {
        return Err(Error::InvalidKey);
    }
    Ok(SharedSecret(*shared.as_bytes()))
}

//! Cryptographic primitives for `Noise_XXpsk3_25519_ChaChaPoly_BLAKE2s`.
//!
//! - [`aead`]: ChaCha20-Poly1305 sealing, opening and rekey
//! - [`hash`]: BLAKE2s, HMAC-BLAKE2s and the Noise HKDF
//! - [`x25519`]: X25519 agreement with low-order point rejection

pub mod aead;
pub mod hash;
pub mod x25519;

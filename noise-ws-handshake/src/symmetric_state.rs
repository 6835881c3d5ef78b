use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::cipher_state::CipherState;
use crate::crypto::aead::AEAD_KEY_LEN;
use crate::crypto::hash::{self, HASH_LEN, Okm};
use crate::error::Error;

/// Noise SymmetricState: chaining key, handshake hash and the handshake
/// cipher.
///
/// Both peers must feed identical bytes in identical order, otherwise the
/// first AEAD check after the divergence fails.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricState {
    cipher: CipherState,
    ck: Zeroizing<[u8; HASH_LEN]>,
    h: [u8; HASH_LEN],
}

impl SymmetricState {
    /// `h` is the protocol name zero-padded to `HASH_LEN`, or its hash when
    /// longer; `ck` starts equal to `h`.
    pub fn initialize(protocol_name: &str) -> Self {
        let name = protocol_name.as_bytes();
        let h = if name.len() <= HASH_LEN {
            let mut h = [0u8; HASH_LEN];
            h[..name.len()].copy_from_slice(name);
            h
        } else {
            hash::hash(name)
        };

        Self {
            cipher: CipherState::empty(),
            ck: Zeroizing::new(h),
            h,
        }
    }

    /// `(ck, k) = HKDF(ck, ikm, 2)`; the cipher nonce restarts at zero.
    pub fn mix_key(&mut self, input_key_material: &[u8]) {
        let (ck, k) = hash::hkdf2(&self.ck, input_key_material);
        *self.ck = *ck;
        self.cipher.initialize_key(&truncate_key(&k));
    }

    /// `h = HASH(h || data)`
    pub fn mix_hash(&mut self, data: &[u8]) {
        self.h = hash::hash_parts(&[&self.h, data]);
    }

    /// `(ck, t, k) = HKDF(ck, ikm, 3)`, then `MixHash(t)` and install `k`.
    pub fn mix_key_and_hash(&mut self, input_key_material: &[u8]) {
        let (ck, temp_h, k) = hash::hkdf3(&self.ck, input_key_material);
        *self.ck = *ck;
        self.mix_hash(temp_h.as_slice());
        self.cipher.initialize_key(&truncate_key(&k));
    }

    pub fn has_key(&self) -> bool {
        self.cipher.has_key()
    }

    /// Bytes [`Self::encrypt_and_hash`] adds to its input right now.
    pub fn overhead(&self) -> usize {
        self.cipher.overhead()
    }

    /// Encrypt with `h` as associated data, then mix the ciphertext into `h`.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        let len = self.cipher.encrypt_with_ad(&self.h, plaintext, out)?;
        self.mix_hash(&out[..len]);
        Ok(len)
    }

    /// Decrypt with `h` as associated data, then mix the ciphertext into `h`.
    ///
    /// `h` is left untouched when authentication fails.
    pub fn decrypt_and_hash(&mut self, ciphertext: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        let len = self.cipher.decrypt_with_ad(&self.h, ciphertext, out)?;
        self.mix_hash(ciphertext);
        Ok(len)
    }

    pub fn handshake_hash(&self) -> &[u8; HASH_LEN] {
        &self.h
    }

    /// Derive the two one-way transport ciphers from the final chaining key.
    ///
    /// Returns `(initiator -> responder, responder -> initiator)`. Consuming
    /// `self` makes reuse after the split impossible.
    pub fn split(self) -> (CipherState, CipherState) {
        let (k1, k2) = hash::hkdf2(&self.ck, &[]);

        let mut c1 = CipherState::empty();
        c1.initialize_key(&truncate_key(&k1));
        let mut c2 = CipherState::empty();
        c2.initialize_key(&truncate_key(&k2));
        (c1, c2)
    }
}

/// HASHLEN and the cipher key length are both 32 here, so this is a copy.
fn truncate_key(okm: &Okm) -> Zeroizing<[u8; AEAD_KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; AEAD_KEY_LEN]);
    key.copy_from_slice(&okm[..AEAD_KEY_LEN]);
    key
}

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::aead::{self, AEAD_KEY_LEN, AEAD_TAG_LEN};
use crate::error::Error;

/// Noise CipherState: an optional AEAD key and a 64-bit nonce counter.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherState {
    key: Option<[u8; AEAD_KEY_LEN]>,
    #[zeroize(skip)]
    nonce: u64,
}

impl CipherState {
    pub fn empty() -> Self {
        Self {
            key: None,
            nonce: 0,
        }
    }

    /// Install a key and restart the nonce counter at zero.
    pub fn initialize_key(&mut self, key: &[u8; AEAD_KEY_LEN]) {
        self.key = Some(*key);
        self.nonce = 0;
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Bytes added to a plaintext by [`Self::encrypt_with_ad`].
    pub fn overhead(&self) -> usize {
        if self.has_key() { AEAD_TAG_LEN } else { 0 }
    }

    /// The nonce the next operation will use.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// The nonce only advances after the AEAD call succeeds. 2^64-1 is
    /// reserved for rekeying and is never used for messages.
    fn next_nonce(&self) -> Result<u64, Error> {
        if self.nonce == u64::MAX {
            return Err(Error::NonceExhausted);
        }
        Ok(self.nonce)
    }

    /// Without a key the plaintext is copied through unchanged.
    pub fn encrypt_with_ad(
        &mut self,
        ad: &[u8],
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let Some(key) = &self.key else {
            return copy_through(plaintext, out);
        };
        let nonce = self.next_nonce()?;
        let len = aead::seal(key, nonce, ad, plaintext, out)?;
        self.nonce += 1;
        Ok(len)
    }

    /// Without a key the ciphertext is copied through unchanged.
    pub fn decrypt_with_ad(
        &mut self,
        ad: &[u8],
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let Some(key) = &self.key else {
            return copy_through(ciphertext, out);
        };
        let nonce = self.next_nonce()?;
        let len = aead::open(key, nonce, ad, ciphertext, out)?;
        self.nonce += 1;
        Ok(len)
    }

    /// Replace the key with REKEY(k). The nonce counter is kept.
    pub fn rekey(&mut self) -> Result<(), Error> {
        if let Some(key) = self.key.as_mut() {
            let mut next = aead::rekey(key)?;
            key.copy_from_slice(&next);
            next.zeroize();
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }
}

fn copy_through(input: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    let dst = out.get_mut(..input.len()).ok_or(Error::BufferTooSmall)?;
    dst.copy_from_slice(input);
    Ok(input.len())
}

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use zeroize::Zeroizing;

use crate::error::Error;

/// AEAD key length in bytes.
pub const AEAD_KEY_LEN: usize = 32;
/// AEAD tag length in bytes.
pub const AEAD_TAG_LEN: usize = 16;
/// AEAD nonce length in bytes.
pub const AEAD_NONCE_LEN: usize = 12;

/// Encrypt `plaintext` into `out`, appending the 16-byte tag.
///
/// Returns the ciphertext length (`plaintext.len() + AEAD_TAG_LEN`).
pub fn seal(
    key: &[u8; AEAD_KEY_LEN],
    nonce: u64,
    ad: &[u8],
    plaintext: &[u8],
    out: &mut [u8],
) -> Result<usize, Error> {
    let total = plaintext
        .len()
        .checked_add(AEAD_TAG_LEN)
        .ok_or(Error::MessageTooLarge)?;
    if out.len() < total {
        return Err(Error::BufferTooSmall);
    }

    let (body, rest) = out.split_at_mut(plaintext.len());
    body.copy_from_slice(plaintext);

    let cipher = ChaCha20Poly1305::new(key.into());
    let tag = cipher
        .encrypt_in_place_detached(&Nonce::from(nonce_bytes(nonce)), ad, body)
        .map_err(|_| Error::MessageTooLarge)?;
    rest[..AEAD_TAG_LEN].copy_from_slice(&tag);

    Ok(total)
}

/// Verify and decrypt `ciphertext` (body || tag) into `out`.
///
/// `out` only needs room for the plaintext. Nothing is written to `out`
/// unless the tag verifies.
pub fn open(
    key: &[u8; AEAD_KEY_LEN],
    nonce: u64,
    ad: &[u8],
    ciphertext: &[u8],
    out: &mut [u8],
) -> Result<usize, Error> {
    let plaintext_len = ciphertext
        .len()
        .checked_sub(AEAD_TAG_LEN)
        .ok_or(Error::MalformedMessage)?;
    if out.len() < plaintext_len {
        return Err(Error::BufferTooSmall);
    }

    let (body, tag) = ciphertext.split_at(plaintext_len);
    let mut scratch = Zeroizing::new(body.to_vec());

    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt_in_place_detached(
            &Nonce::from(nonce_bytes(nonce)),
            ad,
            &mut scratch,
            Tag::from_slice(tag),
        )
        .map_err(|_| Error::AuthenticationFailure)?;

    out[..plaintext_len].copy_from_slice(&scratch);
    Ok(plaintext_len)
}

/// REKEY(k) = ENCRYPT(k, 2^64-1, "", zeros), truncated to the key length.
pub fn rekey(key: &[u8; AEAD_KEY_LEN]) -> Result<[u8; AEAD_KEY_LEN], Error> {
    let zeros = [0u8; AEAD_KEY_LEN];
    let mut sealed = Zeroizing::new([0u8; AEAD_KEY_LEN + AEAD_TAG_LEN]);
    seal(key, u64::MAX, &[], &zeros, sealed.as_mut_slice())?;

    let mut next = [0u8; AEAD_KEY_LEN];
    next.copy_from_slice(&sealed[..AEAD_KEY_LEN]);
    Ok(next)
}

/// ChaChaPoly nonce: 32 bits of zeros, then the counter little-endian.
fn nonce_bytes(n: u64) -> [u8; AEAD_NONCE_LEN] {
    let mut nonce = [0u8; AEAD_NONCE_LEN];
    nonce[4..].copy_from_slice(&n.to_le_bytes());
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; AEAD_KEY_LEN] = [7u8; AEAD_KEY_LEN];

    fn sealed(nonce: u64, ad: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; plaintext.len() + AEAD_TAG_LEN];
        let len = seal(&KEY, nonce, ad, plaintext, &mut out).unwrap();
        out.truncate(len);
        out
    }

    #[test]
    fn seal_then_open() {
        let ct = sealed(3, b"hash", b"jsonrpc");
        let mut pt = [0u8; 7];
        let len = open(&KEY, 3, b"hash", &ct, &mut pt).unwrap();
        assert_eq!(&pt[..len], b"jsonrpc");
    }

    #[test]
    fn nonce_layout_is_little_endian_after_zero_prefix() {
        assert_eq!(nonce_bytes(1), [0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            nonce_bytes(0x0102_0304_0506_0708),
            [0, 0, 0, 0, 8, 7, 6, 5, 4, 3, 2, 1]
        );
    }

    #[test]
    fn open_rejects_wrong_nonce_and_ad() {
        let ct = sealed(0, b"ad", b"payload");
        let mut pt = [0u8; 16];
        assert_eq!(
            open(&KEY, 1, b"ad", &ct, &mut pt),
            Err(Error::AuthenticationFailure)
        );
        assert_eq!(
            open(&KEY, 0, b"other", &ct, &mut pt),
            Err(Error::AuthenticationFailure)
        );
    }

    #[test]
    fn open_leaves_output_untouched_on_failure() {
        let mut ct = sealed(0, b"", b"secret");
        ct[0] ^= 0x80;
        let mut pt = [0xAAu8; 6];
        assert!(open(&KEY, 0, b"", &ct, &mut pt).is_err());
        assert_eq!(pt, [0xAA; 6]);
    }

    #[test]
    fn short_ciphertext_is_malformed() {
        let mut pt = [0u8; 4];
        assert_eq!(
            open(&KEY, 0, b"", &[0u8; AEAD_TAG_LEN - 1], &mut pt),
            Err(Error::MalformedMessage)
        );
    }

    #[test]
    fn seal_needs_room_for_tag() {
        let mut out = [0u8; 4 + AEAD_TAG_LEN - 1];
        assert_eq!(
            seal(&KEY, 0, b"", b"abcd", &mut out),
            Err(Error::BufferTooSmall)
        );
    }

    #[test]
    fn empty_plaintext_is_just_a_tag() {
        let ct = sealed(9, b"", b"");
        assert_eq!(ct.len(), AEAD_TAG_LEN);
        assert_eq!(open(&KEY, 9, b"", &ct, &mut []), Ok(0));
    }

    #[test]
    fn rekey_is_deterministic_and_fresh() {
        let next = rekey(&KEY).unwrap();
        assert_eq!(next, rekey(&KEY).unwrap());
        assert_ne!(next, KEY);
    }
}

use blake2::{Blake2s256, Digest};
use zeroize::Zeroizing;

/// Hash output length (BLAKE2s = 32 bytes).
pub const HASH_LEN: usize = 32;

/// BLAKE2s block length, used by HMAC padding.
const BLOCK_LEN: usize = 64;

/// A 32-byte secret derived by HKDF, zeroized on drop.
pub type Okm = Zeroizing<[u8; HASH_LEN]>;

/// BLAKE2s-256 over the concatenation of `parts`.
pub fn hash_parts(parts: &[&[u8]]) -> [u8; HASH_LEN] {
    let mut hasher = Blake2s256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// BLAKE2s-256 of a single input.
pub fn hash(input: &[u8]) -> [u8; HASH_LEN] {
    hash_parts(&[input])
}

/// HMAC-BLAKE2s (RFC 2104) over the concatenation of `parts`.
///
/// This is the HMAC construction Noise specifies, not BLAKE2's keyed mode.
pub fn hmac(key: &[u8; HASH_LEN], parts: &[&[u8]]) -> Okm {
    let mut ipad = Zeroizing::new([0x36u8; BLOCK_LEN]);
    let mut opad = Zeroizing::new([0x5cu8; BLOCK_LEN]);
    for (i, k) in key.iter().enumerate() {
        ipad[i] ^= k;
        opad[i] ^= k;
    }

    let mut inner = Blake2s256::new();
    inner.update(ipad.as_slice());
    for part in parts {
        inner.update(part);
    }
    let inner = Zeroizing::new(<[u8; HASH_LEN]>::from(inner.finalize()));

    let mut outer = Blake2s256::new();
    outer.update(opad.as_slice());
    outer.update(inner.as_slice());
    Zeroizing::new(outer.finalize().into())
}

/// Noise HKDF producing `N` (2 or 3) outputs:
///
/// ```text
/// temp = HMAC(ck, ikm)
/// out1 = HMAC(temp, 0x01)
/// outi = HMAC(temp, out(i-1) || i)
/// ```
fn hkdf<const N: usize>(chaining_key: &[u8; HASH_LEN], ikm: &[u8]) -> [Okm; N] {
    let temp = hmac(chaining_key, &[ikm]);
    let mut outputs: [Okm; N] = core::array::from_fn(|_| Zeroizing::new([0u8; HASH_LEN]));
    for i in 0..N {
        let counter = [(i + 1) as u8];
        outputs[i] = if i == 0 {
            hmac(&temp, &[&counter])
        } else {
            let prev = Zeroizing::new(*outputs[i - 1]);
            hmac(&temp, &[prev.as_slice(), &counter])
        };
    }
    outputs
}

/// HKDF with two outputs, used by `MixKey` and `Split`.
pub fn hkdf2(chaining_key: &[u8; HASH_LEN], ikm: &[u8]) -> (Okm, Okm) {
    let [a, b] = hkdf::<2>(chaining_key, ikm);
    (a, b)
}

/// HKDF with three outputs, used by `MixKeyAndHash`.
pub fn hkdf3(chaining_key: &[u8; HASH_LEN], ikm: &[u8]) -> (Okm, Okm, Okm) {
    let [a, b, c] = hkdf::<3>(chaining_key, ikm);
    (a, b, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_parts_matches_concatenation() {
        assert_eq!(hash_parts(&[b"noise", b"_xx"]), hash(b"noise_xx"));
    }

    #[test]
    fn blake2s_empty_vector() {
        // RFC 7693 BLAKE2s-256("")
        assert_eq!(
            hash(b""),
            [
                0x69, 0x21, 0x7a, 0x30, 0x79, 0x90, 0x80, 0x94, 0xe1, 0x11, 0x21, 0xd0, 0x42, 0x35,
                0x4a, 0x7c, 0x1f, 0x55, 0xb6, 0x48, 0x2c, 0xa1, 0xa5, 0x1e, 0x1b, 0x25, 0x0d, 0xfd,
                0x1e, 0xd0, 0xee, 0xf9,
            ]
        );
    }

    #[test]
    fn hmac_splits_parts_transparently() {
        let key = [0x11u8; HASH_LEN];
        assert_eq!(*hmac(&key, &[b"ab", b"cd"]), *hmac(&key, &[b"abcd"]));
        assert_ne!(*hmac(&key, &[b"abcd"]), *hmac(&[0x12; HASH_LEN], &[b"abcd"]));
    }

    #[test]
    fn hkdf3_extends_hkdf2() {
        let ck = [0x01u8; HASH_LEN];
        let (a2, b2) = hkdf2(&ck, b"ikm");
        let (a3, b3, c3) = hkdf3(&ck, b"ikm");
        assert_eq!(*a2, *a3);
        assert_eq!(*b2, *b3);
        assert_ne!(*b3, *c3);
    }

    #[test]
    fn hkdf_chains_previous_output() {
        let ck = [0x05u8; HASH_LEN];
        let (a, b) = hkdf2(&ck, b"");
        let temp = hmac(&ck, &[b""]);
        assert_eq!(*a, *hmac(&temp, &[&[1u8]]));
        assert_eq!(*b, *hmac(&temp, &[a.as_slice(), &[2u8]]));
    }
}

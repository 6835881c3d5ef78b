use rand_core::{CryptoRngCore, OsRng};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::MAX_MESSAGE_LEN;
use crate::crypto::aead::AEAD_TAG_LEN;
use crate::crypto::hash::HASH_LEN;
use crate::crypto::x25519::{self, DH_LEN};
use crate::error::Error;
use crate::keys::{KeyPair, PreSharedKey, PublicKey, StaticSecret};
use crate::protocol::ProtocolName;
use crate::symmetric_state::SymmetricState;
use crate::transport::TransportState;

/// Which side of the handshake this peer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Sends the first message.
    Initiator,
    /// Answers the first message.
    Responder,
}

impl Role {
    fn writes(self, message_index: usize) -> bool {
        match self {
            Role::Initiator => message_index % 2 == 0,
            Role::Responder => message_index % 2 == 1,
        }
    }
}

/// The action the caller must take to advance the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Call `write_message()` to produce the next handshake message.
    WriteMessage,
    /// Call `read_message()` with the peer's handshake message.
    ReadMessage,
    /// The handshake is complete. Call `into_transport()`.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    E,
    S,
    Ee,
    Es,
    Se,
    Psk,
}

/// ```text
/// XXpsk3:
///   -> e
///   <- e, ee, s, es
///   -> s, se, psk
/// ```
const XXPSK3: [&[Token]; 3] = [
    &[Token::E],
    &[Token::E, Token::Ee, Token::S, Token::Es],
    &[Token::S, Token::Se, Token::Psk],
];

/// A `Noise_XXpsk3_25519_ChaChaPoly_BLAKE2s` handshake.
///
/// Message layouts, for a payload of `N` bytes:
///
/// ```text
/// 1: e(32) || enc(payload)(N+16)
/// 2: e(32) || enc(s)(48) || enc(payload)(N+16)
/// 3: enc(s)(48) || enc(payload)(N+16)
/// ```
///
/// The payload of message 1 is encrypted because PSK handshakes pass every
/// ephemeral key through `MixKey`. It is still only protected by a key both
/// sides derive from public values and should not carry secrets.
///
/// Any failed read or write poisons the handshake; every later call fails
/// with [`Error::HandshakeOrderViolation`].
pub struct Handshake {
    /// Option so that `into_transport()` can `.take()` it.
    symmetric: Option<SymmetricState>,
    cursor: usize,
    failed: bool,
    role: Role,
    s: StaticSecret,
    s_pub: PublicKey,
    e: Option<StaticSecret>,
    e_pub: Option<[u8; DH_LEN]>,
    rs: Option<PublicKey>,
    re: Option<[u8; DH_LEN]>,
    expected_rs: Option<PublicKey>,
    psk: PreSharedKey,
}

impl Drop for Handshake {
    fn drop(&mut self) {
        if let Some(v) = self.e_pub.as_mut() {
            v.zeroize();
        }
        if let Some(v) = self.re.as_mut() {
            v.zeroize();
        }
    }
}

impl Handshake {
    /// Start a handshake for `role`.
    ///
    /// The `prologue` is hashed but never sent; both peers must use the same
    /// prologue and the same protocol name.
    pub fn new(
        protocol: ProtocolName,
        role: Role,
        local: &KeyPair,
        psk: &PreSharedKey,
        prologue: &[u8],
    ) -> Self {
        let mut symmetric = SymmetricState::initialize(protocol.as_str());
        symmetric.mix_hash(prologue);

        Self {
            symmetric: Some(symmetric),
            cursor: 0,
            failed: false,
            role,
            s: local.secret.clone(),
            s_pub: local.public,
            e: None,
            e_pub: None,
            rs: None,
            re: None,
            expected_rs: None,
            psk: psk.clone(),
        }
    }

    pub fn new_initiator(local: &KeyPair, psk: &PreSharedKey, prologue: &[u8]) -> Self {
        Self::new(ProtocolName::default(), Role::Initiator, local, psk, prologue)
    }

    pub fn new_responder(local: &KeyPair, psk: &PreSharedKey, prologue: &[u8]) -> Self {
        Self::new(ProtocolName::default(), Role::Responder, local, psk, prologue)
    }

    /// Require the peer to present exactly this static key.
    ///
    /// XX transmits both static keys, so this is optional; without it any
    /// peer holding the PSK is accepted.
    pub fn expect_remote_static(mut self, remote: PublicKey) -> Self {
        self.expected_rs = Some(remote);
        self
    }

    pub fn next_action(&self) -> HandshakeAction {
        if self.cursor >= XXPSK3.len() {
            HandshakeAction::Complete
        } else if self.role.writes(self.cursor) {
            HandshakeAction::WriteMessage
        } else {
            HandshakeAction::ReadMessage
        }
    }

    /// Index of the next pattern message; only ever moves forward.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= XXPSK3.len()
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_initiator(&self) -> bool {
        self.role == Role::Initiator
    }

    pub fn local_static(&self) -> &PublicKey {
        &self.s_pub
    }

    /// The peer's static key, once received.
    pub fn remote_static(&self) -> Option<&PublicKey> {
        self.rs.as_ref()
    }

    /// The running handshake hash.
    pub fn handshake_hash(&self) -> Result<&[u8; HASH_LEN], Error> {
        self.symmetric
            .as_ref()
            .map(SymmetricState::handshake_hash)
            .ok_or(Error::HandshakeOrderViolation)
    }

    /// Bytes the next message carries beyond its payload.
    pub fn next_message_overhead(&self) -> usize {
        let Some(tokens) = XXPSK3.get(self.cursor) else {
            return 0;
        };
        let mut keyed = self.symmetric.as_ref().is_some_and(SymmetricState::has_key);
        let mut overhead = 0;
        for token in *tokens {
            match token {
                Token::E => {
                    overhead += DH_LEN;
                    keyed = true;
                }
                Token::S => overhead += DH_LEN + if keyed { AEAD_TAG_LEN } else { 0 },
                Token::Ee | Token::Es | Token::Se | Token::Psk => keyed = true,
            }
        }
        overhead + if keyed { AEAD_TAG_LEN } else { 0 }
    }

    /// Write the next handshake message into `out`.
    ///
    /// Returns the number of bytes written.
    pub fn write_message(&mut self, payload: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        self.write_message_with_rng(payload, out, &mut OsRng)
    }

    /// Write the next handshake message with a specific RNG for the ephemeral key.
    pub fn write_message_with_rng(
        &mut self,
        payload: &[u8],
        out: &mut [u8],
        rng: &mut impl CryptoRngCore,
    ) -> Result<usize, Error> {
        self.expect_action(HandshakeAction::WriteMessage)?;

        let total = self.next_message_overhead() + payload.len();
        if total > MAX_MESSAGE_LEN {
            return Err(Error::MessageTooLarge);
        }
        if out.len() < total {
            return Err(Error::BufferTooSmall);
        }

        let result = self.write_tokens(payload, out, rng);
        self.settle(result)
    }

    /// Consume the peer's next handshake message, writing its payload to `out`.
    ///
    /// Returns the payload length.
    pub fn read_message(&mut self, message: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        self.expect_action(HandshakeAction::ReadMessage)?;

        let overhead = self.next_message_overhead();
        if message.len() < overhead || message.len() > MAX_MESSAGE_LEN {
            self.failed = true;
            return Err(Error::MalformedMessage);
        }
        if out.len() < message.len() - overhead {
            return Err(Error::BufferTooSmall);
        }

        let result = self.read_tokens(message, out);
        self.settle(result)
    }

    /// Split a completed handshake into transport ciphers.
    ///
    /// Initiator gets (c1 = send, c2 = recv), responder the reverse.
    pub fn into_transport(mut self) -> Result<TransportState, Error> {
        if !self.is_complete() || self.failed {
            return Err(Error::HandshakeOrderViolation);
        }
        let remote = self.rs.ok_or(Error::HandshakeOrderViolation)?;
        let symmetric = self.symmetric.take().ok_or(Error::HandshakeOrderViolation)?;
        let hash = *symmetric.handshake_hash();
        Ok(TransportState::new(
            symmetric.split(),
            self.is_initiator(),
            hash,
            remote,
        ))
    }

    fn expect_action(&self, action: HandshakeAction) -> Result<(), Error> {
        if self.failed || self.next_action() != action {
            return Err(Error::HandshakeOrderViolation);
        }
        Ok(())
    }

    /// Advance on success, poison on failure.
    fn settle(&mut self, result: Result<usize, Error>) -> Result<usize, Error> {
        match result {
            Ok(len) => {
                self.cursor += 1;
                Ok(len)
            }
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    fn ss(&mut self) -> Result<&mut SymmetricState, Error> {
        self.symmetric.as_mut().ok_or(Error::HandshakeOrderViolation)
    }

    fn write_tokens(
        &mut self,
        payload: &[u8],
        out: &mut [u8],
        rng: &mut impl CryptoRngCore,
    ) -> Result<usize, Error> {
        let mut offset = 0;
        for &token in XXPSK3[self.cursor] {
            match token {
                Token::E => {
                    let (secret, public) = x25519::generate_keypair(rng);
                    out[offset..offset + DH_LEN].copy_from_slice(&public);
                    offset += DH_LEN;
                    self.mix_ephemeral(&public)?;
                    self.e = Some(StaticSecret::from_dalek(secret));
                    self.e_pub = Some(public);
                }
                Token::S => {
                    let s_pub = *self.s_pub.as_bytes();
                    offset += self.ss()?.encrypt_and_hash(&s_pub, &mut out[offset..])?;
                }
                Token::Psk => self.mix_psk()?,
                dh => self.mix_dh(dh)?,
            }
        }
        offset += self.ss()?.encrypt_and_hash(payload, &mut out[offset..])?;
        Ok(offset)
    }

    fn read_tokens(&mut self, message: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        let mut rest = message;
        for &token in XXPSK3[self.cursor] {
            match token {
                Token::E => {
                    let (re, tail) = take(rest, DH_LEN)?;
                    let mut key = [0u8; DH_LEN];
                    key.copy_from_slice(re);
                    self.mix_ephemeral(&key)?;
                    self.re = Some(key);
                    rest = tail;
                }
                Token::S => {
                    let ss = self.ss()?;
                    let (sealed, tail) = take(rest, DH_LEN + ss.overhead())?;
                    let mut key = [0u8; DH_LEN];
                    ss.decrypt_and_hash(sealed, &mut key)?;
                    self.accept_remote_static(PublicKey::from_bytes(key))?;
                    rest = tail;
                }
                Token::Psk => self.mix_psk()?,
                dh => self.mix_dh(dh)?,
            }
        }
        self.ss()?.decrypt_and_hash(rest, out)
    }

    /// PSK handshakes feed every ephemeral key to both `MixHash` and `MixKey`.
    fn mix_ephemeral(&mut self, public: &[u8; DH_LEN]) -> Result<(), Error> {
        let ss = self.ss()?;
        ss.mix_hash(public);
        ss.mix_key(public);
        Ok(())
    }

    fn mix_psk(&mut self) -> Result<(), Error> {
        let ss = self
            .symmetric
            .as_mut()
            .ok_or(Error::HandshakeOrderViolation)?;
        ss.mix_key_and_hash(self.psk.as_bytes());
        Ok(())
    }

    /// `ee`, `es` and `se`; the first letter names the initiator's key.
    fn mix_dh(&mut self, token: Token) -> Result<(), Error> {
        let rs = self.rs.as_ref().map(PublicKey::as_bytes);
        let (local, remote) = match (token, self.role) {
            (Token::Ee, _) => (self.e.as_ref(), self.re.as_ref()),
            (Token::Es, Role::Initiator) | (Token::Se, Role::Responder) => (self.e.as_ref(), rs),
            (Token::Es, Role::Responder) | (Token::Se, Role::Initiator) => {
                (Some(&self.s), self.re.as_ref())
            }
            _ => return Err(Error::HandshakeOrderViolation),
        };
        let (Some(local), Some(remote)) = (local, remote) else {
            return Err(Error::HandshakeOrderViolation);
        };
        let shared = x25519::dh(local.inner(), remote)?;
        self.ss()?.mix_key(shared.as_bytes());
        Ok(())
    }

    fn accept_remote_static(&mut self, remote: PublicKey) -> Result<(), Error> {
        if let Some(expected) = &self.expected_rs {
            if !bool::from(expected.as_bytes().ct_eq(remote.as_bytes())) {
                return Err(Error::RemoteIdentityMismatch);
            }
        }
        self.rs = Some(remote);
        Ok(())
    }
}

/// Split `len` bytes off the front of `bytes`.
fn take(bytes: &[u8], len: usize) -> Result<(&[u8], &[u8]), Error> {
    if bytes.len() < len {
        return Err(Error::MalformedMessage);
    }
    Ok(bytes.split_at(len))
}

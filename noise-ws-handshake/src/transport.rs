use zeroize::Zeroize;

use crate::MAX_MESSAGE_LEN;
use crate::cipher_state::CipherState;
use crate::crypto::aead::AEAD_TAG_LEN;
use crate::crypto::hash::HASH_LEN;
use crate::error::Error;
use crate::keys::PublicKey;

/// Largest plaintext a single transport message can carry.
pub const MAX_TRANSPORT_PAYLOAD_LEN: usize = MAX_MESSAGE_LEN - AEAD_TAG_LEN;

/// Post-handshake transport state: one cipher per direction.
///
/// - Initiator: c1 = send, c2 = recv
/// - Responder: c1 = recv, c2 = send
pub struct TransportState {
    send: CipherState,
    recv: CipherState,
    handshake_hash: [u8; HASH_LEN],
    remote_static: PublicKey,
}

impl Drop for TransportState {
    fn drop(&mut self) {
        self.handshake_hash.zeroize();
    }
}

impl TransportState {
    pub(crate) fn new(
        (c1, c2): (CipherState, CipherState),
        is_initiator: bool,
        handshake_hash: [u8; HASH_LEN],
        remote_static: PublicKey,
    ) -> Self {
        let (send, recv) = if is_initiator { (c1, c2) } else { (c2, c1) };
        Self {
            send,
            recv,
            handshake_hash,
            remote_static,
        }
    }

    /// Encrypt `payload` for the peer into `out`.
    ///
    /// `out` needs `payload.len() + 16` bytes.
    pub fn write_message(&mut self, payload: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        if payload.len() > MAX_TRANSPORT_PAYLOAD_LEN {
            return Err(Error::MessageTooLarge);
        }
        self.send.encrypt_with_ad(&[], payload, out)
    }

    /// Decrypt a message from the peer into `out`.
    pub fn read_message(&mut self, message: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        if message.len() > MAX_MESSAGE_LEN {
            return Err(Error::MalformedMessage);
        }
        self.recv.decrypt_with_ad(&[], message, out)
    }

    /// Channel binding value; identical on both sides of a session.
    pub fn handshake_hash(&self) -> &[u8; HASH_LEN] {
        &self.handshake_hash
    }

    /// The authenticated static key of the peer.
    pub fn remote_static(&self) -> &PublicKey {
        &self.remote_static
    }

    pub fn overhead(&self) -> usize {
        AEAD_TAG_LEN
    }

    /// Number of messages sent so far.
    pub fn sending_nonce(&self) -> u64 {
        self.send.nonce()
    }

    /// Number of messages received so far.
    pub fn receiving_nonce(&self) -> u64 {
        self.recv.nonce()
    }

    pub fn rekey_send(&mut self) -> Result<(), Error> {
        self.send.rekey()
    }

    pub fn rekey_recv(&mut self) -> Result<(), Error> {
        self.recv.rekey()
    }

    #[cfg(test)]
    pub(crate) fn set_sending_nonce(&mut self, nonce: u64) {
        self.send.set_nonce(nonce);
    }
}

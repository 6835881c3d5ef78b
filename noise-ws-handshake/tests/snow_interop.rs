//! Interoperability and integration tests for noise-ws-handshake.
//!
//! Tests the `Noise_XXpsk3_25519_ChaChaPoly_BLAKE2s` implementation against
//! the `snow` crate, and verifies internal consistency of the public API.

use noise_ws_handshake::{
    Error, Handshake, HandshakeAction, KeyPair, MAX_MESSAGE_LEN, PROTOCOL_NAME, PreSharedKey,
    StaticSecret, TransportState,
};
use rand::RngCore;

const PSK: [u8; 32] = *b"Random 32 characters long secret";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn random_private_key() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn keypair_from_bytes(private: &[u8; 32]) -> KeyPair {
    KeyPair::from_secret(StaticSecret::from_bytes(*private))
}

fn snow_builder<'a>(local_priv: &'a [u8; 32], psk: &'a [u8; 32], prologue: &'a [u8]) -> snow::Builder<'a> {
    snow::Builder::new(PROTOCOL_NAME.parse().unwrap())
        .local_private_key(local_priv)
        .unwrap()
        .psk(3, psk)
        .unwrap()
        .prologue(prologue)
        .unwrap()
}

fn snow_initiator(local_priv: &[u8; 32], psk: &[u8; 32], prologue: &[u8]) -> snow::HandshakeState {
    snow_builder(local_priv, psk, prologue)
        .build_initiator()
        .unwrap()
}

fn snow_responder(local_priv: &[u8; 32], psk: &[u8; 32], prologue: &[u8]) -> snow::HandshakeState {
    snow_builder(local_priv, psk, prologue)
        .build_responder()
        .unwrap()
}

/// Drive a full handshake between two local peers.
/// Returns (initiator_transport, responder_transport).
fn local_handshake_pair(
    initiator_kp: &KeyPair,
    responder_kp: &KeyPair,
    prologue: &[u8],
    payloads: [&[u8]; 3],
) -> (TransportState, TransportState) {
    let psk = PreSharedKey::from(PSK);
    let mut initiator = Handshake::new_initiator(initiator_kp, &psk, prologue);
    let mut responder = Handshake::new_responder(responder_kp, &psk, prologue);

    let mut buf = vec![0u8; MAX_MESSAGE_LEN];
    let mut payload_buf = vec![0u8; MAX_MESSAGE_LEN];

    for (index, payload) in payloads.into_iter().enumerate() {
        let (writer, reader) = if index % 2 == 0 {
            (&mut initiator, &mut responder)
        } else {
            (&mut responder, &mut initiator)
        };
        assert_eq!(writer.next_action(), HandshakeAction::WriteMessage);
        assert_eq!(reader.next_action(), HandshakeAction::ReadMessage);
        let len = writer.write_message(payload, &mut buf).unwrap();
        let plen = reader.read_message(&buf[..len], &mut payload_buf).unwrap();
        assert_eq!(&payload_buf[..plen], payload);
    }

    assert_eq!(initiator.next_action(), HandshakeAction::Complete);
    assert_eq!(responder.next_action(), HandshakeAction::Complete);
    (
        initiator.into_transport().unwrap(),
        responder.into_transport().unwrap(),
    )
}

// ===========================================================================
// Local initiator, snow responder
// ===========================================================================

#[test]
fn local_initiator_snow_responder() {
    let i_priv = random_private_key();
    let r_priv = random_private_key();
    let i_kp = keypair_from_bytes(&i_priv);
    let r_kp = keypair_from_bytes(&r_priv);

    let mut initiator = Handshake::new_initiator(&i_kp, &PreSharedKey::from(PSK), b"prologue");
    let mut responder = snow_responder(&r_priv, &PSK, b"prologue");

    let mut buf = vec![0u8; MAX_MESSAGE_LEN];
    let mut payload_buf = vec![0u8; MAX_MESSAGE_LEN];

    // -> e
    let len = initiator.write_message(b"msg1", &mut buf).unwrap();
    assert_eq!(len, 32 + 4 + 16);
    let plen = responder.read_message(&buf[..len], &mut payload_buf).unwrap();
    assert_eq!(&payload_buf[..plen], b"msg1");

    // <- e, ee, s, es
    let len = responder.write_message(b"msg2", &mut buf).unwrap();
    assert_eq!(len, 32 + 48 + 4 + 16);
    let plen = initiator.read_message(&buf[..len], &mut payload_buf).unwrap();
    assert_eq!(&payload_buf[..plen], b"msg2");
    assert_eq!(initiator.remote_static(), Some(&r_kp.public));

    // -> s, se, psk
    let len = initiator.write_message(b"msg3", &mut buf).unwrap();
    assert_eq!(len, 48 + 4 + 16);
    let plen = responder.read_message(&buf[..len], &mut payload_buf).unwrap();
    assert_eq!(&payload_buf[..plen], b"msg3");

    assert_eq!(initiator.next_action(), HandshakeAction::Complete);
    assert!(responder.is_handshake_finished());
    assert_eq!(
        responder.get_remote_static(),
        Some(i_kp.public.as_bytes().as_slice())
    );
    assert_eq!(
        initiator.handshake_hash().unwrap().as_slice(),
        responder.get_handshake_hash()
    );

    let mut i_transport = initiator.into_transport().unwrap();
    let mut r_transport = responder.into_transport_mode().unwrap();

    let msg = b"hello from local initiator";
    let len = i_transport.write_message(msg, &mut buf).unwrap();
    let plen = r_transport.read_message(&buf[..len], &mut payload_buf).unwrap();
    assert_eq!(&payload_buf[..plen], msg);

    let msg = b"hello from snow responder";
    let len = r_transport.write_message(msg, &mut buf).unwrap();
    let plen = i_transport.read_message(&buf[..len], &mut payload_buf).unwrap();
    assert_eq!(&payload_buf[..plen], msg);
}

// ===========================================================================
// Snow initiator, local responder
// ===========================================================================

#[test]
fn snow_initiator_local_responder() {
    let i_priv = random_private_key();
    let r_priv = random_private_key();
    let i_kp = keypair_from_bytes(&i_priv);
    let r_kp = keypair_from_bytes(&r_priv);

    let mut initiator = snow_initiator(&i_priv, &PSK, &[]);
    let mut responder = Handshake::new_responder(&r_kp, &PreSharedKey::from(PSK), &[]);

    let mut buf = vec![0u8; MAX_MESSAGE_LEN];
    let mut payload_buf = vec![0u8; MAX_MESSAGE_LEN];

    let len = initiator.write_message(&[], &mut buf).unwrap();
    assert_eq!(responder.next_action(), HandshakeAction::ReadMessage);
    let plen = responder.read_message(&buf[..len], &mut payload_buf).unwrap();
    assert_eq!(plen, 0);

    assert_eq!(responder.next_action(), HandshakeAction::WriteMessage);
    let len = responder.write_message(&[], &mut buf).unwrap();
    let plen = initiator.read_message(&buf[..len], &mut payload_buf).unwrap();
    assert_eq!(plen, 0);

    let len = initiator.write_message(&[], &mut buf).unwrap();
    assert_eq!(responder.next_action(), HandshakeAction::ReadMessage);
    let plen = responder.read_message(&buf[..len], &mut payload_buf).unwrap();
    assert_eq!(plen, 0);

    assert_eq!(responder.next_action(), HandshakeAction::Complete);
    assert!(initiator.is_handshake_finished());
    assert_eq!(responder.remote_static(), Some(&i_kp.public));

    let mut r_transport = responder.into_transport().unwrap();
    let mut i_transport = initiator.into_transport_mode().unwrap();

    for i in 0..10 {
        let msg = format!("initiator message #{i}");
        let len = i_transport.write_message(msg.as_bytes(), &mut buf).unwrap();
        let plen = r_transport.read_message(&buf[..len], &mut payload_buf).unwrap();
        assert_eq!(&payload_buf[..plen], msg.as_bytes());

        let msg = format!("responder message #{i}");
        let len = r_transport.write_message(msg.as_bytes(), &mut buf).unwrap();
        let plen = i_transport.read_message(&buf[..len], &mut payload_buf).unwrap();
        assert_eq!(&payload_buf[..plen], msg.as_bytes());
    }
}

// ===========================================================================
// Fixed keys: identities and channel binding
// ===========================================================================

#[test]
fn fixed_keys_agree_with_snow() {
    let i_priv: [u8; 32] =
        hex::decode("e61ef9919cde45dd5f82166404bd08e38bceb5dfdfded0a34c8df7ed542214d1")
            .unwrap()
            .try_into()
            .unwrap();
    let r_priv: [u8; 32] =
        hex::decode("4a3acbfdb163dec651dfa3194dece676d437029c62a408b4c5ea9114246e4893")
            .unwrap()
            .try_into()
            .unwrap();
    let r_kp = keypair_from_bytes(&r_priv);

    let mut initiator = snow_initiator(&i_priv, &PSK, b"ws");
    let mut responder = Handshake::new_responder(&r_kp, &PreSharedKey::from(PSK), b"ws");

    let mut buf = vec![0u8; 1024];
    let mut payload_buf = vec![0u8; 1024];

    let len = initiator.write_message(b"1", &mut buf).unwrap();
    responder.read_message(&buf[..len], &mut payload_buf).unwrap();
    let len = responder.write_message(b"2", &mut buf).unwrap();
    initiator.read_message(&buf[..len], &mut payload_buf).unwrap();
    let len = initiator.write_message(b"3", &mut buf).unwrap();
    responder.read_message(&buf[..len], &mut payload_buf).unwrap();

    assert_eq!(
        hex::encode(initiator.get_remote_static().unwrap()),
        hex::encode(r_kp.public.as_bytes())
    );
    let expected_initiator = keypair_from_bytes(&i_priv).public;
    assert_eq!(responder.remote_static(), Some(&expected_initiator));
    assert_eq!(
        hex::encode(initiator.get_handshake_hash()),
        hex::encode(responder.handshake_hash().unwrap())
    );
}

// ===========================================================================
// Failure cases against snow
// ===========================================================================

#[test]
fn psk_mismatch_fails_on_third_message() {
    let i_priv = random_private_key();
    let r_kp = KeyPair::generate(&mut rand::thread_rng());

    let mut wrong = PSK;
    wrong[31] ^= 0x80;
    let mut initiator = snow_initiator(&i_priv, &wrong, &[]);
    let mut responder = Handshake::new_responder(&r_kp, &PreSharedKey::from(PSK), &[]);

    let mut buf = vec![0u8; 1024];
    let mut payload_buf = vec![0u8; 1024];

    // The PSK only enters on message 3, so the first two messages succeed.
    let len = initiator.write_message(&[], &mut buf).unwrap();
    responder.read_message(&buf[..len], &mut payload_buf).unwrap();
    let len = responder.write_message(&[], &mut buf).unwrap();
    initiator.read_message(&buf[..len], &mut payload_buf).unwrap();

    let len = initiator.write_message(&[], &mut buf).unwrap();
    assert_eq!(
        responder.read_message(&buf[..len], &mut payload_buf),
        Err(Error::AuthenticationFailure)
    );
    assert!(responder.has_failed());
    assert!(responder.into_transport().is_err());
}

#[test]
fn prologue_mismatch_fails_on_first_message() {
    let i_kp = KeyPair::generate(&mut rand::thread_rng());
    let r_priv = random_private_key();

    let mut initiator = Handshake::new_initiator(&i_kp, &PreSharedKey::from(PSK), b"v1");
    let mut responder = snow_responder(&r_priv, &PSK, b"v2");

    let mut buf = vec![0u8; 1024];
    let len = initiator.write_message(&[], &mut buf).unwrap();
    assert!(
        responder
            .read_message(&buf[..len], &mut vec![0u8; 1024])
            .is_err()
    );
}

#[test]
fn tampered_snow_message_is_rejected() {
    let i_priv = random_private_key();
    let r_kp = KeyPair::generate(&mut rand::thread_rng());

    let mut initiator = snow_initiator(&i_priv, &PSK, &[]);
    let mut buf = vec![0u8; 1024];
    let mut payload_buf = vec![0u8; 1024];
    let len = initiator.write_message(b"payload", &mut buf).unwrap();
    let msg1 = buf[..len].to_vec();

    for bit in 0..len * 8 {
        let mut responder = Handshake::new_responder(&r_kp, &PreSharedKey::from(PSK), &[]);
        let mut tampered = msg1.clone();
        tampered[bit / 8] ^= 1 << (bit % 8);
        assert_eq!(
            responder.read_message(&tampered, &mut payload_buf),
            Err(Error::AuthenticationFailure),
            "bit {bit}"
        );
    }
}

#[test]
fn transport_replay_is_rejected() {
    let mut rng = rand::thread_rng();
    let i_kp = KeyPair::generate(&mut rng);
    let r_kp = KeyPair::generate(&mut rng);
    let (mut i_transport, mut r_transport) =
        local_handshake_pair(&i_kp, &r_kp, &[], [&[], &[], &[]]);

    let mut buf = [0u8; 64];
    let mut out = [0u8; 64];
    let len = i_transport.write_message(b"once", &mut buf).unwrap();
    r_transport.read_message(&buf[..len], &mut out).unwrap();
    assert_eq!(
        r_transport.read_message(&buf[..len], &mut out),
        Err(Error::AuthenticationFailure)
    );
}

// ===========================================================================
// Local round trips
// ===========================================================================

#[test]
fn local_round_trip_with_payloads() {
    let mut rng = rand::thread_rng();
    let i_kp = KeyPair::generate(&mut rng);
    let r_kp = KeyPair::generate(&mut rng);

    let (mut i_transport, mut r_transport) = local_handshake_pair(
        &i_kp,
        &r_kp,
        b"prologue",
        [b"first", b"second", b"third"],
    );
    assert_eq!(i_transport.handshake_hash(), r_transport.handshake_hash());
    assert_eq!(i_transport.remote_static(), &r_kp.public);
    assert_eq!(r_transport.remote_static(), &i_kp.public);

    let mut buf = [0u8; 64];
    let mut out = [0u8; 64];
    let len = r_transport.write_message(b"reply", &mut buf).unwrap();
    let plen = i_transport.read_message(&buf[..len], &mut out).unwrap();
    assert_eq!(&out[..plen], b"reply");
}

#[test]
fn fresh_ephemerals_give_fresh_sessions() {
    let mut rng = rand::thread_rng();
    let i_kp = KeyPair::generate(&mut rng);
    let r_kp = KeyPair::generate(&mut rng);

    let (a, _) = local_handshake_pair(&i_kp, &r_kp, &[], [&[], &[], &[]]);
    let (b, _) = local_handshake_pair(&i_kp, &r_kp, &[], [&[], &[], &[]]);
    assert_ne!(a.handshake_hash(), b.handshake_hash());
}

#[test]
fn large_transport_message_interops() {
    let i_priv = random_private_key();
    let r_priv = random_private_key();
    let r_kp = keypair_from_bytes(&r_priv);

    let mut initiator = snow_initiator(&i_priv, &PSK, &[]);
    let mut responder = Handshake::new_responder(&r_kp, &PreSharedKey::from(PSK), &[]);

    let mut buf = vec![0u8; MAX_MESSAGE_LEN];
    let mut payload_buf = vec![0u8; MAX_MESSAGE_LEN];
    let len = initiator.write_message(&[], &mut buf).unwrap();
    responder.read_message(&buf[..len], &mut payload_buf).unwrap();
    let len = responder.write_message(&[], &mut buf).unwrap();
    initiator.read_message(&buf[..len], &mut payload_buf).unwrap();
    let len = initiator.write_message(&[], &mut buf).unwrap();
    responder.read_message(&buf[..len], &mut payload_buf).unwrap();

    let mut r_transport = responder.into_transport().unwrap();
    let mut i_transport = initiator.into_transport_mode().unwrap();

    let mut big = vec![0u8; noise_ws_handshake::MAX_TRANSPORT_PAYLOAD_LEN];
    rand::thread_rng().fill_bytes(&mut big);
    let len = r_transport.write_message(&big, &mut buf).unwrap();
    assert_eq!(len, MAX_MESSAGE_LEN);
    let plen = i_transport.read_message(&buf[..len], &mut payload_buf).unwrap();
    assert_eq!(&payload_buf[..plen], big.as_slice());
}

//! Directional byte sinks.
//!
//! A [`NoiseStateMachine`](crate::NoiseStateMachine) owns two sinks: `up`
//! receives decrypted application plaintext and `down` receives wire
//! messages ready for the transport. Both are invoked synchronously from
//! within `handle_connection`.

use std::sync::mpsc;

use noise_ws_handshake::Error;
use tracing::debug;

/// Receives byte strings produced by a session.
///
/// A failed delivery is fatal to the session: by then the handshake cursor
/// or the sending nonce has already moved past the lost bytes.
pub trait Sink {
    fn deliver(&mut self, bytes: &[u8]) -> Result<(), Error>;
}

impl<F> Sink for F
where
    F: FnMut(&[u8]),
{
    fn deliver(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self(bytes);
        Ok(())
    }
}

/// Channel endpoint. A dropped receiver fails with [`Error::SinkClosed`].
impl Sink for mpsc::Sender<Vec<u8>> {
    fn deliver(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.send(bytes.to_vec()).map_err(|_| {
            debug!(len = bytes.len(), "sink receiver dropped");
            Error::SinkClosed
        })
    }
}

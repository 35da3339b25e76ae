//! Port number stream
//!
//! A single producer task offers successive port numbers on a channel until
//! the universe's lifetime ends. Any number of consumers share the receiving
//! end; each value is delivered to exactly one of them.

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Create a port stream starting at `base`
///
/// Nothing is produced until the returned producer is run.
pub fn port_stream(base: u16, lifetime: CancellationToken) -> (PortStream, PortProducer) {
    let (tx, rx) = mpsc::channel(1);
    (
        PortStream {
            rx: Mutex::new(rx),
            lifetime: lifetime.clone(),
        },
        PortProducer { base, tx, lifetime },
    )
}

/// Receiving side of the port stream
#[derive(Debug)]
pub struct PortStream {
    rx: Mutex<mpsc::Receiver<u16>>,
    lifetime: CancellationToken,
}

impl PortStream {
    /// Take the next port number
    ///
    /// Returns `None` once the lifetime has ended (or every port up to 65535
    /// has been handed out) instead of blocking forever.
    pub async fn next(&self) -> Option<u16> {
        if self.lifetime.is_cancelled() {
            return None;
        }

        let mut rx = tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => return None,
            rx = self.rx.lock() => rx,
        };

        tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => None,
            port = rx.recv() => port,
        }
    }
}

/// Sending side of the port stream
#[derive(Debug)]
pub struct PortProducer {
    base: u16,
    tx: mpsc::Sender<u16>,
    lifetime: CancellationToken,
}

impl PortProducer {
    /// Offer successive ports until the lifetime ends
    pub async fn run(self) {
        for port in self.base..=u16::MAX {
            tokio::select! {
                biased;
                _ = self.lifetime.cancelled() => break,
                sent = self.tx.send(port) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("port stream stopped");
    }
}

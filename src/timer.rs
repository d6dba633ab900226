//! The coarse clock that drives retransmissions.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crate::transfer::{lock, Event, Session};

/// Ticks a transfer at a fixed interval until dropped.
///
/// The tick interval is independent of the retransmission timeout; each
/// state compares the time since its last send against the timeout itself.
pub(crate) struct Ticker {
    _stop: Sender<()>,
}

impl Ticker {
    pub(crate) fn start(interval: Duration, session: Weak<Mutex<Session>>) -> io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("tftp-timer".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    // Dropping the sender disconnects the channel.
                    _ => break,
                }

                match session.upgrade() {
                    Some(session) => lock(&session).handle(Event::Timer(Instant::now())),
                    None => break,
                }
            })?;

        Ok(Self { _stop: stop })
    }
}

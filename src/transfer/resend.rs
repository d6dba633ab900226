//! Send-and-await: resend the last packet on the timer until answered.

use std::time::Instant;

use tracing::debug;

use super::Context;
use crate::error::TransferError;
use crate::packet::Command;

/// The outcome of a timer tick.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Tick {
    /// Nothing pending, or the timeout has not elapsed yet.
    Idle,

    /// The pending packet went out again.
    Resent,

    /// The retry budget is spent.
    Exhausted { retransmissions: u32 },
}

/// The packet a state is waiting on a reply for.
#[derive(Debug)]
pub(crate) struct Resend {
    pending: Option<Command>,
    retransmissions: u32,
    last_sent: Instant,
}

impl Resend {
    pub(crate) fn idle() -> Self {
        Self {
            pending: None,
            retransmissions: 0,
            last_sent: Instant::now(),
        }
    }

    /// Sends `command` right away and keeps it for retransmission.
    pub(crate) fn send_and_await(
        &mut self,
        ctx: &mut Context,
        command: Command,
    ) -> Result<(), TransferError> {
        ctx.send(&command)?;

        self.pending = Some(command);
        self.retransmissions = 0;
        self.last_sent = Instant::now();
        Ok(())
    }

    /// Like [`send_and_await`](Self::send_and_await), for a fresh state.
    pub(crate) fn start(ctx: &mut Context, command: Command) -> Result<Self, TransferError> {
        let mut resend = Self::idle();
        resend.send_and_await(ctx, command)?;
        Ok(resend)
    }

    pub(crate) fn on_timer(
        &mut self,
        ctx: &mut Context,
        now: Instant,
    ) -> Result<Tick, TransferError> {
        let packet = match &self.pending {
            Some(packet) => packet,
            None => return Ok(Tick::Idle),
        };

        if now.saturating_duration_since(self.last_sent) < ctx.retry_timeout() {
            return Ok(Tick::Idle);
        }

        if self.retransmissions >= ctx.retry_count {
            return Ok(Tick::Exhausted {
                retransmissions: self.retransmissions,
            });
        }

        ctx.send(packet)?;
        self.retransmissions += 1;
        self.last_sent = now;

        debug!(
            file = %ctx.filename,
            packet = %packet,
            attempt = self.retransmissions,
            "retransmitted"
        );

        Ok(Tick::Resent)
    }
}

//! The `tftp_transfer` crate implements both ends of a Trivial File Transfer
//! Protocol (RFC 1350) transfer, including option negotiation for block
//! size, timeout and transfer size (RFC 2347, RFC 2348, RFC 2349):
//!
//! * The protocol (types that represent TFTP packets and their encoding).
//! * A [`Transfer`]: the state machine that drives one file from request to
//!   completion, retransmitting on timeout and tolerating duplicate packets.
//! * A client that starts outgoing transfers.
//! * A server that accepts incoming ones.
//!
//! For more information, please see [THE TFTP PROTOCOL (REVISION 2)](
//! https://tools.ietf.org/html/rfc1350).
//!
//! ## Try it out
//!
//! In one terminal window, start up the server:
//!
//! ```console
//! $ cargo run --example server 127.0.0.1:6655 ./served
//! Serving Trivial File Transfer Protocol (TFTP) @ 127.0.0.1:6655
//! ```
//!
//! Then in another window:
//!
//! ```console
//! $ cargo run --example client 127.0.0.1:6655 get some-file.txt
//! ```

#![warn(missing_docs)]

use std::time::Duration;

mod block;
mod bytes;
pub mod client;
mod error;
pub mod options;
pub mod packet;
mod server;
mod stream;
mod timer;
mod transfer;
pub mod transport;

pub use block::WrapPolicy;
pub use client::Client;
pub use error::{Error, TransferError};
pub use options::{TransferOption, TransferOptionSet};
pub use server::Server;
pub use stream::TransferStream;
pub use transfer::{Progress, Role, Transfer};

/// How transfers are run, fixed when a transfer is created.
///
/// The retry count, wrap policy and negotiation flag can still be changed on
/// each [`Transfer`] until it is started.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferSettings {
    /// Whether to negotiate options (RFC 2347) at all.
    pub negotiate: bool,

    /// Whether a client proposes `tsize`.
    pub advertise_transfer_size: bool,

    /// How many times an unanswered packet is retransmitted.
    ///
    /// Note that this is the number of *retransmissions*, not transmissions,
    /// so setting this to 0 still sends each packet once.
    pub retry_count: u32,

    /// What follows block 65535.
    pub wrap_policy: WrapPolicy,

    /// How often the transfer checks for expired timeouts.
    pub tick_interval: Duration,

    /// Log every event handed to the state machine at `trace` level.
    pub trace_states: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            negotiate: true,
            advertise_transfer_size: true,
            retry_count: 5,
            wrap_policy: WrapPolicy::default(),
            tick_interval: Duration::from_millis(500),
            trace_states: false,
        }
    }
}

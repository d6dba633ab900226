use std::io;
use std::sync::Arc;

use crate::options::OptionName;
use crate::packet::ErrorCode;
use crate::Role;

/// Errors returned synchronously to the caller.
///
/// Misuse of a [`Transfer`](crate::Transfer) is rejected before anything is
/// sent to the peer and leaves a running transfer untouched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `start` was called twice.
    #[error("this transfer has already been started")]
    AlreadyStarted,

    /// A setter was called after `start`.
    #[error("transfer options cannot be changed after the transfer has been started")]
    OptionsFrozen,

    /// A sender was given a sink, or a receiver a source.
    #[error("a {role:?} transfer cannot be started with this kind of stream")]
    #[allow(missing_docs)]
    StreamDirection { role: Role },

    /// The value is outside the range the option allows.
    #[error("invalid value {value:?} for option {name}")]
    #[allow(missing_docs)]
    InvalidOption { name: OptionName, value: String },

    /// The transfer ended without finishing.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Setting up sockets or threads failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Why a transfer ended without finishing.
///
/// Reported exactly once through the transfer's error callbacks.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransferError {
    /// The peer sent an error packet.
    #[error("remote peer reported {code:?}: {message}")]
    #[allow(missing_docs)]
    Remote { code: ErrorCode, message: String },

    /// Cancelled locally; the reason was sent to the peer.
    #[error("cancelled ({code:?}): {message}")]
    #[allow(missing_docs)]
    Cancelled { code: ErrorCode, message: String },

    /// The retry budget ran out.
    #[error("no reply after {retransmissions} retransmissions")]
    #[allow(missing_docs)]
    TimedOut { retransmissions: u32 },

    /// The peer sent something the protocol does not allow here.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Reading or writing the file contents failed.
    #[error("stream failure: {0}")]
    Stream(#[source] Arc<io::Error>),

    /// Sending or receiving datagrams failed.
    #[error("transport failure: {0}")]
    Transport(#[source] Arc<io::Error>),
}

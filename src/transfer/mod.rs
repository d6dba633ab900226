//! A single TFTP transfer, from request to completion or failure.
//!
//! All mutable state of a transfer lives in a [`Session`] behind one mutex.
//! The transport's receive thread, the timer thread and the caller's
//! `start`/`cancel` calls each take that lock and hand one [`Event`] to the
//! current state, so the state machine only ever sees one event at a time.

use std::fmt;
use std::mem;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::block::WrapPolicy;
use crate::error::{Error, TransferError};
use crate::options::TransferOptionSet;
use crate::packet::{Command, ErrorCode, ErrorPacket, Mode, Request};
use crate::stream::TransferStream;
use crate::timer::Ticker;
use crate::transport::{Transport, TransportEvents};
use crate::TransferSettings;

mod resend;
mod state;

use state::State;

/// Which side of which kind of transfer this is.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// We asked the server for a file.
    ClientRead,

    /// We are storing a file on the server.
    ClientWrite,

    /// A client asked us for a file.
    ServerRead,

    /// A client is storing a file with us.
    ServerWrite,
}

impl Role {
    /// Whether this side sends the file contents.
    pub fn is_sender(self) -> bool {
        matches!(self, Role::ClientWrite | Role::ServerRead)
    }

    /// Whether this side sent the request.
    pub fn is_client(self) -> bool {
        matches!(self, Role::ClientRead | Role::ClientWrite)
    }
}

/// Reported after every acknowledged block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Progress {
    /// Payload bytes transferred so far.
    pub transferred: u64,

    /// The announced file size, when the peer or the caller provided one.
    pub expected: Option<u64>,
}

type ProgressCallback = Box<dyn FnMut(Progress) + Send>;
type FinishedCallback = Box<dyn FnMut() + Send>;
type ErrorCallback = Box<dyn FnMut(&TransferError) + Send>;

#[derive(Default)]
struct Callbacks {
    progress: Vec<ProgressCallback>,
    finished: Vec<FinishedCallback>,
    error: Vec<ErrorCallback>,
}

/// Something that happened to a transfer.
pub(crate) enum Event {
    Start,
    Command(Command, SocketAddr),
    Timer(Instant),
    Cancel(ErrorPacket),
    TransportError(TransferError),
    Undecodable(SocketAddr),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Start => f.write_str("start"),
            Event::Command(command, from) => write!(f, "{} from {}", command, from),
            Event::Timer(_) => f.write_str("tick"),
            Event::Cancel(reason) => write!(f, "cancel ({})", reason.message),
            Event::TransportError(err) => write!(f, "transport error ({})", err),
            Event::Undecodable(from) => write!(f, "undecodable datagram from {}", from),
        }
    }
}

/// The mutable state shared by all states of one transfer.
pub(crate) struct Context {
    pub(crate) filename: String,
    pub(crate) mode: Mode,
    pub(crate) role: Role,
    pub(crate) proposed: TransferOptionSet,
    negotiated: Option<TransferOptionSet>,
    pub(crate) negotiate: bool,
    was_started: bool,
    expected_size_set: bool,
    pub(crate) retry_count: u32,
    pub(crate) wrap_policy: WrapPolicy,
    trace_states: bool,
    stream: Option<TransferStream>,
    transport: Box<dyn Transport>,
    pub(crate) peer: SocketAddr,
    callbacks: Callbacks,
    outcome_reported: bool,
}

impl Context {
    fn options(&self) -> &TransferOptionSet {
        self.negotiated.as_ref().unwrap_or(&self.proposed)
    }

    pub(crate) fn block_size(&self) -> usize {
        self.options().block_size() as usize
    }

    pub(crate) fn retry_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.options().timeout_secs()))
    }

    pub(crate) fn expected_size(&self) -> Option<u64> {
        self.negotiated
            .as_ref()
            .and_then(TransferOptionSet::transfer_size)
            .or_else(|| self.proposed.transfer_size())
    }

    /// Freezes the options the peer agreed to. Happens once per transfer.
    pub(crate) fn finish_negotiation(&mut self, acknowledged: TransferOptionSet) {
        debug_assert!(self.negotiated.is_none());
        let negotiated = acknowledged.finish_negotiation();

        debug!(
            file = %self.filename,
            block_size = negotiated.block_size(),
            timeout = negotiated.timeout_secs(),
            tsize = ?negotiated.transfer_size(),
            "options negotiated"
        );

        self.negotiated = Some(negotiated);
    }

    /// Puts the stream's length into the proposed `tsize`, or stops
    /// proposing it when the length is unknown.
    pub(crate) fn fill_or_disable_transfer_size(&mut self) {
        if !self.proposed.includes_transfer_size() || self.expected_size_set {
            return;
        }

        match self.stream.as_ref().and_then(TransferStream::known_len) {
            Some(len) if len > 0 => self.proposed.set_transfer_size(len),
            _ => self.proposed.disable_transfer_size(),
        }
    }

    pub(crate) fn adopt_peer(&mut self, peer: SocketAddr) {
        if peer != self.peer {
            debug!(file = %self.filename, old = %self.peer, new = %peer, "peer moved to a new transfer ID");
            self.peer = peer;
        }
    }

    pub(crate) fn send(&mut self, command: &Command) -> Result<(), TransferError> {
        self.transport
            .send(command, self.peer)
            .map_err(|err| TransferError::Transport(Arc::new(err)))
    }

    /// Sends without caring whether it arrives.
    pub(crate) fn send_best_effort(&mut self, command: &Command, to: SocketAddr) {
        if let Err(err) = self.transport.send(command, to) {
            debug!(file = %self.filename, %to, error = %err, "best-effort send failed");
        }
    }

    pub(crate) fn read_block(&mut self) -> Result<Vec<u8>, TransferError> {
        let size = self.block_size();
        match self.stream.as_mut() {
            Some(stream) => stream
                .read_block(size)
                .map_err(|err| TransferError::Stream(Arc::new(err))),
            None => Err(missing_stream()),
        }
    }

    pub(crate) fn write_block(&mut self, block: &[u8]) -> Result<(), TransferError> {
        match self.stream.as_mut() {
            Some(stream) => stream
                .write_block(block)
                .map_err(|err| TransferError::Stream(Arc::new(err))),
            None => Err(missing_stream()),
        }
    }

    pub(crate) fn flush_stream(&mut self) -> Result<(), TransferError> {
        match self.stream.as_mut() {
            Some(stream) => stream
                .flush()
                .map_err(|err| TransferError::Stream(Arc::new(err))),
            None => Ok(()),
        }
    }

    pub(crate) fn raise_progress(&mut self, transferred: u64) {
        let progress = Progress {
            transferred,
            expected: self.expected_size(),
        };

        for callback in &mut self.callbacks.progress {
            callback(progress);
        }
    }

    pub(crate) fn raise_finished(&mut self) {
        if mem::replace(&mut self.outcome_reported, true) {
            return;
        }

        debug!(file = %self.filename, peer = %self.peer, "transfer finished");
        for callback in &mut self.callbacks.finished {
            callback();
        }
    }

    pub(crate) fn raise_error(&mut self, error: &TransferError) {
        if mem::replace(&mut self.outcome_reported, true) {
            return;
        }

        debug!(file = %self.filename, peer = %self.peer, %error, "transfer failed");
        for callback in &mut self.callbacks.error {
            callback(error);
        }
    }

    fn ensure_not_started(&self) -> Result<(), Error> {
        if self.was_started {
            Err(Error::OptionsFrozen)
        } else {
            Ok(())
        }
    }
}

fn missing_stream() -> TransferError {
    TransferError::Stream(Arc::new(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "no stream is bound to this transfer",
    )))
}

/// A [`Context`] and the state it is in, guarded together.
pub(crate) struct Session {
    ctx: Context,
    state: State,
}

impl Session {
    pub(crate) fn handle(&mut self, event: Event) {
        let before = self.state.name();

        if self.ctx.trace_states {
            trace!(file = %self.ctx.filename, state = before, %event, "dispatching");
        }

        // `Finished` is only a placeholder while the handler owns the state.
        let state = mem::replace(&mut self.state, State::Finished);
        self.state = state.handle(&mut self.ctx, event);

        let after = self.state.name();
        if after != before {
            debug!(file = %self.ctx.filename, from = before, to = after, "state transition");
        }
    }
}

pub(crate) fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One file transfer with one peer.
///
/// Callbacks run on whichever thread produced the event, while the transfer
/// is locked: they must not call back into the same `Transfer`.
///
/// Dropping a `Transfer` cancels it if it is still running (telling the peer),
/// releases the stream and closes the transport.
pub struct Transfer {
    session: Arc<Mutex<Session>>,
    ticker: Option<Ticker>,
}

impl Transfer {
    /// Creates a transfer that will send a request to `server` once started.
    pub fn outgoing<T: Transport + 'static>(
        role: Role,
        filename: &str,
        mode: Mode,
        transport: T,
        server: SocketAddr,
        settings: &TransferSettings,
    ) -> std::io::Result<Self> {
        if !role.is_client() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "outgoing transfers need a client role",
            ));
        }

        let mut proposed = TransferOptionSet::new_default();
        if !settings.advertise_transfer_size {
            proposed.disable_transfer_size();
        }

        Self::open(role, filename, mode, proposed, Box::new(transport), server, settings)
    }

    /// Creates a transfer answering `request`, received from `client`.
    ///
    /// The options the client proposed become this side's proposal, which
    /// the caller may adjust before starting.
    pub fn incoming<T: Transport + 'static>(
        role: Role,
        request: Request,
        transport: T,
        client: SocketAddr,
        settings: &TransferSettings,
    ) -> std::io::Result<Self> {
        if role.is_client() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "incoming transfers need a server role",
            ));
        }

        let proposed = TransferOptionSet::from_options(&request.options);

        Self::open(
            role,
            &request.filename,
            request.mode,
            proposed,
            Box::new(transport),
            client,
            settings,
        )
    }

    fn open(
        role: Role,
        filename: &str,
        mode: Mode,
        proposed: TransferOptionSet,
        transport: Box<dyn Transport>,
        peer: SocketAddr,
        settings: &TransferSettings,
    ) -> std::io::Result<Self> {
        let ctx = Context {
            filename: filename.to_string(),
            mode,
            role,
            proposed,
            negotiated: None,
            negotiate: settings.negotiate,
            was_started: false,
            expected_size_set: false,
            retry_count: settings.retry_count,
            wrap_policy: settings.wrap_policy,
            trace_states: settings.trace_states,
            stream: None,
            transport,
            peer,
            callbacks: Callbacks::default(),
            outcome_reported: false,
        };

        let session = Arc::new(Mutex::new(Session {
            ctx,
            state: State::initial(role),
        }));

        let events = TransportEvents::new(Arc::downgrade(&session));
        lock(&session).ctx.transport.open(events)?;

        let ticker = Ticker::start(settings.tick_interval, Arc::downgrade(&session))?;

        debug!(file = filename, %peer, ?role, "transfer created");

        Ok(Self {
            session,
            ticker: Some(ticker),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        lock(&self.session)
    }

    fn configure<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context) -> Result<(), Error>,
    {
        let mut session = self.lock();
        session.ctx.ensure_not_started()?;
        f(&mut session.ctx)
    }

    /// The name of the file being transferred.
    pub fn filename(&self) -> String {
        self.lock().ctx.filename.clone()
    }

    /// The transfer mode named in the request.
    pub fn mode(&self) -> Mode {
        self.lock().ctx.mode
    }

    /// Which side of the transfer this is.
    pub fn role(&self) -> Role {
        self.lock().ctx.role
    }

    /// The peer's current transfer ID.
    pub fn peer(&self) -> SocketAddr {
        self.lock().ctx.peer
    }

    /// The options this side proposes (or, for a server, accepts).
    pub fn proposed_options(&self) -> TransferOptionSet {
        self.lock().ctx.proposed.clone()
    }

    /// The options in effect, once negotiation has concluded.
    pub fn negotiated_options(&self) -> Option<TransferOptionSet> {
        self.lock().ctx.negotiated.clone()
    }

    /// The block size in effect.
    pub fn block_size(&self) -> u16 {
        self.lock().ctx.options().block_size()
    }

    /// How long to wait for a reply before retransmitting.
    pub fn retry_timeout(&self) -> Duration {
        self.lock().ctx.retry_timeout()
    }

    /// The size of the file, if known.
    pub fn expected_size(&self) -> Option<u64> {
        self.lock().ctx.expected_size()
    }

    /// How many times a packet is retransmitted before giving up.
    pub fn retry_count(&self) -> u32 {
        self.lock().ctx.retry_count
    }

    /// The block counter's wrap-around policy.
    pub fn wrap_policy(&self) -> WrapPolicy {
        self.lock().ctx.wrap_policy
    }

    /// Whether the transfer reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.lock().state.is_terminal()
    }

    /// Proposes a block size.
    pub fn set_block_size(&self, size: u16) -> Result<(), Error> {
        self.configure(|ctx| ctx.proposed.set_block_size(size))
    }

    /// Proposes a retransmission timeout.
    pub fn set_timeout(&self, secs: u8) -> Result<(), Error> {
        self.configure(|ctx| ctx.proposed.set_timeout_secs(secs))
    }

    /// Announces the file size instead of taking it from the stream.
    pub fn set_expected_size(&self, size: u64) -> Result<(), Error> {
        self.configure(|ctx| {
            ctx.proposed.set_transfer_size(size);
            ctx.expected_size_set = true;
            Ok(())
        })
    }

    /// Sets how many times a packet is retransmitted before giving up.
    pub fn set_retry_count(&self, count: u32) -> Result<(), Error> {
        self.configure(|ctx| {
            ctx.retry_count = count;
            Ok(())
        })
    }

    /// Sets what follows block 65535.
    pub fn set_wrap_policy(&self, policy: WrapPolicy) -> Result<(), Error> {
        self.configure(|ctx| {
            ctx.wrap_policy = policy;
            Ok(())
        })
    }

    /// Enables or disables option negotiation.
    pub fn set_negotiate(&self, negotiate: bool) -> Result<(), Error> {
        self.configure(|ctx| {
            ctx.negotiate = negotiate;
            Ok(())
        })
    }

    /// Registers a callback for every acknowledged block.
    pub fn on_progress<F: FnMut(Progress) + Send + 'static>(&self, callback: F) {
        self.lock().ctx.callbacks.progress.push(Box::new(callback));
    }

    /// Registers a callback for successful completion.
    pub fn on_finished<F: FnMut() + Send + 'static>(&self, callback: F) {
        self.lock().ctx.callbacks.finished.push(Box::new(callback));
    }

    /// Registers a callback for failure, including cancellation.
    pub fn on_error<F: FnMut(&TransferError) + Send + 'static>(&self, callback: F) {
        self.lock().ctx.callbacks.error.push(Box::new(callback));
    }

    /// Starts the transfer, reading from or writing to `stream`.
    ///
    /// Senders (`ClientWrite`, `ServerRead`) need a source, receivers a sink.
    pub fn start(&self, stream: TransferStream) -> Result<(), Error> {
        let mut session = self.lock();

        if session.ctx.was_started {
            return Err(Error::AlreadyStarted);
        }

        let role = session.ctx.role;
        if stream.is_source() != role.is_sender() {
            return Err(Error::StreamDirection { role });
        }

        session.ctx.was_started = true;
        session.ctx.stream = Some(stream);
        session.handle(Event::Start);
        Ok(())
    }

    /// Aborts the transfer, sending `reason` to the peer.
    ///
    /// Has no effect once the transfer has ended.
    pub fn cancel(&self, reason: ErrorPacket) {
        self.lock().handle(Event::Cancel(reason));
    }

    /// Starts the transfer and blocks until it ends.
    pub fn run(self, stream: TransferStream) -> Result<(), Error> {
        let (tx, rx) = mpsc::channel();
        let finished = tx.clone();
        self.on_finished(move || {
            let _ = finished.send(Ok(()));
        });
        self.on_error(move |err| {
            let _ = tx.send(Err(err.clone()));
        });

        self.start(stream)?;

        match rx.recv() {
            Ok(outcome) => outcome.map_err(Error::from),
            Err(_) => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "transfer ended without an outcome",
            ))),
        }
    }

    #[cfg(test)]
    pub(crate) fn tick_at(&self, now: Instant) {
        self.lock().handle(Event::Timer(now));
    }

    #[cfg(test)]
    pub(crate) fn state_name(&self) -> &'static str {
        self.lock().state.name()
    }
}

impl Drop for Transfer {
    fn drop(&mut self) {
        self.ticker.take();

        let mut session = self.lock();
        session.handle(Event::Cancel(ErrorPacket::new(
            ErrorCode::NotDefined,
            "transfer has been disposed",
        )));
        session.ctx.stream = None;
        session.ctx.transport.close();
    }
}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.lock();
        f.debug_struct("Transfer")
            .field("filename", &session.ctx.filename)
            .field("role", &session.ctx.role)
            .field("peer", &session.ctx.peer)
            .field("state", &session.state.name())
            .finish()
    }
}

//! The states a transfer moves through.
//!
//! Every state handles every kind of [`Event`] explicitly in the `on_*`
//! functions below. Events that mean nothing to a state go through
//! [`ignore`], so dropping an event is always a visible decision.
//!
//! Handlers return `Err` for anything that ends the transfer unsuccessfully;
//! [`terminate`] turns that into the matching terminal state.

use std::net::SocketAddr;
use std::time::Instant;

use tracing::{trace, warn};

use super::resend::{Resend, Tick};
use super::{Context, Event, Role};
use crate::block::BlockCounter;
use crate::error::TransferError;
use crate::options::TransferOptionSet;
use crate::packet::{Ack, Block, Command, Data, ErrorCode, ErrorPacket, OptionAck, Request};

type Next = Result<State, TransferError>;

pub(crate) enum State {
    /// Client read, waiting for the caller to start.
    StartOutgoingRead,
    /// Client write, waiting for the caller to start.
    StartOutgoingWrite,
    /// Server side of a read request, waiting for the caller to start.
    StartIncomingRead,
    /// Server side of a write request, waiting for the caller to start.
    StartIncomingWrite,

    SendReadRequest(Resend),
    SendWriteRequest(Resend),
    /// OACK sent for a read request; expecting `Ack(0)`.
    SendOptionAckForRead(Resend),
    /// OACK sent for a write request; expecting `Data(1)`.
    SendOptionAckForWrite(Resend),
    /// `Ack(0)` sent for a write request; expecting `Data(1)`.
    AcknowledgeWriteRequest(Resend),

    Sending(Sending),
    Receiving(Receiving),

    Finished,
    ReceivedError,
    CancelledByUser,
    TimedOut,
    Failed,
}

impl State {
    pub(crate) fn initial(role: Role) -> Self {
        match role {
            Role::ClientRead => State::StartOutgoingRead,
            Role::ClientWrite => State::StartOutgoingWrite,
            Role::ServerRead => State::StartIncomingRead,
            Role::ServerWrite => State::StartIncomingWrite,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            State::StartOutgoingRead => "StartOutgoingRead",
            State::StartOutgoingWrite => "StartOutgoingWrite",
            State::StartIncomingRead => "StartIncomingRead",
            State::StartIncomingWrite => "StartIncomingWrite",
            State::SendReadRequest(_) => "SendReadRequest",
            State::SendWriteRequest(_) => "SendWriteRequest",
            State::SendOptionAckForRead(_) => "SendOptionAckForRead",
            State::SendOptionAckForWrite(_) => "SendOptionAckForWrite",
            State::AcknowledgeWriteRequest(_) => "AcknowledgeWriteRequest",
            State::Sending(_) => "Sending",
            State::Receiving(_) => "Receiving",
            State::Finished => "Finished",
            State::ReceivedError => "ReceivedError",
            State::CancelledByUser => "CancelledByUser",
            State::TimedOut => "TimedOut",
            State::Failed => "Failed",
        }
    }

    pub(crate) fn is_terminal(&self) -> bool {
        matches!(
            self,
            State::Finished
                | State::ReceivedError
                | State::CancelledByUser
                | State::TimedOut
                | State::Failed
        )
    }

    pub(crate) fn handle(self, ctx: &mut Context, event: Event) -> State {
        let next = match event {
            Event::Start => self.on_start(ctx),
            Event::Command(command, from) => self.on_command(ctx, command, from),
            Event::Timer(now) => self.on_timer(ctx, now),
            Event::Cancel(reason) => self.on_cancel(ctx, reason),
            Event::TransportError(err) => self.on_transport_error(err),
            Event::Undecodable(from) => self.on_undecodable(ctx, from),
        };

        next.unwrap_or_else(|err| terminate(ctx, err))
    }

    fn on_start(self, ctx: &mut Context) -> Next {
        match self {
            State::StartOutgoingRead => {
                let request = outgoing_request(ctx);
                Ok(State::SendReadRequest(Resend::start(
                    ctx,
                    Command::ReadRequest(request),
                )?))
            }
            State::StartOutgoingWrite => {
                ctx.fill_or_disable_transfer_size();
                let request = outgoing_request(ctx);
                Ok(State::SendWriteRequest(Resend::start(
                    ctx,
                    Command::WriteRequest(request),
                )?))
            }
            State::StartIncomingRead => {
                ctx.fill_or_disable_transfer_size();
                match accept_proposal(ctx) {
                    Some(oack) => Ok(State::SendOptionAckForRead(Resend::start(ctx, oack)?)),
                    None => Sending::enter(ctx),
                }
            }
            State::StartIncomingWrite => match accept_proposal(ctx) {
                Some(oack) => Ok(State::SendOptionAckForWrite(Resend::start(ctx, oack)?)),
                None => Ok(State::AcknowledgeWriteRequest(Resend::start(
                    ctx,
                    Command::ack(Block::new(0)),
                )?)),
            },
            State::SendReadRequest(_)
            | State::SendWriteRequest(_)
            | State::SendOptionAckForRead(_)
            | State::SendOptionAckForWrite(_)
            | State::AcknowledgeWriteRequest(_)
            | State::Sending(_)
            | State::Receiving(_)
            | State::Finished
            | State::ReceivedError
            | State::CancelledByUser
            | State::TimedOut
            | State::Failed => Ok(ignore(ctx, self, "start")),
        }
    }

    fn on_command(self, ctx: &mut Context, command: Command, from: SocketAddr) -> Next {
        if self.talks_to_known_peer() && from != ctx.peer {
            warn!(file = %ctx.filename, %from, command = %command, "packet from unknown transfer ID");
            reject_unknown_tid(ctx, from);
            return Ok(self);
        }

        match self {
            State::StartOutgoingRead
            | State::StartOutgoingWrite
            | State::StartIncomingRead
            | State::StartIncomingWrite => Ok(ignore(ctx, self, "command before start")),

            State::SendReadRequest(_) => match command {
                Command::OptionAck(OptionAck { options }) if ctx.negotiate => {
                    ctx.finish_negotiation(TransferOptionSet::from_options(&options));
                    ctx.adopt_peer(from);
                    let resend = Resend::start(ctx, Command::ack(Block::new(0)))?;
                    Ok(State::Receiving(Receiving::new(ctx, resend)))
                }
                Command::Data(data) => {
                    ctx.finish_negotiation(TransferOptionSet::new_empty());
                    ctx.adopt_peer(from);
                    Receiving::new(ctx, Resend::idle()).on_data(ctx, data)
                }
                other => Err(unexpected(ctx, &other)),
            },

            State::SendWriteRequest(_) => match command {
                Command::OptionAck(OptionAck { options }) if ctx.negotiate => {
                    ctx.finish_negotiation(TransferOptionSet::from_options(&options));
                    ctx.adopt_peer(from);
                    Sending::enter(ctx)
                }
                Command::Ack(Ack { block }) if block == Block::new(0) => {
                    ctx.finish_negotiation(TransferOptionSet::new_empty());
                    ctx.adopt_peer(from);
                    Sending::enter(ctx)
                }
                other => Err(unexpected(ctx, &other)),
            },

            State::SendOptionAckForRead(_) => match command {
                Command::Ack(Ack { block }) if block == Block::new(0) => Sending::enter(ctx),
                other => Err(unexpected(ctx, &other)),
            },

            State::SendOptionAckForWrite(_) | State::AcknowledgeWriteRequest(_) => match command {
                Command::Data(data) => Receiving::new(ctx, Resend::idle()).on_data(ctx, data),
                other => Err(unexpected(ctx, &other)),
            },

            State::Sending(sending) => sending.on_command(ctx, command),
            State::Receiving(receiving) => receiving.on_command(ctx, command),

            State::Finished
            | State::ReceivedError
            | State::CancelledByUser
            | State::TimedOut
            | State::Failed => Ok(ignore(ctx, self, "command after the end")),
        }
    }

    fn on_timer(mut self, ctx: &mut Context, now: Instant) -> Next {
        let tick = match self.resend_mut() {
            Some(resend) => resend.on_timer(ctx, now)?,
            None => Tick::Idle,
        };

        match tick {
            Tick::Idle | Tick::Resent => Ok(self),
            Tick::Exhausted { retransmissions } => Err(TransferError::TimedOut { retransmissions }),
        }
    }

    fn on_cancel(self, ctx: &mut Context, reason: ErrorPacket) -> Next {
        match self {
            // Nothing was sent yet, so there is nobody to tell.
            State::StartOutgoingRead | State::StartOutgoingWrite => {
                ctx.raise_error(&cancelled(reason));
                Ok(State::CancelledByUser)
            }

            // A server that refuses a request says so to the client.
            State::StartIncomingRead
            | State::StartIncomingWrite
            | State::SendReadRequest(_)
            | State::SendWriteRequest(_)
            | State::SendOptionAckForRead(_)
            | State::SendOptionAckForWrite(_)
            | State::AcknowledgeWriteRequest(_)
            | State::Sending(_)
            | State::Receiving(_) => Err(cancelled(reason)),

            State::Finished
            | State::ReceivedError
            | State::CancelledByUser
            | State::TimedOut
            | State::Failed => Ok(ignore(ctx, self, "cancel after the end")),
        }
    }

    fn on_undecodable(self, ctx: &mut Context, from: SocketAddr) -> Next {
        match self {
            State::SendOptionAckForRead(_)
            | State::SendOptionAckForWrite(_)
            | State::AcknowledgeWriteRequest(_)
            | State::Sending(_)
            | State::Receiving(_) => {
                if from == ctx.peer {
                    Err(TransferError::Protocol(format!(
                        "undecodable datagram from {}",
                        from
                    )))
                } else {
                    reject_unknown_tid(ctx, from);
                    Ok(self)
                }
            }

            // Until the server answers, any source could be it; leave
            // recovery to retransmission.
            State::SendReadRequest(_) | State::SendWriteRequest(_) => {
                Ok(ignore(ctx, self, "undecodable datagram before the peer answered"))
            }

            State::StartOutgoingRead
            | State::StartOutgoingWrite
            | State::StartIncomingRead
            | State::StartIncomingWrite => Ok(ignore(ctx, self, "undecodable datagram before start")),

            State::Finished
            | State::ReceivedError
            | State::CancelledByUser
            | State::TimedOut
            | State::Failed => Ok(ignore(ctx, self, "undecodable datagram after the end")),
        }
    }

    fn on_transport_error(self, err: TransferError) -> Next {
        if self.is_terminal() {
            Ok(self)
        } else {
            Err(err)
        }
    }

    /// The retransmission bookkeeping of states waiting on a reply.
    fn resend_mut(&mut self) -> Option<&mut Resend> {
        match self {
            State::SendReadRequest(resend)
            | State::SendWriteRequest(resend)
            | State::SendOptionAckForRead(resend)
            | State::SendOptionAckForWrite(resend)
            | State::AcknowledgeWriteRequest(resend) => Some(resend),
            State::Sending(sending) => Some(&mut sending.resend),
            State::Receiving(receiving) => Some(&mut receiving.resend),
            State::StartOutgoingRead
            | State::StartOutgoingWrite
            | State::StartIncomingRead
            | State::StartIncomingWrite
            | State::Finished
            | State::ReceivedError
            | State::CancelledByUser
            | State::TimedOut
            | State::Failed => None,
        }
    }

    /// Whether the peer's transfer ID is settled, so that packets from
    /// anywhere else belong to somebody else.
    fn talks_to_known_peer(&self) -> bool {
        match self {
            // Servers answer requests from a fresh port.
            State::SendReadRequest(_) | State::SendWriteRequest(_) => false,
            State::StartOutgoingRead | State::StartOutgoingWrite => false,
            State::StartIncomingRead
            | State::StartIncomingWrite
            | State::SendOptionAckForRead(_)
            | State::SendOptionAckForWrite(_)
            | State::AcknowledgeWriteRequest(_)
            | State::Sending(_)
            | State::Receiving(_) => true,
            State::Finished
            | State::ReceivedError
            | State::CancelledByUser
            | State::TimedOut
            | State::Failed => false,
        }
    }
}

/// Steady state of the sending side.
pub(crate) struct Sending {
    resend: Resend,
    counter: BlockCounter,
    last_len: usize,
    blocks_acked: u64,
    transferred: u64,
}

impl Sending {
    fn enter(ctx: &mut Context) -> Next {
        let mut sending = Sending {
            resend: Resend::idle(),
            counter: BlockCounter::new(ctx.wrap_policy),
            last_len: 0,
            blocks_acked: 0,
            transferred: 0,
        };

        sending.send_next(ctx)?;
        Ok(State::Sending(sending))
    }

    fn send_next(&mut self, ctx: &mut Context) -> Result<(), TransferError> {
        let block = ctx.read_block()?;
        self.last_len = block.len();
        let number = self.counter.advance();
        self.resend.send_and_await(ctx, Command::data(number, block))
    }

    fn on_command(mut self, ctx: &mut Context, command: Command) -> Next {
        match command {
            Command::Ack(Ack { block }) if block == self.counter.current() => {
                self.blocks_acked += 1;
                self.transferred += self.last_len as u64;
                ctx.raise_progress(self.transferred);

                // A short block (possibly empty) ends the file.
                if self.last_len < ctx.block_size() {
                    ctx.raise_finished();
                    return Ok(State::Finished);
                }

                self.send_next(ctx)?;
                Ok(State::Sending(self))
            }
            // Everything behind the pending block, the request's ACK 0
            // included, was acknowledged already.
            Command::Ack(Ack { block }) if self.counter.distance_behind(block).is_some() => {
                trace!(file = %ctx.filename, %block, "duplicate ACK");
                Ok(State::Sending(self))
            }
            Command::OptionAck(_) if self.blocks_acked == 0 => {
                trace!(file = %ctx.filename, "duplicate OACK");
                Ok(State::Sending(self))
            }
            other => Err(unexpected(ctx, &other)),
        }
    }
}

/// Steady state of the receiving side.
pub(crate) struct Receiving {
    resend: Resend,
    counter: BlockCounter,
    blocks: u64,
    transferred: u64,
}

impl Receiving {
    fn new(ctx: &Context, resend: Resend) -> Self {
        Self {
            resend,
            counter: BlockCounter::new(ctx.wrap_policy),
            blocks: 0,
            transferred: 0,
        }
    }

    /// Whether `block` is one of the blocks written so far.
    fn was_written(&self, block: Block) -> bool {
        match self.counter.distance_behind(block) {
            Some(distance) => u64::from(distance) < self.blocks,
            None => false,
        }
    }

    fn on_command(self, ctx: &mut Context, command: Command) -> Next {
        match command {
            Command::Data(data) => self.on_data(ctx, data),
            // Our ACK of the OACK got lost.
            Command::OptionAck(_) if self.blocks == 0 => {
                ctx.send(&Command::ack(Block::new(0)))?;
                Ok(State::Receiving(self))
            }
            other => Err(unexpected(ctx, &other)),
        }
    }

    fn on_data(mut self, ctx: &mut Context, data: Data) -> Next {
        let Data { block, data } = data;

        if block == self.counter.peek_next() {
            if data.len() > ctx.block_size() {
                return Err(TransferError::Protocol(format!(
                    "block {} carries {} bytes, more than the {} byte block size",
                    block,
                    data.len(),
                    ctx.block_size()
                )));
            }

            ctx.write_block(&data)?;
            self.counter.advance();
            self.blocks += 1;
            self.transferred += data.len() as u64;
            ctx.raise_progress(self.transferred);

            let ack = Command::ack(block);
            if data.len() < ctx.block_size() {
                ctx.flush_stream()?;
                ctx.send(&ack)?;
                ctx.raise_finished();
                return Ok(State::Finished);
            }

            self.resend.send_and_await(ctx, ack)?;
            Ok(State::Receiving(self))
        } else if self.was_written(block) {
            // The peer did not see our ACK; repeat it without writing again.
            trace!(file = %ctx.filename, %block, "duplicate DATA");
            ctx.send(&Command::ack(block))?;
            Ok(State::Receiving(self))
        } else {
            Err(TransferError::Protocol(format!(
                "expected DATA #{} but got DATA #{}",
                self.counter.peek_next(),
                block
            )))
        }
    }
}

/// Tells a stray sender it is not part of this transfer (RFC 1350 section 4).
fn reject_unknown_tid(ctx: &mut Context, from: SocketAddr) {
    let kind = ErrorCode::UnknownTid;
    ctx.send_best_effort(&Command::error(kind, kind.as_str()), from);
}

/// The named default for events a state has no use for.
fn ignore(ctx: &Context, state: State, what: &str) -> State {
    trace!(file = %ctx.filename, state = state.name(), what, "ignored");
    state
}

fn outgoing_request(ctx: &Context) -> Request {
    // Don't propose options if we are not negotiating.
    let options = if ctx.negotiate {
        ctx.proposed.to_option_list()
    } else {
        vec![]
    };

    Request::new(&ctx.filename, ctx.mode, options)
}

/// Settles a server's options. Returns the OACK to send, if any.
fn accept_proposal(ctx: &mut Context) -> Option<Command> {
    if ctx.negotiate && !ctx.proposed.is_empty() {
        let accepted = ctx.proposed.clone();
        let oack = Command::OptionAck(OptionAck::new(accepted.to_option_list()));
        ctx.finish_negotiation(accepted);
        Some(oack)
    } else {
        ctx.finish_negotiation(TransferOptionSet::new_empty());
        None
    }
}

fn unexpected(ctx: &Context, command: &Command) -> TransferError {
    match command {
        Command::Error(err) => TransferError::Remote {
            code: err.code,
            message: err.message.clone(),
        },
        Command::OptionAck(_) if !ctx.negotiate => {
            TransferError::Protocol("peer acknowledged options that were never proposed".into())
        }
        other => TransferError::Protocol(format!("unexpected {}", other)),
    }
}

fn cancelled(reason: ErrorPacket) -> TransferError {
    TransferError::Cancelled {
        code: reason.code,
        message: reason.message,
    }
}

/// Enters the terminal state for `err`, telling the peer where that makes sense.
fn terminate(ctx: &mut Context, err: TransferError) -> State {
    let notice = match &err {
        TransferError::Cancelled { code, message } => Some(ErrorPacket::new(*code, message.clone())),
        TransferError::Protocol(message) => {
            Some(ErrorPacket::new(ErrorCode::IllegalOperation, message.clone()))
        }
        TransferError::Stream(io) => Some(ErrorPacket::from(&**io)),
        TransferError::TimedOut { .. } => Some(ErrorPacket::new(
            ErrorCode::NotDefined,
            "exceeded max retransmissions",
        )),
        TransferError::Remote { .. } | TransferError::Transport(_) => None,
    };

    if let Some(notice) = notice {
        let peer = ctx.peer;
        ctx.send_best_effort(&Command::Error(notice), peer);
    }

    ctx.raise_error(&err);

    match err {
        TransferError::Remote { .. } => State::ReceivedError,
        TransferError::Cancelled { .. } => State::CancelledByUser,
        TransferError::TimedOut { .. } => State::TimedOut,
        TransferError::Protocol(_) | TransferError::Stream(_) | TransferError::Transport(_) => {
            State::Failed
        }
    }
}

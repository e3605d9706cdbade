use std::net::SocketAddr;

use crate::error::CheckError;
use crate::outcome::{CatchAll, Validity};

use super::classify::{Verdict, classify};
use super::reply::{ReplyBuffer, ServerReply};
use super::stage::DialogueStage;
use super::transport::{Deadline, TcpTransport, Transport};

const READ_CHUNK: usize = 512;

/// Everything the dialogue needs to say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialoguePlan {
    /// Name announced in `EHLO`.
    pub fqdn: String,
    /// Envelope sender for `MAIL FROM`; empty sends the null path.
    pub sender: String,
    /// Mailbox under test.
    pub recipient: String,
    /// Mailbox that should not exist, sent as a second `RCPT TO` to detect
    /// catch-all domains.
    pub probe: Option<String>,
    /// Extra RCPT code to read as acceptance.
    pub accept_code: Option<u16>,
}

/// A reply together with the stage that classified it.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReply {
    pub stage: DialogueStage,
    pub reply: ServerReply,
}

/// What a finished dialogue learned.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueRecord {
    pub validity: Validity,
    pub catch_all: CatchAll,
    /// Last reply that decided something about the target mailbox.
    pub last: Option<StageReply>,
    pub try_again: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    /// Reply not listed for this stage; keep reading.
    Wait,
    Send(String),
    /// Send `QUIT`. `abort` drops the connection right after writing it.
    Quit { abort: bool },
    Finish,
}

#[derive(Debug)]
struct DialogueState {
    stage: DialogueStage,
    probe_sent: bool,
    record: DialogueRecord,
}

impl DialogueState {
    fn new(plan: &DialoguePlan) -> Self {
        let catch_all = if plan.probe.is_some() {
            CatchAll::Unknown
        } else {
            CatchAll::NotAttempted
        };
        Self {
            stage: DialogueStage::Connect,
            probe_sent: false,
            record: DialogueRecord {
                validity: Validity::Unknown,
                catch_all,
                last: None,
                try_again: false,
            },
        }
    }

    fn connected(&mut self) {
        if self.stage == DialogueStage::Connect {
            self.stage = DialogueStage::Greet;
        }
    }

    fn closed(&mut self) {
        self.stage = DialogueStage::Closed;
    }

    /// The single transition function of the dialogue.
    fn advance(&mut self, reply: ServerReply, plan: &DialoguePlan) -> Action {
        use DialogueStage::{Closed, Ehlo, Greet, Mail, Quit, Rcpt, RcptProbe};

        let stage = self.stage;
        if matches!(stage, Quit | Closed) {
            tracing::debug!(%stage, code = reply.code, "dialogue finished");
            self.closed();
            return Action::Finish;
        }

        let verdict = if stage == Rcpt && plan.accept_code == Some(reply.code) {
            Some(Verdict::Success)
        } else {
            classify(stage, reply.code)
        };
        let Some(verdict) = verdict else {
            tracing::warn!(
                %stage,
                code = reply.code,
                text = %reply.text,
                "unexpected reply, waiting"
            );
            return Action::Wait;
        };
        tracing::debug!(%stage, code = reply.code, ?verdict, "reply classified");

        let action = match (stage, verdict) {
            (RcptProbe, Verdict::Success) => {
                // everything is accepted, so the RCPT result says nothing
                self.record.catch_all = CatchAll::Yes;
                self.record.validity = Validity::Unknown;
                self.stage = Quit;
                return Action::Quit { abort: false };
            }
            (RcptProbe, _) => {
                self.record.catch_all = CatchAll::No;
                self.stage = Quit;
                return Action::Quit { abort: false };
            }
            (Greet, Verdict::Advance) => {
                self.stage = Ehlo;
                Action::Send(format!("EHLO {}", plan.fqdn))
            }
            (Ehlo, Verdict::Advance) => {
                self.stage = Mail;
                Action::Send(format!("MAIL FROM:<{}>", plan.sender))
            }
            (Mail, Verdict::Advance) => {
                self.stage = Rcpt;
                Action::Send(format!("RCPT TO:<{}>", plan.recipient))
            }
            (Rcpt, Verdict::Success) => {
                self.record.validity = Validity::Valid;
                match &plan.probe {
                    Some(probe) if !self.probe_sent => {
                        self.probe_sent = true;
                        self.stage = RcptProbe;
                        Action::Send(format!("RCPT TO:<{probe}>"))
                    }
                    _ => {
                        self.stage = Quit;
                        Action::Quit { abort: false }
                    }
                }
            }
            (_, Verdict::SoftBounce) => {
                self.record.try_again = true;
                self.stage = Quit;
                Action::Quit { abort: false }
            }
            (_, Verdict::HardBounce) => {
                self.record.validity = Validity::Invalid;
                self.stage = Quit;
                Action::Quit { abort: true }
            }
            (_, Verdict::Advance | Verdict::Success) => {
                tracing::warn!(%stage, ?verdict, "verdict does not apply to stage, waiting");
                return Action::Wait;
            }
        };
        self.record.last = Some(StageReply { stage, reply });
        action
    }
}

/// One probing dialogue over one connection.
///
/// Stages run strictly in sequence: a command is written only after the
/// previous reply has been classified.
pub struct Conversation<T: Transport> {
    transport: T,
    plan: DialoguePlan,
    state: DialogueState,
    buffer: ReplyBuffer,
}

impl Conversation<TcpTransport> {
    /// Connects to one of `addrs` and returns a dialogue waiting for the
    /// banner of `host`.
    pub fn open(
        host: &str,
        addrs: &[SocketAddr],
        plan: DialoguePlan,
        deadline: Deadline,
    ) -> Result<Self, CheckError> {
        let transport = TcpTransport::connect(host, addrs, deadline).map_err(|err| {
            tracing::warn!(host, error = %err, "connection failed");
            CheckError::transport(DialogueStage::Connect, err)
        })?;
        Ok(Self::new(transport, plan))
    }
}

impl<T: Transport> Conversation<T> {
    /// Wraps an already connected transport.
    pub fn new(transport: T, plan: DialoguePlan) -> Self {
        let mut state = DialogueState::new(&plan);
        state.connected();
        Self {
            transport,
            plan,
            state,
            buffer: ReplyBuffer::new(),
        }
    }

    pub fn stage(&self) -> DialogueStage {
        self.state.stage
    }

    /// Drives the dialogue to `Closed`. Any transport failure before that
    /// point aborts the connection and fails the whole dialogue.
    pub fn run(mut self) -> Result<DialogueRecord, CheckError> {
        while self.state.stage != DialogueStage::Closed {
            let reply = match self.next_reply() {
                Ok(Some(reply)) => reply,
                Ok(None) if self.state.stage == DialogueStage::Quit => {
                    tracing::debug!("server closed after QUIT");
                    self.state.closed();
                    break;
                }
                Ok(None) => {
                    self.transport.abort();
                    return Err(CheckError::dialogue(
                        self.state.stage,
                        "connection closed by server",
                    ));
                }
                Err(err) => return Err(err),
            };
            tracing::debug!(stage = %self.state.stage, code = reply.code, text = %reply.text, "S");

            match self.state.advance(reply, &self.plan) {
                Action::Wait | Action::Finish => {}
                Action::Send(command) => self.send(&command)?,
                Action::Quit { abort } => {
                    self.send("QUIT")?;
                    if abort {
                        self.transport.abort();
                        self.state.closed();
                        return Ok(self.state.record);
                    }
                }
            }
        }
        self.transport.close();
        Ok(self.state.record)
    }

    fn send(&mut self, command: &str) -> Result<(), CheckError> {
        tracing::debug!(stage = %self.state.stage, command, "C");
        self.transport
            .write_line(command)
            .map_err(|err| self.fail(err))
    }

    fn next_reply(&mut self) -> Result<Option<ServerReply>, CheckError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(reply) = self.buffer.next_reply() {
                return Ok(Some(reply));
            }
            let read = self
                .transport
                .read_chunk(&mut chunk)
                .map_err(|err| self.fail(err))?;
            if read == 0 {
                return Ok(None);
            }
            self.buffer.extend(&chunk[..read]);
        }
    }

    fn fail(&mut self, err: super::TransportError) -> CheckError {
        tracing::warn!(stage = %self.state.stage, error = %err, "dialogue failed");
        self.transport.abort();
        CheckError::transport(self.state.stage, err)
    }
}

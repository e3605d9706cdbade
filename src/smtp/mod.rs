//! The SMTP probing dialogue.
//!
//! A [`Conversation`] connects to one exchanger and walks
//! `Greet → EHLO → MAIL FROM → RCPT TO → (probe RCPT TO) → QUIT`, reading
//! every reply through [`classify`]. It stops before `DATA`, so no message
//! is ever sent.

mod classify;
mod conversation;
mod reply;
mod stage;
mod transport;

pub use classify::{Verdict, classify};
pub use conversation::{Conversation, DialoguePlan, DialogueRecord, StageReply};
pub use reply::{ReplyBuffer, ServerReply};
pub use stage::DialogueStage;
pub use transport::{Canceller, Deadline, TcpTransport, Transport, TransportError};

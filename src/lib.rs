#![forbid(unsafe_code)]
//! mailprobe_lib: SMTP mailbox probing without sending mail.
//!
//! [`check_address`] resolves the MX hosts of the target domain, opens one
//! connection to the preferred exchanger and runs
//! `EHLO / MAIL FROM / RCPT TO` far enough to read the server's verdict on
//! the mailbox, optionally probing a random sibling address to spot
//! catch-all domains. It quits before `DATA`.

pub mod address;
mod check;
mod error;
pub mod mx;
pub mod outcome;
pub mod smtp;

pub use address::{AddressError, Mailbox, is_well_formed};
pub use check::{CheckOptions, check_address};
pub use error::CheckError;
pub use mx::{DnsServers, Exchanger, ResolutionError, resolve_exchangers, resolve_host};
pub use outcome::{CatchAll, Outcome, Settled, Validity};
pub use smtp::{DialogueStage, ServerReply, Verdict, classify};

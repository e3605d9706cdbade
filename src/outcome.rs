//! Terminal result shape of a check, whatever point the check reached.

use std::fmt;

use crate::error::CheckError;
use crate::smtp::{DialogueRecord, DialogueStage};

/// Stage name used when nothing was transmitted.
pub const PRE_DIALOGUE_STAGE: &str = "conn";

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid,
    #[default]
    Unknown,
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Valid => "true",
            Self::Invalid => "false",
            Self::Unknown => "unknown",
        })
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CatchAll {
    /// The server accepted a mailbox that should not exist.
    Yes,
    /// The server rejected the probe mailbox.
    No,
    /// The probe was enabled but the dialogue never got to it.
    #[default]
    Unknown,
    /// The probe was disabled.
    NotAttempted,
}

impl fmt::Display for CatchAll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yes => "true",
            Self::No => "false",
            Self::Unknown => "unknown",
            Self::NotAttempted => "not-attempted",
        })
    }
}

/// How far a check got.
#[derive(Debug, Clone, Copy)]
pub enum Settled<'a> {
    /// Stopped before any network activity.
    Skipped { reason: &'a str },
    /// Failed with an error and produced no dialogue record.
    Errored(&'a CheckError),
    /// The dialogue reached its end.
    Finished(&'a DialogueRecord),
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub address: String,
    pub valid: Validity,
    pub catch_all: CatchAll,
    pub last_stage: String,
    pub last_code: Option<u16>,
    pub last_message: Option<String>,
    /// A transient condition was seen; checking again later may conclude.
    pub try_again: bool,
}

impl Outcome {
    /// Shapes any end state into an [`Outcome`]. Pure: the same input always
    /// yields an equal value.
    pub fn normalize(address: &str, settled: &Settled<'_>) -> Self {
        match settled {
            Settled::Skipped { reason } => Self::short_circuit(address, reason.to_string(), false),
            Settled::Errored(err) => {
                let mut outcome = Self::short_circuit(address, err.to_string(), err.is_timeout());
                if err.stage() > DialogueStage::Greet {
                    outcome.last_stage = err.stage().as_str().to_string();
                }
                outcome
            }
            Settled::Finished(record) => {
                let (last_stage, last_code, last_message) = match &record.last {
                    Some(last) => (
                        last.stage.as_str().to_string(),
                        Some(last.reply.code),
                        Some(last.reply.text.clone()),
                    ),
                    None => (PRE_DIALOGUE_STAGE.to_string(), None, None),
                };
                Self {
                    address: address.to_string(),
                    valid: record.validity,
                    catch_all: record.catch_all,
                    last_stage,
                    last_code,
                    last_message,
                    try_again: record.try_again,
                }
            }
        }
    }

    fn short_circuit(address: &str, message: String, try_again: bool) -> Self {
        Self {
            address: address.to_string(),
            valid: Validity::Unknown,
            catch_all: CatchAll::Unknown,
            last_stage: PRE_DIALOGUE_STAGE.to_string(),
            last_code: None,
            last_message: Some(message),
            try_again,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} valid={} catch_all={} last={}",
            self.address, self.valid, self.catch_all, self.last_stage
        )?;
        if let Some(code) = self.last_code {
            write!(f, " {code}")?;
        }
        if let Some(message) = &self.last_message {
            write!(f, " \"{}\"", message.replace('\n', " / "))?;
        }
        if self.try_again {
            f.write_str(" (try again)")?;
        }
        Ok(())
    }
}

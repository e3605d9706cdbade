use std::borrow::Cow;
use std::time::Duration;

use rand::{Rng, distributions::Alphanumeric};

use crate::address::Mailbox;
use crate::error::CheckError;
use crate::mx::{DnsServers, Exchanger};

/// Controls how [`check_address`](crate::check_address) talks to DNS and
/// to the mail exchanger.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOptions {
    pub port: u16,
    /// Envelope sender. Empty falls back to `postmaster@<target domain>`.
    pub sender: String,
    /// Bound on the whole check; `0` disables it.
    pub timeout_ms: u64,
    /// Name announced in `EHLO`. Empty falls back to the target domain.
    pub fqdn: String,
    /// Talk to this host directly; no MX lookup.
    pub smtp_host: Option<String>,
    /// Pre-built exchanger list; no MX lookup.
    pub exchangers: Option<Vec<Exchanger>>,
    pub dns: DnsServers,
    pub catch_all_probe: bool,
    /// Local part of the catch-all probe. Random when unset.
    pub probe_local_part: Option<String>,
    /// RCPT reply code to read as acceptance on top of 250/251.
    pub accept_code: Option<u16>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            port: 25,
            sender: "info@example.org".to_string(),
            timeout_ms: 10_000,
            fqdn: "mail.example.org".to_string(),
            smtp_host: None,
            exchangers: None,
            dns: DnsServers::System,
            catch_all_probe: true,
            probe_local_part: None,
            accept_code: None,
        }
    }
}

impl CheckOptions {
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.timeout_ms))
        }
    }

    /// `EHLO` name. Fails when the configured value spans several lines.
    pub fn fqdn<'a>(&'a self, ascii_domain: &'a str) -> Result<Cow<'a, str>, CheckError> {
        let fqdn = single_line("fqdn", self.fqdn.trim())?;
        if fqdn.is_empty() {
            Ok(Cow::Borrowed(ascii_domain))
        } else {
            Ok(Cow::Borrowed(fqdn))
        }
    }

    pub fn envelope_sender(&self, ascii_domain: &str) -> Result<String, CheckError> {
        let sender = single_line("sender", self.sender.trim())?;
        if sender.is_empty() {
            Ok(format!("postmaster@{ascii_domain}"))
        } else {
            Ok(sender.to_string())
        }
    }

    /// Address used for the catch-all probe, if the probe is enabled.
    pub fn probe_address(&self, target: &Mailbox) -> Result<Option<String>, CheckError> {
        if !self.catch_all_probe {
            return Ok(None);
        }
        let local = match self.probe_local_part.as_deref().map(str::trim) {
            Some(local) if !local.is_empty() => single_line("probe_local_part", local)?.to_string(),
            _ => random_local_part(target.local.len()),
        };
        Ok(Some(target.sibling(&local)))
    }
}

fn single_line<'a>(option: &'static str, value: &'a str) -> Result<&'a str, CheckError> {
    if value.contains(['\r', '\n']) {
        Err(CheckError::InvalidOption { option })
    } else {
        Ok(value)
    }
}

fn random_local_part(len: usize) -> String {
    let length = len.clamp(16, 32);
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect()
}

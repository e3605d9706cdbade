mod options;

pub use options::CheckOptions;

use std::net::SocketAddr;
use std::time::Duration;

use crate::address::Mailbox;
use crate::error::CheckError;
use crate::mx::{Exchanger, ResolutionError, resolve_exchangers, resolve_host};
use crate::outcome::{Outcome, Settled};
use crate::smtp::{Conversation, Deadline, DialoguePlan, DialogueStage};

/// Checks whether `address` looks deliverable, without sending a message.
///
/// The preferred exchanger of the domain is asked to accept the address as
/// a recipient; the dialogue stops before `DATA`. SMTP rejections are part of
/// the returned [`Outcome`]. Only resolution failures, socket errors and
/// timeouts are errors, and only one exchanger is ever tried. The configured
/// timeout bounds the whole check, DNS included.
pub fn check_address(address: &str, options: &CheckOptions) -> Result<Outcome, CheckError> {
    check_with(
        address,
        options,
        |domain, timeout| resolve_exchangers(domain, &options.dns, timeout),
        |host, timeout| resolve_host(host, options.port, &options.dns, timeout),
    )
}

pub(crate) fn check_with<F, H>(
    address: &str,
    options: &CheckOptions,
    resolve_mx: F,
    resolve_addrs: H,
) -> Result<Outcome, CheckError>
where
    F: FnOnce(&str, Option<Duration>) -> Result<Vec<Exchanger>, ResolutionError>,
    H: FnOnce(&str, Option<Duration>) -> Result<Vec<SocketAddr>, ResolutionError>,
{
    let address = address.trim();
    let mailbox = match Mailbox::parse(address) {
        Ok(mailbox) => mailbox,
        Err(err) => {
            tracing::info!(address, error = %err, "syntax check failed, skipping network");
            let reason = err.to_string();
            return Ok(Outcome::normalize(address, &Settled::Skipped { reason: &reason }));
        }
    };

    let plan = DialoguePlan {
        fqdn: options.fqdn(&mailbox.domain)?.into_owned(),
        sender: options.envelope_sender(&mailbox.domain)?,
        recipient: mailbox.to_string(),
        probe: options.probe_address(&mailbox)?,
        accept_code: options.accept_code,
    };

    let deadline = Deadline::after(options.timeout());
    let host = target_host(&mailbox, options, |domain| {
        Ok(resolve_mx(domain, time_left(&deadline)?)?)
    })
    .inspect_err(|err| {
        tracing::warn!(address, error = %err, "no exchanger to talk to");
    })?;
    let addrs = resolve_addrs(&host, time_left(&deadline)?).inspect_err(|err| {
        tracing::warn!(address, host = %host, error = %err, "exchanger has no usable address");
    })?;
    tracing::debug!(
        address,
        host = %host,
        port = options.port,
        probe = ?plan.probe,
        "starting dialogue"
    );

    let record = Conversation::open(&host, &addrs, plan, deadline)?.run()?;
    let outcome = Outcome::normalize(address, &Settled::Finished(&record));
    tracing::info!(
        address,
        host = %host,
        valid = %outcome.valid,
        catch_all = %outcome.catch_all,
        code = ?outcome.last_code,
        "check finished"
    );
    Ok(outcome)
}

/// Share of the check budget still available to the next step.
fn time_left(deadline: &Deadline) -> Result<Option<Duration>, CheckError> {
    deadline
        .remaining()
        .map_err(|err| CheckError::transport(DialogueStage::Connect, err))
}

/// Host override first, then the caller's exchanger list, then DNS.
pub(crate) fn target_host<F>(
    mailbox: &Mailbox,
    options: &CheckOptions,
    resolve: F,
) -> Result<String, CheckError>
where
    F: FnOnce(&str) -> Result<Vec<Exchanger>, CheckError>,
{
    if let Some(host) = options.smtp_host.as_deref().map(str::trim) {
        if !host.is_empty() {
            return Ok(host.to_string());
        }
    }
    let exchangers = match &options.exchangers {
        Some(list) => Exchanger::ordered(list.clone())?,
        None => resolve(&mailbox.domain)?,
    };
    exchangers
        .into_iter()
        .next()
        .map(|exchanger| exchanger.host)
        .ok_or_else(|| ResolutionError::NoMxRecords.into())
}

#[cfg(test)]
mod tests;

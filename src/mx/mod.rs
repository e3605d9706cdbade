//! Mail exchanger resolution.
//!
//! [`resolve_exchangers`] looks up the MX records of a domain and returns them
//! in ascending priority order. Callers holding a pre-built list skip DNS
//! entirely through [`Exchanger::ordered`]. [`resolve_host`] turns the chosen
//! exchanger into socket addresses through the same name servers.

mod error;
mod resolver;
mod types;

pub use error::ResolutionError;
pub use resolver::{resolve_exchangers, resolve_host};
pub use types::{DnsServers, Exchanger};

#[cfg(test)]
pub(crate) use resolver::{host_addrs_with, resolve_with};

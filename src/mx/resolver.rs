use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use trust_dns_resolver::{
    Resolver,
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
    proto::op::ResponseCode,
    system_conf,
};

use super::{DnsServers, Exchanger, ResolutionError};

/// Looks up the MX records of `domain` and returns them by ascending priority.
///
/// The domain is normalised via IDNA first. `timeout` bounds each DNS query.
/// An empty answer is [`ResolutionError::NoMxRecords`]; every other failure,
/// including an unknown domain, is [`ResolutionError::Lookup`].
pub fn resolve_exchangers(
    domain: &str,
    servers: &DnsServers,
    timeout: Option<Duration>,
) -> Result<Vec<Exchanger>, ResolutionError> {
    let resolver = build_resolver(servers, timeout)?;
    let ascii = normalize_domain(domain)?;
    resolve_with(&resolver, &ascii)
}

pub(crate) fn resolve_with<R>(
    resolver: &R,
    ascii_domain: &str,
) -> Result<Vec<Exchanger>, ResolutionError>
where
    R: LookupMx,
{
    let mut exchangers = resolver.lookup_mx(ascii_domain).map_err(|err| {
        tracing::warn!(domain = ascii_domain, error = %err, "MX lookup failed");
        ResolutionError::lookup(err)
    })?;
    if exchangers.is_empty() {
        tracing::debug!(domain = ascii_domain, "MX answer set is empty");
        return Err(ResolutionError::NoMxRecords);
    }
    // stable: equal priorities stay in answer order
    exchangers.sort_by_key(|exchanger| exchanger.priority);
    tracing::debug!(
        domain = ascii_domain,
        count = exchangers.len(),
        preferred = %exchangers[0].host,
        "resolved mail exchangers"
    );
    Ok(exchangers)
}

/// Socket addresses of an exchanger host, looked up through the same servers
/// as the MX records. IP literals (bracketed or not) skip DNS.
pub fn resolve_host(
    host: &str,
    port: u16,
    servers: &DnsServers,
    timeout: Option<Duration>,
) -> Result<Vec<SocketAddr>, ResolutionError> {
    if let Some(ip) = ip_literal(host) {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }
    let resolver = build_resolver(servers, timeout)?;
    let ascii = normalize_domain(host)?;
    host_addrs_with(&resolver, &ascii, port)
}

pub(crate) fn host_addrs_with<R>(
    resolver: &R,
    ascii_host: &str,
    port: u16,
) -> Result<Vec<SocketAddr>, ResolutionError>
where
    R: LookupHost,
{
    let ips = resolver.lookup_host(ascii_host).map_err(|err| {
        tracing::warn!(host = ascii_host, error = %err, "address lookup failed");
        ResolutionError::host_lookup(ascii_host, err)
    })?;
    if ips.is_empty() {
        return Err(ResolutionError::NoHostAddress {
            host: ascii_host.to_string(),
        });
    }
    tracing::debug!(host = ascii_host, count = ips.len(), "resolved exchanger addresses");
    Ok(ips.into_iter().map(|ip| SocketAddr::new(ip, port)).collect())
}

fn ip_literal(host: &str) -> Option<IpAddr> {
    let host = host.trim();
    let bare = host
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(host);
    bare.parse().ok()
}

fn build_resolver(
    servers: &DnsServers,
    timeout: Option<Duration>,
) -> Result<Resolver, ResolutionError> {
    let (config, mut opts) = match servers.socket_addrs()? {
        None => system_conf::read_system_conf().map_err(ResolutionError::resolver_init)?,
        Some(addrs) => {
            let mut group = NameServerConfigGroup::new();
            for addr in addrs {
                group.merge(NameServerConfigGroup::from_ips_clear(
                    &[addr.ip()],
                    addr.port(),
                    true,
                ));
            }
            (
                ResolverConfig::from_parts(None, Vec::new(), group),
                ResolverOpts::default(),
            )
        }
    };
    if let Some(timeout) = timeout {
        opts.timeout = timeout;
        opts.attempts = 1;
    }
    Resolver::new(config, opts).map_err(ResolutionError::resolver_init)
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, ResolutionError> {
    let trimmed = domain.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(ResolutionError::EmptyDomain);
    }
    idna::domain_to_ascii(trimmed)
        .map(|ascii| ascii.to_ascii_lowercase())
        .map_err(ResolutionError::idna)
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}

pub(crate) trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<Exchanger>, ResolveError>;
}

impl LookupMx for Resolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<Exchanger>, ResolveError> {
        let lookup = match Resolver::mx_lookup(self, domain) {
            Ok(lookup) => lookup,
            Err(err) if is_empty_answer(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        Ok(lookup
            .iter()
            .map(|mx| {
                Exchanger::new(mx.preference(), normalize_exchange(mx.exchange().to_utf8()))
            })
            .collect())
    }
}

pub(crate) trait LookupHost {
    fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

impl LookupHost for Resolver {
    fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        match Resolver::lookup_ip(self, host) {
            Ok(lookup) => Ok(lookup.iter().collect()),
            Err(err) if is_empty_answer(&err) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

/// NOERROR with no answers; NXDOMAIN stays a lookup failure.
fn is_empty_answer(err: &ResolveError) -> bool {
    matches!(
        err.kind(),
        ResolveErrorKind::NoRecordsFound {
            response_code: ResponseCode::NoError,
            ..
        }
    )
}

#[cfg(test)]
impl LookupMx for crate::mx::tests::StubResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<Exchanger>, ResolveError> {
        (self.on_lookup)(domain)
    }
}

#[cfg(test)]
impl LookupHost for crate::mx::tests::StubResolver {
    fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        (self.on_host)(host)
    }
}

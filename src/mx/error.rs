use thiserror::Error;

/// Failures of the exchanger resolution stage. None of them is retried.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("domain is empty")]
    EmptyDomain,
    #[error("invalid DNS options")]
    InvalidDnsOptions { entry: Option<String> },
    #[error("domain IDNA conversion failed")]
    IdnaConversion {
        #[source]
        source: idna::Errors,
    },
    #[error("error while resolving MX")]
    ResolverInit {
        #[source]
        source: std::io::Error,
    },
    #[error("error while resolving MX")]
    Lookup {
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[error("no MX records")]
    NoMxRecords,
    #[error("error while resolving exchanger host {host}")]
    HostLookup {
        host: String,
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[error("no address for exchanger host {host}")]
    NoHostAddress { host: String },
}

impl ResolutionError {
    pub(crate) fn invalid_dns(entry: Option<&str>) -> Self {
        Self::InvalidDnsOptions {
            entry: entry.map(str::to_string),
        }
    }

    pub(crate) fn idna(source: idna::Errors) -> Self {
        Self::IdnaConversion { source }
    }

    pub(crate) fn resolver_init(source: std::io::Error) -> Self {
        Self::ResolverInit { source }
    }

    pub(crate) fn lookup(source: trust_dns_resolver::error::ResolveError) -> Self {
        Self::Lookup { source }
    }

    pub(crate) fn host_lookup(host: &str, source: trust_dns_resolver::error::ResolveError) -> Self {
        Self::HostLookup {
            host: host.to_string(),
            source,
        }
    }
}

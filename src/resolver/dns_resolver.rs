use std::io;

use tokio::net::lookup_host;
use tonic::async_trait;
use tracing::trace;

use crate::default_check_target;
use crate::Endpoint;
use crate::ResolveError;
use crate::Resolver;

/// Resolver using the system name service.
///
/// Targets are `host`, `host:port` or `[v6-literal]:port`. Every distinct
/// address becomes an unweighted endpoint whose hostname is the IP address.
#[derive(Debug, Clone)]
pub struct DnsResolver {
    default_port: u16,
}

impl DnsResolver {
    pub fn new(default_port: u16) -> Self {
        Self { default_port }
    }

    /// Splits a target into host and port, falling back to the default port
    pub(crate) fn split_target(
        &self,
        target: &str,
    ) -> Result<(String, u16), ResolveError> {
        if let Some(rest) = target.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| ResolveError::Invalid(format!("unterminated IPv6 literal in {target}")))?;
            let port = match tail {
                "" => self.default_port,
                _ => {
                    let port = tail.strip_prefix(':').ok_or_else(|| {
                        ResolveError::Invalid(format!("unexpected {tail:?} after IPv6 literal"))
                    })?;
                    parse_port(port)?
                }
            };
            return Ok((host.to_string(), port));
        }

        match target.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => Ok((host.to_string(), parse_port(port)?)),
            // Bare IPv6 literal
            Some(_) => Ok((target.to_string(), self.default_port)),
            None => Ok((target.to_string(), self.default_port)),
        }
    }
}

fn parse_port(port: &str) -> Result<u16, ResolveError> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(ResolveError::Invalid(format!("invalid port {port:?}"))),
        Ok(p) => Ok(p),
    }
}

/// Maps a failed lookup to a resolver outcome.
///
/// The system resolver reports an unknown host as an uncategorised
/// `io::Error`, so besides `ErrorKind::NotFound` this matches the English
/// getaddrinfo/WinSock messages. Under other locales or platforms an unknown
/// host falls through to `Transient` and is retried until the retry budget
/// runs out.
pub(crate) fn classify_lookup_error(e: io::Error) -> ResolveError {
    let message = e.to_string();
    let unknown_host = e.kind() == io::ErrorKind::NotFound
        || message.contains("not known")
        || message.contains("No address associated")
        || message.contains("No such host");
    if unknown_host {
        ResolveError::NotFound
    } else {
        ResolveError::Transient(message)
    }
}

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(
        &self,
        target: &str,
    ) -> Result<Vec<Endpoint>, ResolveError> {
        let (host, port) = self.split_target(target)?;
        let addrs = lookup_host((host.as_str(), port))
            .await
            .map_err(classify_lookup_error)?;

        let members: Vec<Endpoint> = addrs
            .map(|addr| Endpoint::new(addr.ip().to_string(), addr.port(), 0))
            .collect();

        trace!(target = %target, members = members.len(), "DNS lookup completed");

        if members.is_empty() {
            return Err(ResolveError::NotFound);
        }
        Ok(members)
    }

    fn check_target(
        &self,
        target: &str,
    ) -> Result<(), ResolveError> {
        default_check_target(target)?;
        let (host, _) = self.split_target(target)?;
        if host.is_empty() {
            return Err(ResolveError::Invalid(format!("{target} has no host part")));
        }
        Ok(())
    }
}

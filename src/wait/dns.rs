use std::collections::BTreeSet;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};

use thiserror::Error;
use tracing::{debug, info};

use super::{Poll, WaitError, wait_for};
use crate::retry::backoff::Backoff;

#[cfg_attr(test, mockall::automock)]
pub trait HostResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolves names through the operating system resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        Ok((host, 443)
            .to_socket_addrs()?
            .map(|addr| addr.ip())
            .collect())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("hosts not resolved within {timeout:?}: {}", pending.join(", "))]
pub struct UnknownHostsError {
    pub pending: Vec<String>,
    pub timeout: std::time::Duration,
}

/// Waits until every host in `hosts` resolves at least once.
///
/// Resolved hosts are removed from the pending set and never queried again.
pub fn wait_until_hosts_are_resolved<R, I, H>(
    resolver: &R,
    hosts: I,
    backoff: Backoff,
) -> Result<(), UnknownHostsError>
where
    R: HostResolver,
    I: IntoIterator<Item = H>,
    H: Into<String>,
{
    let mut pending: BTreeSet<String> = hosts.into_iter().map(Into::into).collect();

    let result = wait_for("hosts to be resolved", backoff, |_| {
        pending.retain(|host| match resolver.resolve(host) {
            Ok(addresses) if !addresses.is_empty() => {
                info!(%host, ?addresses, "host resolved");
                false
            }
            Ok(_) => {
                debug!(%host, "host resolved without addresses");
                true
            }
            Err(err) => {
                debug!(%host, %err, "failed to resolve host");
                true
            }
        });

        if pending.is_empty() {
            Ok::<_, std::convert::Infallible>(Poll::Ready(()))
        } else {
            Ok(Poll::Pending(pending.len()))
        }
    });

    match result {
        Ok(()) => Ok(()),
        Err(WaitError::Timeout { timeout, .. }) => Err(UnknownHostsError {
            pending: pending.into_iter().collect(),
            timeout,
        }),
        Err(WaitError::Probe(never)) => match never {},
    }
}

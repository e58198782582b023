use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::model::{KafkaRequest, KafkaStatus};
use crate::wait::WaitError;
use crate::wait::dns::UnknownHostsError;

/// How long a wait lasted before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    pub elapsed: Duration,
    pub timeout: Duration,
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "after {:?} (timeout {:?})", self.elapsed, self.timeout)
    }
}

#[derive(Error, Debug)]
pub enum KafkaError<E> {
    #[error("kafka instance {} is not ready, last status {}{}", id(.kafka), status(.kafka), bounds(.elapsed))]
    NotReady {
        kafka: Option<Box<KafkaRequest>>,
        elapsed: Option<Elapsed>,
    },

    #[error("kafka instance {} did not start provisioning, last status {} {elapsed}", id(.kafka), status(.kafka))]
    Unprovisioned {
        kafka: Option<Box<KafkaRequest>>,
        elapsed: Elapsed,
    },

    #[error("kafka instance {} is not deleted, last status {} {elapsed}", id(.kafka), status(.kafka))]
    NotDeleted {
        kafka: Option<Box<KafkaRequest>>,
        elapsed: Elapsed,
    },

    #[error("kafka instance {id} did not reach status {expected}, last status {} {elapsed}", last_status(.last))]
    UnexpectedState {
        id: String,
        expected: KafkaStatus,
        last: Option<KafkaStatus>,
        elapsed: Elapsed,
    },

    #[error("kafka instance {id} has no bootstrap server host")]
    MissingBootstrapHost { id: String },

    #[error(transparent)]
    UnknownHosts(#[from] UnknownHostsError),

    #[error("cluster capacity exhausted: {0}")]
    CapacityExhausted(#[source] E),

    #[error("kafka instance did not switch the owner {elapsed}, last error: {}", or_none(.last_error))]
    OwnerNotChanged {
        elapsed: Elapsed,
        last_error: Option<String>,
    },

    #[error("metric matching `{pattern}` not found for kafka instance {id}")]
    MetricNotFound { id: String, pattern: String },

    #[error(transparent)]
    Api(E),
}

fn id(kafka: &Option<Box<KafkaRequest>>) -> &str {
    kafka.as_deref().map(|k| k.id.as_str()).unwrap_or("<unknown>")
}

fn status(kafka: &Option<Box<KafkaRequest>>) -> &str {
    kafka
        .as_deref()
        .map(KafkaRequest::status_str)
        .unwrap_or("unknown")
}

fn last_status(last: &Option<KafkaStatus>) -> &str {
    last.as_ref().map(KafkaStatus::as_str).unwrap_or("unknown")
}

fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("none")
}

fn bounds(elapsed: &Option<Elapsed>) -> String {
    elapsed.map(|e| format!(" {e}")).unwrap_or_default()
}

impl<E> KafkaError<E> {
    /// Maps a failed wait: probe errors become [KafkaError::Api], timeouts are handed to `timeout`
    /// with the last observed instance.
    pub(crate) fn from_wait<F>(err: WaitError<KafkaRequest, E>, timeout: F) -> Self
    where
        F: FnOnce(Option<Box<KafkaRequest>>, Elapsed) -> Self,
    {
        match err {
            WaitError::Probe(err) => Self::Api(err),
            WaitError::Timeout {
                timeout: limit,
                elapsed,
                last,
                ..
            } => timeout(
                last.map(Box::new),
                Elapsed {
                    elapsed,
                    timeout: limit,
                },
            ),
        }
    }

    pub fn api(&self) -> Option<&E> {
        match self {
            Self::Api(err) | Self::CapacityExhausted(err) => Some(err),
            _ => None,
        }
    }

    /// The instance last observed before the failure, if any.
    pub fn kafka(&self) -> Option<&KafkaRequest> {
        match self {
            Self::NotReady { kafka, .. }
            | Self::Unprovisioned { kafka, .. }
            | Self::NotDeleted { kafka, .. } => kafka.as_deref(),
            _ => None,
        }
    }
}

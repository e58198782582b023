use thiserror::Error;

use super::model::Registry;
use crate::kafka_mgmt::error::Elapsed;
use crate::wait::WaitError;

#[derive(Error, Debug)]
pub enum RegistryError<E> {
    #[error("registry {} is not ready, last status {} {elapsed}", id(.registry), status(.registry))]
    NotReady {
        registry: Option<Box<Registry>>,
        elapsed: Elapsed,
    },

    #[error("registry {} is not deleted, last status {} {elapsed}", id(.registry), status(.registry))]
    NotDeleted {
        registry: Option<Box<Registry>>,
        elapsed: Elapsed,
    },

    #[error(transparent)]
    Api(E),
}

fn id(registry: &Option<Box<Registry>>) -> &str {
    registry
        .as_deref()
        .map(|r| r.id.as_str())
        .unwrap_or("<unknown>")
}

fn status(registry: &Option<Box<Registry>>) -> &str {
    registry
        .as_deref()
        .map(Registry::status_str)
        .unwrap_or("unknown")
}

impl<E> RegistryError<E> {
    pub(crate) fn from_wait<F>(err: WaitError<Registry, E>, timeout: F) -> Self
    where
        F: FnOnce(Option<Box<Registry>>, Elapsed) -> Self,
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
}

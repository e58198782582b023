use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::RegistryError;
use super::model::{Registry, RegistryCreate, RegistryListQuery, RegistryStatus};
use super::RegistryMgmtApi;
use crate::client::ClientError;
use crate::retry::backoff::Backoff;
use crate::wait::{wait_until, wait_until_absent};

pub const REGISTRY_READY: Backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(60));
pub const REGISTRY_DELETED: Backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(20));

pub type RegistryResult<T> = Result<T, RegistryError<ClientError>>;

/// Registries matching `name`. Names are not unique, so more than one can be returned.
pub fn get_registry_by_name<A>(api: &A, name: &str) -> Result<Vec<Registry>, ClientError>
where
    A: RegistryMgmtApi + ?Sized,
{
    let list = api.get_registries(&RegistryListQuery::search(format!("name = {}", name.trim())))?;
    Ok(list.items)
}

/// Returns the first registry named like `payload`, or creates it and waits until it is ready.
pub fn apply_registry<A>(api: &A, payload: &RegistryCreate, ready: Backoff) -> RegistryResult<Registry>
where
    A: RegistryMgmtApi + ?Sized,
{
    let existing = get_registry_by_name(api, &payload.name).map_err(RegistryError::Api)?;
    if let Some(registry) = existing.into_iter().next() {
        warn!(registry = %registry.name, "registry already exists");
        debug!(?registry);
        return Ok(registry);
    }

    info!(registry = %payload.name, "create registry");
    let registry = api.create_registry(payload).map_err(RegistryError::Api)?;
    wait_until_registry_is_ready(api, &registry.id, ready)
}

pub fn wait_until_registry_is_ready<A>(api: &A, id: &str, backoff: Backoff) -> RegistryResult<Registry>
where
    A: RegistryMgmtApi + ?Sized,
{
    wait_for_registry_ready(|| api.get_registry(id), backoff)
}

/// Waits until the management API answers 404 for the registry.
pub fn wait_until_registry_is_deleted<A>(api: &A, id: &str, backoff: Backoff) -> RegistryResult<()>
where
    A: RegistryMgmtApi + ?Sized,
{
    wait_for_registry_deleted(
        || match api.get_registry(id) {
            Ok(registry) => Ok(Some(registry)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        },
        backoff,
    )
}

/// Deletes every registry named `name`.
pub fn delete_registry_by_name_if_exists<A>(api: &A, name: &str) -> Result<(), ClientError>
where
    A: RegistryMgmtApi + ?Sized,
{
    let registries = get_registry_by_name(api, name)?;
    if registries.is_empty() {
        warn!(registry = %name, "registry not found");
    }
    for registry in registries {
        info!(registry_id = %registry.id, "delete registry");
        api.delete_registry(&registry.id)?;
    }
    Ok(())
}

pub fn wait_for_registry_ready<E, F>(probe: F, backoff: Backoff) -> Result<Registry, RegistryError<E>>
where
    F: FnMut() -> Result<Registry, E>,
{
    let registry = wait_until("registry to be ready", backoff, probe, |registry: &Registry| {
        registry.is(&RegistryStatus::Ready)
    })
    .map_err(|err| {
        RegistryError::from_wait(err, |registry, elapsed| RegistryError::NotReady {
            registry,
            elapsed,
        })
    })?;

    info!(registry = %registry.name, "service registry is ready");
    debug!(?registry);
    Ok(registry)
}

pub fn wait_for_registry_deleted<E, F>(probe: F, backoff: Backoff) -> Result<(), RegistryError<E>>
where
    F: FnMut() -> Result<Option<Registry>, E>,
{
    wait_until_absent("registry to be deleted", backoff, probe).map_err(|err| {
        RegistryError::from_wait(err, |registry, elapsed| RegistryError::NotDeleted {
            registry,
            elapsed,
        })
    })
}

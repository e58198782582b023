//! Lifecycle helpers for Kafka instances: create or reuse, wait for state transitions and clean up.
//!
//! Every wait comes in two flavours: a method on [KafkaLifecycle] probing through the management
//! API, and a free function taking the probe as a closure so other front-ends (e.g. the CLI) can
//! drive the same conditions.
use std::convert::Infallible;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use super::error::{Elapsed, KafkaError};
use super::hosts::kafka_hosts;
use super::model::{
    KafkaListQuery, KafkaRequest, KafkaRequestPayload, KafkaStatus, KafkaUpdateRequest,
};
use super::KafkaMgmtApi;
use crate::client::ClientError;
use crate::config::E2eConfig;
use crate::kafka_instance::{KafkaInstanceApi, apply_topic};
use crate::retry::backoff::Backoff;
use crate::retry::classifier::is_capacity_exhausted;
use crate::retry::{CAPACITY_RETRY_INTERVAL, CAPACITY_RETRY_TIMEOUT, RetryPolicy, retry_with_policy};
use crate::wait::dns::{HostResolver, SystemResolver, wait_until_hosts_are_resolved};
use crate::wait::{Poll, WaitError, wait_for, wait_until, wait_until_absent};

/// Topic created and deleted to find out whether the new owner already has admin rights.
pub const OWNER_PROBE_TOPIC: &str = "topic-used-to-wait";

const PARTITION_LIMIT_METRIC: &str = r"(?m)^kafka_instance_partition_limit.*\s(\d+)$";
const MESSAGE_SIZE_LIMIT_METRIC: &str = r"(?m)^kafka_instance_max_message_size_limit.*\s(\d+)$";
const DESIRED_BROKER_COUNT_METRIC: &str =
    r"(?m)^kafka_instance_spec_brokers_desired_count.*\s(\d+)$";

/// Statuses from which an existing instance is expected to become ready on its own.
const RECOVERABLE_STATUSES: [KafkaStatus; 7] = [
    KafkaStatus::Accepted,
    KafkaStatus::Preparing,
    KafkaStatus::Provisioning,
    KafkaStatus::Failed,
    KafkaStatus::Suspended,
    KafkaStatus::Resuming,
    KafkaStatus::Suspending,
];

pub type KafkaResult<T> = Result<T, KafkaError<ClientError>>;

/// Poll interval and timeout of every Kafka wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KafkaTimings {
    pub capacity: Backoff,
    pub provisioning: Backoff,
    pub ready: Backoff,
    pub hosts: Backoff,
    pub suspended: Backoff,
    pub resumed: Backoff,
    pub deleted: Backoff,
    pub owner_changed: Backoff,
}

impl Default for KafkaTimings {
    fn default() -> Self {
        Self {
            capacity: Backoff::new(CAPACITY_RETRY_INTERVAL, CAPACITY_RETRY_TIMEOUT),
            provisioning: Backoff::new(Duration::from_secs(30), Duration::from_secs(24 * 60 * 60)),
            ready: Backoff::new(Duration::from_secs(10), Duration::from_secs(30 * 60)),
            hosts: Backoff::new(Duration::from_secs(5), Duration::from_secs(5 * 60)),
            suspended: Backoff::new(Duration::from_secs(5), Duration::from_secs(60)),
            resumed: Backoff::new(Duration::from_secs(10), Duration::from_secs(5 * 60)),
            deleted: Backoff::new(Duration::from_secs(10), Duration::from_secs(10 * 60)),
            owner_changed: Backoff::new(Duration::from_secs(10), Duration::from_secs(5 * 60)),
        }
    }
}

/// Default creation payload for the configured cloud provider and region.
pub fn default_kafka_payload(config: &E2eConfig, name: &str) -> KafkaRequestPayload {
    KafkaRequestPayload::new(name)
        .with_cloud_provider(&config.cloud_provider)
        .with_region(&config.default_kafka_region)
}

pub struct KafkaLifecycle<A, R = SystemResolver> {
    api: A,
    resolver: R,
    timings: KafkaTimings,
    skip_teardown: bool,
}

impl<A: KafkaMgmtApi> KafkaLifecycle<A> {
    pub fn new(api: A) -> Self {
        Self::with_resolver(api, SystemResolver)
    }
}

impl<A, R> KafkaLifecycle<A, R>
where
    A: KafkaMgmtApi,
    R: HostResolver,
{
    pub fn with_resolver(api: A, resolver: R) -> Self {
        Self {
            api,
            resolver,
            timings: KafkaTimings::default(),
            skip_teardown: false,
        }
    }

    pub fn with_timings(self, timings: KafkaTimings) -> Self {
        Self { timings, ..self }
    }

    pub fn with_skip_teardown(self, skip_teardown: bool) -> Self {
        Self {
            skip_teardown,
            ..self
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn timings(&self) -> &KafkaTimings {
        &self.timings
    }

    pub fn get_kafka_by_name(&self, name: &str) -> Result<Option<KafkaRequest>, ClientError> {
        self.first_kafka(format!("name = {}", name.trim()))
    }

    pub fn get_kafka_by_owner(&self, owner: &str) -> Result<Option<KafkaRequest>, ClientError> {
        self.first_kafka(format!("owner = {}", owner.trim()))
    }

    fn first_kafka(&self, search: String) -> Result<Option<KafkaRequest>, ClientError> {
        let list = self.api.get_kafkas(&KafkaListQuery::first(search))?;
        Ok(list.items.into_iter().next())
    }

    /// Returns the instance named like `payload`, creating it when missing, once it is ready.
    pub fn apply_kafka_instance(&self, payload: &KafkaRequestPayload) -> KafkaResult<KafkaRequest> {
        let kafka = match self
            .get_kafka_by_name(&payload.name)
            .map_err(KafkaError::Api)?
        {
            Some(kafka) => {
                warn!(kafka = %kafka.name, "kafka instance already exists");
                debug!(?kafka);
                kafka
            }
            None => {
                info!(kafka = %payload.name, "create kafka instance");
                self.create_kafka_instance(payload)?
            }
        };

        if kafka.is(&KafkaStatus::Ready) {
            return Ok(kafka);
        }
        if RECOVERABLE_STATUSES.iter().any(|status| kafka.is(status)) {
            return self.wait_until_kafka_is_ready(&kafka.id);
        }
        Err(KafkaError::NotReady {
            kafka: Some(Box::new(kafka)),
            elapsed: None,
        })
    }

    /// Creates the instance, waiting for cluster capacity if needed, and returns it once it
    /// started provisioning.
    pub fn create_kafka_instance(&self, payload: &KafkaRequestPayload) -> KafkaResult<KafkaRequest> {
        let kafka = self.attempt_creating_kafka_instance(payload, self.timings.capacity)?;
        self.wait_until_kafka_is_provisioning(&kafka.id)
    }

    /// Requests the creation every `backoff.interval()` while the cluster capacity is exhausted.
    pub fn attempt_creating_kafka_instance(
        &self,
        payload: &KafkaRequestPayload,
        backoff: Backoff,
    ) -> KafkaResult<KafkaRequest> {
        retry_with_policy(
            RetryPolicy::FixedInterval(backoff),
            || self.api.create_kafka(true, payload),
            is_capacity_exhausted,
        )
        .map_err(|err| {
            if is_capacity_exhausted(&err) {
                KafkaError::CapacityExhausted(err)
            } else {
                KafkaError::Api(err)
            }
        })
    }

    pub fn wait_until_kafka_is_provisioning(&self, id: &str) -> KafkaResult<KafkaRequest> {
        wait_for_kafka_provisioning(|| self.api.get_kafka_by_id(id), self.timings.provisioning)
    }

    pub fn wait_until_kafka_is_ready(&self, id: &str) -> KafkaResult<KafkaRequest> {
        wait_for_kafka_ready(
            || self.api.get_kafka_by_id(id),
            &self.resolver,
            &self.timings,
        )
    }

    pub fn wait_until_kafka_is_suspended(&self, id: &str) -> KafkaResult<KafkaRequest> {
        info!(kafka_id = %id, "waiting for kafka instance to be suspended");
        self.wait_until_kafka_is_in_state(id, KafkaStatus::Suspended, self.timings.suspended)
    }

    pub fn wait_until_kafka_is_resumed(&self, id: &str) -> KafkaResult<KafkaRequest> {
        info!(kafka_id = %id, "waiting for kafka instance to be resumed");
        self.wait_until_kafka_is_in_state(id, KafkaStatus::Ready, self.timings.resumed)
    }

    pub fn wait_until_kafka_is_in_state(
        &self,
        id: &str,
        expected: KafkaStatus,
        backoff: Backoff,
    ) -> KafkaResult<KafkaRequest> {
        wait_for_kafka_state(|| self.api.get_kafka_by_id(id), id, expected, backoff)
    }

    /// Waits until the management API answers 404 for the instance.
    pub fn wait_until_kafka_is_deleted(&self, id: &str) -> KafkaResult<()> {
        wait_for_kafka_deleted(
            || match self.api.get_kafka_by_id(id) {
                Ok(kafka) => Ok(Some(kafka)),
                Err(err) if err.is_not_found() => Ok(None),
                Err(err) => Err(err),
            },
            self.timings.deleted,
        )
    }

    /// Waits until the new owner can create and delete topics on the instance.
    pub fn wait_until_owner_is_changed<K>(&self, new_owner_api: &K) -> KafkaResult<()>
    where
        K: KafkaInstanceApi,
    {
        wait_for_owner_change(new_owner_api, self.timings.owner_changed)
    }

    /// Requests an owner change. The change is applied asynchronously, see
    /// [KafkaLifecycle::wait_until_owner_is_changed].
    pub fn change_kafka_instance_owner(
        &self,
        kafka: &KafkaRequest,
        new_owner: &str,
    ) -> Result<KafkaRequest, ClientError> {
        let update = KafkaUpdateRequest {
            owner: Some(new_owner.to_lowercase()),
            ..Default::default()
        };
        self.api.update_kafka(&kafka.id, &update)
    }

    pub fn delete_kafka_by_name_if_exists(&self, name: &str) -> Result<(), ClientError> {
        match self.get_kafka_by_name(name)? {
            Some(kafka) => {
                info!(kafka = %kafka.name, "delete kafka instance");
                debug!(?kafka);
                self.api.delete_kafka_by_id(&kafka.id, true)?;
                info!(kafka = %kafka.name, "kafka instance deleted");
            }
            None => info!(kafka = %name, "kafka instance not found"),
        }
        Ok(())
    }

    /// Deletes the instance unless the teardown is disabled.
    pub fn clean_kafka_instance(&self, name: &str) -> Result<(), ClientError> {
        if self.skip_teardown {
            warn!("skip kafka instance clean up");
            return Ok(());
        }
        self.delete_kafka_by_name_if_exists(name)
    }

    /// Deletes every instance of `owner`, one at a time, unless the teardown is disabled.
    pub fn clean_kafka_instances_by_owner(&self, owner: &str) -> KafkaResult<()> {
        if self.skip_teardown {
            warn!("skip kafka instance clean up");
            return Ok(());
        }
        while let Some(kafka) = self.get_kafka_by_owner(owner).map_err(KafkaError::Api)? {
            info!(kafka = %kafka.name, "kafka instance to be deleted");
            self.api
                .delete_kafka_by_id(&kafka.id, true)
                .map_err(KafkaError::Api)?;
            self.wait_until_kafka_is_deleted(&kafka.id)?;
            info!(kafka = %kafka.name, "kafka instance deleted");
        }
        info!(%owner, "all kafka instances of the owner are deleted");
        Ok(())
    }

    /// Deletes the instances of `owner` whose name contains `name_substring` and waits for all
    /// of them to be gone.
    pub fn delete_searched_kafka_instances_by_owner(
        &self,
        name_substring: &str,
        owner: &str,
    ) -> KafkaResult<()> {
        debug!(%name_substring, %owner, "search for kafka instances");
        let kafkas: Vec<KafkaRequest> = self
            .api
            .get_kafkas(&KafkaListQuery::default())
            .map_err(KafkaError::Api)?
            .items
            .into_iter()
            .filter(|k| k.name.contains(name_substring) && k.owner.as_deref() == Some(owner))
            .collect();
        debug!("{} kafka instances to be deleted", kafkas.len());

        for kafka in &kafkas {
            self.delete_kafka_by_name_if_exists(&kafka.name)
                .map_err(KafkaError::Api)?;
        }
        for kafka in &kafkas {
            self.wait_until_kafka_is_deleted(&kafka.id)?;
        }
        Ok(())
    }

    pub fn partition_limit_max(&self, kafka: &KafkaRequest) -> KafkaResult<u64> {
        self.metric(kafka, PARTITION_LIMIT_METRIC)
    }

    pub fn message_size_limit(&self, kafka: &KafkaRequest) -> KafkaResult<u64> {
        self.metric(kafka, MESSAGE_SIZE_LIMIT_METRIC)
    }

    pub fn desired_broker_count(&self, kafka: &KafkaRequest) -> KafkaResult<u64> {
        self.metric(kafka, DESIRED_BROKER_COUNT_METRIC)
    }

    fn metric(&self, kafka: &KafkaRequest, pattern: &str) -> KafkaResult<u64> {
        let metrics = self
            .api
            .federate_metrics(&kafka.id)
            .map_err(KafkaError::Api)?;
        find_metric(&metrics, pattern).ok_or_else(|| KafkaError::MetricNotFound {
            id: kafka.id.clone(),
            pattern: pattern.to_string(),
        })
    }
}

fn find_metric(metrics: &str, pattern: &str) -> Option<u64> {
    let regex = Regex::new(pattern).ok()?;
    regex
        .captures(metrics)
        .and_then(|captures| captures.get(1))
        .and_then(|value| value.as_str().parse().ok())
}

/// Waits until the instance left the `accepted` status.
pub fn wait_for_kafka_provisioning<E, F>(probe: F, backoff: Backoff) -> Result<KafkaRequest, KafkaError<E>>
where
    F: FnMut() -> Result<KafkaRequest, E>,
{
    let kafka = wait_until(
        "kafka instance to start provisioning",
        backoff,
        probe,
        |kafka: &KafkaRequest| !kafka.is(&KafkaStatus::Accepted),
    )
    .map_err(|err| {
        KafkaError::from_wait(err, |kafka, elapsed| KafkaError::Unprovisioned { kafka, elapsed })
    })?;

    info!(kafka = %kafka.name, kafka_id = %kafka.id, "kafka instance is provisioning");
    Ok(kafka)
}

/// Waits until the instance is `ready` and then until all its hosts resolve.
pub fn wait_for_kafka_ready<E, F, R>(
    probe: F,
    resolver: &R,
    timings: &KafkaTimings,
) -> Result<KafkaRequest, KafkaError<E>>
where
    F: FnMut() -> Result<KafkaRequest, E>,
    R: HostResolver,
{
    let kafka = wait_until(
        "kafka instance to be ready",
        timings.ready,
        probe,
        |kafka: &KafkaRequest| kafka.is(&KafkaStatus::Ready),
    )
    .map_err(|err| {
        KafkaError::from_wait(err, |kafka, elapsed| KafkaError::NotReady {
            kafka,
            elapsed: Some(elapsed),
        })
    })?;
    info!(kafka = %kafka.name, kafka_id = %kafka.id, "kafka instance is ready");

    let hosts = kafka_hosts(&kafka).ok_or_else(|| KafkaError::MissingBootstrapHost {
        id: kafka.id.clone(),
    })?;
    wait_until_hosts_are_resolved(resolver, hosts, timings.hosts)?;
    debug!(kafka_id = %kafka.id, "kafka hosts are resolved");

    Ok(kafka)
}

/// Waits until the instance reports exactly `expected`.
pub fn wait_for_kafka_state<E, F>(
    probe: F,
    id: &str,
    expected: KafkaStatus,
    backoff: Backoff,
) -> Result<KafkaRequest, KafkaError<E>>
where
    F: FnMut() -> Result<KafkaRequest, E>,
{
    let description = format!("kafka instance to be '{expected}'");
    let kafka = wait_until(description, backoff, probe, |kafka: &KafkaRequest| {
        kafka.is(&expected)
    })
    .map_err(|err| match err {
        WaitError::Probe(err) => KafkaError::Api(err),
        WaitError::Timeout {
            timeout,
            elapsed,
            last,
            ..
        } => KafkaError::UnexpectedState {
            id: id.to_string(),
            expected: expected.clone(),
            last: last.and_then(|kafka| kafka.status),
            elapsed: Elapsed { elapsed, timeout },
        },
    })?;

    info!(kafka = %kafka.name, kafka_id = %kafka.id, status = %expected, "kafka instance reached the expected status");
    Ok(kafka)
}

/// Waits until `probe` reports the instance as gone (`None`).
pub fn wait_for_kafka_deleted<E, F>(probe: F, backoff: Backoff) -> Result<(), KafkaError<E>>
where
    F: FnMut() -> Result<Option<KafkaRequest>, E>,
{
    wait_until_absent("kafka instance to be deleted", backoff, probe).map_err(|err| {
        KafkaError::from_wait(err, |kafka, elapsed| KafkaError::NotDeleted { kafka, elapsed })
    })
}

/// Waits until the owner change is applied to every broker.
///
/// The probe creates and deletes [OWNER_PROBE_TOPIC] with the new owner's credentials. Any API
/// failure (forbidden while the owner is not switched yet, replication problems during the
/// brokers roll out) only means the change is still in progress.
pub fn wait_for_owner_change<K, E>(new_owner_api: &K, backoff: Backoff) -> Result<(), KafkaError<E>>
where
    K: KafkaInstanceApi + ?Sized,
{
    let mut last_error = None;
    let result = wait_for("kafka owner to be changed", backoff, |_| {
        let probe = apply_topic(new_owner_api, OWNER_PROBE_TOPIC)
            .and_then(|_| new_owner_api.delete_topic(OWNER_PROBE_TOPIC));
        match probe {
            Ok(()) => Ok::<_, Infallible>(Poll::Ready(())),
            Err(err) => {
                debug!(%err, "owner change not applied yet");
                last_error = Some(err.to_string());
                Ok(Poll::Pending(()))
            }
        }
    });

    match result {
        Ok(()) => Ok(()),
        Err(WaitError::Timeout {
            timeout, elapsed, ..
        }) => Err(KafkaError::OwnerNotChanged {
            elapsed: Elapsed { elapsed, timeout },
            last_error,
        }),
        Err(WaitError::Probe(never)) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use crate::kafka_instance::{MockKafkaInstanceApi, Topic};
    use crate::kafka_mgmt::MockKafkaMgmtApi;
    use crate::kafka_mgmt::model::KafkaRequestList;
    use crate::retry::classifier::CLUSTER_CAPACITY_EXHAUSTED_CODE;
    use crate::wait::dns::MockHostResolver;
    use assert_matches::assert_matches;
    use mockall::Sequence;
    use mockall::predicate::eq;
    use std::net::{IpAddr, Ipv4Addr};

    const UNIT: Duration = Duration::from_millis(5);

    fn fast_timings() -> KafkaTimings {
        let backoff = Backoff::new(UNIT, 40 * UNIT);
        KafkaTimings {
            capacity: backoff,
            provisioning: backoff,
            ready: backoff,
            hosts: backoff,
            suspended: backoff,
            resumed: backoff,
            deleted: backoff,
            owner_changed: backoff,
        }
    }

    fn kafka(id: &str, status: KafkaStatus) -> KafkaRequest {
        KafkaRequest {
            id: id.to_string(),
            name: format!("{id}-name"),
            status: Some(status),
            owner: Some("qe".to_string()),
            bootstrap_server_host: Some(format!("{id}.kafka.example.com:443")),
            instance_type: Some("developer".to_string()),
            ..Default::default()
        }
    }

    fn list(items: Vec<KafkaRequest>) -> KafkaRequestList {
        KafkaRequestList {
            total: items.len() as u32,
            items,
            ..Default::default()
        }
    }

    fn resolving_resolver() -> MockHostResolver {
        let mut resolver = MockHostResolver::new();
        resolver
            .expect_resolve()
            .returning(|_| Ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]));
        resolver
    }

    fn lifecycle(api: MockKafkaMgmtApi) -> KafkaLifecycle<MockKafkaMgmtApi, MockHostResolver> {
        KafkaLifecycle::with_resolver(api, resolving_resolver()).with_timings(fast_timings())
    }

    #[test]
    fn test_default_timings() {
        let timings = KafkaTimings::default();
        assert_eq!(Duration::from_secs(10), timings.ready.interval());
        assert_eq!(Duration::from_secs(30 * 60), timings.ready.timeout());
        assert_eq!(Duration::from_secs(24 * 60 * 60), timings.provisioning.timeout());
        assert_eq!(Duration::from_secs(60), timings.suspended.timeout());
        assert_eq!(Duration::from_secs(10 * 60), timings.deleted.timeout());
    }

    #[test]
    fn test_apply_returns_existing_ready_instance() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_get_kafkas()
            .withf(|q| q.search.as_deref() == Some("name = c1-name"))
            .returning(|_| Ok(list(vec![kafka("c1", KafkaStatus::Ready)])));
        api.expect_create_kafka().never();
        api.expect_get_kafka_by_id().never();

        let kafka = lifecycle(api)
            .apply_kafka_instance(&KafkaRequestPayload::new("c1-name"))
            .unwrap();
        assert_eq!("c1", kafka.id);
    }

    #[test]
    fn test_apply_waits_for_existing_suspended_instance() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_get_kafkas()
            .returning(|_| Ok(list(vec![kafka("c1", KafkaStatus::Suspended)])));
        let mut seq = Sequence::new();
        api.expect_get_kafka_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(kafka("c1", KafkaStatus::Resuming)));
        api.expect_get_kafka_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(kafka("c1", KafkaStatus::Ready)));

        let kafka = lifecycle(api)
            .apply_kafka_instance(&KafkaRequestPayload::new("c1-name"))
            .unwrap();
        assert!(kafka.is(&KafkaStatus::Ready));
    }

    #[test]
    fn test_apply_fails_for_deprovisioning_instance() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_get_kafkas()
            .returning(|_| Ok(list(vec![kafka("c1", KafkaStatus::Deprovision)])));
        api.expect_get_kafka_by_id().never();

        let err = lifecycle(api)
            .apply_kafka_instance(&KafkaRequestPayload::new("c1-name"))
            .unwrap_err();
        assert_matches!(err, KafkaError::NotReady { elapsed: None, .. });
        assert!(err.to_string().contains("deprovision"));
    }

    #[test]
    fn test_apply_creates_missing_instance() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_get_kafkas().returning(|_| Ok(list(vec![])));
        api.expect_create_kafka()
            .with(eq(true), eq(KafkaRequestPayload::new("c1-name")))
            .times(1)
            .returning(|_, _| Ok(kafka("c1", KafkaStatus::Accepted)));
        let mut seq = Sequence::new();
        for status in [
            KafkaStatus::Accepted,
            KafkaStatus::Provisioning,
            KafkaStatus::Provisioning,
            KafkaStatus::Ready,
        ] {
            api.expect_get_kafka_by_id()
                .with(eq("c1"))
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |id| Ok(kafka(id, status.clone())));
        }

        let kafka = lifecycle(api)
            .apply_kafka_instance(&KafkaRequestPayload::new("c1-name"))
            .unwrap();
        assert!(kafka.is(&KafkaStatus::Ready));
    }

    #[test]
    fn test_creation_waits_for_capacity() {
        let mut api = MockKafkaMgmtApi::new();
        let mut seq = Sequence::new();
        api.expect_create_kafka()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Err(ApiError::new(403)
                    .with_code(CLUSTER_CAPACITY_EXHAUSTED_CODE)
                    .into())
            });
        api.expect_create_kafka()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(kafka("c1", KafkaStatus::Accepted)));

        let kafka = lifecycle(api)
            .attempt_creating_kafka_instance(&KafkaRequestPayload::new("k"), Backoff::new(UNIT, Duration::from_secs(5)))
            .unwrap();
        assert_eq!("c1", kafka.id);
    }

    #[test]
    fn test_creation_gives_up_when_capacity_never_frees() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_create_kafka().returning(|_, _| {
            Err(ApiError::new(403)
                .with_code(CLUSTER_CAPACITY_EXHAUSTED_CODE)
                .into())
        });

        let err = lifecycle(api)
            .attempt_creating_kafka_instance(&KafkaRequestPayload::new("k"), Backoff::new(UNIT, 4 * UNIT))
            .unwrap_err();
        assert_matches!(err, KafkaError::CapacityExhausted(_));
    }

    #[test]
    fn test_creation_other_forbidden_is_fatal() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_create_kafka()
            .times(1)
            .returning(|_, _| Err(ApiError::new(403).with_code("KAFKAS-MGMT-4").into()));

        let err = lifecycle(api)
            .attempt_creating_kafka_instance(&KafkaRequestPayload::new("k"), Backoff::new(UNIT, Duration::from_secs(5)))
            .unwrap_err();
        assert_matches!(err, KafkaError::Api(_));
    }

    #[test]
    fn test_ready_requires_hosts_to_resolve() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_get_kafka_by_id()
            .returning(|id| Ok(kafka(id, KafkaStatus::Ready)));
        let mut resolver = MockHostResolver::new();
        resolver
            .expect_resolve()
            .withf(|host| host.starts_with("broker-0-"))
            .returning(|_| Err(std::io::Error::other("NXDOMAIN")));
        resolver
            .expect_resolve()
            .returning(|_| Ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]));

        let err = KafkaLifecycle::with_resolver(api, resolver)
            .with_timings(fast_timings())
            .wait_until_kafka_is_ready("c1")
            .unwrap_err();
        assert_matches!(err, KafkaError::UnknownHosts(e) => {
            assert_eq!(vec!["broker-0-c1.kafka.example.com".to_string()], e.pending);
        });
    }

    #[test]
    fn test_ready_timeout_reports_last_status() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_get_kafka_by_id()
            .returning(|id| Ok(kafka(id, KafkaStatus::Provisioning)));

        let err = lifecycle(api).wait_until_kafka_is_ready("c1").unwrap_err();
        assert_matches!(err, KafkaError::NotReady { elapsed: Some(_), .. });
        let message = err.to_string();
        assert!(message.contains("c1"));
        assert!(message.contains("provisioning"));
    }

    #[test]
    fn test_suspended_and_unexpected_state() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_get_kafka_by_id()
            .returning(|id| Ok(kafka(id, KafkaStatus::Suspending)));

        let err = lifecycle(api).wait_until_kafka_is_suspended("c1").unwrap_err();
        assert_matches!(err, KafkaError::UnexpectedState { expected: KafkaStatus::Suspended, last: Some(KafkaStatus::Suspending), .. });
    }

    #[test]
    fn test_resumed() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_get_kafka_by_id()
            .times(1)
            .returning(|id| Ok(kafka(id, KafkaStatus::Ready)));

        assert!(lifecycle(api).wait_until_kafka_is_resumed("c1").is_ok());
    }

    #[test]
    fn test_deleted_when_not_found() {
        let mut api = MockKafkaMgmtApi::new();
        let mut seq = Sequence::new();
        api.expect_get_kafka_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id| Ok(kafka(id, KafkaStatus::Deprovision)));
        api.expect_get_kafka_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ApiError::new(404).into()));

        assert!(lifecycle(api).wait_until_kafka_is_deleted("c1").is_ok());
    }

    #[test]
    fn test_deleted_probe_error_is_propagated() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_get_kafka_by_id()
            .times(1)
            .returning(|_| Err(ApiError::new(401).into()));

        let err = lifecycle(api).wait_until_kafka_is_deleted("c1").unwrap_err();
        assert_matches!(err, KafkaError::Api(ClientError::Api(ApiError { status: 401, .. })));
    }

    #[test]
    fn test_clean_kafka_instance_honours_skip_teardown() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_get_kafkas().never();
        api.expect_delete_kafka_by_id().never();

        lifecycle(api)
            .with_skip_teardown(true)
            .clean_kafka_instance("c1-name")
            .unwrap();
    }

    #[test]
    fn test_delete_by_name_if_exists() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_get_kafkas()
            .returning(|_| Ok(list(vec![kafka("c1", KafkaStatus::Ready)])));
        api.expect_delete_kafka_by_id()
            .with(eq("c1"), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));

        lifecycle(api).clean_kafka_instance("c1-name").unwrap();
    }

    #[test]
    fn test_clean_by_owner_deletes_until_none_remain() {
        let mut api = MockKafkaMgmtApi::new();
        let mut seq = Sequence::new();
        for id in ["c1", "c2"] {
            api.expect_get_kafkas()
                .withf(|q| q.search.as_deref() == Some("owner = qe"))
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_| Ok(list(vec![kafka(id, KafkaStatus::Ready)])));
            api.expect_delete_kafka_by_id()
                .with(eq(id), eq(true))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
            api.expect_get_kafka_by_id()
                .with(eq(id))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Err(ApiError::new(404).into()));
        }
        api.expect_get_kafkas()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(list(vec![])));

        lifecycle(api).clean_kafka_instances_by_owner("qe").unwrap();
    }

    #[test]
    fn test_delete_searched_instances_by_owner() {
        let mut api = MockKafkaMgmtApi::new();
        let mut other_owner = kafka("c3", KafkaStatus::Ready);
        other_owner.owner = Some("someone-else".to_string());
        let all = list(vec![
            kafka("c1", KafkaStatus::Ready),
            kafka("x2", KafkaStatus::Ready),
            other_owner,
        ]);
        api.expect_get_kafkas()
            .withf(|q| q.search.is_none())
            .times(1)
            .returning(move |_| Ok(all.clone()));
        api.expect_get_kafkas()
            .withf(|q| q.search.as_deref() == Some("name = c1-name"))
            .times(1)
            .returning(|_| Ok(list(vec![kafka("c1", KafkaStatus::Ready)])));
        api.expect_delete_kafka_by_id()
            .with(eq("c1"), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));
        api.expect_get_kafka_by_id()
            .with(eq("c1"))
            .times(1)
            .returning(|_| Err(ApiError::new(404).into()));

        lifecycle(api)
            .delete_searched_kafka_instances_by_owner("c1", "qe")
            .unwrap();
    }

    #[test]
    fn test_owner_change_waits_for_topic_permissions() {
        let mut new_owner = MockKafkaInstanceApi::new();
        let mut seq = Sequence::new();
        new_owner
            .expect_get_topic()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ApiError::new(403).into()));
        new_owner
            .expect_get_topic()
            .with(eq(OWNER_PROBE_TOPIC))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ApiError::new(404).into()));
        new_owner
            .expect_create_topic()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|input| {
                Ok(Topic {
                    name: input.name.clone(),
                    ..Default::default()
                })
            });
        new_owner
            .expect_delete_topic()
            .with(eq(OWNER_PROBE_TOPIC))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let api = MockKafkaMgmtApi::new();
        lifecycle(api)
            .wait_until_owner_is_changed(&new_owner)
            .unwrap();
    }

    #[test]
    fn test_owner_not_changed() {
        let mut new_owner = MockKafkaInstanceApi::new();
        new_owner
            .expect_get_topic()
            .returning(|_| Err(ApiError::new(403).with_reason("not authorized").into()));

        let err = wait_for_owner_change::<_, ClientError>(&new_owner, Backoff::new(UNIT, 3 * UNIT))
            .unwrap_err();
        assert_matches!(err, KafkaError::OwnerNotChanged { last_error: Some(ref e), .. } => {
            assert!(e.contains("not authorized"));
        });
    }

    #[test]
    fn test_change_owner_lowercases_name() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_update_kafka()
            .withf(|id, update| id == "c1" && update.owner.as_deref() == Some("new-owner"))
            .times(1)
            .returning(|id, _| Ok(kafka(id, KafkaStatus::Ready)));

        lifecycle(api)
            .change_kafka_instance_owner(&kafka("c1", KafkaStatus::Ready), "New-Owner")
            .unwrap();
    }

    #[test]
    fn test_metrics() {
        let mut api = MockKafkaMgmtApi::new();
        api.expect_federate_metrics().returning(|_| {
            Ok(concat!(
                "# TYPE kafka_instance_partition_limit gauge\n",
                "kafka_instance_partition_limit{namespace=\"ns\"} 1000\n",
                "kafka_instance_max_message_size_limit{namespace=\"ns\"} 1048588\n",
            )
            .to_string())
        });

        let lifecycle = lifecycle(api);
        let kafka = kafka("c1", KafkaStatus::Ready);
        assert_eq!(1000, lifecycle.partition_limit_max(&kafka).unwrap());
        assert_eq!(1048588, lifecycle.message_size_limit(&kafka).unwrap());
        assert_matches!(
            lifecycle.desired_broker_count(&kafka),
            Err(KafkaError::MetricNotFound { .. })
        );
    }

    #[test]
    fn test_probe_closure_variant() {
        let mut statuses = vec![KafkaStatus::Ready, KafkaStatus::Provisioning].into_iter().rev();
        let kafka = wait_for_kafka_ready(
            || -> Result<KafkaRequest, String> {
                Ok(kafka("c1", statuses.next().unwrap_or(KafkaStatus::Ready)))
            },
            &resolving_resolver(),
            &fast_timings(),
        )
        .unwrap();
        assert!(kafka.is(&KafkaStatus::Ready));
    }
}

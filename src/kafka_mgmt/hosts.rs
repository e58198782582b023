use super::model::KafkaRequest;

const BOOTSTRAP_PORT_SUFFIX: &str = ":443";
const ADMIN_SERVER_PREFIX: &str = "admin-server-";
const BROKER_PREFIXES: [&str; 3] = ["broker-0-", "broker-1-", "broker-2-"];

/// Host names that must resolve before a ready instance can be used: the bootstrap host, the
/// admin server and one host per broker. Developer instances only run the first broker.
///
/// Returns `None` when the instance has no bootstrap server host yet.
pub fn kafka_hosts(kafka: &KafkaRequest) -> Option<Vec<String>> {
    let bootstrap_host = kafka.bootstrap_server_host.as_deref()?;
    let bootstrap = bootstrap_host
        .strip_suffix(BOOTSTRAP_PORT_SUFFIX)
        .unwrap_or(bootstrap_host);

    let brokers = if kafka.is_developer() {
        &BROKER_PREFIXES[..1]
    } else {
        &BROKER_PREFIXES[..]
    };

    let mut hosts = vec![
        bootstrap.to_string(),
        format!("{ADMIN_SERVER_PREFIX}{bootstrap}"),
    ];
    hosts.extend(brokers.iter().map(|prefix| format!("{prefix}{bootstrap}")));
    Some(hosts)
}

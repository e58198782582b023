use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use managed_services_e2e::cli::{Cli, CliError};
use managed_services_e2e::kafka_mgmt::{KafkaRequestPayload, KafkaStatus};
use managed_services_e2e::retry::backoff::Backoff;
use managed_services_e2e::retry::classifier::Classify;
use serial_test::serial;
use tempfile::TempDir;

use crate::common::{attempts, fake_cli};

/// Fake `rhoas`: fails unless invoked with `-v`, counts attempts per command in the working
/// directory and prints what the real tool prints in verbose mode.
const FAKE_RHOAS: &str = r#"
[ "$1" = "-v" ] || { echo "missing -v" >&2; exit 2; }
shift

count() {
  n=$(cat "$1" 2>/dev/null || echo 0)
  n=$((n + 1))
  echo "$n" > "$1"
  echo "$n"
}

case "$*" in
  "kafka describe --id c1")
    count describe > /dev/null
    echo '{"id": "c1", "name": "k", "status": "ready", "bootstrap_server_host": "k.example.com:443"}'
    ;;
  "kafka describe --id missing")
    count describe-missing > /dev/null
    echo "< HTTP/1.1 404 Not Found" >&2
    echo "Error: Kafka instance not found (KAFKAS-MGMT-7)" >&2
    exit 1
    ;;
  "kafka create --bypass-checks --name k --provider aws --region us-east-1")
    if [ "$(count create)" -lt 3 ]; then
      echo "> POST /api/kafkas_mgmt/v1/kafkas?async=true HTTP/1.1" >&2
      echo "< HTTP/1.1 403 Forbidden" >&2
      echo "Error: Cluster capacity(1) exhausted (KAFKAS-MGMT-24)" >&2
      exit 1
    fi
    echo '{"id": "c1", "name": "k", "status": "accepted"}'
    ;;
  "kafka delete --id c1 -y")
    count delete > /dev/null
    echo "< HTTP/1.1 503 Service Unavailable" >&2
    exit 1
    ;;
  "kafka list -o json")
    sleep 30
    ;;
  "kafka topic consume --instance-id c1 --name t --partition 0 --format json")
    for i in 0 1; do
      printf '{\n  "partition": 0,\n  "offset": %s,\n  "headers": {},\n  "value": "m-%s"\n}\n' "$i" "$i"
    done
    ;;
  "kafka topic consume --instance-id c1 --name empty --partition 0 --format json")
    ;;
  "kafka topic produce --instance-id c1 --name t --partition 1 --key k1")
    value=$(cat)
    printf '{\n  "partition": 1,\n  "offset": 7,\n  "key": "k1",\n  "value": "%s"\n}\n' "$value"
    ;;
  "login --print-sso-url")
    echo "https://sso.example.com/auth?state=abc"
    sleep 30
    ;;
  *)
    echo "unexpected command: $*" >&2
    exit 3
    ;;
esac
"#;

fn cli(dir: &TempDir) -> Cli {
    Cli::new(fake_cli(dir, FAKE_RHOAS)).unwrap()
}

#[test]
#[serial]
fn describe_kafka_parses_json() {
    let dir = TempDir::new().unwrap();
    let kafka = cli(&dir).describe_kafka_by_id("c1").unwrap();

    assert_eq!("c1", kafka.id);
    assert!(kafka.is(&KafkaStatus::Ready));
    assert_eq!(1, attempts(dir.path(), "describe"));
}

#[test]
#[serial]
fn client_errors_are_not_retried() {
    let dir = TempDir::new().unwrap();
    let err = cli(&dir).describe_kafka_by_id("missing").unwrap_err();

    assert_eq!(Some(404), err.status_code());
    assert_eq!(Some("KAFKAS-MGMT-7"), err.error_code());
    assert_eq!(1, attempts(dir.path(), "describe-missing"));
}

#[test]
#[serial]
fn server_errors_are_retried_once() {
    let dir = TempDir::new().unwrap();
    let err = cli(&dir).delete_kafka("c1").unwrap_err();

    assert_matches!(err, CliError::Command { status: Some(503), exit_code: Some(1), .. });
    assert_eq!(2, attempts(dir.path(), "delete"));
}

#[test]
#[serial]
fn kafka_creation_waits_for_capacity() {
    let dir = TempDir::new().unwrap();
    let cli = cli(&dir).with_creation_backoff(Backoff::new(
        Duration::from_millis(20),
        Duration::from_secs(10),
    ));
    let payload = KafkaRequestPayload::new("k")
        .with_cloud_provider("aws")
        .with_region("us-east-1");

    let kafka = cli.create_kafka(&payload).unwrap();

    assert!(kafka.is(&KafkaStatus::Accepted));
    assert_eq!(3, attempts(dir.path(), "create"));
}

#[test]
#[serial]
fn kafka_creation_gives_up_after_deadline() {
    let dir = TempDir::new().unwrap();
    let cli = cli(&dir).with_creation_backoff(Backoff::new(
        Duration::from_millis(20),
        Duration::ZERO,
    ));
    let payload = KafkaRequestPayload::new("k")
        .with_cloud_provider("aws")
        .with_region("us-east-1");

    let err = cli.create_kafka(&payload).unwrap_err();

    assert_eq!(Some(403), err.status_code());
    assert_eq!(1, attempts(dir.path(), "create"));
}

#[test]
#[serial]
fn commands_are_bounded_by_the_timeout() {
    let dir = TempDir::new().unwrap();
    let cli = cli(&dir).with_timeout(Duration::from_millis(300));

    let start = Instant::now();
    let err = cli.list_kafka().unwrap_err();

    assert!(err.is_timeout());
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
#[serial]
fn consume_multiple_records() {
    let dir = TempDir::new().unwrap();
    let records = cli(&dir).consume_records("t", "c1", 0, None).unwrap();

    assert_eq!(2, records.len());
    assert_eq!(Some(1), records[1].offset);
    assert_eq!("m-1", records[1].value);
}

#[test]
#[serial]
fn consume_without_records() {
    let dir = TempDir::new().unwrap();
    let records = cli(&dir).consume_records("empty", "c1", 0, None).unwrap();
    assert!(records.is_empty());
}

#[test]
#[serial]
fn produce_writes_message_to_stdin() {
    let dir = TempDir::new().unwrap();
    let record = cli(&dir)
        .produce_record("t", "c1", "hello", Some((1, "k1")))
        .unwrap();

    assert_eq!("hello", record.value);
    assert_eq!(Some("k1"), record.key.as_deref());
    assert_eq!(Some(7), record.offset);
}

#[test]
#[serial]
fn login_returns_the_running_process() {
    let dir = TempDir::new().unwrap();
    let mut login = cli(&dir).login(None, None, false).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !login.current_output().0.contains("https://") && Instant::now() < deadline {
        sleep(Duration::from_millis(20));
    }
    assert!(login.is_running());
    assert_eq!(
        "https://sso.example.com/auth?state=abc\n",
        login.current_output().0
    );
    login.kill().unwrap();
}

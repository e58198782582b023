use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use managed_services_e2e::command::{CommandNotStarted, ProcessError};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct Record {
    offset: i64,
    value: String,
}

#[test]
fn sync_captures_both_streams_in_order() {
    let output = CommandNotStarted::new(
        "sh",
        ["-c", "for i in 1 2 3; do echo out-$i; echo err-$i >&2; done"],
    )
    .start()
    .unwrap()
    .sync(Duration::from_secs(10))
    .unwrap();

    assert!(output.success());
    assert_eq!("out-1\nout-2\nout-3\n", output.stdout());
    assert_eq!("err-1\nerr-2\nerr-3\n", output.stderr());
}

#[test]
fn sync_times_out_on_long_running_process() {
    let mut process = CommandNotStarted::new("sh", ["-c", "echo started; sleep 30"])
        .start()
        .unwrap();

    let start = Instant::now();
    let err = process.sync(Duration::from_millis(300)).unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_matches!(err, ProcessError::Timeout { ref command, .. } => {
        assert_eq!("sh -c echo started; sleep 30", command);
    });
    assert!(process.is_running());
    process.kill().unwrap();
    assert!(!process.is_running());
}

#[test]
fn dropping_a_running_process_kills_it() {
    let process = CommandNotStarted::new("sleep", ["30"]).start().unwrap();
    let pid = process.pid();
    drop(process);

    // the pid is reaped on drop, so it no longer exists
    let probe = format!("kill -0 {pid}");
    let alive = CommandNotStarted::new("sh", ["-c", probe.as_str()])
        .start()
        .unwrap()
        .sync(Duration::from_secs(5));
    assert_matches!(alive, Err(ProcessError::Failed { .. }));
}

#[test]
fn stdin_is_forwarded_and_closed() {
    let mut process = CommandNotStarted::new("sh", ["-c", "tr a-z A-Z"])
        .start()
        .unwrap();
    process.write_stdin(b"hello\n").unwrap();
    process.write_stdin(b"world\n").unwrap();
    process.close_stdin();

    let output = process.sync(Duration::from_secs(10)).unwrap();
    assert_eq!("HELLO\nWORLD\n", output.stdout());
}

#[test]
fn output_is_available_while_running() {
    let mut process = CommandNotStarted::new("sh", ["-c", "echo ready; sleep 30"])
        .start()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !process.current_output().0.contains("ready") && Instant::now() < deadline {
        sleep(Duration::from_millis(20));
    }
    assert_eq!("ready\n", process.current_output().0);
    process.terminate(Duration::from_secs(2)).unwrap();
}

#[test]
fn failure_keeps_output_and_exit_code() {
    let err = CommandNotStarted::new("sh", ["-c", "echo partial; echo boom >&2; exit 3"])
        .start()
        .unwrap()
        .sync(Duration::from_secs(10))
        .unwrap_err();

    assert_matches!(err, ProcessError::Failed { exit_code: Some(3), .. });
    assert_eq!(Some(("partial\n", "boom\n")), err.output());
}

#[test]
fn multi_record_json_output() {
    let script = r#"
for i in 0 1 2; do
  printf '{\n  "offset": %s,\n  "value": "message-%s",\n  "headers": {\n    "k": "v"\n  }\n}\n' "$i" "$i"
done
"#;
    let output = CommandNotStarted::new("sh", ["-c", script])
        .start()
        .unwrap()
        .sync(Duration::from_secs(10))
        .unwrap();

    let records: Vec<Record> = output.parse_json_records().unwrap();
    assert_eq!(3, records.len());
    assert_eq!(
        Record {
            offset: 2,
            value: "message-2".to_string()
        },
        records[2]
    );
}

#[test]
fn empty_output_yields_no_records() {
    let output = CommandNotStarted::new("true", Vec::<&str>::new())
        .start()
        .unwrap()
        .sync(Duration::from_secs(10))
        .unwrap();
    assert!(output.parse_json_records::<Record>().unwrap().is_empty());
}

#[test]
fn sync_fails_when_a_descendant_keeps_the_output_open() {
    let mut process = CommandNotStarted::new("sh", ["-c", "echo first; (sleep 5; echo second) &"])
        .start()
        .unwrap();

    let start = Instant::now();
    let err = process.sync(Duration::from_millis(300)).unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(4));
    assert!(err.is_timeout());
    assert_eq!(Some(("first\n", "")), err.output());
}

#[test]
fn sync_drains_output_written_shortly_after_exit() {
    let output = CommandNotStarted::new("sh", ["-c", "echo first; (sleep 0.2; echo second) &"])
        .start()
        .unwrap()
        .sync(Duration::from_millis(100))
        .unwrap();

    assert!(output.success());
    assert_eq!("first\nsecond\n", output.stdout());
}

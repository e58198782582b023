use std::process::ExitStatus;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::Deserializer;

/// Output of a process that completed and whose streams were fully drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl ProcessOutput {
    pub fn new(status: ExitStatus, stdout: String, stderr: String) -> Self {
        Self {
            status,
            stdout,
            stderr,
        }
    }

    pub fn status(&self) -> ExitStatus {
        self.status
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Parses stdout as a single JSON document.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.stdout)
    }

    /// Parses stdout as a sequence of concatenated JSON documents.
    pub fn parse_json_records<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        Deserializer::from_str(&self.stdout)
            .into_iter::<T>()
            .collect()
    }
}

/// Splits a stream of concatenated JSON documents into the raw text of each document.
///
/// Documents may be compact or pretty-printed and separated by any whitespace. Empty output yields
/// no records.
pub fn split_json_records(output: &str) -> Result<Vec<&str>, serde_json::Error> {
    let mut stream = Deserializer::from_str(output).into_iter::<IgnoredAny>();
    let mut records = Vec::new();
    let mut start = 0;
    while let Some(record) = stream.next() {
        record?;
        let end = stream.byte_offset();
        records.push(output[start..end].trim());
        start = end;
    }
    Ok(records)
}

//! External process driver.
//!
//! A [CommandNotStarted] describes the command line, working directory and environment. Starting
//! it yields an [AsyncProcess] with a writable stdin and stdout/stderr captured in background
//! threads. [AsyncProcess::sync] bounds the wait with a timeout and returns a [ProcessOutput].
pub mod error;
pub mod output;
pub mod process;

pub use error::ProcessError;
pub use output::{ProcessOutput, split_json_records};
pub use process::{AsyncProcess, CommandNotStarted};

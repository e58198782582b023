//! Lifecycle tooling for end-to-end tests of managed Kafka and service registry instances.
//!
//! The building blocks are a retry executor with pluggable classifiers ([retry]), a condition
//! poller ([wait]) and an external process driver ([command]). The control plane clients
//! ([kafka_mgmt], [registry_mgmt], [kafka_instance]) and the [cli] wrapper are built on them.
pub mod cli;
pub mod client;
pub mod command;
pub mod config;
pub mod kafka_instance;
pub mod kafka_mgmt;
pub mod logging;
pub mod registry_mgmt;
pub mod retry;
pub mod utils;
pub mod wait;

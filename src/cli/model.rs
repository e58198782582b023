use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kafka record as printed by `kafka topic consume --format json` and `kafka topic produce`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Record {
    pub partition: Option<i32>,
    pub offset: Option<i64>,
    pub timestamp: Option<String>,
    pub timestamp_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub key: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Consumer {
    pub group_id: String,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub log_end_offset: Option<i64>,
    pub lag: i64,
    pub member_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsumerGroup {
    pub group_id: String,
    pub state: Option<String>,
    pub consumers: Vec<Consumer>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerGroupList {
    pub items: Vec<ConsumerGroup>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceAccount {
    pub id: String,
    pub name: Option<String>,
    pub client_id: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<i64>,
}

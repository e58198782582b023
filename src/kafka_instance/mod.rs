//! Kafka instance (data plane) admin API, reached through the admin server of an instance.
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::token::TokenRetriever;
use crate::client::{ApiClient, ClientError};

const TOPICS_PATH: [&str; 3] = ["api", "v1", "topics"];
const DEFAULT_PARTITIONS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigEntry {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Partition {
    pub partition: u32,
    pub replicas: Vec<serde_json::Value>,
    pub isr: Vec<serde_json::Value>,
    pub leader: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Topic {
    pub name: String,
    pub is_internal: bool,
    pub partitions: Vec<Partition>,
    pub config: Vec<ConfigEntry>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsList {
    pub items: Vec<Topic>,
    pub page: u32,
    pub size: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_partitions: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub config: Vec<ConfigEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTopicInput {
    pub name: String,
    pub settings: TopicSettings,
}

impl NewTopicInput {
    pub fn new(name: impl Into<String>, partitions: u32) -> Self {
        Self {
            name: name.into(),
            settings: TopicSettings {
                num_partitions: Some(partitions),
                config: Vec::new(),
            },
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait KafkaInstanceApi {
    fn get_topics(&self) -> Result<TopicsList, ClientError>;

    fn get_topic(&self, name: &str) -> Result<Topic, ClientError>;

    fn create_topic(&self, input: &NewTopicInput) -> Result<Topic, ClientError>;

    fn update_topic(&self, name: &str, settings: &TopicSettings) -> Result<Topic, ClientError>;

    fn delete_topic(&self, name: &str) -> Result<(), ClientError>;
}

/// [KafkaInstanceApi] over the admin server REST endpoints of one instance.
pub struct HttpKafkaInstanceApi<R> {
    client: ApiClient<R>,
}

impl<R: TokenRetriever> HttpKafkaInstanceApi<R> {
    /// `client` must point at the admin server url of the instance.
    pub fn new(client: ApiClient<R>) -> Self {
        Self { client }
    }

    fn topics(&self, extra: &[&str]) -> Result<url::Url, ClientError> {
        self.client.endpoint(TOPICS_PATH.iter().chain(extra.iter()))
    }
}

impl<R: TokenRetriever> KafkaInstanceApi for HttpKafkaInstanceApi<R> {
    fn get_topics(&self) -> Result<TopicsList, ClientError> {
        self.client.get(&self.topics(&[])?, &[])
    }

    fn get_topic(&self, name: &str) -> Result<Topic, ClientError> {
        self.client.get(&self.topics(&[name])?, &[])
    }

    fn create_topic(&self, input: &NewTopicInput) -> Result<Topic, ClientError> {
        self.client.post(&self.topics(&[])?, &[], input)
    }

    fn update_topic(&self, name: &str, settings: &TopicSettings) -> Result<Topic, ClientError> {
        self.client.patch(&self.topics(&[name])?, settings)
    }

    fn delete_topic(&self, name: &str) -> Result<(), ClientError> {
        self.client.delete(&self.topics(&[name])?, &[])
    }
}

/// Returns the topic named `name`, creating it with a single partition when it does not exist.
pub fn apply_topic<A: KafkaInstanceApi + ?Sized>(api: &A, name: &str) -> Result<Topic, ClientError> {
    match api.get_topic(name) {
        Ok(topic) => {
            debug!(topic = %name, "topic already exists");
            Ok(topic)
        }
        Err(err) if err.is_not_found() => {
            info!(topic = %name, "create topic");
            api.create_topic(&NewTopicInput::new(name, DEFAULT_PARTITIONS))
        }
        Err(err) => Err(err),
    }
}

//! Kafka management (control plane) API and the lifecycle utilities built on top of it.
use crate::client::token::TokenRetriever;
use crate::client::{ApiClient, ClientError};

pub mod error;
pub mod hosts;
pub mod model;
pub mod utils;

pub use error::KafkaError;
pub use hosts::kafka_hosts;
pub use utils::{KafkaLifecycle, KafkaTimings};
pub use model::{
    KafkaListQuery, KafkaRequest, KafkaRequestList, KafkaRequestPayload, KafkaStatus,
    KafkaUpdateRequest,
};

const KAFKAS_PATH: [&str; 4] = ["api", "kafkas_mgmt", "v1", "kafkas"];

#[cfg_attr(test, mockall::automock)]
pub trait KafkaMgmtApi {
    fn get_kafka_by_id(&self, id: &str) -> Result<KafkaRequest, ClientError>;

    fn get_kafkas(&self, query: &KafkaListQuery) -> Result<KafkaRequestList, ClientError>;

    fn create_kafka(
        &self,
        is_async: bool,
        payload: &KafkaRequestPayload,
    ) -> Result<KafkaRequest, ClientError>;

    fn delete_kafka_by_id(&self, id: &str, is_async: bool) -> Result<(), ClientError>;

    fn update_kafka(
        &self,
        id: &str,
        update: &KafkaUpdateRequest,
    ) -> Result<KafkaRequest, ClientError>;

    /// Instance metrics in the Prometheus text exposition format.
    fn federate_metrics(&self, id: &str) -> Result<String, ClientError>;
}

/// [KafkaMgmtApi] over the REST endpoints under `/api/kafkas_mgmt/v1`.
pub struct HttpKafkaMgmtApi<R> {
    client: ApiClient<R>,
}

impl<R: TokenRetriever> HttpKafkaMgmtApi<R> {
    pub fn new(client: ApiClient<R>) -> Self {
        Self { client }
    }

    fn kafkas(&self, extra: &[&str]) -> Result<url::Url, ClientError> {
        self.client
            .endpoint(KAFKAS_PATH.iter().chain(extra.iter()))
    }
}

fn async_query(is_async: bool) -> [(&'static str, String); 1] {
    [("async", is_async.to_string())]
}

impl<R: TokenRetriever> KafkaMgmtApi for HttpKafkaMgmtApi<R> {
    fn get_kafka_by_id(&self, id: &str) -> Result<KafkaRequest, ClientError> {
        self.client.get(&self.kafkas(&[id])?, &[])
    }

    fn get_kafkas(&self, query: &KafkaListQuery) -> Result<KafkaRequestList, ClientError> {
        self.client.get(&self.kafkas(&[])?, &query.to_query())
    }

    fn create_kafka(
        &self,
        is_async: bool,
        payload: &KafkaRequestPayload,
    ) -> Result<KafkaRequest, ClientError> {
        self.client
            .post(&self.kafkas(&[])?, &async_query(is_async), payload)
    }

    fn delete_kafka_by_id(&self, id: &str, is_async: bool) -> Result<(), ClientError> {
        self.client
            .delete(&self.kafkas(&[id])?, &async_query(is_async))
    }

    fn update_kafka(
        &self,
        id: &str,
        update: &KafkaUpdateRequest,
    ) -> Result<KafkaRequest, ClientError> {
        self.client.patch(&self.kafkas(&[id])?, update)
    }

    fn federate_metrics(&self, id: &str) -> Result<String, ClientError> {
        self.client
            .get_text(&self.kafkas(&[id, "metrics", "federate"])?)
    }
}

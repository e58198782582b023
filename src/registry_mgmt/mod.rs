//! Service registry management API and the ready/deleted waits built on top of it.
use crate::client::token::TokenRetriever;
use crate::client::{ApiClient, ClientError};

pub mod error;
pub mod model;
pub mod utils;

pub use error::RegistryError;
pub use model::{Registry, RegistryCreate, RegistryList, RegistryListQuery, RegistryStatus};

const REGISTRIES_PATH: [&str; 4] = ["api", "serviceregistry_mgmt", "v1", "registries"];

#[cfg_attr(test, mockall::automock)]
pub trait RegistryMgmtApi {
    fn create_registry(&self, payload: &RegistryCreate) -> Result<Registry, ClientError>;

    fn get_registry(&self, id: &str) -> Result<Registry, ClientError>;

    fn get_registries(&self, query: &RegistryListQuery) -> Result<RegistryList, ClientError>;

    fn delete_registry(&self, id: &str) -> Result<(), ClientError>;
}

pub struct HttpRegistryMgmtApi<R> {
    client: ApiClient<R>,
}

impl<R: TokenRetriever> HttpRegistryMgmtApi<R> {
    pub fn new(client: ApiClient<R>) -> Self {
        Self { client }
    }

    fn registries(&self, extra: &[&str]) -> Result<url::Url, ClientError> {
        self.client
            .endpoint(REGISTRIES_PATH.iter().chain(extra.iter()))
    }
}

impl<R: TokenRetriever> RegistryMgmtApi for HttpRegistryMgmtApi<R> {
    fn create_registry(&self, payload: &RegistryCreate) -> Result<Registry, ClientError> {
        self.client.post(&self.registries(&[])?, &[], payload)
    }

    fn get_registry(&self, id: &str) -> Result<Registry, ClientError> {
        self.client.get(&self.registries(&[id])?, &[])
    }

    fn get_registries(&self, query: &RegistryListQuery) -> Result<RegistryList, ClientError> {
        self.client
            .get(&self.registries(&[])?, &query.to_query())
    }

    fn delete_registry(&self, id: &str) -> Result<(), ClientError> {
        self.client.delete(&self.registries(&[id])?, &[])
    }
}

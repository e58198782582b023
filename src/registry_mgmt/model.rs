use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryStatus {
    Accepted,
    Provisioning,
    Ready,
    Failed,
    Deprovision,
    Deleting,
    #[serde(untagged)]
    Other(String),
}

impl RegistryStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Accepted => "accepted",
            Self::Provisioning => "provisioning",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Deprovision => "deprovision",
            Self::Deleting => "deleting",
            Self::Other(status) => status,
        }
    }
}

impl fmt::Display for RegistryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Registry {
    pub id: String,
    pub kind: Option<String>,
    pub href: Option<String>,
    pub name: String,
    pub status: Option<RegistryStatus>,
    #[serde(rename = "registryUrl")]
    pub registry_url: Option<String>,
    #[serde(rename = "browserUrl")]
    pub browser_url: Option<String>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Registry {
    pub fn is(&self, status: &RegistryStatus) -> bool {
        self.status.as_ref() == Some(status)
    }

    pub fn status_str(&self) -> &str {
        self.status
            .as_ref()
            .map(RegistryStatus::as_str)
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryList {
    pub kind: Option<String>,
    pub page: u32,
    pub size: u32,
    pub total: u32,
    pub items: Vec<Registry>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegistryCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RegistryCreate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegistryListQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub order_by: Option<String>,
    pub search: Option<String>,
}

impl RegistryListQuery {
    /// First page of ten matches, registry names are not unique.
    pub fn search(search: impl Into<String>) -> Self {
        Self {
            page: Some(1),
            size: Some(10),
            order_by: None,
            search: Some(search.into()),
        }
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        [
            ("page", self.page.map(|v| v.to_string())),
            ("size", self.size.map(|v| v.to_string())),
            ("orderBy", self.order_by.clone()),
            ("search", self.search.clone()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect()
    }
}

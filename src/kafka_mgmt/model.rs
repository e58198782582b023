use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status reported by the control plane for a Kafka instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KafkaStatus {
    Accepted,
    Preparing,
    Provisioning,
    Ready,
    Failed,
    Suspending,
    Suspended,
    Resuming,
    Deprovision,
    Deleting,
    #[serde(untagged)]
    Other(String),
}

impl KafkaStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Accepted => "accepted",
            Self::Preparing => "preparing",
            Self::Provisioning => "provisioning",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Suspending => "suspending",
            Self::Suspended => "suspended",
            Self::Resuming => "resuming",
            Self::Deprovision => "deprovision",
            Self::Deleting => "deleting",
            Self::Other(status) => status,
        }
    }
}

impl fmt::Display for KafkaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaRequest {
    pub id: String,
    pub kind: Option<String>,
    pub href: Option<String>,
    pub status: Option<KafkaStatus>,
    pub name: String,
    pub cloud_provider: Option<String>,
    pub region: Option<String>,
    pub owner: Option<String>,
    pub bootstrap_server_host: Option<String>,
    pub admin_api_server_url: Option<String>,
    pub instance_type: Option<String>,
    pub plan: Option<String>,
    pub failed_reason: Option<String>,
    pub version: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub reauthentication_enabled: Option<bool>,
}

impl KafkaRequest {
    pub fn is(&self, status: &KafkaStatus) -> bool {
        self.status.as_ref() == Some(status)
    }

    pub fn status_str(&self) -> &str {
        self.status.as_ref().map(KafkaStatus::as_str).unwrap_or("unknown")
    }

    pub fn is_developer(&self) -> bool {
        self.instance_type.as_deref() == Some("developer")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaRequestList {
    pub kind: Option<String>,
    pub page: u32,
    pub size: u32,
    pub total: u32,
    pub items: Vec<KafkaRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KafkaRequestPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reauthentication_enabled: Option<bool>,
}

impl KafkaRequestPayload {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cloud_provider: None,
            region: None,
            plan: None,
            reauthentication_enabled: None,
        }
    }

    pub fn with_cloud_provider(self, cloud_provider: impl Into<String>) -> Self {
        Self {
            cloud_provider: Some(cloud_provider.into()),
            ..self
        }
    }

    pub fn with_region(self, region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            ..self
        }
    }

    pub fn with_plan(self, plan: impl Into<String>) -> Self {
        Self {
            plan: Some(plan.into()),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KafkaUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reauthentication_enabled: Option<bool>,
}

/// Query parameters of the Kafka list endpoint. Unset fields are not sent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KafkaListQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub order_by: Option<String>,
    pub search: Option<String>,
}

impl KafkaListQuery {
    /// First match of a search expression such as `name = my-kafka`.
    pub fn first(search: impl Into<String>) -> Self {
        Self {
            page: Some(1),
            size: Some(1),
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

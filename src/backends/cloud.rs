//! Cloud provisioning collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backends::error::BackendResult;
use crate::backends::http::RestClient;

/// Parameters for a new instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// Label; also becomes the VPN server name.
    pub label: String,
    pub region: String,
    pub plan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_key_ids: Vec<String>,
}

/// Instance as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub status: String,
    /// Public address; empty until the provider assigns one.
    #[serde(default)]
    pub main_ip: String,
}

impl InstanceInfo {
    /// True once the instance is running with a public address.
    pub fn is_ready(&self) -> bool {
        self.status == "active" && !self.main_ip.is_empty() && self.main_ip != "0.0.0.0"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

/// Cloud backend contract.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn create_instance(&self, spec: &InstanceSpec) -> BackendResult<InstanceInfo>;

    async fn list_regions(&self) -> BackendResult<Vec<Region>>;

    async fn delete_instance(&self, id: &str) -> BackendResult<()>;

    async fn poll_instance(&self, id: &str) -> BackendResult<InstanceInfo>;
}

#[derive(Deserialize)]
struct InstanceEnvelope {
    instance: InstanceInfo,
}

#[derive(Deserialize)]
struct RegionsEnvelope {
    regions: Vec<Region>,
}

/// REST implementation: `instances` and `regions` collections under the base URL.
#[derive(Debug, Clone)]
pub struct HttpCloud {
    client: RestClient,
}

impl HttpCloud {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CloudProvider for HttpCloud {
    async fn create_instance(&self, spec: &InstanceSpec) -> BackendResult<InstanceInfo> {
        let envelope: InstanceEnvelope = self.client.post_json(&["instances"], spec).await?;
        tracing::info!(id = %envelope.instance.id, label = %spec.label, region = %spec.region, "Cloud instance created");
        Ok(envelope.instance)
    }

    async fn list_regions(&self) -> BackendResult<Vec<Region>> {
        let envelope: RegionsEnvelope = self.client.get_json(&["regions"]).await?;
        Ok(envelope.regions)
    }

    async fn delete_instance(&self, id: &str) -> BackendResult<()> {
        self.client.delete(&["instances", id]).await?;
        tracing::info!(id = %id, "Cloud instance deleted");
        Ok(())
    }

    async fn poll_instance(&self, id: &str) -> BackendResult<InstanceInfo> {
        let envelope: InstanceEnvelope = self.client.get_json(&["instances", id]).await?;
        Ok(envelope.instance)
    }
}

//! HTTP adapter for the inventory and lifecycle APIs
//!
//! Records are served as JSON envelopes keyed by kind, e.g.
//! `{"service-instance": {...}}`, from `GET {base}/{kind}/{key}`. A 404 means
//! the resource is not found. Envelopes are decoded into the typed records of
//! [`crate::model`] here, so a missing or mistyped field surfaces as
//! [`Error::Decode`] instead of reaching the stage verifiers.
//!
//! Successful reads are cached per `(kind, key)`. A read with `refresh = false`
//! is answered from the cache when possible; `refresh = true` always goes to
//! the server and replaces the cached entry.

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use super::{Inventory, ResourceLifecycle};
use crate::model::{
    FqName, InterfaceRecord, NetworkRecord, ResourceKind, RoutingInstanceRecord,
    ServiceInstanceRecord, ServiceInstanceRef, WorkloadRecord,
};
use crate::Error;

/// Inventory and lifecycle client backed by the control plane's REST API
pub struct HttpInventory {
    client: reqwest::Client,
    base_url: String,
    cache: DashMap<(ResourceKind, String), Value>,
}

impl HttpInventory {
    /// Create a client for the API rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing `reqwest::Client`
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: DashMap::new(),
        }
    }

    fn record_url(&self, kind: ResourceKind, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, kind.as_str(), key)
    }

    fn collection_url(&self, kind: ResourceKind) -> String {
        format!("{}/{}s", self.base_url, kind.as_str())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        key: &str,
        refresh: bool,
    ) -> Result<Option<T>, Error> {
        let cache_key = (kind, key.to_string());
        if !refresh {
            if let Some(cached) = self.cache.get(&cache_key) {
                trace!(kind = %kind, key, "Inventory cache hit");
                return decode_envelope(kind, key, cached.value().clone()).map(Some);
            }
        }

        let response = self
            .client
            .get(self.record_url(kind, key))
            .query(&[("refresh", refresh)])
            .send()
            .await
            .map_err(|e| Error::inventory(kind, key, e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(kind = %kind, key, "Inventory reports not found");
            self.cache.remove(&cache_key);
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::inventory(kind, key, format!("{} - {}", status, body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::decode(kind, key, format!("invalid JSON: {}", e)))?;
        let record = decode_envelope(kind, key, body.clone())?;
        self.cache.insert(cache_key, body);
        Ok(Some(record))
    }
}

/// Unwrap a `{"<kind>": {...}}` envelope and decode the typed record
pub fn decode_envelope<T: DeserializeOwned>(
    kind: ResourceKind,
    key: &str,
    mut body: Value,
) -> Result<T, Error> {
    let inner = body
        .get_mut(kind.as_str())
        .map(Value::take)
        .ok_or_else(|| Error::decode(kind, key, format!("missing `{}` envelope", kind.as_str())))?;
    serde_json::from_value(inner).map_err(|e| Error::decode(kind, key, e.to_string()))
}

/// Build the body of a create call.
///
/// Left and right networks are only sent as a pair.
pub fn create_request(instance: &ServiceInstanceRef) -> Value {
    let mut properties = json!({
        "scale_out": { "max_instances": instance.scale_out },
    });
    if let (Some(left), Some(right)) = (&instance.left_network, &instance.right_network) {
        properties["left_virtual_network"] = json!(left);
        properties["right_virtual_network"] = json!(right);
    }

    json!({
        "service-instance": {
            "fq_name": instance.fq_name,
            "parent_type": "project",
            "service_template_name": instance.template,
            "service_instance_properties": properties,
        }
    })
}

#[derive(Deserialize)]
struct ListedInstance {
    fq_name: FqName,
}

#[derive(Deserialize)]
struct ServiceInstanceList {
    #[serde(rename = "service-instances", default)]
    service_instances: Vec<ListedInstance>,
}

#[async_trait]
impl Inventory for HttpInventory {
    async fn service_instance(
        &self,
        fq_name: &FqName,
        refresh: bool,
    ) -> Result<Option<ServiceInstanceRecord>, Error> {
        self.get(ResourceKind::ServiceInstance, &fq_name.to_string(), refresh)
            .await
    }

    async fn workload(&self, id: &str, refresh: bool) -> Result<Option<WorkloadRecord>, Error> {
        self.get(ResourceKind::Workload, id, refresh).await
    }

    async fn workload_interface(
        &self,
        id: &str,
        refresh: bool,
    ) -> Result<Option<InterfaceRecord>, Error> {
        self.get(ResourceKind::WorkloadInterface, id, refresh).await
    }

    async fn virtual_network(
        &self,
        id: &str,
        refresh: bool,
    ) -> Result<Option<NetworkRecord>, Error> {
        self.get(ResourceKind::VirtualNetwork, id, refresh).await
    }

    async fn routing_instance(
        &self,
        id: &str,
        refresh: bool,
    ) -> Result<Option<RoutingInstanceRecord>, Error> {
        self.get(ResourceKind::RoutingInstance, id, refresh).await
    }
}

#[async_trait]
impl ResourceLifecycle for HttpInventory {
    async fn create_service_instance(
        &self,
        instance: &ServiceInstanceRef,
    ) -> Result<ServiceInstanceRecord, Error> {
        let target = instance.fq_name.to_string();
        let response = self
            .client
            .post(self.collection_url(ResourceKind::ServiceInstance))
            .json(&create_request(instance))
            .send()
            .await
            .map_err(|e| Error::lifecycle("create", &target, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::lifecycle("create", &target, format!("{} - {}", status, body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::lifecycle("create", &target, format!("invalid JSON: {}", e)))?;
        decode_envelope(ResourceKind::ServiceInstance, &target, body)
    }

    async fn delete_service_instance(&self, fq_name: &FqName) -> Result<(), Error> {
        let target = fq_name.to_string();
        let response = self
            .client
            .delete(self.record_url(ResourceKind::ServiceInstance, &target))
            .send()
            .await
            .map_err(|e| Error::lifecycle("delete", &target, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::lifecycle("delete", &target, format!("{} - {}", status, body)));
        }
        self.cache
            .remove(&(ResourceKind::ServiceInstance, target));
        Ok(())
    }

    async fn list_service_instances(&self, scope: &FqName) -> Result<Vec<FqName>, Error> {
        let target = scope.to_string();
        let response = self
            .client
            .get(self.collection_url(ResourceKind::ServiceInstance))
            .query(&[("parent_fq_name_str", target.as_str())])
            .send()
            .await
            .map_err(|e| Error::lifecycle("list", &target, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::lifecycle("list", &target, format!("{} - {}", status, body)));
        }

        let list: ServiceInstanceList = response
            .json()
            .await
            .map_err(|e| Error::lifecycle("list", &target, format!("invalid JSON: {}", e)))?;
        Ok(list
            .service_instances
            .into_iter()
            .map(|listed| listed.fq_name)
            .collect())
    }
}

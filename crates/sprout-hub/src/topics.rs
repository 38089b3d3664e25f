//! Adapters between bus payloads and the services that handle them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use sprout_services::{ProvisioningCoordinator, TelemetryRecorder};
use sprout_types::bus::{BreadcrumbPayload, ProvisionPayload};

use crate::error::HubError;

pub const BREADCRUMB_TOPIC: &str = "Breadcrumb";
pub const PROVISION_TOPIC: &str = "Provision";

/// Narrow "invoke with payload" seam between the router and a service.
#[async_trait]
pub trait TopicHandler: Send + Sync {
    async fn invoke(&self, payload: &[u8]) -> Result<(), HubError>;
}

fn decode<T: DeserializeOwned>(topic: &'static str, payload: &[u8]) -> Result<T, HubError> {
    serde_json::from_slice(payload).map_err(|source| HubError::Decode { topic, source })
}

/// Completes two-phase provisioning for devices announcing their contract.
pub struct ProvisionTopic {
    provisioning: Arc<ProvisioningCoordinator>,
}

impl ProvisionTopic {
    pub fn new(provisioning: Arc<ProvisioningCoordinator>) -> Self {
        Self { provisioning }
    }
}

#[async_trait]
impl TopicHandler for ProvisionTopic {
    async fn invoke(&self, payload: &[u8]) -> Result<(), HubError> {
        let msg: ProvisionPayload = decode(PROVISION_TOPIC, payload)?;
        self.provisioning
            .complete_device_provision(&msg.mac_addr, &msg.contract)
            .await
            .map(|_| ())
            .map_err(|source| HubError::Handler {
                topic: PROVISION_TOPIC,
                source,
            })
    }
}

/// Records telemetry samples.
pub struct BreadcrumbTopic {
    telemetry: Arc<TelemetryRecorder>,
}

impl BreadcrumbTopic {
    pub fn new(telemetry: Arc<TelemetryRecorder>) -> Self {
        Self { telemetry }
    }
}

#[async_trait]
impl TopicHandler for BreadcrumbTopic {
    async fn invoke(&self, payload: &[u8]) -> Result<(), HubError> {
        let crumb: BreadcrumbPayload = decode(BREADCRUMB_TOPIC, payload)?;
        self.telemetry
            .record_breadcrumb(&crumb)
            .await
            .map_err(|source| HubError::Handler {
                topic: BREADCRUMB_TOPIC,
                source,
            })
    }
}

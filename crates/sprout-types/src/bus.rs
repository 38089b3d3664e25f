//! Payloads devices publish on the message bus. Field names are fixed by the
//! device firmware, hence the PascalCase renames.

use serde::{Deserialize, Serialize};

/// Telemetry sample published on the breadcrumb topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BreadcrumbPayload {
    pub mac_addr: String,
    pub capacitance: i64,
    pub temperature: i64,
}

/// Provisioning completion published by a freshly flashed device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionPayload {
    pub mac_addr: String,
    pub contract: String,
}

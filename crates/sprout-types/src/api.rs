use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPwQuery {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePwQuery {
    pub token: String,
}

/// Form posted by the change-password page.
#[derive(Debug, Deserialize)]
pub struct ChangePwForm {
    pub pw1: String,
    pub pw2: String,
}

// -- Devices --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionQuery {
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProvisionResponse {
    pub contract: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameDeviceRequest {
    pub display_name: String,
}

// -- Data --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    pub device_id: i64,
    /// RFC 3339. A query string decodes a bare `+` to a space, so offsets
    /// must be sent as `Z` or percent-encoded (`%2B01:00`).
    pub start_time: DateTime<Utc>,
}

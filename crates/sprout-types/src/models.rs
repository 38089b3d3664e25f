use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered person. The password hash never leaves the db layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// A soil sensor owned by a user. `mac_addr` stays `None` until the device
/// announces itself on the bus and completes provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub user_id: i64,
    pub mac_addr: Option<String>,
    pub display_name: String,
}

impl Device {
    pub fn is_provisioned(&self) -> bool {
        self.mac_addr.is_some()
    }
}

/// Time-series keys a breadcrumb is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measurement {
    Capacitance,
    Temperature,
}

impl Measurement {
    pub const ALL: [Measurement; 2] = [Measurement::Capacitance, Measurement::Temperature];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capacitance => "capacitance",
            Self::Temperature => "temperature",
        }
    }
}

/// One stored time-series sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    pub value: i64,
    pub time: DateTime<Utc>,
    pub key: Measurement,
}

/// Latest capacitance and temperature of a device. The two values come from
/// independent series and need not share a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub capacitance: i64,
    pub temperature: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_serializes_lowercase() {
        let json = serde_json::to_string(&Measurement::Capacitance).unwrap();
        assert_eq!(json, "\"capacitance\"");
    }

    #[test]
    fn series_key_matches_wire_name() {
        for m in Measurement::ALL {
            assert_eq!(serde_json::to_value(m).unwrap(), m.as_str());
        }
    }
}

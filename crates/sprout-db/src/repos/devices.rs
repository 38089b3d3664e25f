use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};
use sprout_types::models::Device;
use tracing::debug;

use crate::Database;
use crate::models::StagingRow;

const DEVICE_COLUMNS: &str = "id, user_id, mac_addr, display_name";

/// Result of consuming a provisioning contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Completed(Device),
    /// No staging row carries that contract (never issued, or already used).
    UnknownContract,
    /// Another device is already bound to the hardware address.
    AddressInUse { device_id: i64 },
}

impl Database {
    /// Phase one of provisioning: an unaddressed device plus its staging row,
    /// written together so a device never exists without a way to complete it.
    pub fn create_device_with_staging(
        &self,
        user_id: i64,
        display_name: &str,
        contract: &str,
    ) -> Result<Device> {
        self.transaction("create_device_with_staging", |tx| {
            tx.execute(
                "INSERT INTO devices (user_id, display_name) VALUES (?1, ?2)",
                rusqlite::params![user_id, display_name],
            )?;
            let device_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO provision_staging (device_id, contract) VALUES (?1, ?2)",
                rusqlite::params![device_id, contract],
            )?;
            Ok(Device {
                id: device_id,
                user_id,
                mac_addr: None,
                display_name: display_name.to_string(),
            })
        })
    }

    /// Phase two: bind `mac_addr` to the device staged under `contract` and
    /// consume the staging row, so the contract cannot be replayed.
    pub fn complete_provision(&self, contract: &str, mac_addr: &str) -> Result<ProvisionOutcome> {
        self.transaction("complete_provision", |tx| {
            let Some(staging) = query_staging_by_contract(tx, contract)? else {
                return Ok(ProvisionOutcome::UnknownContract);
            };

            if let Some(other) = query_device_by_mac(tx, mac_addr)? {
                if other.id != staging.device_id {
                    return Ok(ProvisionOutcome::AddressInUse { device_id: other.id });
                }
            }

            tx.execute(
                "UPDATE devices SET mac_addr = ?2 WHERE id = ?1",
                rusqlite::params![staging.device_id, mac_addr],
            )?;
            tx.execute(
                "DELETE FROM provision_staging WHERE device_id = ?1",
                [staging.device_id],
            )?;

            let device = query_device_by_id(tx, staging.device_id)?.ok_or_else(|| {
                anyhow::anyhow!("staged device {} does not exist", staging.device_id)
            })?;
            debug!(device_id = device.id, mac_addr, "provision completed");
            Ok(ProvisionOutcome::Completed(device))
        })
    }

    pub fn get_device(&self, id: i64) -> Result<Option<Device>> {
        self.transaction("get_device", |tx| query_device_by_id(tx, id))
    }

    pub fn get_device_by_mac(&self, mac_addr: &str) -> Result<Option<Device>> {
        self.transaction("get_device_by_mac", |tx| query_device_by_mac(tx, mac_addr))
    }

    pub fn get_devices_by_user(&self, user_id: i64) -> Result<Vec<Device>> {
        self.transaction("get_devices_by_user", |tx| {
            let mut stmt = tx.prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM devices WHERE user_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([user_id], map_device)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false when the device does not exist.
    pub fn rename_device(&self, id: i64, display_name: &str) -> Result<bool> {
        self.transaction("rename_device", |tx| {
            let n = tx.execute(
                "UPDATE devices SET display_name = ?2 WHERE id = ?1",
                rusqlite::params![id, display_name],
            )?;
            Ok(n > 0)
        })
    }
}

fn query_staging_by_contract(conn: &Connection, contract: &str) -> Result<Option<StagingRow>> {
    let row = conn
        .query_row(
            "SELECT device_id, contract FROM provision_staging WHERE contract = ?1",
            [contract],
            |row| {
                Ok(StagingRow {
                    device_id: row.get(0)?,
                    contract: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn query_device_by_id(conn: &Connection, id: i64) -> Result<Option<Device>> {
    let row = conn
        .query_row(
            &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1"),
            [id],
            map_device,
        )
        .optional()?;
    Ok(row)
}

fn query_device_by_mac(conn: &Connection, mac_addr: &str) -> Result<Option<Device>> {
    let row = conn
        .query_row(
            &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE mac_addr = ?1"),
            [mac_addr],
            map_device,
        )
        .optional()?;
    Ok(row)
}

fn map_device(row: &Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get(0)?,
        user_id: row.get(1)?,
        mac_addr: row.get(2)?,
        display_name: row.get(3)?,
    })
}

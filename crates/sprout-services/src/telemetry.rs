//! Breadcrumb ingestion and telemetry reads.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use sprout_db::SeriesStore;
use sprout_types::bus::BreadcrumbPayload;
use sprout_types::models::{Breadcrumb, DataPoint, Measurement};

use crate::error::{Error, Result};
use crate::provisioning::DeviceLookup;

/// Read/write access to per-device measurement series.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn write(
        &self,
        device_id: i64,
        key: Measurement,
        value: i64,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    async fn read_latest(
        &self,
        device_id: i64,
        key: Measurement,
    ) -> anyhow::Result<Option<DataPoint>>;

    async fn read_range(
        &self,
        device_id: i64,
        key: Measurement,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<DataPoint>>;
}

/// [`TimeSeriesStore`] over the SQLite series file.
pub struct SqliteSeries {
    store: Arc<SeriesStore>,
}

impl SqliteSeries {
    pub fn new(store: Arc<SeriesStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TimeSeriesStore for SqliteSeries {
    async fn write(
        &self,
        device_id: i64,
        key: Measurement,
        value: i64,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.write_point(device_id, key, value, at)).await?
    }

    async fn read_latest(
        &self,
        device_id: i64,
        key: Measurement,
    ) -> anyhow::Result<Option<DataPoint>> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.latest_point(device_id, key)).await?
    }

    async fn read_range(
        &self,
        device_id: i64,
        key: Measurement,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<DataPoint>> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.points_in_range(device_id, key, start, end))
            .await?
    }
}

pub struct TelemetryRecorder {
    devices: Arc<dyn DeviceLookup>,
    series: Arc<dyn TimeSeriesStore>,
}

impl TelemetryRecorder {
    pub fn new(devices: Arc<dyn DeviceLookup>, series: Arc<dyn TimeSeriesStore>) -> Self {
        Self { devices, series }
    }

    /// Store one capacitance and one temperature point for the device bound
    /// to the payload's hardware address, both stamped with the same instant.
    pub async fn record_breadcrumb(&self, crumb: &BreadcrumbPayload) -> Result<()> {
        let device = self
            .devices
            .device_by_hardware_address(&crumb.mac_addr)
            .await?
            .ok_or_else(|| {
                warn!(mac_addr = %crumb.mac_addr, "breadcrumb from unknown device");
                Error::NoDevice(crumb.mac_addr.clone())
            })?;

        let now = Utc::now();
        self.series
            .write(device.id, Measurement::Capacitance, crumb.capacitance, now)
            .await
            .map_err(Error::persistence("record_breadcrumb"))?;
        self.series
            .write(device.id, Measurement::Temperature, crumb.temperature, now)
            .await
            .map_err(Error::persistence("record_breadcrumb"))?;

        debug!(
            device_id = device.id,
            capacitance = crumb.capacitance,
            temperature = crumb.temperature,
            "breadcrumb recorded"
        );
        Ok(())
    }

    /// Latest value of each measurement, read independently.
    pub async fn get_latest_breadcrumb(&self, device_id: i64) -> Result<Breadcrumb> {
        let capacitance = self.latest(device_id, Measurement::Capacitance).await?;
        let temperature = self.latest(device_id, Measurement::Temperature).await?;

        match (capacitance, temperature) {
            (Some(c), Some(t)) => Ok(Breadcrumb {
                capacitance: c.value,
                temperature: t.value,
            }),
            _ => Err(Error::NoTelemetry(device_id)),
        }
    }

    /// Points of one measurement with `start <= time <= end`, oldest first.
    pub async fn points_between(
        &self,
        device_id: i64,
        key: Measurement,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DataPoint>> {
        self.series
            .read_range(device_id, key, start, end)
            .await
            .map_err(Error::persistence("points_between"))
    }

    pub async fn capacitance_since(
        &self,
        device_id: i64,
        start: DateTime<Utc>,
    ) -> Result<Vec<DataPoint>> {
        self.points_between(device_id, Measurement::Capacitance, start, Utc::now())
            .await
    }

    pub async fn temperature_since(
        &self,
        device_id: i64,
        start: DateTime<Utc>,
    ) -> Result<Vec<DataPoint>> {
        self.points_between(device_id, Measurement::Temperature, start, Utc::now())
            .await
    }

    async fn latest(&self, device_id: i64, key: Measurement) -> Result<Option<DataPoint>> {
        self.series
            .read_latest(device_id, key)
            .await
            .map_err(Error::persistence("get_latest_breadcrumb"))
    }
}

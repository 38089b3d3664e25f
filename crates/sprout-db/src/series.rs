//! Time-series storage for device measurements.
//!
//! Kept in its own SQLite file so telemetry volume never contends with the
//! control-plane tables. Points are keyed by (device, measurement, instant);
//! writing the same key twice overwrites the value.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use sprout_types::models::{DataPoint, Measurement};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub struct SeriesStore {
    conn: Mutex<Connection>,
}

impl SeriesStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        init_schema(&conn)?;

        info!("Series store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Series lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn write_point(
        &self,
        device_id: i64,
        key: Measurement,
        value: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO points (device_id, measurement, recorded_at, value)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(device_id, measurement, recorded_at) DO UPDATE SET value = excluded.value",
                rusqlite::params![device_id, key.as_str(), at.timestamp_millis(), value],
            )?;
            Ok(())
        })
    }

    pub fn latest_point(&self, device_id: i64, key: Measurement) -> Result<Option<DataPoint>> {
        self.with_conn(|conn| {
            let point = conn
                .query_row(
                    "SELECT value, recorded_at FROM points
                     WHERE device_id = ?1 AND measurement = ?2
                     ORDER BY recorded_at DESC
                     LIMIT 1",
                    rusqlite::params![device_id, key.as_str()],
                    |row| map_point(row, key),
                )
                .optional()?;
            Ok(point)
        })
    }

    /// Points with `start <= time <= end`, oldest first.
    pub fn points_in_range(
        &self,
        device_id: i64,
        key: Measurement,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DataPoint>> {
        if end < start {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT value, recorded_at FROM points
                 WHERE device_id = ?1 AND measurement = ?2
                   AND recorded_at BETWEEN ?3 AND ?4
                 ORDER BY recorded_at ASC",
            )?;
            let points = stmt
                .query_map(
                    rusqlite::params![
                        device_id,
                        key.as_str(),
                        start.timestamp_millis(),
                        end.timestamp_millis()
                    ],
                    |row| map_point(row, key),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(points)
        })
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS points (
            device_id    INTEGER NOT NULL,
            measurement  TEXT NOT NULL,
            recorded_at  INTEGER NOT NULL,
            value        INTEGER NOT NULL,
            PRIMARY KEY (device_id, measurement, recorded_at)
        ) WITHOUT ROWID;
        ",
    )?;
    Ok(())
}

fn map_point(row: &Row<'_>, key: Measurement) -> rusqlite::Result<DataPoint> {
    let millis: i64 = row.get(1)?;
    let time = DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(1, millis))?;
    Ok(DataPoint {
        value: row.get(0)?,
        time,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn latest_point_ignores_other_series() {
        let store = SeriesStore::open_in_memory().unwrap();
        store.write_point(1, Measurement::Capacitance, 100, at(0)).unwrap();
        store.write_point(1, Measurement::Capacitance, 200, at(10)).unwrap();
        store.write_point(1, Measurement::Temperature, 21, at(20)).unwrap();
        store.write_point(2, Measurement::Capacitance, 999, at(30)).unwrap();

        let latest = store.latest_point(1, Measurement::Capacitance).unwrap().unwrap();
        assert_eq!(latest.value, 200);
        assert_eq!(latest.time, at(10));
        assert_eq!(latest.key, Measurement::Capacitance);

        assert!(store.latest_point(3, Measurement::Temperature).unwrap().is_none());
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let store = SeriesStore::open_in_memory().unwrap();
        for (i, v) in [5, 3, 9, 1].into_iter().enumerate() {
            // insert out of time order on purpose
            let t = at(30 - (i as i64) * 10);
            store.write_point(7, Measurement::Temperature, v, t).unwrap();
        }

        let points = store
            .points_in_range(7, Measurement::Temperature, at(0), at(20))
            .unwrap();
        let values: Vec<i64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1, 9, 3]);
        assert!(points.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn empty_or_inverted_range_is_empty() {
        let store = SeriesStore::open_in_memory().unwrap();
        store.write_point(1, Measurement::Capacitance, 1, at(0)).unwrap();

        let none = store
            .points_in_range(1, Measurement::Capacitance, at(100), at(200))
            .unwrap();
        assert!(none.is_empty());

        let inverted = store
            .points_in_range(1, Measurement::Capacitance, at(0) + Duration::hours(1), at(0))
            .unwrap();
        assert!(inverted.is_empty());
    }

    #[test]
    fn same_instant_overwrites() {
        let store = SeriesStore::open_in_memory().unwrap();
        store.write_point(1, Measurement::Capacitance, 1, at(0)).unwrap();
        store.write_point(1, Measurement::Capacitance, 2, at(0)).unwrap();

        let points = store
            .points_in_range(1, Measurement::Capacitance, at(0), at(0))
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 2);
    }
}

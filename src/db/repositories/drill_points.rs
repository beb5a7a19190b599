use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u64},
};
use crate::models::{DrillPoint, DrillPointId};

const NEXT_ID_KEY: &str = "drill_next_id";

fn row_to_drill_point(row: &Row) -> Result<DrillPoint> {
    let id: i64 = row.get("id")?;
    let created_at: String = row.get("created_at")?;

    Ok(DrillPoint {
        id: DrillPointId(to_u64(id, "id")?),
        lat: row.get("lat")?,
        lon: row.get("lon")?,
        thickness: row.get("thickness")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Stores a point and advances the persisted id counter past it.
    pub async fn insert_drill_point(&self, point: &DrillPoint) -> Result<()> {
        let record = point.clone();
        self.transaction(move |tx| {
            tx.execute(
                "INSERT INTO drill_points (id, lat, lon, thickness, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    to_i64(record.id.0)?,
                    record.lat,
                    record.lon,
                    record.thickness,
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to insert drill point {}", record.id))?;
            tx.execute(
                "UPDATE annotation_meta SET value = MAX(value, ?1) WHERE key = ?2",
                params![to_i64(record.id.0 + 1)?, NEXT_ID_KEY],
            )
            .context("failed to advance drill point counter")?;
            Ok(())
        })
        .await
    }

    pub async fn delete_drill_point(&self, id: DrillPointId) -> Result<bool> {
        self.execute(move |conn| {
            let removed = conn
                .execute("DELETE FROM drill_points WHERE id = ?1", params![to_i64(id.0)?])
                .with_context(|| format!("failed to delete drill point {id}"))?;
            Ok(removed > 0)
        })
        .await
    }

    /// Deletes every point; the id counter is kept.
    pub async fn clear_drill_points(&self) -> Result<usize> {
        self.execute(|conn| {
            conn.execute("DELETE FROM drill_points", [])
                .context("failed to clear drill points")
        })
        .await
    }

    /// All stored points in id order, plus the next id to hand out.
    pub async fn load_drill_points(&self) -> Result<(Vec<DrillPoint>, u64)> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, lat, lon, thickness, created_at
                 FROM drill_points
                 ORDER BY id ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut points = Vec::new();
            while let Some(row) = rows.next()? {
                points.push(row_to_drill_point(row)?);
            }

            let next_id: Option<i64> = conn
                .query_row(
                    "SELECT value FROM annotation_meta WHERE key = ?1",
                    params![NEXT_ID_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            Ok((points, to_u64(next_id.unwrap_or(1), NEXT_ID_KEY)?))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill::DrillPointStore;
    use chrono::{TimeZone, Utc};

    fn open(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("annotations.sqlite3")).expect("database opens")
    }

    fn point(id: u64, lat: f64) -> DrillPoint {
        DrillPoint {
            id: DrillPointId(id),
            lat,
            lon: 10.0,
            thickness: 2.5,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_round_trip_keeps_fields_and_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open(&dir);
        db.insert_drill_point(&point(2, 46.0)).await.expect("insert");
        db.insert_drill_point(&point(1, 45.0)).await.expect("insert");

        let (points, next_id) = db.load_drill_points().await.expect("load");
        assert_eq!(points, vec![point(1, 45.0), point(2, 46.0)]);
        assert_eq!(next_id, 3);
    }

    #[tokio::test]
    async fn test_counter_survives_delete_clear_and_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = open(&dir);
            db.insert_drill_point(&point(1, 45.0)).await.expect("insert");
            db.insert_drill_point(&point(2, 46.0)).await.expect("insert");
            assert!(db.delete_drill_point(DrillPointId(2)).await.expect("delete"));
            assert!(!db.delete_drill_point(DrillPointId(2)).await.expect("delete"));
        }

        let db = open(&dir);
        let (points, next_id) = db.load_drill_points().await.expect("load");
        assert_eq!(points.len(), 1);
        let mut store = DrillPointStore::restore(points, next_id);
        let added = store.add(1.0, 1.0, 1.0).expect("valid point");
        assert_eq!(added.id, DrillPointId(3));

        assert_eq!(db.clear_drill_points().await.expect("clear"), 1);
        let (points, next_id) = db.load_drill_points().await.expect("load");
        assert!(points.is_empty());
        assert_eq!(next_id, 3);
    }
}

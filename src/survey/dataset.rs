use serde_json::Value;

use crate::models::{Bounds, Feature, FeatureCollection, LatLon, Reading, RowId, Track};

use super::height::{base_thickness_for, InstrumentHeight};
use super::index::ReadingIndex;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Property carrying a row id that survived a previous round trip.
const ROW_ID_PROPERTY: &str = "_row_id";

/// Readings and tracks of one uploaded survey. Replaced wholesale on the next
/// upload; readings can be edited or removed but never added.
#[derive(Debug, Clone, Default)]
pub struct SurveyDataset {
    readings: Vec<Reading>,
    tracks: Vec<Track>,
    bounds: Option<Bounds>,
    index: ReadingIndex,
}

impl SurveyDataset {
    /// Builds the dataset from the backend's feature collection. `height` is the
    /// instrument height the backend used to derive the thicknesses it sent.
    ///
    /// Readings without a row id are numbered `r1`, `r2`, ... from a counter
    /// that restarts at every ingest. Features that are neither a readable
    /// point reading nor a track are skipped.
    pub fn ingest(collection: &FeatureCollection, height: InstrumentHeight) -> Self {
        let mut readings: Vec<Reading> = Vec::new();
        let mut tracks = Vec::new();
        let mut index = ReadingIndex::default();
        let mut next_seq: u64 = 1;
        let mut skipped = 0usize;

        for feature in &collection.features {
            match feature.kind() {
                Some("reading") => {
                    let Some(position) = point_position(feature) else {
                        skipped += 1;
                        continue;
                    };
                    let row_id = match feature.text(ROW_ID_PROPERTY).map(RowId::new) {
                        Some(id) if !index.contains(&id) => id,
                        _ => next_free_id(&index, &mut next_seq),
                    };
                    let reading = reading_from_feature(feature, row_id, position, height);
                    index.insert(reading.row_id.clone(), readings.len());
                    readings.push(reading);
                }
                Some("track") => match track_path(feature) {
                    Some(path) => tracks.push(Track {
                        line_name: feature.text("line_name"),
                        path,
                    }),
                    None => skipped += 1,
                },
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            log_debug!("skipped {} features without usable geometry or kind", skipped);
        }
        log_info!(
            "ingested survey: {} readings, {} tracks (instrument height {} m)",
            readings.len(),
            tracks.len(),
            height.meters()
        );

        Self {
            readings,
            tracks,
            bounds: collection.bounds.as_deref().and_then(Bounds::from_slice),
            index,
        }
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Mutable view that cannot add or drop readings, so the index stays valid.
    pub(crate) fn readings_mut(&mut self) -> &mut [Reading] {
        &mut self.readings
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Bounding box announced by the backend, if any.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Announced bounds, or the box around every reading and track vertex.
    pub fn extent(&self) -> Option<Bounds> {
        self.bounds.or_else(|| {
            let readings = self.readings.iter().map(|r| &r.position);
            let tracks = self.tracks.iter().flat_map(|t| t.path.iter());
            Bounds::enclosing(readings.chain(tracks))
        })
    }

    pub fn index(&self) -> &ReadingIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn get(&self, row_id: &RowId) -> Option<&Reading> {
        self.index
            .position(row_id)
            .and_then(|pos| self.readings.get(pos))
    }

    pub fn get_mut(&mut self, row_id: &RowId) -> Option<&mut Reading> {
        let pos = self.index.position(row_id)?;
        self.readings.get_mut(pos)
    }

    pub fn conductivities(&self) -> impl Iterator<Item = f64> + '_ {
        self.readings.iter().filter_map(|r| r.conductivity)
    }

    /// Removes a reading from the list and the index. `false` if it was not there.
    pub fn remove(&mut self, row_id: &RowId) -> bool {
        match self.index.remove(row_id) {
            Some(pos) => {
                self.readings.remove(pos);
                true
            }
            None => false,
        }
    }
}

fn next_free_id(index: &ReadingIndex, next_seq: &mut u64) -> RowId {
    loop {
        let candidate = RowId::from_sequence(*next_seq);
        *next_seq += 1;
        if !index.contains(&candidate) {
            return candidate;
        }
    }
}

fn point_position(feature: &Feature) -> Option<LatLon> {
    if feature.geometry_type()? != "Point" {
        return None;
    }
    LatLon::from_geojson(feature.coordinates()?.as_array()?)
}

fn track_path(feature: &Feature) -> Option<Vec<LatLon>> {
    if feature.geometry_type()? != "LineString" {
        return None;
    }
    let path: Vec<LatLon> = feature
        .coordinates()?
        .as_array()?
        .iter()
        .filter_map(|pos| pos.as_array().and_then(|c| LatLon::from_geojson(c)))
        .collect();
    (!path.is_empty()).then_some(path)
}

fn reading_from_feature(
    feature: &Feature,
    row_id: RowId,
    position: LatLon,
    height: InstrumentHeight,
) -> Reading {
    let thickness = feature.number("thickness");
    Reading {
        line_name: feature.text("line_name"),
        time_ms: feature
            .property("time_ms")
            .and_then(Value::as_i64)
            .or_else(|| feature.number("time_ms").map(|t| t.round() as i64)),
        conductivity: feature.number("conductivity"),
        inphase: feature.number("inphase"),
        thickness,
        base_thickness: base_thickness_for(thickness, height),
        range: feature.text("range"),
        dipole_mode: feature.text("dipole_mode"),
        marker: feature.property("marker").and_then(Value::as_bool),
        station: feature.number("station"),
        gps_quality: feature.text("gps_quality"),
        gps_satellites: feature.number("gps_satellites"),
        gps_hdop: feature.number("gps_hdop"),
        gps_altitude: feature.number("gps_altitude"),
        ..Reading::new(row_id, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EPS: f64 = 1e-9;

    fn collection(value: Value) -> FeatureCollection {
        serde_json::from_value(value).expect("feature collection parses")
    }

    fn height(m: f64) -> InstrumentHeight {
        InstrumentHeight::new(m).expect("valid height")
    }

    fn sample() -> FeatureCollection {
        collection(json!({
            "type": "FeatureCollection",
            "bounds": [4.0, 50.0, 4.1, 50.1],
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [4.01, 50.01]},
                 "properties": {"kind": "reading", "time_ms": 1000, "conductivity": 10.0, "thickness": 1.0,
                                "range": 2, "dipole_mode": "V", "gps_quality": 4, "gps_satellites": 9}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [4.02, 50.02]},
                 "properties": {"kind": "reading", "conductivity": null, "thickness": null}},
                {"type": "Feature", "geometry": {"type": "LineString",
                                                 "coordinates": [[4.0, 50.0], [4.05, 50.05], ["x", 1]]},
                 "properties": {"kind": "track", "line_name": "L1"}},
                {"type": "Feature", "geometry": null, "properties": {"kind": "reading"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 0]}}
            ]
        }))
    }

    #[test]
    fn test_ingest_assigns_sequential_row_ids() {
        let dataset = SurveyDataset::ingest(&sample(), height(0.15));
        let ids: Vec<_> = dataset.readings().iter().map(|r| r.row_id.to_string()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert_eq!(dataset.index().len(), 2);
        assert_eq!(dataset.tracks().len(), 1);
        assert_eq!(dataset.tracks()[0].path.len(), 2);
        assert_eq!(dataset.tracks()[0].line_name.as_deref(), Some("L1"));

        // A second ingest restarts the counter.
        let again = SurveyDataset::ingest(&sample(), height(0.15));
        assert_eq!(again.readings()[0].row_id, RowId::from("r1"));
    }

    #[test]
    fn test_ingest_derives_base_thickness() {
        let dataset = SurveyDataset::ingest(&sample(), height(0.15));
        let first = dataset.get(&RowId::from("r1")).expect("r1 present");
        let base = first.base_thickness.expect("numeric thickness has a base");
        assert!((first.thickness.unwrap() + 0.15 - base).abs() < EPS);
        assert!((base - 1.15).abs() < EPS);

        let second = dataset.get(&RowId::from("r2")).expect("r2 present");
        assert_eq!(second.base_thickness, None);
        assert_eq!(second.conductivity, None);
    }

    #[test]
    fn test_ingest_reads_auxiliary_fields() {
        let dataset = SurveyDataset::ingest(&sample(), height(0.15));
        let first = &dataset.readings()[0];
        assert_eq!(first.time_ms, Some(1000));
        assert_eq!(first.range.as_deref(), Some("2"));
        assert_eq!(first.gps_quality.as_deref(), Some("4"));
        assert_eq!(first.gps_satellites, Some(9.0));
        assert_eq!(first.position, LatLon::new(50.01, 4.01));
        assert_eq!(
            dataset.bounds(),
            Some(Bounds {
                west: 4.0,
                south: 50.0,
                east: 4.1,
                north: 50.1
            })
        );
    }

    #[test]
    fn test_ingest_keeps_existing_row_ids_and_avoids_collisions() {
        let fc = collection(json!({"features": [
            {"geometry": {"type": "Point", "coordinates": [1, 1]}, "properties": {"kind": "reading"}},
            {"geometry": {"type": "Point", "coordinates": [2, 2]}, "properties": {"kind": "reading", "_row_id": "r1"}},
            {"geometry": {"type": "Point", "coordinates": [3, 3]}, "properties": {"kind": "reading", "_row_id": "keep"}}
        ]}));
        let dataset = SurveyDataset::ingest(&fc, InstrumentHeight::ZERO);
        let ids: Vec<_> = dataset.readings().iter().map(|r| r.row_id.to_string()).collect();
        assert_eq!(ids, vec!["r1", "r2", "keep"]);
    }

    #[test]
    fn test_remove_keeps_index_in_lockstep() {
        let mut dataset = SurveyDataset::ingest(&sample(), height(0.15));
        assert!(dataset.remove(&RowId::from("r1")));
        assert!(!dataset.index().contains(&RowId::from("r1")));
        assert_eq!(
            dataset.get(&RowId::from("r2")).map(|r| r.row_id.clone()),
            Some(RowId::from("r2"))
        );
        assert!(!dataset.remove(&RowId::from("r1")));
        assert!(dataset.remove(&RowId::from("r2")));
        assert!(dataset.is_empty());
        assert!(dataset.index().is_empty());
    }

    #[test]
    fn test_extent_falls_back_to_geometry() {
        let fc = collection(json!({"features": [
            {"geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {"kind": "reading"}},
            {"geometry": {"type": "LineString", "coordinates": [[3, 4], [5, 6]]}, "properties": {"kind": "track"}}
        ]}));
        let dataset = SurveyDataset::ingest(&fc, InstrumentHeight::ZERO);
        assert_eq!(dataset.bounds(), None);
        assert_eq!(
            dataset.extent(),
            Some(Bounds {
                west: 1.0,
                south: 2.0,
                east: 5.0,
                north: 6.0
            })
        );
    }
}

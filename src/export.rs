//! CSV export of the current readings.

use std::{fs::File, io::Write, path::Path, path::PathBuf};

use anyhow::{Context, Result};

use crate::models::{Reading, ReadingField};

const ENABLE_LOGS: bool = true;

use crate::log_info;

pub const CSV_FILE_NAME: &str = "em31_points.csv";

/// Export column order.
pub const CSV_COLUMNS: [ReadingField; 14] = [
    ReadingField::TimeMs,
    ReadingField::Lat,
    ReadingField::Lon,
    ReadingField::Conductivity,
    ReadingField::Thickness,
    ReadingField::Inphase,
    ReadingField::Range,
    ReadingField::DipoleMode,
    ReadingField::Marker,
    ReadingField::Station,
    ReadingField::GpsQuality,
    ReadingField::GpsSatellites,
    ReadingField::GpsHdop,
    ReadingField::GpsAltitude,
];

/// Writes a header plus one row per reading. Absent values are empty fields.
pub fn write_csv<W: Write>(readings: &[Reading], out: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);

    writer.write_record(CSV_COLUMNS.iter().map(|c| c.as_str()))?;
    for reading in readings {
        writer.write_record(CSV_COLUMNS.iter().map(|&c| reading.value(c).to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_csv_string(readings: &[Reading]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(readings, &mut buf)?;
    String::from_utf8(buf).context("csv output is not valid utf-8")
}

/// Writes `em31_points.csv` into `dir` and returns its path.
pub fn export_to_dir(readings: &[Reading], dir: &Path) -> Result<PathBuf> {
    let path = dir.join(CSV_FILE_NAME);
    export_to_file(readings, &path)?;
    Ok(path)
}

pub fn export_to_file(readings: &[Reading], path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(readings, file)?;
    log_info!("exported {} readings to {}", readings.len(), path.display());
    Ok(())
}

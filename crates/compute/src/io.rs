//! CSV input and output for vitals runs, feature frames and decision rows.
//!
//! Empty cells (and `NaN`) are read as missing values.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, info};

use triage_core::{FeatureFrame, Result, TriageError, VitalsSample, VITALS_COLUMNS};

use crate::pipeline::types::DecisionRow;

/// Largest whole number of seconds an `f64` cell holds exactly (2^53).
const MAX_EXACT_SECONDS: f64 = 9_007_199_254_740_992.0;

fn csv_err(e: csv::Error) -> TriageError {
    TriageError::Csv(e.to_string())
}

fn parse_cell(raw: &str, column: &str, line: usize) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(|v| (!v.is_nan()).then_some(v))
        .map_err(|_| TriageError::Csv(format!("line {line}: column '{column}' has non-numeric value '{raw}'")))
}

/// Read a raw vitals run. Every vitals column must be present in the header;
/// extra columns are ignored.
pub fn read_vitals<R: Read>(reader: R) -> Result<Vec<VitalsSample>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().map_err(csv_err)?.clone();

    let mut index = [0usize; VITALS_COLUMNS.len()];
    for (slot, column) in index.iter_mut().zip(VITALS_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| TriageError::SchemaMismatch {
                column: column.to_string(),
            })?;
    }

    let mut samples = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let line = i + 2;
        let mut values = [None; VITALS_COLUMNS.len()];
        for ((value, &idx), column) in values.iter_mut().zip(&index).zip(VITALS_COLUMNS) {
            *value = parse_cell(record.get(idx).unwrap_or(""), column, line)?;
        }
        let time_sec = values[0]
            .filter(|t| (0.0..=MAX_EXACT_SECONDS).contains(t) && t.fract() == 0.0)
            .ok_or_else(|| {
                TriageError::Csv(format!(
                    "line {line}: time_sec must be a non-negative whole number of seconds"
                ))
            })?;
        samples.push(VitalsSample {
            time_sec: time_sec as u64,
            heart_rate_bpm: values[1],
            spo2_percent: values[2],
            bp_systolic: values[3],
            bp_diastolic: values[4],
            motion: values[5],
        });
    }
    debug!(rows = samples.len(), "vitals read");
    Ok(samples)
}

pub fn read_vitals_path(path: &Path) -> Result<Vec<VitalsSample>> {
    let samples = read_vitals(File::open(path)?)?;
    info!(path = %path.display(), rows = samples.len(), "vitals loaded");
    Ok(samples)
}

/// Read every numeric column of a CSV into a frame. Columns holding any
/// non-numeric text are skipped.
pub fn read_frame<R: Read>(reader: R) -> Result<FeatureFrame> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers: Vec<String> = rdr.headers().map_err(csv_err)?.iter().map(|h| h.trim().to_string()).collect();

    let mut columns: Vec<Option<Vec<f64>>> = vec![Some(Vec::new()); headers.len()];
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        for (c, column) in columns.iter_mut().enumerate() {
            let Some(values) = column else { continue };
            match parse_cell(record.get(c).unwrap_or(""), &headers[c], i + 2) {
                Ok(v) => values.push(v.unwrap_or(f64::NAN)),
                Err(_) => {
                    debug!(column = %headers[c], "non-numeric column skipped");
                    *column = None;
                }
            }
        }
    }

    let mut frame = FeatureFrame::new();
    for (name, values) in headers.into_iter().zip(columns) {
        if let Some(values) = values {
            frame.insert(name, values)?;
        }
    }
    Ok(frame)
}

pub fn read_frame_path(path: &Path) -> Result<FeatureFrame> {
    let frame = read_frame(File::open(path)?)?;
    info!(path = %path.display(), rows = frame.len(), columns = frame.column_names().count(), "frame loaded");
    Ok(frame)
}

/// Write a frame with its column order; `NaN` becomes an empty cell.
pub fn write_frame<W: Write>(writer: W, frame: &FeatureFrame) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(frame.column_names()).map_err(csv_err)?;
    let columns: Vec<&[f64]> = frame.columns().map(|(_, v)| v).collect();
    for row in 0..frame.len() {
        let record = columns.iter().map(|col| {
            let v = col[row];
            if v.is_nan() {
                String::new()
            } else {
                v.to_string()
            }
        });
        wtr.write_record(record).map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a vitals run in canonical column order; missing readings stay empty.
pub fn write_vitals<W: Write>(writer: W, samples: &[VitalsSample]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(VITALS_COLUMNS).map_err(csv_err)?;
    for s in samples {
        let cell = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        wtr.write_record([
            s.time_sec.to_string(),
            cell(s.heart_rate_bpm),
            cell(s.spo2_percent),
            cell(s.bp_systolic),
            cell(s.bp_diastolic),
            cell(s.motion),
        ])
        .map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_decisions<W: Write>(writer: W, rows: &[DecisionRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row).map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

pub fn write_frame_path(path: &Path, frame: &FeatureFrame) -> Result<()> {
    write_frame(create(path)?, frame)?;
    info!(path = %path.display(), rows = frame.len(), "frame written");
    Ok(())
}

pub fn write_vitals_path(path: &Path, samples: &[VitalsSample]) -> Result<()> {
    write_vitals(create(path)?, samples)?;
    info!(path = %path.display(), rows = samples.len(), "vitals written");
    Ok(())
}

pub fn write_decisions_path(path: &Path, rows: &[DecisionRow]) -> Result<()> {
    write_decisions(create(path)?, rows)?;
    info!(path = %path.display(), rows = rows.len(), "decisions written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_vitals_with_missing_cells() {
        let csv = "time_sec,heart_rate_bpm,spo2_percent,bp_systolic,bp_diastolic,motion\n\
                   0,80,97,120,80,0.2\n\
                   1,,97,120,,0.3\n";
        let samples = read_vitals(csv.as_bytes()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], VitalsSample::complete(0, 80.0, 97.0, 120.0, 80.0, 0.2));
        assert_eq!(samples[1].heart_rate_bpm, None);
        assert_eq!(samples[1].bp_diastolic, None);
        assert_eq!(samples[1].motion, Some(0.3));
    }

    #[test]
    fn column_order_and_extras_do_not_matter() {
        let csv = "motion,time_sec,note,bp_diastolic,bp_systolic,spo2_percent,heart_rate_bpm\n\
                   0.1,5,x,70,110,96,88\n";
        let samples = read_vitals(csv.as_bytes()).unwrap();
        assert_eq!(samples[0], VitalsSample::complete(5, 88.0, 96.0, 110.0, 70.0, 0.1));
    }

    #[test]
    fn missing_column_is_schema_mismatch() {
        let csv = "time_sec,heart_rate_bpm,spo2_percent,bp_systolic,motion\n0,80,97,120,0.2\n";
        match read_vitals(csv.as_bytes()) {
            Err(TriageError::SchemaMismatch { column }) => assert_eq!(column, "bp_diastolic"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn garbage_cell_is_csv_error() {
        let csv = "time_sec,heart_rate_bpm,spo2_percent,bp_systolic,bp_diastolic,motion\n0,high,97,120,80,0.2\n";
        assert!(matches!(read_vitals(csv.as_bytes()), Err(TriageError::Csv(_))));
    }

    #[test]
    fn fractional_or_out_of_range_time_is_rejected() {
        let header = "time_sec,heart_rate_bpm,spo2_percent,bp_systolic,bp_diastolic,motion\n";
        for time in ["1.5", "-1", "1e30", ""] {
            let csv = format!("{header}{time},80,97,120,80,0.2\n");
            let err = read_vitals(csv.as_bytes()).unwrap_err();
            assert!(matches!(err, TriageError::Csv(_)), "time {time:?}");
            assert!(err.to_string().contains("line 2"));
        }
        let csv = format!("{header}7.0,80,97,120,80,0.2\n");
        assert_eq!(read_vitals(csv.as_bytes()).unwrap()[0].time_sec, 7);
    }

    #[test]
    fn frame_round_trip_keeps_order_and_gaps() {
        let mut frame = FeatureFrame::new();
        frame.insert("hr_mean_30s", vec![80.5, 81.0]).unwrap();
        frame.insert("bp_diastolic", vec![f64::NAN, 79.0]).unwrap();

        let mut buf = Vec::new();
        write_frame(&mut buf, &frame).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("hr_mean_30s,bp_diastolic\n80.5,\n"));

        let back = read_frame(buf.as_slice()).unwrap();
        assert_eq!(back.get("hr_mean_30s"), Some(&[80.5, 81.0][..]));
        assert!(back.get("bp_diastolic").unwrap()[0].is_nan());
    }

    #[test]
    fn written_vitals_read_back() {
        let mut samples = vec![
            VitalsSample::complete(0, 80.0, 97.5, 120.0, 80.0, 0.2),
            VitalsSample::complete(1, 81.0, 97.0, 121.0, 79.0, 0.25),
        ];
        samples[1].spo2_percent = None;
        let mut buf = Vec::new();
        write_vitals(&mut buf, &samples).unwrap();
        assert_eq!(read_vitals(buf.as_slice()).unwrap(), samples);
    }

    #[test]
    fn text_columns_are_skipped_in_frames() {
        let csv = "time_sec,reason,risk_score\n0,normal,1.5\n1,HR rising trend,2.5\n";
        let frame = read_frame(csv.as_bytes()).unwrap();
        let names: Vec<&str> = frame.column_names().collect();
        assert_eq!(names, vec!["time_sec", "risk_score"]);
        assert_eq!(frame.mean("risk_score"), Some(2.0));
    }
}

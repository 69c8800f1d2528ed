//! CSV input/output for routing models
//!
//! Parsers for reading segment parameters, HRU mappings, and daily
//! lateral-inflow forcing from CSV files, plus a writer for the per-day
//! per-segment results table. CSV keeps the tables editable in a
//! spreadsheet.
//!
//! # CSV Formats
//!
//! ## Segments CSV
//! Columns: `segment`, `tosegment`, `mann_n`, `seg_depth`, `seg_length`,
//! `seg_slope`, `segment_type`, `x_coef`, `segment_flow_init`
//!
//! `segment` ids are 1-based and must cover `1..=nsegment`; `tosegment`
//! is 1-based with 0 meaning "out of the domain". `segment_type` is one
//! of `segment`, `headwater`, `lake`, `replace_inflow` (default
//! `segment`).
//!
//! ## HRUs CSV
//! Columns: `hru`, `hru_segment`, `hru_area`
//!
//! `hru_segment` is 1-based with 0 meaning the HRU drains outside the
//! network.
//!
//! ## Forcing CSV
//! Columns: `date`, `hru`, `sroff_vol`, `ssres_flow_vol`, `gwres_flow_vol`
//!
//! Volumes are cubic feet over the day. HRUs absent on a date contribute
//! zero; multiple rows for the same date and HRU accumulate.
//!
//! ## Output CSV
//! Columns: `date`, `segment`, `seg_lateral_inflow`,
//! `seg_upstream_inflow`, `seg_inflow`, `seg_outflow`, `seg_stor_change`,
//! `channel_outflow_vol`

use std::error::Error;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, Writer};
use serde::{Deserialize, Serialize};

use crate::parameters::{SegmentParameters, SegmentType};

// ============================================================================
// Segments CSV
// ============================================================================

/// CSV record for one stream segment
#[derive(Debug, Deserialize)]
pub struct SegmentCsvRecord {
    /// Segment id, 1-based
    pub segment: usize,
    /// Downstream segment id, 1-based; 0 = out of the domain
    pub tosegment: i32,
    /// Manning's roughness coefficient
    pub mann_n: f64,
    /// Bank-full depth (ft)
    pub seg_depth: f64,
    /// Segment length (ft)
    pub seg_length: f64,
    /// Segment slope (ft/ft)
    pub seg_slope: f64,
    /// Segment type name - optional, defaults to "segment"
    pub segment_type: Option<String>,
    /// Muskingum weighting factor
    pub x_coef: f64,
    /// Initial outflow (cfs) - optional, defaults to 0
    pub segment_flow_init: Option<f64>,
}

impl SegmentCsvRecord {
    /// Resolve the segment type name
    pub fn to_segment_type(&self) -> Result<SegmentType, Box<dyn Error>> {
        match self.segment_type.as_deref() {
            Some("segment") | None => Ok(SegmentType::Segment),
            Some("headwater") => Ok(SegmentType::Headwater),
            Some("lake") => Ok(SegmentType::Lake),
            Some("replace_inflow") => Ok(SegmentType::ReplaceInflow),
            Some(t) => Err(format!("Unknown segment type: {}", t).into()),
        }
    }
}

/// Parse segment records from any reader
pub fn parse_segments<R: Read>(reader: R) -> Result<Vec<SegmentCsvRecord>, Box<dyn Error>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut records = Vec::new();
    for (line_num, result) in reader.deserialize().enumerate() {
        let record: SegmentCsvRecord =
            result.map_err(|e| format!("Line {}: {}", line_num + 2, e))?;
        records.push(record);
    }
    Ok(records)
}

/// Parse segment records from a CSV file
pub fn parse_segments_csv<P: AsRef<Path>>(path: P) -> Result<Vec<SegmentCsvRecord>, Box<dyn Error>> {
    parse_segments(File::open(path)?)
}

// ============================================================================
// HRUs CSV
// ============================================================================

/// CSV record for one hydrologic response unit
#[derive(Debug, Deserialize)]
pub struct HruCsvRecord {
    /// HRU id, 1-based
    pub hru: usize,
    /// Receiving segment id, 1-based; 0 = drains outside the network
    pub hru_segment: i32,
    /// HRU area (acres) - optional, unused by routing
    pub hru_area: Option<f64>,
}

/// Parse HRU records from any reader
pub fn parse_hrus<R: Read>(reader: R) -> Result<Vec<HruCsvRecord>, Box<dyn Error>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut records = Vec::new();
    for (line_num, result) in reader.deserialize().enumerate() {
        let record: HruCsvRecord = result.map_err(|e| format!("Line {}: {}", line_num + 2, e))?;
        records.push(record);
    }
    Ok(records)
}

/// Parse HRU records from a CSV file
pub fn parse_hrus_csv<P: AsRef<Path>>(path: P) -> Result<Vec<HruCsvRecord>, Box<dyn Error>> {
    parse_hrus(File::open(path)?)
}

/// Assemble a parameter table from parsed segment and HRU records
///
/// Segment and HRU ids must each cover `1..=len` exactly (in any order).
pub fn build_parameters(
    segments: &[SegmentCsvRecord],
    hrus: &[HruCsvRecord],
) -> Result<SegmentParameters, Box<dyn Error>> {
    let nsegment = segments.len();
    let nhru = hrus.len();

    let mut params = SegmentParameters {
        nsegment,
        nhru,
        tosegment: vec![0; nsegment],
        hru_segment: vec![0; nhru],
        hru_area: vec![0.0; nhru],
        mann_n: vec![0.0; nsegment],
        seg_depth: vec![0.0; nsegment],
        seg_length: vec![0.0; nsegment],
        seg_slope: vec![0.0; nsegment],
        segment_type: vec![SegmentType::Segment; nsegment],
        x_coef: vec![0.0; nsegment],
        segment_flow_init: vec![0.0; nsegment],
        ..Default::default()
    };

    let mut seen = vec![false; nsegment];
    for record in segments {
        if record.segment < 1 || record.segment > nsegment {
            return Err(format!(
                "segment id {} out of range 1..={}",
                record.segment, nsegment
            )
            .into());
        }
        let i = record.segment - 1;
        if seen[i] {
            return Err(format!("duplicate segment id {}", record.segment).into());
        }
        seen[i] = true;
        params.tosegment[i] = record.tosegment;
        params.mann_n[i] = record.mann_n;
        params.seg_depth[i] = record.seg_depth;
        params.seg_length[i] = record.seg_length;
        params.seg_slope[i] = record.seg_slope;
        params.segment_type[i] = record.to_segment_type()?;
        params.x_coef[i] = record.x_coef;
        params.segment_flow_init[i] = record.segment_flow_init.unwrap_or(0.0);
    }

    let mut seen = vec![false; nhru];
    for record in hrus {
        if record.hru < 1 || record.hru > nhru {
            return Err(format!("HRU id {} out of range 1..={}", record.hru, nhru).into());
        }
        let h = record.hru - 1;
        if seen[h] {
            return Err(format!("duplicate HRU id {}", record.hru).into());
        }
        seen[h] = true;
        params.hru_segment[h] = record.hru_segment;
        params.hru_area[h] = record.hru_area.unwrap_or(0.0);
    }

    Ok(params)
}

// ============================================================================
// Forcing CSV
// ============================================================================

/// CSV record for one HRU's inflow volumes on one day
#[derive(Debug, Clone, Deserialize)]
pub struct ForcingCsvRecord {
    /// Day the volumes apply to
    pub date: NaiveDate,
    /// HRU id, 1-based
    pub hru: usize,
    /// Surface runoff volume (ft³ over the day)
    pub sroff_vol: f64,
    /// Subsurface reservoir flow volume (ft³ over the day)
    pub ssres_flow_vol: f64,
    /// Groundwater baseflow volume (ft³ over the day)
    pub gwres_flow_vol: f64,
}

/// One day of forcing, dense over all HRUs
#[derive(Debug, Clone, PartialEq)]
pub struct DailyForcing {
    pub date: NaiveDate,
    pub sroff_vol: Vec<f64>,
    pub ssres_flow_vol: Vec<f64>,
    pub gwres_flow_vol: Vec<f64>,
}

/// Parse forcing records from any reader
pub fn parse_forcing<R: Read>(reader: R) -> Result<Vec<ForcingCsvRecord>, Box<dyn Error>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut records = Vec::new();
    for (line_num, result) in reader.deserialize().enumerate() {
        let record: ForcingCsvRecord =
            result.map_err(|e| format!("Line {}: {}", line_num + 2, e))?;
        records.push(record);
    }
    Ok(records)
}

/// Parse forcing records from a CSV file
pub fn parse_forcing_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ForcingCsvRecord>, Box<dyn Error>> {
    parse_forcing(File::open(path)?)
}

/// Group sparse forcing records into dense per-day arrays, sorted by date
pub fn group_forcing_by_day(
    records: &[ForcingCsvRecord],
    nhru: usize,
) -> Result<Vec<DailyForcing>, Box<dyn Error>> {
    let mut days: Vec<DailyForcing> = Vec::new();
    let mut sorted: Vec<&ForcingCsvRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.date);

    for record in sorted {
        if record.hru < 1 || record.hru > nhru {
            return Err(format!(
                "forcing on {} references HRU {} but only {} HRUs exist",
                record.date, record.hru, nhru
            )
            .into());
        }
        if days.last().map(|d| d.date) != Some(record.date) {
            days.push(DailyForcing {
                date: record.date,
                sroff_vol: vec![0.0; nhru],
                ssres_flow_vol: vec![0.0; nhru],
                gwres_flow_vol: vec![0.0; nhru],
            });
        }
        let day = days.last_mut().unwrap();
        let h = record.hru - 1;
        day.sroff_vol[h] += record.sroff_vol;
        day.ssres_flow_vol[h] += record.ssres_flow_vol;
        day.gwres_flow_vol[h] += record.gwres_flow_vol;
    }

    Ok(days)
}

// ============================================================================
// Output CSV
// ============================================================================

/// CSV record for one segment's results on one day
#[derive(Debug, Clone, Serialize)]
pub struct OutputCsvRecord {
    /// Routed day
    pub date: NaiveDate,
    /// Segment id, 1-based
    pub segment: usize,
    /// Daily-mean lateral inflow (cfs)
    pub seg_lateral_inflow: f64,
    /// Daily-mean upstream inflow (cfs)
    pub seg_upstream_inflow: f64,
    /// Daily-mean total inflow (cfs)
    pub seg_inflow: f64,
    /// Daily-mean outflow (cfs)
    pub seg_outflow: f64,
    /// Storage change (ft³ over the day)
    pub seg_stor_change: f64,
    /// Boundary outflow volume (ft³ over the day; 0 off the mask)
    pub channel_outflow_vol: f64,
}

/// Write output records as CSV
pub fn write_output<W: Write>(
    writer: W,
    records: &[OutputCsvRecord],
) -> Result<(), Box<dyn Error>> {
    let mut writer = Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write output records to a CSV file
pub fn write_output_csv<P: AsRef<Path>>(
    path: P,
    records: &[OutputCsvRecord],
) -> Result<(), Box<dyn Error>> {
    write_output(File::create(path)?, records)
}

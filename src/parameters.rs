//! Segment and HRU parameter tables
//!
//! Parameters arrive with 1-based connectivity, the convention used by the
//! upstream data sources. The engine rebases them to zero-based indices
//! internally (see [`crate::network`]); the structures here hold the table
//! exactly as loaded.

use serde::{Deserialize, Serialize};

use crate::RoutingError;

/// Stream segment classification
///
/// Only [`SegmentType::Lake`] changes routing behavior: lake segments are
/// assigned the maximum travel time of 24 hours regardless of geometry.
/// The remaining variants are carried through from the parameter table
/// unchanged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    /// Ordinary stream reach
    Segment,
    /// Headwater reach
    Headwater,
    /// Lake reach; forces a 24-hour travel time
    Lake,
    /// Reach whose inflow is replaced from an external record
    #[serde(rename = "replace_inflow")]
    ReplaceInflow,
}

impl SegmentType {
    pub fn is_lake(&self) -> bool {
        matches!(self, SegmentType::Lake)
    }
}

impl Default for SegmentType {
    fn default() -> Self {
        SegmentType::Segment
    }
}

/// Segment parameter table
///
/// Holds every parameter accepted at construction. The routing core reads
/// `nsegment`, `nhru`, `hru_segment`, `mann_n`, `seg_depth`, `seg_length`,
/// `seg_slope`, `segment_type`, `tosegment`, `x_coef`, and
/// `segment_flow_init`; the remaining fields are accepted and stored but
/// currently unread.
///
/// `obsin_segment` and `obsout_segment` are reserved hook points for a
/// future observed-flow override at gauged inlets and outlets. They are
/// never consulted by the solver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SegmentParameters {
    /// Number of stream segments
    pub nsegment: usize,

    /// Number of hydrologic response units
    pub nhru: usize,

    /// Number of subsurface reservoirs (reserved; conventionally `nhru`)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub nssr: usize,

    /// Number of groundwater reservoirs (reserved; conventionally `nhru`)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ngw: usize,

    /// Downstream segment for each segment, 1-based; 0 means the segment
    /// flows out of the modeled domain
    pub tosegment: Vec<i32>,

    /// Receiving segment for each HRU, 1-based; 0 means the HRU drains
    /// outside the network and its inflow is discarded
    pub hru_segment: Vec<i32>,

    /// HRU areas in acres (accepted; unused by routing)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hru_area: Vec<f64>,

    /// Manning's roughness coefficient per segment
    pub mann_n: Vec<f64>,

    /// Bank-full depth per segment (ft)
    pub seg_depth: Vec<f64>,

    /// Segment length (ft)
    pub seg_length: Vec<f64>,

    /// Segment slope (ft/ft); raw values may be zero or negative
    pub seg_slope: Vec<f64>,

    /// Segment classification
    pub segment_type: Vec<SegmentType>,

    /// National-scale downstream segment ids (accepted; unused by routing)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tosegment_nhm: Vec<i32>,

    /// Muskingum weighting factor per segment, dimensionless in [0, 0.5]
    pub x_coef: Vec<f64>,

    /// Initial segment outflow (cfs)
    pub segment_flow_init: Vec<f64>,

    /// Reserved hook: gauge index supplying observed inflow per segment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obsin_segment: Vec<i32>,

    /// Reserved hook: gauge index overriding outflow per segment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obsout_segment: Vec<i32>,
}

fn is_zero(v: &usize) -> bool {
    *v == 0
}

impl SegmentParameters {
    /// Assemble a parameter table from the fields the routing core uses
    ///
    /// `nsegment` and `nhru` are taken from the lengths of `tosegment` and
    /// `hru_segment`; reserved fields are left empty.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tosegment: Vec<i32>,
        mann_n: Vec<f64>,
        seg_depth: Vec<f64>,
        seg_length: Vec<f64>,
        seg_slope: Vec<f64>,
        segment_type: Vec<SegmentType>,
        x_coef: Vec<f64>,
        segment_flow_init: Vec<f64>,
        hru_segment: Vec<i32>,
    ) -> Self {
        Self {
            nsegment: tosegment.len(),
            nhru: hru_segment.len(),
            tosegment,
            hru_segment,
            mann_n,
            seg_depth,
            seg_length,
            seg_slope,
            segment_type,
            x_coef,
            segment_flow_init,
            ..Default::default()
        }
    }

    /// Check that every per-segment array has `nsegment` entries and the
    /// HRU mapping has `nhru` entries
    pub fn validate_shape(&self) -> Result<(), RoutingError> {
        let n = self.nsegment;
        let checks: [(&str, usize); 8] = [
            ("tosegment", self.tosegment.len()),
            ("mann_n", self.mann_n.len()),
            ("seg_depth", self.seg_depth.len()),
            ("seg_length", self.seg_length.len()),
            ("seg_slope", self.seg_slope.len()),
            ("segment_type", self.segment_type.len()),
            ("x_coef", self.x_coef.len()),
            ("segment_flow_init", self.segment_flow_init.len()),
        ];
        for (name, len) in checks {
            if len != n {
                return Err(RoutingError::InvalidNetwork(format!(
                    "{} has {} entries but nsegment is {}",
                    name, len, n
                )));
            }
        }
        if self.hru_segment.len() != self.nhru {
            return Err(RoutingError::InvalidNetwork(format!(
                "hru_segment has {} entries but nhru is {}",
                self.hru_segment.len(),
                self.nhru
            )));
        }
        Ok(())
    }
}

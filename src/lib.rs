//! # Muskingum-Mann Stream Network Routing
//!
//! This library routes streamflow through a directed acyclic network of
//! stream segments using the Muskingum-Mann method, where the travel time
//! of each segment is derived from Manning's equation at bank-full depth.
//!
//! ## Overview
//!
//! The library is organized into several modules:
//!
//! - [`parameters`] - Segment and HRU parameter tables
//! - [`network`] - Network connectivity (rebasing, outflow mask, routing order)
//! - [`muskingum`] - Travel times, sub-step strides, and routing coefficients
//! - [`lateral`] - Aggregation of HRU inflow volumes onto segments
//! - [`solver`] - The daily routing engine
//! - [`budget`] - Storage change, boundary outflow, and mass accounting
//! - [`csv`] - CSV input/output for tabular data
//!
//! The engine advances one day at a time. Internally each day is resolved
//! into 24 hourly ticks, and every segment closes a routing sub-step each
//! time its own stride (1, 2, 3, 4, 6, 8, 12, or 24 hours) divides the
//! hour count. Flows are aggregated and averaged across the heterogeneous
//! sub-step grids so that daily means are consistent for every segment.
//!
//! ## Example
//!
//! ```no_run
//! use muskingum::ChannelModel;
//! use muskingum::solver::{MuskingumSolver, SolverConfig};
//! use std::fs;
//!
//! // Load a model from JSON
//! let json = fs::read_to_string("model.json").unwrap();
//! let model = ChannelModel::from_json(&json).unwrap();
//!
//! // Build a solver and route one day of lateral inflow volumes
//! let mut solver = MuskingumSolver::new(&model.parameters, SolverConfig::default()).unwrap();
//! let nhru = model.parameters.nhru;
//! let mut sroff = vec![86400.0; nhru];
//! let mut ssres = vec![0.0; nhru];
//! let mut gwres = vec![0.0; nhru];
//! solver.advance(&mut sroff, &mut ssres, &mut gwres, 86400.0);
//!
//! for (i, q) in solver.seg_outflow().iter().enumerate() {
//!     println!("segment {} outflow {:.3} cfs", i + 1, q);
//! }
//! ```

pub mod budget;
pub mod csv;
pub mod lateral;
pub mod muskingum;
pub mod network;
pub mod parameters;
pub mod solver;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use parameters::{SegmentParameters, SegmentType};

/// Errors raised while constructing a routing model
///
/// All of these are fatal at construction time; once a solver exists, a
/// routing step never fails. Malformed per-step inputs propagate as NaN in
/// the affected segments instead.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Connectivity is not a usable DAG: a cycle, a self-loop, a downstream
    /// index out of range, or a parameter array whose length disagrees with
    /// the segment or HRU count.
    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    /// A segment's hydraulic geometry cannot produce a travel time
    #[error("invalid geometry for segment {segment}: {reason}")]
    InvalidGeometry { segment: usize, reason: String },

    /// An unrecognized configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root-level stream network model
///
/// Top-level structure pairing a schema version with the segment parameter
/// table. This is the unit of JSON round-tripping; a solver is built from
/// the contained parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelModel {
    /// Schema version (semantic versioning)
    pub version: String,

    /// Segment and HRU parameters as loaded (1-based connectivity)
    pub parameters: SegmentParameters,
}

impl ChannelModel {
    /// Create a new model with the current schema version
    pub fn new(parameters: SegmentParameters) -> Self {
        Self {
            version: "1.0.0".to_string(),
            parameters,
        }
    }

    /// Load a model from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the model to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Segments whose outflow leaves the modeled domain (1-based ids)
    pub fn outlet_segments(&self) -> Vec<usize> {
        self.parameters
            .tosegment
            .iter()
            .enumerate()
            .filter(|(_, &to)| to <= 0)
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// Segments with no upstream contributor (1-based ids)
    pub fn headwater_segments(&self) -> Vec<usize> {
        let n = self.parameters.nsegment;
        let mut has_upstream = vec![false; n];
        for &to in &self.parameters.tosegment {
            if to > 0 && (to as usize) <= n {
                has_upstream[to as usize - 1] = true;
            }
        }
        (1..=n).filter(|&i| !has_upstream[i - 1]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_segment_model() -> ChannelModel {
        ChannelModel::new(SegmentParameters::new(
            vec![2, 0],
            vec![0.04, 0.04],
            vec![1.5, 1.5],
            vec![5000.0, 5000.0],
            vec![0.01, 0.01],
            vec![SegmentType::Segment, SegmentType::Segment],
            vec![0.2, 0.2],
            vec![0.0, 0.0],
            vec![1, 2],
        ))
    }

    #[test]
    fn test_outlets_and_headwaters() {
        let model = two_segment_model();
        assert_eq!(model.outlet_segments(), vec![2]);
        assert_eq!(model.headwater_segments(), vec![1]);
    }

    #[test]
    fn test_json_round_trip() {
        let model = two_segment_model();
        let json = model.to_json().unwrap();
        let restored = ChannelModel::from_json(&json).unwrap();
        assert_eq!(model, restored);
    }
}

//! Daily routing engine
//!
//! One [`MuskingumSolver::advance`] call routes the whole network through
//! exactly one day. The day is resolved into 24 hourly ticks; within a
//! tick, segments are processed in topological order so that every
//! upstream outflow for that hour has already been deposited into the
//! downstream segment's inflow buffer. Each segment closes a routing
//! sub-step whenever its stride divides the hour count, time-averages its
//! accumulated inflow, and either applies the three-term Muskingum
//! recurrence or, for sub-hourly segments, passes the inflow through
//! unchanged.
//!
//! The engine owns all persistent and scratch arrays. Routing never
//! fails: numeric pathologies (NaN, Inf) propagate into the outputs and
//! detection is left to the caller.

use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::budget::{boundary_outflow_volume, storage_change, BudgetType, MassBudget};
use crate::lateral::accumulate_lateral_inflow;
use crate::muskingum::RoutingCoefficients;
use crate::network::NetworkTopology;
use crate::parameters::SegmentParameters;
use crate::RoutingError;

/// Hourly ticks per outer step
pub const HOURS_PER_DAY: usize = 24;

/// Numeric kernel selection
///
/// Every variant must produce numerically identical results; the
/// distinction exists so a configuration can survive the introduction of
/// an alternative kernel. `Optimized` currently dispatches to the
/// reference kernel.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CalcMethod {
    /// Straightforward scalar kernel
    #[default]
    Reference,
    /// Reserved for a vectorized kernel; aliases `Reference` today
    Optimized,
}

impl FromStr for CalcMethod {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reference" => Ok(CalcMethod::Reference),
            "optimized" => Ok(CalcMethod::Optimized),
            other => Err(RoutingError::InvalidConfig(format!(
                "unknown calc_method \"{}\" (expected reference or optimized)",
                other
            ))),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Numeric kernel variant
    pub calc_method: CalcMethod,

    /// Mass-budget reporting severity
    pub budget_type: BudgetType,

    /// Emit diagnostic logging
    pub verbose: bool,

    /// Zero the caller's inflow volumes for HRUs that drain outside the
    /// network (compatibility behavior; see [`crate::lateral`])
    pub zero_orphan_inflows: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            calc_method: CalcMethod::Reference,
            budget_type: BudgetType::None,
            verbose: false,
            zero_orphan_inflows: true,
        }
    }
}

/// Muskingum-Mann routing engine
///
/// Construction ingests and freezes the network and hydraulic parameters;
/// afterwards the solver owns every persistent and per-step array. All
/// published flow values are daily means in cfs; volumes are cubic feet
/// per outer step.
#[derive(Debug)]
pub struct MuskingumSolver {
    topology: NetworkTopology,
    coefficients: RoutingCoefficients,
    config: SolverConfig,
    budget: MassBudget,
    nhru: usize,

    // Persistent state across outer steps
    seg_inflow_prev: Vec<Option<f64>>,
    outflow_ts: Vec<f64>,
    seg_outflow: Vec<f64>,

    // Published per-step results
    seg_lateral_inflow: Vec<f64>,
    seg_upstream_inflow: Vec<f64>,
    seg_inflow: Vec<f64>,
    seg_stor_change: Vec<f64>,
    channel_outflow_vol: Vec<f64>,

    // Scratch reused every step
    inflow_ts: Vec<f64>,
    seg_current_sum: Vec<f64>,
    upstream_tick: Vec<f64>,
}

impl MuskingumSolver {
    /// Build an engine from the raw parameter table
    ///
    /// # Errors
    /// [`RoutingError::InvalidNetwork`] for malformed connectivity and
    /// [`RoutingError::InvalidGeometry`] for unusable hydraulics.
    pub fn new(params: &SegmentParameters, config: SolverConfig) -> Result<Self, RoutingError> {
        params.validate_shape()?;
        let topology =
            NetworkTopology::build(&params.tosegment, &params.hru_segment, params.nsegment)?;
        let coefficients = RoutingCoefficients::precondition(params)?;

        let n = params.nsegment;
        if config.verbose {
            let k_min = coefficients.k_coef.iter().cloned().fold(f64::INFINITY, f64::min);
            let k_max = coefficients.k_coef.iter().cloned().fold(0.0, f64::max);
            let passthrough = coefficients.tsi.iter().filter(|&&t| t < 0).count();
            debug!(
                "routing {} segments, travel time {:.2}..{:.2} h, {} sub-hourly pass-through",
                n, k_min, k_max, passthrough
            );
        }

        Ok(Self {
            topology,
            coefficients,
            budget: MassBudget::new(config.budget_type),
            config,
            nhru: params.nhru,
            seg_inflow_prev: vec![None; n],
            outflow_ts: vec![0.0; n],
            seg_outflow: params.segment_flow_init.clone(),
            seg_lateral_inflow: vec![0.0; n],
            seg_upstream_inflow: vec![0.0; n],
            seg_inflow: vec![0.0; n],
            seg_stor_change: vec![0.0; n],
            channel_outflow_vol: vec![0.0; n],
            inflow_ts: vec![0.0; n],
            seg_current_sum: vec![0.0; n],
            upstream_tick: vec![0.0; n],
        })
    }

    /// Route one day
    ///
    /// The three volume slices hold one entry per HRU, in cubic feet over
    /// the step; `s_per_time` is the step length in seconds. Entries for
    /// HRUs draining outside the network are zeroed in place when the
    /// configuration asks for it.
    ///
    /// This call never fails. Malformed inputs surface as NaN in the
    /// affected segments.
    pub fn advance(
        &mut self,
        sroff_vol: &mut [f64],
        ssres_flow_vol: &mut [f64],
        gwres_flow_vol: &mut [f64],
        s_per_time: f64,
    ) {
        assert_eq!(sroff_vol.len(), self.nhru, "sroff_vol length must equal nhru");
        assert_eq!(ssres_flow_vol.len(), self.nhru, "ssres_flow_vol length must equal nhru");
        assert_eq!(gwres_flow_vol.len(), self.nhru, "gwres_flow_vol length must equal nhru");

        accumulate_lateral_inflow(
            &self.topology.hru_segment,
            sroff_vol,
            ssres_flow_vol,
            gwres_flow_vol,
            s_per_time,
            &mut self.seg_lateral_inflow,
            self.config.zero_orphan_inflows,
        );

        match self.config.calc_method {
            // Both variants share the reference kernel for now
            CalcMethod::Reference | CalcMethod::Optimized => muskingum_mann_day(
                &self.topology.segment_order,
                &self.topology.to_segment,
                &self.seg_lateral_inflow,
                &mut self.seg_inflow_prev,
                &mut self.outflow_ts,
                &self.coefficients.tsi,
                &self.coefficients.ts,
                &self.coefficients.c0,
                &self.coefficients.c1,
                &self.coefficients.c2,
                &mut self.seg_upstream_inflow,
                &mut self.seg_inflow,
                &mut self.seg_outflow,
                &mut self.inflow_ts,
                &mut self.seg_current_sum,
                &mut self.upstream_tick,
            ),
        }

        storage_change(
            &self.seg_inflow,
            &self.seg_outflow,
            s_per_time,
            &mut self.seg_stor_change,
        );
        boundary_outflow_volume(
            &self.seg_outflow,
            &self.topology.outflow_mask,
            s_per_time,
            &mut self.channel_outflow_vol,
        );

        let input_vol: f64 = sroff_vol.iter().sum::<f64>()
            + ssres_flow_vol.iter().sum::<f64>()
            + gwres_flow_vol.iter().sum::<f64>();
        let output_vol: f64 = self.channel_outflow_vol.iter().sum();
        let stor_vol: f64 = self.seg_stor_change.iter().sum();
        self.budget.record_step(input_vol, output_vol, stor_vol);

        if self.config.verbose {
            debug!(
                "routed day {}: lateral {:.3} cfs, boundary outflow {:.3} cfs",
                self.budget.steps,
                self.seg_lateral_inflow.iter().sum::<f64>(),
                output_vol / s_per_time
            );
        }
    }

    /// Daily-mean outflow per segment (cfs)
    pub fn seg_outflow(&self) -> &[f64] {
        &self.seg_outflow
    }

    /// Daily-mean total inflow per segment (cfs)
    pub fn seg_inflow(&self) -> &[f64] {
        &self.seg_inflow
    }

    /// Daily-mean upstream inflow per segment (cfs)
    ///
    /// The mean over the 24 hourly snapshots of the upstream buffer as
    /// seen at the start of each segment's processing. Kept distinct from
    /// `seg_inflow - seg_lateral_inflow`, which agrees only up to
    /// floating-point association.
    pub fn seg_upstream_inflow(&self) -> &[f64] {
        &self.seg_upstream_inflow
    }

    /// Lateral inflow rate per segment for the last step (cfs)
    pub fn seg_lateral_inflow(&self) -> &[f64] {
        &self.seg_lateral_inflow
    }

    /// Storage change per segment over the last step (ft³)
    pub fn seg_stor_change(&self) -> &[f64] {
        &self.seg_stor_change
    }

    /// Boundary outflow volume per segment over the last step (ft³)
    pub fn channel_outflow_vol(&self) -> &[f64] {
        &self.channel_outflow_vol
    }

    /// True for segments whose outflow leaves the domain
    pub fn outflow_mask(&self) -> &[bool] {
        &self.topology.outflow_mask
    }

    /// Network topology (frozen at construction)
    pub fn topology(&self) -> &NetworkTopology {
        &self.topology
    }

    /// Preconditioned routing coefficients (frozen at construction)
    pub fn coefficients(&self) -> &RoutingCoefficients {
        &self.coefficients
    }

    /// Cumulative mass budget
    pub fn mass_budget(&self) -> &MassBudget {
        &self.budget
    }

    /// Sub-step inflow accumulator, exposed for inspection
    ///
    /// Every valid stride divides 24, so each segment drains this to zero
    /// by the end of a routed day.
    pub fn inflow_ts(&self) -> &[f64] {
        &self.inflow_ts
    }

    /// Upstream snapshot accumulator, exposed for inspection
    pub fn seg_current_sum(&self) -> &[f64] {
        &self.seg_current_sum
    }

    /// Number of segments
    pub fn nsegment(&self) -> usize {
        self.topology.nsegment()
    }
}

/// Reference Muskingum-Mann kernel: route the network through 24 hourly
/// ticks
///
/// `seg_lateral_inflow` is held constant over the day. The recurrence is
/// carried in time by `outflow_ts` (last sub-step outflow) and
/// `seg_inflow_prev` (last sub-step averaged inflow); an absent
/// `seg_inflow_prev` means no sub-step has closed yet for that segment,
/// and the current averaged inflow stands in for it.
#[allow(clippy::too_many_arguments)]
fn muskingum_mann_day(
    segment_order: &[usize],
    to_segment: &[i32],
    seg_lateral_inflow: &[f64],
    seg_inflow_prev: &mut [Option<f64>],
    outflow_ts: &mut [f64],
    tsi: &[i32],
    ts: &[f64],
    c0: &[f64],
    c1: &[f64],
    c2: &[f64],
    seg_upstream_inflow: &mut [f64],
    seg_inflow: &mut [f64],
    seg_outflow: &mut [f64],
    inflow_ts: &mut [f64],
    seg_current_sum: &mut [f64],
    upstream_tick: &mut [f64],
) {
    seg_inflow.fill(0.0);
    seg_outflow.fill(0.0);
    inflow_ts.fill(0.0);
    seg_current_sum.fill(0.0);

    for hour in 1..=HOURS_PER_DAY {
        // The hour's upstream deposits; topological order guarantees each
        // segment sees its complete upstream total for this tick.
        upstream_tick.fill(0.0);

        for &j in segment_order {
            let q_in = seg_lateral_inflow[j] + upstream_tick[j];
            seg_inflow[j] += q_in;
            inflow_ts[j] += q_in;
            seg_current_sum[j] += upstream_tick[j];

            let stride = tsi[j];
            let closes = stride < 0 || hour % stride as usize == 0;
            if closes {
                // Time-average the inflow accumulated over this sub-step
                inflow_ts[j] /= ts[j];

                if stride > 0 {
                    let prev = seg_inflow_prev[j].unwrap_or(inflow_ts[j]);
                    outflow_ts[j] =
                        c0[j] * inflow_ts[j] + c1[j] * prev + c2[j] * outflow_ts[j];
                } else {
                    // Travel time under one hour: pass the inflow through
                    outflow_ts[j] = inflow_ts[j];
                }

                seg_inflow_prev[j] = Some(inflow_ts[j]);
                inflow_ts[j] = 0.0;
            }

            // Daily outflow is the mean of the 24 hourly outflow values,
            // whether or not this hour closed a sub-step
            seg_outflow[j] += outflow_ts[j];

            let to = to_segment[j];
            if to >= 0 {
                upstream_tick[to as usize] += outflow_ts[j];
            }
        }
    }

    let hours = HOURS_PER_DAY as f64;
    for j in 0..seg_outflow.len() {
        seg_outflow[j] /= hours;
        seg_inflow[j] /= hours;
        seg_upstream_inflow[j] = seg_current_sum[j] / hours;
    }
}

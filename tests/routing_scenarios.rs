//! End-to-end routing scenarios
//!
//! Each test builds a small network programmatically, routes a known
//! forcing through it, and checks the daily means against values that can
//! be worked out by hand.
//!
//! Hydraulic shorthand used throughout: n = 0.05, depth = 1 ft, and
//! slope = 0.01 give a bank-full velocity of exactly 7200 ft/h, so the
//! travel time in hours is seg_length / 7200.

use muskingum::budget::BudgetType;
use muskingum::solver::{MuskingumSolver, SolverConfig};
use muskingum::{RoutingError, SegmentParameters, SegmentType};

use approx::{assert_abs_diff_eq, assert_relative_eq};

const DAY_SECONDS: f64 = 86400.0;

/// Uniform-hydraulics network: one HRU per segment, every HRU mapped to
/// its own segment
fn uniform_network(
    tosegment: Vec<i32>,
    seg_length: f64,
    segment_type: Vec<SegmentType>,
) -> SegmentParameters {
    let n = tosegment.len();
    SegmentParameters::new(
        tosegment,
        vec![0.05; n],
        vec![1.0; n],
        vec![seg_length; n],
        vec![0.01; n],
        segment_type,
        vec![0.2; n],
        vec![0.0; n],
        (1..=n as i32).collect(),
    )
}

/// Advance one day with the given per-HRU surface runoff rates (cfs)
fn advance_with_rates(solver: &mut MuskingumSolver, rates_cfs: &[f64]) {
    let mut sroff: Vec<f64> = rates_cfs.iter().map(|r| r * DAY_SECONDS).collect();
    let mut ssres = vec![0.0; rates_cfs.len()];
    let mut gwres = vec![0.0; rates_cfs.len()];
    solver.advance(&mut sroff, &mut ssres, &mut gwres, DAY_SECONDS);
}

#[test]
fn test_single_segment_constant_inflow() {
    // One out-flowing segment, 3600 ft: travel time 0.5 h, so the segment
    // is a pass-through. A constant 1 cfs lateral inflow must appear as a
    // 1 cfs daily-mean outflow and a full day's outflow volume.
    let params = uniform_network(vec![0], 3600.0, vec![SegmentType::Segment]);
    let mut solver = MuskingumSolver::new(&params, SolverConfig::default()).unwrap();

    for _ in 0..3 {
        advance_with_rates(&mut solver, &[1.0]);
    }

    assert_abs_diff_eq!(solver.seg_outflow()[0], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(solver.channel_outflow_vol()[0], 86400.0, epsilon = 1e-3);
    assert!(solver.outflow_mask()[0]);
}

#[test]
fn test_two_segment_chain_reaches_steady_state() {
    // 1 -> 2 -> out, lateral only on the upstream segment. At steady
    // state the downstream segment passes everything through and storage
    // stops changing.
    let params = SegmentParameters::new(
        vec![2, 0],
        vec![0.05, 0.05],
        vec![1.0, 1.0],
        vec![3600.0, 3600.0],
        vec![0.01, 0.01],
        vec![SegmentType::Segment, SegmentType::Segment],
        vec![0.2, 0.2],
        vec![0.0, 0.0],
        vec![1],
    );
    let mut solver = MuskingumSolver::new(&params, SolverConfig::default()).unwrap();

    for _ in 0..5 {
        advance_with_rates(&mut solver, &[1.0]);
    }

    assert_relative_eq!(
        solver.seg_outflow()[1],
        solver.seg_outflow()[0],
        max_relative = 1e-9
    );
    assert_abs_diff_eq!(solver.seg_stor_change()[0], 0.0, epsilon = 1e-3);
    assert_abs_diff_eq!(solver.seg_stor_change()[1], 0.0, epsilon = 1e-3);
}

#[test]
fn test_lake_attenuates_and_delays_pulse() {
    // Chain 1 -> 2 -> 3 -> out, 36000 ft reaches (5 h travel time). The
    // middle segment is a lake in one run and an ordinary reach in the
    // other; a single-day pulse enters the head segment. The lake holds
    // the pulse back: less water reaches the outlet early, the outlet
    // peak comes later, and the total volume still gets through.
    let types_lake = vec![SegmentType::Segment, SegmentType::Lake, SegmentType::Segment];
    let types_normal = vec![SegmentType::Segment; 3];

    let mut with_lake = MuskingumSolver::new(
        &uniform_network(vec![2, 3, 0], 36_000.0, types_lake),
        SolverConfig::default(),
    )
    .unwrap();
    let mut without_lake = MuskingumSolver::new(
        &uniform_network(vec![2, 3, 0], 36_000.0, types_normal),
        SolverConfig::default(),
    )
    .unwrap();

    // Lake travel time is pinned at a full day
    assert_relative_eq!(with_lake.coefficients().k_coef[1], 24.0);
    assert_eq!(with_lake.coefficients().tsi[1], 24);
    assert_eq!(without_lake.coefficients().tsi[1], 4);

    let days = 60;
    let mut outlet_lake = Vec::with_capacity(days);
    let mut outlet_normal = Vec::with_capacity(days);
    let mut volume_lake = 0.0;
    let mut volume_normal = 0.0;
    for day in 0..days {
        let pulse = if day == 0 { 2.0 } else { 0.0 };
        advance_with_rates(&mut with_lake, &[pulse, 0.0, 0.0]);
        advance_with_rates(&mut without_lake, &[pulse, 0.0, 0.0]);
        outlet_lake.push(with_lake.seg_outflow()[2]);
        outlet_normal.push(without_lake.seg_outflow()[2]);
        volume_lake += with_lake.channel_outflow_vol()[2];
        volume_normal += without_lake.channel_outflow_vol()[2];
    }

    // Early days: the lake run has passed strictly less water
    let mut cumulative_lake = 0.0;
    let mut cumulative_normal = 0.0;
    for day in 0..4 {
        cumulative_lake += outlet_lake[day];
        cumulative_normal += outlet_normal[day];
        assert!(
            cumulative_lake < cumulative_normal,
            "day {}: lake cumulative {} not below normal {}",
            day,
            cumulative_lake,
            cumulative_normal
        );
    }

    // The outlet peak is attenuated and arrives no earlier
    let peak_day = |series: &[f64]| {
        series
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap()
    };
    let lake_peak = peak_day(&outlet_lake);
    let normal_peak = peak_day(&outlet_normal);
    assert!(lake_peak >= 1, "lake outlet peak on day {}", lake_peak);
    assert!(lake_peak >= normal_peak);
    assert!(outlet_lake[lake_peak] < outlet_normal[normal_peak]);

    // Both runs eventually deliver the injected pulse volume
    let injected = 2.0 * DAY_SECONDS;
    assert_relative_eq!(volume_lake, injected, max_relative = 1e-2);
    assert_relative_eq!(volume_normal, injected, max_relative = 1e-2);
}

#[test]
fn test_slope_below_floor() {
    // A slope of 1e-9 still yields a tiny positive velocity, so the
    // travel time computes huge and clamps to 24 h; the stored slope is
    // replaced by the floor value.
    let mut params = uniform_network(vec![0], 3600.0, vec![SegmentType::Segment]);
    params.seg_slope = vec![1e-9];
    let solver = MuskingumSolver::new(&params, SolverConfig::default()).unwrap();

    assert_relative_eq!(solver.coefficients().k_coef[0], 24.0);
    assert_eq!(solver.coefficients().tsi[0], 24);
    assert_relative_eq!(solver.coefficients().seg_slope[0], 0.0001);
    // The caller's table is untouched
    assert_relative_eq!(params.seg_slope[0], 1e-9);
}

#[test]
fn test_cyclic_network_rejected() {
    let params = uniform_network(
        vec![2, 1],
        3600.0,
        vec![SegmentType::Segment, SegmentType::Segment],
    );
    let err = MuskingumSolver::new(&params, SolverConfig::default()).unwrap_err();
    assert!(matches!(err, RoutingError::InvalidNetwork(_)));
}

#[test]
fn test_passthrough_segment_exact() {
    // 720 ft: travel time 0.1 h, stride -1. Outflow equals the lateral
    // inflow exactly, every step.
    let params = uniform_network(vec![0], 720.0, vec![SegmentType::Segment]);
    let mut solver = MuskingumSolver::new(&params, SolverConfig::default()).unwrap();
    assert_eq!(solver.coefficients().tsi[0], -1);

    for _ in 0..4 {
        advance_with_rates(&mut solver, &[2.5]);
        assert_eq!(solver.seg_outflow()[0], 2.5);
        assert_eq!(solver.seg_inflow()[0], 2.5);
    }
}

#[test]
fn test_orphan_hru_discarded() {
    // Two HRUs: the first feeds the only segment, the second drains
    // outside the network. The orphan's volumes are zeroed in place and
    // never reach the segment, and the budget still closes.
    let mut params = uniform_network(vec![0], 3600.0, vec![SegmentType::Segment]);
    params.hru_segment = vec![1, 0];
    params.nhru = 2;

    let config = SolverConfig {
        budget_type: BudgetType::None,
        ..SolverConfig::default()
    };
    let mut solver = MuskingumSolver::new(&params, config).unwrap();

    let mut sroff = vec![86400.0, 86400.0];
    let mut ssres = vec![0.0, 43200.0];
    let mut gwres = vec![0.0, 21600.0];
    solver.advance(&mut sroff, &mut ssres, &mut gwres, DAY_SECONDS);

    assert_relative_eq!(solver.seg_lateral_inflow()[0], 1.0);
    assert_relative_eq!(sroff[1], 0.0);
    assert_relative_eq!(ssres[1], 0.0);
    assert_relative_eq!(gwres[1], 0.0);
    assert_relative_eq!(sroff[0], 86400.0);

    let budget = solver.mass_budget();
    assert_relative_eq!(budget.inputs, 86400.0);
    assert_abs_diff_eq!(budget.balance(), 0.0, epsilon = 1e-3);
}

//! Lateral inflow aggregation
//!
//! Each outer step, the per-HRU volumetric contributions (surface runoff,
//! subsurface reservoir flow, groundwater baseflow, all in cubic feet over
//! the step) are collapsed into one lateral inflow rate per segment, in
//! cubic feet per second.
//!
//! HRUs mapped to no segment (`hru_segment == -1`) drain outside the
//! network. Their contributions are discarded, and when `zero_orphans`
//! is set their entries in the caller-supplied volume slices are zeroed
//! so downstream mass accounting sees the discard. That mutation of
//! caller storage is a compatibility behavior; disable the flag to keep
//! the inputs untouched.

/// Accumulate per-HRU inflow volumes onto segments as flow rates
///
/// `seg_lateral_inflow` is zeroed before accumulation. The three volume
/// slices must each have one entry per HRU.
///
/// # Arguments
/// * `hru_segment` - zero-based receiving segment per HRU, -1 for orphans
/// * `sroff_vol` - surface runoff volume per HRU (ft³ per step)
/// * `ssres_flow_vol` - subsurface reservoir flow volume per HRU (ft³ per step)
/// * `gwres_flow_vol` - groundwater baseflow volume per HRU (ft³ per step)
/// * `s_per_time` - outer-step length in seconds
/// * `seg_lateral_inflow` - output rates per segment (cfs)
/// * `zero_orphans` - zero the volume entries of orphan HRUs
pub fn accumulate_lateral_inflow(
    hru_segment: &[i32],
    sroff_vol: &mut [f64],
    ssres_flow_vol: &mut [f64],
    gwres_flow_vol: &mut [f64],
    s_per_time: f64,
    seg_lateral_inflow: &mut [f64],
    zero_orphans: bool,
) {
    assert_eq!(sroff_vol.len(), hru_segment.len());
    assert_eq!(ssres_flow_vol.len(), hru_segment.len());
    assert_eq!(gwres_flow_vol.len(), hru_segment.len());

    seg_lateral_inflow.fill(0.0);

    for (h, &seg) in hru_segment.iter().enumerate() {
        if seg < 0 {
            if zero_orphans {
                sroff_vol[h] = 0.0;
                ssres_flow_vol[h] = 0.0;
                gwres_flow_vol[h] = 0.0;
            }
            continue;
        }
        // cubic feet over the step to cfs
        let rate = (sroff_vol[h] + ssres_flow_vol[h] + gwres_flow_vol[h]) / s_per_time;
        seg_lateral_inflow[seg as usize] += rate;
    }
}

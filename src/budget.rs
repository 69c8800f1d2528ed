//! Storage change, boundary outflow, and mass accounting
//!
//! After each routed day the engine derives two volume outputs from the
//! daily means: the storage change of every segment and the outflow volume
//! of segments that leave the modeled domain. A [`MassBudget`] accumulates
//! the global balance of those terms against the injected lateral volumes.
//!
//! Budget terms:
//! - inputs: `sroff_vol`, `ssres_flow_vol`, `gwres_flow_vol`
//! - outputs: `channel_outflow_vol`
//! - storage changes: `seg_stor_change`
//!
//! An imbalance never fails a step; depending on [`BudgetType`] it is
//! ignored or logged at warn or error level.

use std::str::FromStr;

use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::RoutingError;

/// Relative imbalance tolerated before the budget complains
const BALANCE_TOLERANCE: f64 = 1e-9;

/// Per-segment storage change over the step, in cubic feet
///
/// `seg_stor_change[i] = (seg_inflow[i] - seg_outflow[i]) * s_per_time`
pub fn storage_change(
    seg_inflow: &[f64],
    seg_outflow: &[f64],
    s_per_time: f64,
    seg_stor_change: &mut [f64],
) {
    for i in 0..seg_inflow.len() {
        seg_stor_change[i] = (seg_inflow[i] - seg_outflow[i]) * s_per_time;
    }
}

/// Outflow volume leaving the domain over the step, in cubic feet
///
/// Zero for every segment that drains to another segment.
pub fn boundary_outflow_volume(
    seg_outflow: &[f64],
    outflow_mask: &[bool],
    s_per_time: f64,
    channel_outflow_vol: &mut [f64],
) {
    for i in 0..seg_outflow.len() {
        channel_outflow_vol[i] = if outflow_mask[i] {
            seg_outflow[i] * s_per_time
        } else {
            0.0
        };
    }
}

/// How a mass imbalance is reported
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BudgetType {
    /// No balance checking
    #[default]
    None,
    /// Log imbalances at warn level
    Warn,
    /// Log imbalances at error level; routing still never fails
    Error,
}

impl FromStr for BudgetType {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(BudgetType::None),
            "warn" => Ok(BudgetType::Warn),
            "error" => Ok(BudgetType::Error),
            other => Err(RoutingError::InvalidConfig(format!(
                "unknown budget_type \"{}\" (expected none, warn, or error)",
                other
            ))),
        }
    }
}

/// Cumulative global mass balance across routed days
///
/// Volumes are in cubic feet. The balance closes when
/// `inputs - outputs - storage_change` is zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MassBudget {
    /// Reporting severity
    pub budget_type: BudgetType,

    /// Cumulative lateral inflow volume
    pub inputs: f64,

    /// Cumulative boundary outflow volume
    pub outputs: f64,

    /// Cumulative storage change volume
    pub storage_change: f64,

    /// Number of recorded steps
    pub steps: usize,
}

impl MassBudget {
    pub fn new(budget_type: BudgetType) -> Self {
        Self {
            budget_type,
            ..Default::default()
        }
    }

    /// Record one step's totals and report any imbalance
    pub fn record_step(&mut self, input_vol: f64, output_vol: f64, stor_change_vol: f64) {
        self.inputs += input_vol;
        self.outputs += output_vol;
        self.storage_change += stor_change_vol;
        self.steps += 1;

        if self.budget_type == BudgetType::None {
            return;
        }
        let imbalance = input_vol - output_vol - stor_change_vol;
        let scale = input_vol.abs().max(output_vol.abs()).max(1.0);
        if imbalance.abs() > BALANCE_TOLERANCE * scale {
            match self.budget_type {
                BudgetType::Warn => warn!(
                    "mass budget imbalance at step {}: {:.6e} ft³",
                    self.steps, imbalance
                ),
                BudgetType::Error => error!(
                    "mass budget imbalance at step {}: {:.6e} ft³",
                    self.steps, imbalance
                ),
                BudgetType::None => {}
            }
        }
    }

    /// Cumulative imbalance: inputs - outputs - storage change
    pub fn balance(&self) -> f64 {
        self.inputs - self.outputs - self.storage_change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_storage_change() {
        let mut stor = vec![0.0; 2];
        storage_change(&[2.0, 1.0], &[1.5, 1.0], 86400.0, &mut stor);
        assert_relative_eq!(stor[0], 0.5 * 86400.0);
        assert_relative_eq!(stor[1], 0.0);
    }

    #[test]
    fn test_boundary_outflow_masked() {
        let mut vol = vec![0.0; 2];
        boundary_outflow_volume(&[3.0, 2.0], &[false, true], 86400.0, &mut vol);
        assert_relative_eq!(vol[0], 0.0);
        assert_relative_eq!(vol[1], 2.0 * 86400.0);
    }

    #[test]
    fn test_budget_accumulates_and_balances() {
        let mut budget = MassBudget::new(BudgetType::None);
        budget.record_step(100.0, 60.0, 40.0);
        budget.record_step(100.0, 80.0, 20.0);
        assert_eq!(budget.steps, 2);
        assert_relative_eq!(budget.inputs, 200.0);
        assert_relative_eq!(budget.outputs, 140.0);
        assert_relative_eq!(budget.storage_change, 60.0);
        assert_relative_eq!(budget.balance(), 0.0);
    }

    #[test]
    fn test_budget_type_parsing() {
        assert_eq!("warn".parse::<BudgetType>().unwrap(), BudgetType::Warn);
        assert_eq!("NONE".parse::<BudgetType>().unwrap(), BudgetType::None);
        assert!("strict".parse::<BudgetType>().is_err());
    }
}

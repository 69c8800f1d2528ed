//! Network connectivity
//!
//! Builds the routing topology from the raw 1-based parameter table:
//! zero-based downstream indices, the outflow mask marking segments that
//! leave the modeled domain, and a topological processing order.
//!
//! The connectivity graph must be a DAG. The order is computed with Kahn's
//! algorithm over adjacency lists built from `to_segment`; any node left
//! unvisited when the queue drains sits on a cycle, so cycle detection
//! falls out of the sort itself.

use std::collections::VecDeque;

use crate::RoutingError;

/// Routing topology derived from raw connectivity
///
/// All indices are zero-based. `to_segment[i] == -1` means segment `i`
/// flows out of the domain; `hru_segment[h] == -1` means HRU `h` drains
/// outside the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTopology {
    /// Downstream segment per segment; -1 at domain outlets
    pub to_segment: Vec<i32>,

    /// Receiving segment per HRU; -1 for HRUs draining outside the network
    pub hru_segment: Vec<i32>,

    /// Permutation of `[0, N)` such that every segment precedes its
    /// downstream neighbor
    pub segment_order: Vec<usize>,

    /// True iff the segment's outflow leaves the modeled domain
    pub outflow_mask: Vec<bool>,
}

impl NetworkTopology {
    /// Build the topology from 1-based connectivity as loaded
    ///
    /// Entries are rebased by subtracting one, so a raw `0` becomes `-1`
    /// ("no downstream" / "no segment"). Raw negative entries stay
    /// negative and are treated the same way.
    pub fn build(
        tosegment: &[i32],
        hru_segment: &[i32],
        nsegment: usize,
    ) -> Result<Self, RoutingError> {
        let to_zero: Vec<i32> = tosegment.iter().map(|&t| t - 1).collect();
        let hru_zero: Vec<i32> = hru_segment.iter().map(|&h| h - 1).collect();
        Self::from_zero_based(to_zero, hru_zero, nsegment)
    }

    /// Build the topology from already zero-based connectivity
    ///
    /// This is the idempotent core of the builder: feeding a topology's
    /// own `to_segment`/`hru_segment` back in reproduces it exactly.
    pub fn from_zero_based(
        to_segment: Vec<i32>,
        hru_segment: Vec<i32>,
        nsegment: usize,
    ) -> Result<Self, RoutingError> {
        if to_segment.len() != nsegment {
            return Err(RoutingError::InvalidNetwork(format!(
                "tosegment has {} entries but nsegment is {}",
                to_segment.len(),
                nsegment
            )));
        }

        let mut outflow_mask = vec![false; nsegment];
        for (i, &to) in to_segment.iter().enumerate() {
            if to < 0 {
                outflow_mask[i] = true;
            } else if to as usize >= nsegment {
                return Err(RoutingError::InvalidNetwork(format!(
                    "segment {} drains to {} but only {} segments exist",
                    i + 1,
                    to + 1,
                    nsegment
                )));
            } else if to as usize == i {
                return Err(RoutingError::InvalidNetwork(format!(
                    "segment {} drains to itself",
                    i + 1
                )));
            }
        }

        for (h, &seg) in hru_segment.iter().enumerate() {
            if seg >= 0 && seg as usize >= nsegment {
                return Err(RoutingError::InvalidNetwork(format!(
                    "HRU {} drains to segment {} but only {} segments exist",
                    h + 1,
                    seg + 1,
                    nsegment
                )));
            }
        }

        let segment_order = if nsegment == 1 {
            vec![0]
        } else {
            topological_order(&to_segment, nsegment)?
        };

        Ok(Self {
            to_segment,
            hru_segment,
            segment_order,
            outflow_mask,
        })
    }

    /// Number of segments
    pub fn nsegment(&self) -> usize {
        self.to_segment.len()
    }
}

/// Kahn's algorithm over the downstream adjacency
///
/// Every segment has at most one outgoing edge, so the adjacency list is
/// just `to_segment` itself and only in-degrees need counting. Nodes left
/// unvisited after the queue drains lie on a cycle.
fn topological_order(to_segment: &[i32], nsegment: usize) -> Result<Vec<usize>, RoutingError> {
    let mut in_degree = vec![0usize; nsegment];
    for &to in to_segment {
        if to >= 0 {
            in_degree[to as usize] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..nsegment).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nsegment);

    while let Some(i) = queue.pop_front() {
        order.push(i);
        let to = to_segment[i];
        if to >= 0 {
            let to = to as usize;
            in_degree[to] -= 1;
            if in_degree[to] == 0 {
                queue.push_back(to);
            }
        }
    }

    if order.len() != nsegment {
        let stuck: Vec<String> = (0..nsegment)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| (i + 1).to_string())
            .collect();
        return Err(RoutingError::InvalidNetwork(format!(
            "cycle detected involving segments {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid_order(topology: &NetworkTopology) {
        let n = topology.nsegment();
        let mut position = vec![0usize; n];
        for (pos, &seg) in topology.segment_order.iter().enumerate() {
            position[seg] = pos;
        }
        for (i, &to) in topology.to_segment.iter().enumerate() {
            if to >= 0 {
                assert!(
                    position[i] < position[to as usize],
                    "segment {} must precede its downstream neighbor {}",
                    i,
                    to
                );
            }
        }
    }

    #[test]
    fn test_rebase_and_mask() {
        // 1 -> 2 -> out, raw 1-based with 0 as "no downstream"
        let topology = NetworkTopology::build(&[2, 0], &[1, 2, 0], 2).unwrap();
        assert_eq!(topology.to_segment, vec![1, -1]);
        assert_eq!(topology.hru_segment, vec![0, 1, -1]);
        assert_eq!(topology.outflow_mask, vec![false, true]);
        assert_valid_order(&topology);
    }

    #[test]
    fn test_single_segment() {
        let topology = NetworkTopology::build(&[0], &[1], 1).unwrap();
        assert_eq!(topology.segment_order, vec![0]);
        assert_eq!(topology.outflow_mask, vec![true]);
    }

    #[test]
    fn test_confluence_order() {
        // 1 -> 3, 2 -> 3, 3 -> 4, 4 -> out
        let topology = NetworkTopology::build(&[3, 3, 4, 0], &[], 4).unwrap();
        assert_valid_order(&topology);
        assert_eq!(topology.segment_order.len(), 4);
        assert_eq!(*topology.segment_order.last().unwrap(), 3);
    }

    #[test]
    fn test_cycle_detected() {
        let err = NetworkTopology::build(&[2, 1], &[], 2).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidNetwork(_)));
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_self_loop_detected() {
        let err = NetworkTopology::build(&[1, 0], &[], 2).unwrap_err();
        assert!(err.to_string().contains("itself"));
    }

    #[test]
    fn test_downstream_out_of_range() {
        let err = NetworkTopology::build(&[5, 0], &[], 2).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidNetwork(_)));
    }

    #[test]
    fn test_hru_target_out_of_range() {
        let err = NetworkTopology::build(&[0], &[3], 1).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidNetwork(_)));
    }

    #[test]
    fn test_idempotent_on_zero_based() {
        let first = NetworkTopology::build(&[2, 3, 0], &[1, 3, 0], 3).unwrap();
        let second = NetworkTopology::from_zero_based(
            first.to_segment.clone(),
            first.hru_segment.clone(),
            3,
        )
        .unwrap();
        assert_eq!(first, second);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! Per-seed deterministic device ordering.
//!
//! Every device is scored against the allocation seed with the fixed-key
//! ring hash and sorted by descending score. The sorted sequence is then
//! interleaved round-robin across nodes: the first `n` candidates cover `n`
//! distinct nodes wherever the topology allows it, so a consumer that must
//! spread a brick set over fault domains rarely has to skip far ahead.

use brickyard_core::types::{BrickId, DeviceId, NodeId};

use crate::hash::ring_hash2;

/// One device offered to the ring, tagged with its fault domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingCandidate {
    /// The device id.
    pub device: DeviceId,
    /// The node hosting the device.
    pub node: NodeId,
}

/// Orders `candidates` for the given allocation seed.
///
/// The order is deterministic: the same seed and candidate set always
/// produce the same sequence, regardless of input order. Every input device
/// appears exactly once.
#[must_use]
pub fn ordered_candidates(seed: BrickId, candidates: &[RingCandidate]) -> Vec<DeviceId> {
    let mut scored: Vec<(u64, RingCandidate)> = candidates
        .iter()
        .map(|c| (ring_hash2(seed.as_bytes(), c.device.as_bytes()), *c))
        .collect();
    // Score ties are broken by device id so the order stays total.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.device.cmp(&b.1.device)));

    interleave_by_node(scored)
}

/// Round-robin across nodes, preserving the per-node score order.
fn interleave_by_node(scored: Vec<(u64, RingCandidate)>) -> Vec<DeviceId> {
    let mut node_order: Vec<NodeId> = Vec::new();
    let mut queues: Vec<Vec<DeviceId>> = Vec::new();

    for (_, candidate) in scored {
        match node_order.iter().position(|n| *n == candidate.node) {
            Some(idx) => queues[idx].push(candidate.device),
            None => {
                node_order.push(candidate.node);
                queues.push(vec![candidate.device]);
            }
        }
    }

    let total: usize = queues.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    let mut depth = 0;
    while out.len() < total {
        for queue in &queues {
            if let Some(device) = queue.get(depth) {
                out.push(*device);
            }
        }
        depth += 1;
    }
    out
}

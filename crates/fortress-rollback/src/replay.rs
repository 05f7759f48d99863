//! Reverse-order replay of a mutation log, in bounded batches.
//!
//! The caller drives [`ReplayQueue::apply_batch`] from a repeating scheduler
//! task; each invocation applies a bounded slice and returns, so restoring a
//! large match never stalls the host's tick loop. World writes go through
//! [`BlockStore`] so the replay logic stays free of host types.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::record::{is_liquid, ActionKind, MutationRecord};
use crate::AIR;

/// Write access to the world, the one shared resource replay touches.
pub trait BlockStore {
    /// Set a block type. Returns `false` when the write could not be applied
    /// (bad coordinate, unloaded region).
    fn set_block(&mut self, x: i32, y: i32, z: i32, block_type: &str) -> bool;
}

/// One unit of replay work.
#[derive(Debug, Clone, PartialEq)]
enum ReplayOp {
    /// Exact inverse of a logged mutation.
    Revert(MutationRecord),
    /// Best-effort neighborhood sweep around recorded fluid edits. Applied
    /// after all direct reverts; independent of the exact-inverse pass.
    Cleanup { x: i32, y: i32, z: i32 },
}

/// Pending replay work for one player, newest mutation first.
#[derive(Debug, Default)]
pub struct ReplayQueue {
    ops: VecDeque<ReplayOp>,
    total: usize,
}

/// Records applied per scheduler invocation, scaled with the backlog so big
/// rollbacks finish in bounded wall-clock time while small ones stay cheap.
pub fn batch_size(backlog: usize) -> usize {
    match backlog {
        0..=99 => 10,
        100..=499 => 25,
        500..=999 => 40,
        _ => 60,
    }
}

impl ReplayQueue {
    /// Build the queue from a log read in append order. Records are reversed
    /// (strict LIFO) so overlapping edits at one coordinate undo correctly,
    /// then the fluid cleanup positions are appended as a trailing pass.
    pub fn build(
        records: Vec<MutationRecord>,
        cleanup: impl IntoIterator<Item = (i32, i32, i32)>,
    ) -> Self {
        let mut ops: VecDeque<ReplayOp> =
            records.into_iter().rev().map(ReplayOp::Revert).collect();
        ops.extend(
            cleanup
                .into_iter()
                .map(|(x, y, z)| ReplayOp::Cleanup { x, y, z }),
        );
        let total = ops.len();
        Self { ops, total }
    }

    pub fn remaining(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Total ops the queue started with.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Apply up to one batch of ops. Individual apply failures are logged and
    /// skipped; a stalled replay would leave the arena permanently damaged.
    /// Returns the number of ops consumed.
    pub fn apply_batch(&mut self, store: &mut dyn BlockStore) -> usize {
        let batch = batch_size(self.ops.len()).min(self.ops.len());
        for _ in 0..batch {
            let Some(op) = self.ops.pop_front() else {
                break;
            };
            apply_op(&op, store);
        }
        batch
    }
}

fn apply_op(op: &ReplayOp, store: &mut dyn BlockStore) {
    let (x, y, z, block_type) = match op {
        // Undo a placement: whatever was placed goes back to air.
        ReplayOp::Revert(rec) if rec.kind == ActionKind::Place => (rec.x, rec.y, rec.z, AIR),
        // Undo a break: restore the pre-break type. Liquids are skipped; a
        // liquid cannot be broken by a player, so a liquid original type is
        // bad data and restoring it would flood the arena.
        ReplayOp::Revert(rec) => {
            if is_liquid(&rec.block_type) {
                debug!("skipping liquid restore at ({}, {}, {})", rec.x, rec.y, rec.z);
                return;
            }
            (rec.x, rec.y, rec.z, rec.block_type.as_str())
        }
        ReplayOp::Cleanup { x, y, z } => (*x, *y, *z, AIR),
    };
    if !store.set_block(x, y, z, block_type) {
        warn!("failed to revert block at ({x}, {y}, {z}) to {block_type}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapWorld {
        blocks: HashMap<(i32, i32, i32), String>,
        fail_at: Option<(i32, i32, i32)>,
    }

    impl MapWorld {
        fn get(&self, x: i32, y: i32, z: i32) -> &str {
            self.blocks
                .get(&(x, y, z))
                .map(String::as_str)
                .unwrap_or(AIR)
        }
    }

    impl BlockStore for MapWorld {
        fn set_block(&mut self, x: i32, y: i32, z: i32, block_type: &str) -> bool {
            if self.fail_at == Some((x, y, z)) {
                return false;
            }
            self.blocks.insert((x, y, z), block_type.to_string());
            true
        }
    }

    fn rec(kind: ActionKind, x: i32, block_type: &str) -> MutationRecord {
        MutationRecord {
            timestamp: 0.0,
            kind,
            x,
            y: 64,
            z: 0,
            block_type: block_type.into(),
        }
    }

    #[test]
    fn batch_size_tiers() {
        assert_eq!(batch_size(0), 10);
        assert_eq!(batch_size(99), 10);
        assert_eq!(batch_size(100), 25);
        assert_eq!(batch_size(500), 40);
        assert_eq!(batch_size(1000), 60);
        assert_eq!(batch_size(50_000), 60);
    }

    #[test]
    fn lifo_ordering_at_one_coordinate() {
        // Break stone at P, then place dirt at P. Replay must undo the place
        // first (air), then the break (stone), leaving P == stone.
        let mut world = MapWorld::default();
        world.set_block(0, 64, 0, "minecraft:dirt");

        let mut queue = ReplayQueue::build(
            vec![
                rec(ActionKind::Break, 0, "minecraft:stone"),
                rec(ActionKind::Place, 0, "minecraft:dirt"),
            ],
            [],
        );
        // First batch covers both ops; order is still observable through the
        // final state: break-last would leave air.
        queue.apply_batch(&mut world);
        assert!(queue.is_empty());
        assert_eq!(world.get(0, 64, 0), "minecraft:stone");
    }

    #[test]
    fn bounded_batches_drain_in_expected_invocations() {
        let records: Vec<_> = (0..1000)
            .map(|i| rec(ActionKind::Place, i, "minecraft:dirt"))
            .collect();
        let mut queue = ReplayQueue::build(records, []);
        let mut world = MapWorld::default();

        let mut invocations = 0;
        while !queue.is_empty() {
            let applied = queue.apply_batch(&mut world);
            assert!(applied <= 60);
            invocations += 1;
            assert!(invocations < 1000, "replay failed to make progress");
        }
        // 1000 -> 60/batch until <1000 remain... tier shrinks as the backlog
        // drains, so just check it stayed bounded and finished.
        assert!(invocations >= 1000 / 60);
        assert_eq!(world.get(999, 64, 0), AIR);
    }

    #[test]
    fn liquid_break_is_skipped_liquid_place_reverts() {
        let mut world = MapWorld::default();
        world.set_block(1, 64, 0, "minecraft:water");

        let mut queue = ReplayQueue::build(
            vec![
                rec(ActionKind::Break, 0, "minecraft:water"),
                rec(ActionKind::Place, 1, "minecraft:water"),
            ],
            [],
        );
        queue.apply_batch(&mut world);
        // Break of a liquid: restore skipped, position untouched.
        assert_eq!(world.get(0, 64, 0), AIR);
        // Placement of a liquid: reverted to air like any placement.
        assert_eq!(world.get(1, 64, 0), AIR);
    }

    #[test]
    fn apply_failure_skips_and_continues() {
        let mut world = MapWorld {
            fail_at: Some((1, 64, 0)),
            ..Default::default()
        };
        let mut queue = ReplayQueue::build(
            vec![
                rec(ActionKind::Break, 0, "minecraft:stone"),
                rec(ActionKind::Break, 1, "minecraft:stone"),
                rec(ActionKind::Break, 2, "minecraft:stone"),
            ],
            [],
        );
        queue.apply_batch(&mut world);
        assert!(queue.is_empty());
        assert_eq!(world.get(0, 64, 0), "minecraft:stone");
        assert_eq!(world.get(2, 64, 0), "minecraft:stone");
    }

    #[test]
    fn cleanup_pass_runs_after_reverts() {
        let mut world = MapWorld::default();
        let mut queue = ReplayQueue::build(
            vec![rec(ActionKind::Break, 0, "minecraft:stone")],
            [(5, 64, 5)],
        );
        assert_eq!(queue.total(), 2);
        queue.apply_batch(&mut world);
        assert_eq!(world.get(0, 64, 0), "minecraft:stone");
        assert_eq!(world.get(5, 64, 5), AIR);
    }

    #[test]
    fn round_trip_restores_pre_match_state() {
        // Simulate N mutations at distinct coordinates, then full replay.
        let mut world = MapWorld::default();
        let mut records = Vec::new();
        for i in 0..37 {
            if i % 2 == 0 {
                // Break: world had stone there before the match.
                world.set_block(i, 64, 0, AIR); // broken now
                records.push(rec(ActionKind::Break, i, "minecraft:stone"));
            } else {
                world.set_block(i, 64, 0, "minecraft:dirt");
                records.push(rec(ActionKind::Place, i, "minecraft:dirt"));
            }
        }
        let mut queue = ReplayQueue::build(records, []);
        while !queue.is_empty() {
            queue.apply_batch(&mut world);
        }
        for i in 0..37 {
            let expected = if i % 2 == 0 { "minecraft:stone" } else { AIR };
            assert_eq!(world.get(i, 64, 0), expected, "coordinate {i}");
        }
    }
}

//! Split target tables
//!
//! Maps each target (system or block) to the positions of its components in
//! a timeslice. Component order is fixed by the link topology, so the tables
//! are resolved once from the first timeslice.

use contracts::{Block, SystemId, Timeslice, SYSTEMS};

/// Component positions per known system, in [`SYSTEMS`] order
pub fn resolve_systems(ts: &Timeslice) -> Vec<Vec<u32>> {
    let mut table = vec![Vec::new(); SYSTEMS.len()];
    for (pos, component) in ts.components.iter().enumerate() {
        let Some(sys_pos) = component
            .system_id()
            .and_then(|id| SystemId(id).position())
        else {
            continue;
        };
        table[sys_pos].push(pos as u32);
    }
    table
}

/// Component positions per block: union of the member systems' lists,
/// systems in ascending id order
pub fn resolve_blocks(systems: &[Vec<u32>], blocks: &[Block]) -> Vec<Vec<u32>> {
    blocks
        .iter()
        .map(|block| {
            block
                .systems
                .iter()
                .filter_map(|&id| SystemId(id).position())
                .filter_map(|sys_pos| systems.get(sys_pos))
                .flatten()
                .copied()
                .collect()
        })
        .collect()
}

/// Human-readable table for the startup log
pub fn describe_systems(table: &[Vec<u32>]) -> String {
    SYSTEMS
        .iter()
        .zip(table)
        .filter(|(_, positions)| !positions.is_empty())
        .map(|(sys, positions)| format!("{}={:?}", sys.name, positions))
        .collect::<Vec<_>>()
        .join(" ")
}

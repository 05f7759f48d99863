//! Mutation records: one logged block change, with enough data to invert it.

use std::fmt;

/// What the player did to the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// A block was broken. The record's `block_type` is the type that existed
    /// before the break, i.e. what must be restored.
    Break,
    /// A block was placed. The record's `block_type` is the placed type;
    /// placements always revert to air.
    Place,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Break => "break",
            ActionKind::Place => "place",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "break" => Some(ActionKind::Break),
            "place" => Some(ActionKind::Place),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged block mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub timestamp: f64,
    pub kind: ActionKind,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub block_type: String,
}

impl MutationRecord {
    /// Serialize as one log line (no trailing newline). Block identifiers
    /// never contain commas, so a flat delimited format is unambiguous.
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.timestamp, self.kind, self.x, self.y, self.z, self.block_type
        )
    }

    /// Parse one log line. Returns `None` for malformed input.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.trim_end().splitn(6, ',');
        let timestamp = fields.next()?.parse().ok()?;
        let kind = ActionKind::parse(fields.next()?)?;
        let x = fields.next()?.parse().ok()?;
        let y = fields.next()?.parse().ok()?;
        let z = fields.next()?.parse().ok()?;
        let block_type = fields.next()?;
        if block_type.is_empty() {
            return None;
        }
        Some(Self {
            timestamp,
            kind,
            x,
            y,
            z,
            block_type: block_type.to_string(),
        })
    }
}

/// Whether a block type is a fluid that can spread after being placed.
pub fn is_liquid(block_type: &str) -> bool {
    matches!(
        block_type,
        "minecraft:water"
            | "minecraft:flowing_water"
            | "minecraft:lava"
            | "minecraft:flowing_lava"
    )
}

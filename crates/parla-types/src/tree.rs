//! Binary tree structures.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// One of the two child slots under an upline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Left,
    Right,
}

string_enum!(Position, "position", {
    Left => "left",
    Right => "right",
});

impl Position {
    /// Left first.
    pub const BOTH: [Position; 2] = [Position::Left, Position::Right];

    pub fn other(self) -> Position {
        match self {
            Position::Left => Position::Right,
            Position::Right => Position::Left,
        }
    }
}

/// Leg requested when a sponsor's invite is redeemed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementPreference {
    Left,
    Right,
    #[default]
    Auto,
}

string_enum!(PlacementPreference, "placement preference", {
    Left => "left",
    Right => "right",
    Auto => "auto",
});

impl PlacementPreference {
    /// The forced leg, if any.
    pub fn position(self) -> Option<Position> {
        match self {
            PlacementPreference::Left => Some(Position::Left),
            PlacementPreference::Right => Some(Position::Right),
            PlacementPreference::Auto => None,
        }
    }
}

/// A placed user. Roots have neither upline nor position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub user_id: UserId,
    pub upline_id: Option<UserId>,
    pub position: Option<Position>,
    pub placed_at: u64,
}

impl TreeNode {
    pub fn is_root(&self) -> bool {
        self.upline_id.is_none()
    }

    /// The occupied slot, if this node is not a root.
    pub fn slot(&self) -> Option<(UserId, Position)> {
        self.upline_id.zip(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other() {
        assert_eq!(Position::Left.other(), Position::Right);
        assert_eq!(Position::Right.other(), Position::Left);
    }

    #[test]
    fn test_preference_position() {
        assert_eq!(PlacementPreference::Left.position(), Some(Position::Left));
        assert_eq!(PlacementPreference::Auto.position(), None);
        assert_eq!("auto".parse::<PlacementPreference>(), Ok(PlacementPreference::Auto));
    }

    #[test]
    fn test_slot() {
        let root = TreeNode {
            user_id: UserId(1),
            upline_id: None,
            position: None,
            placed_at: 0,
        };
        assert!(root.is_root());
        assert_eq!(root.slot(), None);

        let child = TreeNode {
            user_id: UserId(2),
            upline_id: Some(UserId(1)),
            position: Some(Position::Right),
            placed_at: 0,
        };
        assert_eq!(child.slot(), Some((UserId(1), Position::Right)));
    }
}

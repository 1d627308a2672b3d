//! Static arena geometry for a session.

use serde::{Deserialize, Serialize};

use super::Vector3;

/// A boost pad location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostPad {
    /// Pad centre
    pub location: Vector3,
    /// Large (100) pad rather than a small one
    pub is_full_boost: bool,
}

/// A goal mouth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalInfo {
    /// Team that defends this goal
    pub team_num: u8,
    /// Centre of the goal line
    pub location: Vector3,
    /// Unit vector pointing out of the goal into the field
    pub direction: Vector3,
    /// Goal width
    pub width: f32,
    /// Goal height
    pub height: f32,
}

/// Session-immutable field description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldInfo {
    /// Boost pads, indexed like `GameTickPacket::game_boosts`
    pub boost_pads: Vec<BoostPad>,
    /// Number of valid entries in `boost_pads`
    pub num_boosts: usize,
    /// Goals
    pub goals: Vec<GoalInfo>,
    /// Number of valid entries in `goals`
    pub num_goals: usize,
}

impl FieldInfo {
    /// A standard soccar field: two goals and the six large pads.
    #[must_use]
    pub fn standard() -> Self {
        let big_pads = [
            (-3072.0, -4096.0),
            (3072.0, -4096.0),
            (-3584.0, 0.0),
            (3584.0, 0.0),
            (-3072.0, 4096.0),
            (3072.0, 4096.0),
        ];
        let boost_pads: Vec<_> = big_pads
            .iter()
            .map(|&(x, y)| BoostPad {
                location: Vector3::new(x, y, 73.0),
                is_full_boost: true,
            })
            .collect();
        let goals = vec![
            GoalInfo {
                team_num: 0,
                location: Vector3::new(0.0, -5120.0, 321.0),
                direction: Vector3::new(0.0, 1.0, 0.0),
                width: 1786.0,
                height: 642.0,
            },
            GoalInfo {
                team_num: 1,
                location: Vector3::new(0.0, 5120.0, 321.0),
                direction: Vector3::new(0.0, -1.0, 0.0),
                width: 1786.0,
                height: 642.0,
            },
        ];
        Self {
            num_boosts: boost_pads.len(),
            boost_pads,
            num_goals: goals.len(),
            goals,
        }
    }

    /// The goal defended by `team`.
    #[must_use]
    pub fn goal_of(&self, team: u8) -> Option<&GoalInfo> {
        self.goals
            .iter()
            .take(self.num_goals)
            .find(|g| g.team_num == team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_field_is_consistent() {
        let field = FieldInfo::standard();
        assert_eq!(field.num_boosts, field.boost_pads.len());
        assert_eq!(field.num_goals, 2);
        assert!(field.goal_of(1).is_some_and(|g| g.location.y > 0.0));
        assert!(field.goal_of(2).is_none());
    }
}

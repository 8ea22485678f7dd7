use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One end of the table. P1 defends the low-x end and hits toward +x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "lowercase")]
pub enum Side {
    P1,
    P2,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::P1 => Side::P2,
            Side::P2 => Side::P1,
        }
    }

    /// Sign of the along-table velocity of a ball this side just hit.
    pub fn direction(self) -> f64 {
        match self {
            Side::P1 => 1.0,
            Side::P2 => -1.0,
        }
    }
}

/// Multiplayer role. The host always plays P1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    pub fn side(self) -> Side {
        match self {
            Role::Host => Side::P1,
            Role::Guest => Side::P2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Bot,
    Practice,
    Online,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct Scores {
    pub p1: u32,
    pub p2: u32,
}

impl Scores {
    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::P1 => self.p1,
            Side::P2 => self.p2,
        }
    }

    pub fn increment(&mut self, side: Side) -> u32 {
        let slot = match side {
            Side::P1 => &mut self.p1,
            Side::P2 => &mut self.p2,
        };
        *slot += 1;
        *slot
    }

    pub fn total(&self) -> u32 {
        self.p1 + self.p2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sides_point_in_opposite_directions() {
        assert_eq!(Side::P1.direction(), -Side::P2.direction());
        assert_eq!(Side::P1.opponent(), Side::P2);
    }

    #[test]
    fn side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Side::P2).unwrap(), "\"p2\"");
        assert_eq!(serde_json::to_string(&Role::Host).unwrap(), "\"host\"");
    }

    #[test]
    fn scores_increment_returns_new_total() {
        let mut scores = Scores::default();
        assert_eq!(scores.increment(Side::P2), 1);
        assert_eq!(scores.increment(Side::P2), 2);
        assert_eq!(scores.get(Side::P1), 0);
        assert_eq!(scores.total(), 2);
    }
}

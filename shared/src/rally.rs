//! Bounce bookkeeping for the table variant: who served, who hit last and
//! where the ball has landed since, turned into a single consistent rule set.

use crate::config::RallyRules;
use crate::types::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointReason {
    /// Arcade court: the ball crossed an end line.
    PastEndLine,
    /// Serve bounced on the wrong half first, or twice on the server's half.
    ServeFault,
    /// A rally shot landed on the hitter's own half.
    WrongSideBounce,
    /// Second bounce on the receiver's half.
    DoubleBounce,
    /// Ball left play after landing legally; the receiver failed to return it.
    MissedReturn,
    /// Ball left play without the required bounce.
    OutOfPlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointAward {
    pub scorer: Side,
    pub reason: PointReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RallyTracker {
    /// Set while a serve is in flight, cleared by the receiver's return.
    server: Option<Side>,
    last_hitter: Option<Side>,
    bounces_since_hit: u8,
    receiver_bounced: bool,
    hits: u32,
}

impl RallyTracker {
    pub fn start_serve(&mut self, server: Side) {
        *self = RallyTracker {
            server: Some(server),
            last_hitter: Some(server),
            ..RallyTracker::default()
        };
    }

    pub fn on_hit(&mut self, side: Side) {
        if self.server != Some(side) || self.last_hitter != Some(side) {
            self.server = None;
        }
        self.last_hitter = Some(side);
        self.bounces_since_hit = 0;
        self.receiver_bounced = false;
        self.hits += 1;
    }

    pub fn is_serving(&self) -> bool {
        self.server.is_some()
    }

    pub fn last_hitter(&self) -> Option<Side> {
        self.last_hitter
    }

    /// Paddle contacts since the serve.
    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn on_bounce(&mut self, half: Side, rules: &RallyRules) -> Option<PointAward> {
        let hitter = self.last_hitter?;
        let receiver = hitter.opponent();
        let count = self.bounces_since_hit;
        self.bounces_since_hit = self.bounces_since_hit.saturating_add(1);

        let serving = self.server == Some(hitter) && rules.serve_bounces_own_side;
        // Index of the bounce that must land on the receiver's half.
        let receiver_bounce = if serving { 1 } else { 0 };

        if serving && count == 0 {
            return (half != hitter).then_some(PointAward {
                scorer: receiver,
                reason: PointReason::ServeFault,
            });
        }
        if count == receiver_bounce {
            if half == receiver {
                self.receiver_bounced = true;
                return None;
            }
            let reason = if serving {
                PointReason::ServeFault
            } else {
                PointReason::WrongSideBounce
            };
            return Some(PointAward {
                scorer: receiver,
                reason,
            });
        }
        if rules.double_bounce_loses && self.receiver_bounced && half == receiver {
            return Some(PointAward {
                scorer: hitter,
                reason: PointReason::DoubleBounce,
            });
        }
        None
    }

    /// Ball left play. `half` is where it was when it went dead, used only
    /// when nobody has touched the ball yet.
    pub fn on_out(&self, half: Side) -> PointAward {
        match self.last_hitter {
            Some(hitter) if self.receiver_bounced => PointAward {
                scorer: hitter,
                reason: PointReason::MissedReturn,
            },
            Some(hitter) => PointAward {
                scorer: hitter.opponent(),
                reason: PointReason::OutOfPlay,
            },
            None => PointAward {
                scorer: half.opponent(),
                reason: PointReason::OutOfPlay,
            },
        }
    }
}

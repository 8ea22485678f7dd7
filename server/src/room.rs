use std::time::{Duration, Instant};

use pingpong_shared::protocol::{BallWire, PaddleWire, PaddlesWire};
use pingpong_shared::timer::Alarm;
use pingpong_shared::types::{Role, Scores, Side};

use crate::authoritative::AuthoritativeSim;

/// Connection id handed out by the game loop.
pub type ConnId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Host alone, waiting for a guest
    Waiting,
    /// Guest joined, start delay running
    Starting,
    Countdown { next: u32 },
    Playing,
    Ended { winner: Side },
}

/// Result of applying a score report to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOutcome {
    Ignored,
    Scored,
    Won(Side),
}

/// Canonical state of one two-player match.
#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub host: ConnId,
    pub guest: Option<ConnId>,
    pub state: RoomState,
    pub ball: BallWire,
    pub paddles: PaddlesWire,
    pub scores: Scores,
    pub created_at: Instant,
    pub last_activity: Instant,
    /// Start delay, then the countdown
    pub start_alarm: Alarm,
    pub countdown_alarm: Alarm,
    pub ticks_since_snapshot: u64,
    pub sim: Option<AuthoritativeSim>,
}

impl Room {
    pub fn new(code: String, host: ConnId, now: Instant) -> Self {
        let centered = PaddleWire { y: 0.5, vy: 0.0 };
        Self {
            code,
            host,
            guest: None,
            state: RoomState::Waiting,
            ball: BallWire {
                x: 0.5,
                y: 0.5,
                ..BallWire::default()
            },
            paddles: PaddlesWire {
                p1: centered,
                p2: centered,
            },
            scores: Scores::default(),
            created_at: now,
            last_activity: now,
            start_alarm: Alarm::default(),
            countdown_alarm: Alarm::default(),
            ticks_since_snapshot: 0,
            sim: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.guest.is_some()
    }

    pub fn occupants(&self) -> usize {
        1 + usize::from(self.guest.is_some())
    }

    pub fn members(&self) -> impl Iterator<Item = ConnId> + '_ {
        std::iter::once(self.host).chain(self.guest)
    }

    pub fn role_of(&self, conn: ConnId) -> Option<Role> {
        if conn == self.host {
            Some(Role::Host)
        } else if self.guest == Some(conn) {
            Some(Role::Guest)
        } else {
            None
        }
    }

    /// The other occupant, if any.
    pub fn peer_of(&self, conn: ConnId) -> Option<ConnId> {
        match self.role_of(conn)? {
            Role::Host => self.guest,
            Role::Guest => Some(self.host),
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Milliseconds of room clock, stamped on game-state snapshots.
    pub fn clock_ms(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.created_at).as_millis() as u64
    }

    /// Arm the start delay once the second player is in.
    pub fn schedule_start(&mut self, delay: Duration) {
        self.state = RoomState::Starting;
        self.start_alarm.arm_once(delay.as_secs_f64());
    }

    pub fn cancel_timers(&mut self) {
        self.start_alarm.cancel();
        self.countdown_alarm.cancel();
    }

    pub fn set_paddle(&mut self, role: Role, paddle: PaddleWire) {
        self.paddles.set(role.side(), paddle);
        if let Some(sim) = self.sim.as_mut() {
            sim.set_paddle(role.side(), paddle);
        }
    }

    /// Count a point for `scorer`. Points only count while playing.
    pub fn apply_score(&mut self, scorer: Side, win_score: u32) -> ScoreOutcome {
        if self.state != RoomState::Playing {
            return ScoreOutcome::Ignored;
        }
        if self.scores.increment(scorer) >= win_score {
            self.state = RoomState::Ended { winner: scorer };
            self.cancel_timers();
            if let Some(sim) = self.sim.as_mut() {
                sim.stop();
            }
            return ScoreOutcome::Won(scorer);
        }
        ScoreOutcome::Scored
    }
}

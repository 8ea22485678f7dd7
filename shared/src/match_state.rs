//! Phase machine for one match: countdown, play, pause, scoring and the end.
//! Owns the scores, the serving side and every alarm the match schedules.

use crate::config::{MatchConfig, ServeRotation};
use crate::timer::MatchTimers;
use crate::types::{GameMode, Scores, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Menu,
    Countdown { remaining: u32 },
    Playing,
    Paused,
    /// Between a point and the next serve
    Scoring,
    Ended { winner: Side },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    CountdownTick(u32),
    Go,
    /// Launch the ball from this side.
    Serve(Side),
    PointScored { scorer: Side, scores: Scores },
    MatchEnded { winner: Side, scores: Scores },
}

#[derive(Debug, Clone)]
pub struct MatchState {
    config: MatchConfig,
    mode: GameMode,
    phase: MatchPhase,
    scores: Scores,
    server: Side,
    first_server: Side,
    timers: MatchTimers,
}

impl MatchState {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            mode: GameMode::Bot,
            phase: MatchPhase::Menu,
            scores: Scores::default(),
            server: Side::P1,
            first_server: Side::P1,
            timers: MatchTimers::default(),
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    pub fn server(&self) -> Side {
        self.server
    }

    pub fn timers(&self) -> &MatchTimers {
        &self.timers
    }

    pub fn is_playing(&self) -> bool {
        self.phase == MatchPhase::Playing
    }

    pub fn winner(&self) -> Option<Side> {
        match self.phase {
            MatchPhase::Ended { winner } => Some(winner),
            _ => None,
        }
    }

    fn set_phase(&mut self, phase: MatchPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "match phase");
        self.phase = phase;
    }

    /// Reset the score and run the countdown for `mode`. Valid from any phase.
    pub fn start(&mut self, mode: GameMode) -> Vec<MatchEvent> {
        self.mode = mode;
        self.scores = Scores::default();
        self.server = self.first_server;
        self.timers.cancel_all();
        self.begin_countdown()
    }

    /// Countdown again with scores zeroed, keeping the mode.
    pub fn restart(&mut self) -> Vec<MatchEvent> {
        self.start(self.mode)
    }

    fn begin_countdown(&mut self) -> Vec<MatchEvent> {
        let count = self.config.countdown_from;
        if count == 0 {
            self.set_phase(MatchPhase::Playing);
            return vec![MatchEvent::Go, MatchEvent::Serve(self.server)];
        }
        self.set_phase(MatchPhase::Countdown { remaining: count });
        self.timers
            .countdown
            .arm_repeating(self.config.countdown_interval);
        vec![MatchEvent::CountdownTick(count)]
    }

    pub fn pause(&mut self) -> bool {
        if self.phase != MatchPhase::Playing {
            return false;
        }
        self.set_phase(MatchPhase::Paused);
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.phase != MatchPhase::Paused {
            return false;
        }
        self.set_phase(MatchPhase::Playing);
        true
    }

    /// Back to the menu. Every pending alarm is dropped with the match.
    pub fn quit(&mut self) {
        self.timers.cancel_all();
        self.scores = Scores::default();
        self.set_phase(MatchPhase::Menu);
    }

    /// Run the match clock. Nothing moves while paused or outside a match.
    pub fn advance(&mut self, dt: f64) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        match self.phase {
            MatchPhase::Countdown { mut remaining } => {
                for _ in 0..self.timers.countdown.advance(dt) {
                    remaining = remaining.saturating_sub(1);
                    if remaining == 0 {
                        self.timers.countdown.cancel();
                        self.set_phase(MatchPhase::Playing);
                        events.push(MatchEvent::Go);
                        events.push(MatchEvent::Serve(self.server));
                        return events;
                    }
                    events.push(MatchEvent::CountdownTick(remaining));
                }
                self.phase = MatchPhase::Countdown { remaining };
            }
            MatchPhase::Scoring => {
                if self.timers.serve.advance(dt) > 0 {
                    self.set_phase(MatchPhase::Playing);
                    events.push(MatchEvent::Serve(self.server));
                }
            }
            _ => {}
        }
        events
    }

    /// Award a point. Ignored unless a rally is in progress.
    pub fn point_scored(&mut self, scorer: Side) -> Vec<MatchEvent> {
        if self.phase != MatchPhase::Playing {
            return Vec::new();
        }
        self.scores.increment(scorer);
        tracing::debug!(?scorer, p1 = self.scores.p1, p2 = self.scores.p2, "point");
        let mut events = vec![MatchEvent::PointScored {
            scorer,
            scores: self.scores,
        }];
        if let Some(winner) = self.check_winner() {
            self.timers.cancel_all();
            self.set_phase(MatchPhase::Ended { winner });
            events.push(MatchEvent::MatchEnded {
                winner,
                scores: self.scores,
            });
            return events;
        }
        self.server = self.next_server(scorer);
        self.set_phase(MatchPhase::Scoring);
        self.timers.serve.arm_once(self.config.point_delay);
        events
    }

    fn check_winner(&self) -> Option<Side> {
        let win = &self.config.win;
        [Side::P1, Side::P2].into_iter().find(|&side| {
            win.is_won(self.scores.get(side), self.scores.get(side.opponent()))
        })
    }

    fn next_server(&self, scorer: Side) -> Side {
        match self.config.serve_rotation {
            ServeRotation::Scorer => scorer,
            ServeRotation::Every(n) => {
                if (self.scores.total() / n.max(1)) % 2 == 0 {
                    self.first_server
                } else {
                    self.first_server.opponent()
                }
            }
        }
    }

    // Online matches: the room server drives the clock and the score.

    /// Enter online mode and wait in the menu for the room's countdown.
    pub fn prepare_online(&mut self) {
        self.mode = GameMode::Online;
        self.quit();
    }

    pub fn apply_countdown(&mut self, count: u32) -> Vec<MatchEvent> {
        self.timers.cancel_all();
        if count == 0 {
            return self.apply_game_start();
        }
        if matches!(self.phase, MatchPhase::Menu | MatchPhase::Ended { .. }) {
            self.scores = Scores::default();
            self.server = self.first_server;
        }
        self.set_phase(MatchPhase::Countdown { remaining: count });
        vec![MatchEvent::CountdownTick(count)]
    }

    pub fn apply_game_start(&mut self) -> Vec<MatchEvent> {
        if self.phase == MatchPhase::Playing {
            return Vec::new();
        }
        self.timers.cancel_all();
        self.set_phase(MatchPhase::Playing);
        vec![MatchEvent::Go, MatchEvent::Serve(self.server)]
    }

    /// Adopt authoritative totals. The side that gained a point is `scorer`.
    pub fn apply_scores(&mut self, scores: Scores, scorer: Side) -> Vec<MatchEvent> {
        if matches!(self.phase, MatchPhase::Ended { .. } | MatchPhase::Menu) {
            return Vec::new();
        }
        self.scores = scores;
        self.server = self.next_server(scorer);
        self.set_phase(MatchPhase::Scoring);
        self.timers.serve.arm_once(self.config.point_delay);
        vec![MatchEvent::PointScored { scorer, scores }]
    }

    pub fn apply_game_over(&mut self, winner: Side, scores: Scores) -> Vec<MatchEvent> {
        if matches!(self.phase, MatchPhase::Ended { .. }) {
            return Vec::new();
        }
        self.scores = scores;
        self.timers.cancel_all();
        self.set_phase(MatchPhase::Ended { winner });
        vec![MatchEvent::MatchEnded { winner, scores }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WinRule;

    fn playing(config: MatchConfig) -> MatchState {
        let mut state = MatchState::new(config);
        state.start(GameMode::Bot);
        state.advance(3.0);
        assert_eq!(state.phase(), MatchPhase::Playing);
        state
    }

    fn score(state: &mut MatchState, side: Side) -> Vec<MatchEvent> {
        let events = state.point_scored(side);
        state.advance(10.0);
        events
    }

    #[test]
    fn countdown_ticks_once_per_second_then_serves() {
        let mut state = MatchState::new(MatchConfig::arcade());
        assert_eq!(state.start(GameMode::Bot), vec![MatchEvent::CountdownTick(3)]);
        assert_eq!(state.advance(0.5), vec![]);
        assert_eq!(state.advance(0.5), vec![MatchEvent::CountdownTick(2)]);
        assert_eq!(state.advance(1.0), vec![MatchEvent::CountdownTick(1)]);
        assert_eq!(
            state.advance(1.0),
            vec![MatchEvent::Go, MatchEvent::Serve(Side::P1)]
        );
        assert!(state.is_playing());
        assert!(!state.timers().any_armed());
    }

    #[test]
    fn pause_freezes_and_resume_continues() {
        let mut state = playing(MatchConfig::arcade());
        assert!(state.pause());
        assert!(!state.pause());
        assert_eq!(state.point_scored(Side::P1), vec![]);
        assert!(state.resume());
        assert!(state.is_playing());
        assert_eq!(state.scores(), Scores::default());
    }

    #[test]
    fn scorer_serves_after_point_delay() {
        let mut state = playing(MatchConfig::arcade());
        state.point_scored(Side::P2);
        assert_eq!(state.phase(), MatchPhase::Scoring);
        assert_eq!(state.advance(0.5), vec![]);
        assert_eq!(state.advance(0.5), vec![MatchEvent::Serve(Side::P2)]);
        assert!(state.is_playing());
    }

    #[test]
    fn arcade_match_ends_at_win_score_without_margin() {
        let mut state = playing(MatchConfig::arcade());
        for _ in 0..10 {
            score(&mut state, Side::P1);
            score(&mut state, Side::P2);
        }
        let events = score(&mut state, Side::P1);
        assert_eq!(state.winner(), Some(Side::P1));
        assert!(matches!(
            events.last(),
            Some(MatchEvent::MatchEnded { winner: Side::P1, .. })
        ));
    }

    #[test]
    fn table_match_needs_two_point_lead() {
        let mut state = playing(MatchConfig::table());
        for _ in 0..10 {
            score(&mut state, Side::P1);
            score(&mut state, Side::P2);
        }
        score(&mut state, Side::P1);
        assert_eq!(state.winner(), None);
        score(&mut state, Side::P1);
        assert_eq!(state.winner(), Some(Side::P1));
        assert_eq!(state.scores(), Scores { p1: 12, p2: 10 });
    }

    #[test]
    fn no_points_after_the_end() {
        let config = MatchConfig {
            win: WinRule {
                win_score: 1,
                margin: 1,
            },
            ..MatchConfig::arcade()
        };
        let mut state = playing(config);
        score(&mut state, Side::P2);
        assert_eq!(state.point_scored(Side::P1), vec![]);
        assert_eq!(state.scores(), Scores { p1: 0, p2: 1 });
    }

    #[test]
    fn table_serve_changes_every_two_points() {
        let mut state = playing(MatchConfig::table());
        let mut servers = Vec::new();
        for _ in 0..4 {
            score(&mut state, Side::P1);
            servers.push(state.server());
        }
        assert_eq!(servers, vec![Side::P1, Side::P2, Side::P2, Side::P1]);
    }

    #[test]
    fn quit_cancels_pending_alarms() {
        let mut state = playing(MatchConfig::arcade());
        state.point_scored(Side::P1);
        assert!(state.timers().any_armed());
        state.quit();
        assert!(!state.timers().any_armed());
        assert_eq!(state.phase(), MatchPhase::Menu);
        assert_eq!(state.advance(5.0), vec![]);
    }

    #[test]
    fn restart_zeroes_scores_and_counts_down() {
        let config = MatchConfig {
            win: WinRule {
                win_score: 1,
                margin: 1,
            },
            ..MatchConfig::arcade()
        };
        let mut state = playing(config);
        score(&mut state, Side::P1);
        assert_eq!(state.restart(), vec![MatchEvent::CountdownTick(3)]);
        assert_eq!(state.scores(), Scores::default());
        assert_eq!(state.mode(), GameMode::Bot);
    }

    #[test]
    fn online_phases_follow_the_room() {
        let mut state = MatchState::new(MatchConfig::arcade());
        state.prepare_online();
        assert_eq!(state.mode(), GameMode::Online);
        state.apply_countdown(3);
        // Local time does not advance a server-driven countdown past its last cue.
        state.advance(5.0);
        assert_eq!(state.phase(), MatchPhase::Countdown { remaining: 3 });
        assert_eq!(
            state.apply_game_start(),
            vec![MatchEvent::Go, MatchEvent::Serve(Side::P1)]
        );
        state.apply_scores(Scores { p1: 0, p2: 1 }, Side::P2);
        assert_eq!(state.server(), Side::P2);
        state.apply_game_over(Side::P2, Scores { p1: 3, p2: 11 });
        assert_eq!(state.winner(), Some(Side::P2));
        assert_eq!(state.apply_scores(Scores { p1: 4, p2: 11 }, Side::P1), vec![]);
    }
}

use serde::{Deserialize, Serialize};

/// Per-tick factors (drag, spin decay, trail fade) are expressed against this rate.
pub const REFERENCE_HZ: f64 = 60.0;

/// Raise a per-reference-tick factor to the power matching `dt` seconds.
pub fn per_tick(factor: f64, dt: f64) -> f64 {
    factor.powf(dt * REFERENCE_HZ)
}

/// Table top and net of the realistic variant. The table top sits at `height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    pub height: f64,
    pub net_height: f64,
    /// Half thickness of the band around the net plane that counts as touching it
    pub net_band: f64,
    /// How far below the table top the ball may fall before it is dead
    pub floor_depth: f64,
    /// How far past a side edge the ball may travel before it is dead
    pub side_margin: f64,
}

/// Play field. x runs 0..length (net at length / 2), y runs 0..width.
/// Without a table the field is a top-down court with walls at y = 0 and y = width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arena {
    pub length: f64,
    pub width: f64,
    pub table: Option<TableSpec>,
    /// Distance past an end line at which the ball counts as gone
    pub end_margin: f64,
}

impl Arena {
    pub fn mid_x(&self) -> f64 {
        self.length * 0.5
    }

    pub fn mid_y(&self) -> f64 {
        self.width * 0.5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PaddleShape {
    /// Axis-aligned box: `depth` along x, `span` along y.
    Box { depth: f64, span: f64 },
    /// Round bat facing along x.
    Disc { radius: f64 },
}

impl PaddleShape {
    /// Half extent along the cross-table axis, used to normalize the hit offset.
    pub fn half_span(&self) -> f64 {
        match self {
            PaddleShape::Box { span, .. } => span * 0.5,
            PaddleShape::Disc { radius } => *radius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MagnusModel {
    /// spin.y bends vx, spin.x bends vy.
    Planar,
    /// acceleration = k * (spin x velocity)
    CrossProduct,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpinTier {
    /// Paddle speed (units/s) above which this tier applies
    pub threshold: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicsConfig {
    pub arena: Arena,
    /// Vertical acceleration (units/s^2). Zero on the top-down court.
    pub gravity: f64,
    /// Velocity factor per reference tick
    pub drag: f64,
    pub bounce: f64,
    /// Spin factor per reference tick
    pub spin_decay: f64,
    pub max_spin: f64,
    pub magnus: MagnusModel,
    pub magnus_strength: f64,
    pub ball_radius: f64,
    pub paddle: PaddleShape,
    /// Distance of the paddle face from its end line (negative = behind it)
    pub paddle_inset: f64,
    pub min_ball_speed: f64,
    pub max_ball_speed: f64,
    /// Spin per unit of paddle speed
    pub spin_transfer: f64,
    /// Spin per unit of (hit offset * paddle speed)
    pub offset_spin: f64,
    pub base_boost: f64,
    /// Extra boost per unit of paddle speed
    pub speed_boost: f64,
    /// Cross-table velocity added per unit of hit offset
    pub offset_deflect: f64,
    /// Fraction of paddle velocity carried into the ball
    pub paddle_carry: f64,
    /// Upward velocity given on every hit (table only)
    pub hit_lift: f64,
    /// Extra upward velocity per unit of vertical hit offset (table only)
    pub lift_per_offset: f64,
    /// Ascending by threshold; below the first threshold the multiplier is 1.
    pub spin_tiers: Vec<SpinTier>,
    /// Forward velocity factor when the ball touches the net
    pub net_restitution: f64,
    /// Max angle off the table axis for a court serve (radians)
    pub serve_angle: f64,
    pub trail_length: usize,
    pub trail_fade: f64,
}

impl PhysicsConfig {
    /// Top-down arcade court, in pixels of a 1280x720 reference field.
    pub fn arcade() -> Self {
        let ball_radius = 14.0;
        Self {
            arena: Arena {
                length: 1280.0,
                width: 720.0,
                table: None,
                end_margin: ball_radius * 3.0,
            },
            gravity: 0.0,
            drag: 0.9997,
            bounce: 0.88,
            spin_decay: 0.985,
            max_spin: 0.12,
            magnus: MagnusModel::Planar,
            magnus_strength: 5400.0,
            ball_radius,
            paddle: PaddleShape::Box {
                depth: 24.0,
                span: 160.0,
            },
            paddle_inset: 70.0,
            min_ball_speed: 1200.0,
            max_ball_speed: 2700.0,
            spin_transfer: 0.0002,
            offset_spin: 0.004 / REFERENCE_HZ,
            base_boost: 1.1,
            speed_boost: 0.015 / REFERENCE_HZ,
            offset_deflect: 360.0,
            paddle_carry: 0.5,
            hit_lift: 0.0,
            lift_per_offset: 0.0,
            spin_tiers: vec![
                SpinTier { threshold: 120.0, multiplier: 1.5 },
                SpinTier { threshold: 300.0, multiplier: 2.5 },
                SpinTier { threshold: 480.0, multiplier: 4.0 },
                SpinTier { threshold: 720.0, multiplier: 6.0 },
                SpinTier { threshold: 1080.0, multiplier: 8.0 },
            ],
            net_restitution: 0.0,
            serve_angle: std::f64::consts::PI / 12.0,
            trail_length: 25,
            trail_fade: 0.88,
        }
    }

    /// Regulation table in meters.
    pub fn table() -> Self {
        Self {
            arena: Arena {
                length: 2.74,
                width: 1.525,
                table: Some(TableSpec {
                    height: 0.76,
                    net_height: 0.1525,
                    net_band: 0.03,
                    floor_depth: 0.5,
                    side_margin: 1.0,
                }),
                end_margin: 0.8,
            },
            gravity: -9.8,
            drag: 0.998,
            bounce: 0.9,
            spin_decay: 0.995,
            max_spin: 6.0,
            magnus: MagnusModel::CrossProduct,
            magnus_strength: 0.08,
            ball_radius: 0.02,
            paddle: PaddleShape::Disc { radius: 0.085 },
            paddle_inset: -0.15,
            min_ball_speed: 4.0,
            max_ball_speed: 10.0,
            spin_transfer: 1.2,
            offset_spin: 0.5,
            base_boost: 1.0,
            speed_boost: 0.1,
            offset_deflect: 1.8,
            paddle_carry: 0.4,
            hit_lift: 2.5,
            lift_per_offset: 0.5,
            spin_tiers: vec![
                SpinTier { threshold: 0.5, multiplier: 1.2 },
                SpinTier { threshold: 1.0, multiplier: 1.5 },
                SpinTier { threshold: 1.5, multiplier: 2.0 },
                SpinTier { threshold: 2.5, multiplier: 2.5 },
                SpinTier { threshold: 3.5, multiplier: 3.0 },
            ],
            net_restitution: 0.4,
            serve_angle: 0.0,
            trail_length: 25,
            trail_fade: 0.88,
        }
    }

    /// Returns (tier index, multiplier). Tier 0 is the unity tier below every threshold.
    pub fn spin_tier(&self, paddle_speed: f64) -> (u8, f64) {
        let mut tier = (0u8, 1.0);
        for (i, t) in self.spin_tiers.iter().enumerate() {
            if paddle_speed > t.threshold {
                tier = (i as u8 + 1, t.multiplier);
            }
        }
        tier
    }

    pub fn validate(&self) -> Result<(), String> {
        let a = &self.arena;
        if !(a.length.is_finite() && a.length > 0.0 && a.width.is_finite() && a.width > 0.0) {
            return Err("arena dimensions must be finite and > 0".to_string());
        }
        for (name, factor) in [
            ("drag", self.drag),
            ("bounce", self.bounce),
            ("spin_decay", self.spin_decay),
            ("trail_fade", self.trail_fade),
        ] {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(format!("{} must be in (0, 1]", name));
            }
        }
        if !(self.max_spin.is_finite() && self.max_spin >= 0.0) {
            return Err("max_spin must be finite and >= 0".to_string());
        }
        if !(self.min_ball_speed > 0.0 && self.max_ball_speed >= self.min_ball_speed) {
            return Err("ball speeds must satisfy 0 < min <= max".to_string());
        }
        if !(self.ball_radius > 0.0) {
            return Err("ball_radius must be > 0".to_string());
        }
        if self.paddle.half_span() * 2.0 >= a.width {
            return Err("paddle must be narrower than the arena".to_string());
        }
        if self
            .spin_tiers
            .windows(2)
            .any(|w| w[1].threshold <= w[0].threshold)
        {
            return Err("spin_tiers must be strictly ascending".to_string());
        }
        if a.table.is_none() && self.gravity != 0.0 {
            return Err("gravity requires a table".to_string());
        }
        Ok(())
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self::arcade()
    }
}

/// Power-shot timing and strength. Durations in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerShotConfig {
    pub duration: f64,
    pub cooldown: f64,
    pub speed_multiplier: f64,
    pub spin_multiplier: f64,
}

impl Default for PowerShotConfig {
    fn default() -> Self {
        Self {
            duration: 1.5,
            cooldown: 6.0,
            speed_multiplier: 1.7,
            spin_multiplier: 1.5,
        }
    }
}

impl PowerShotConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.duration > 0.0 && self.cooldown >= 0.0) {
            return Err("power shot duration must be > 0 and cooldown >= 0".to_string());
        }
        if !(self.speed_multiplier >= 1.0 && self.spin_multiplier >= 1.0) {
            return Err("power shot multipliers must be >= 1".to_string());
        }
        Ok(())
    }
}

/// First to `win_score`, leading by at least `margin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinRule {
    pub win_score: u32,
    pub margin: u32,
}

impl WinRule {
    pub fn is_won(&self, mine: u32, theirs: u32) -> bool {
        mine >= self.win_score && mine >= theirs + self.margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "points", rename_all = "camelCase")]
pub enum ServeRotation {
    /// Whoever won the point serves next.
    Scorer,
    /// Service passes to the other side every n points.
    Every(u32),
}

/// Serve legality and bounce rules for the table variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RallyRules {
    /// A serve must bounce on the server's half before crossing the net.
    pub serve_bounces_own_side: bool,
    /// A second bounce on the same half ends the point.
    pub double_bounce_loses: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    pub win: WinRule,
    pub countdown_from: u32,
    /// Seconds between countdown cues
    pub countdown_interval: f64,
    /// Seconds between a point and the next serve
    pub point_delay: f64,
    pub serve_rotation: ServeRotation,
    pub rally: RallyRules,
    /// Practice wall: fraction of the gap closed per reference tick
    pub practice_tracking: f64,
    /// Practice wall: how far ahead (seconds) it projects the ball
    pub practice_lead: f64,
}

impl MatchConfig {
    pub fn arcade() -> Self {
        Self {
            win: WinRule {
                win_score: 11,
                margin: 1,
            },
            countdown_from: 3,
            countdown_interval: 1.0,
            point_delay: 1.0,
            serve_rotation: ServeRotation::Scorer,
            rally: RallyRules {
                serve_bounces_own_side: false,
                double_bounce_loses: false,
            },
            practice_tracking: 0.12,
            practice_lead: 4.0 / REFERENCE_HZ,
        }
    }

    pub fn table() -> Self {
        Self {
            win: WinRule {
                win_score: 11,
                margin: 2,
            },
            point_delay: 2.0,
            serve_rotation: ServeRotation::Every(2),
            rally: RallyRules {
                serve_bounces_own_side: true,
                double_bounce_loses: true,
            },
            ..Self::arcade()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.win.win_score == 0 {
            return Err("win_score must be > 0".to_string());
        }
        if self.win.margin == 0 {
            return Err("win margin must be >= 1".to_string());
        }
        if !(self.countdown_interval > 0.0 && self.point_delay >= 0.0) {
            return Err("countdown_interval must be > 0 and point_delay >= 0".to_string());
        }
        if let ServeRotation::Every(0) = self.serve_rotation {
            return Err("serve rotation interval must be > 0".to_string());
        }
        if !(self.practice_tracking > 0.0 && self.practice_tracking <= 1.0) {
            return Err("practice_tracking must be in (0, 1]".to_string());
        }
        Ok(())
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::arcade()
    }
}

/// Bot tuning. Distances and speeds are in arena units, times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// 0 = clumsy, 1 = sharp
    pub difficulty: f64,
    pub reaction_base: f64,
    /// Added to the reaction delay at difficulty 0
    pub reaction_range: f64,
    /// Aim error span at difficulty 0
    pub error_range: f64,
    pub centering_jitter: f64,
    pub base_speed: f64,
    /// Extra paddle speed at difficulty 1
    pub speed_range: f64,
    /// Prediction offset per unit of lateral spin per second of flight
    pub spin_lead: f64,
    pub bounce_limit: u32,
    pub aggressive_difficulty: f64,
    pub aggressive_distance: f64,
    pub aggressive_boost: f64,
    /// Targets closer than this are treated as reached
    pub dead_zone: f64,
}

impl BotConfig {
    pub fn arcade() -> Self {
        Self {
            difficulty: 0.75,
            reaction_base: 4.0 / REFERENCE_HZ,
            reaction_range: 12.0 / REFERENCE_HZ,
            error_range: 100.0,
            centering_jitter: 80.0,
            base_speed: 7.0 * REFERENCE_HZ,
            speed_range: 7.0 * REFERENCE_HZ,
            spin_lead: 3600.0,
            bounce_limit: 5,
            aggressive_difficulty: 0.6,
            aggressive_distance: 250.0,
            aggressive_boost: 4.0 * REFERENCE_HZ,
            dead_zone: 3.0,
        }
    }

    pub fn table() -> Self {
        Self {
            difficulty: 0.75,
            reaction_base: 4.0 / REFERENCE_HZ,
            reaction_range: 12.0 / REFERENCE_HZ,
            error_range: 0.1,
            centering_jitter: 0.05,
            base_speed: 1.5,
            speed_range: 1.5,
            spin_lead: 0.2,
            bounce_limit: 5,
            aggressive_difficulty: 0.6,
            aggressive_distance: 0.6,
            aggressive_boost: 0.8,
            dead_zone: 0.003,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.difficulty) {
            return Err("difficulty must be in [0, 1]".to_string());
        }
        if !(self.reaction_base > 0.0 && self.reaction_range >= 0.0) {
            return Err("reaction_base must be > 0 and reaction_range >= 0".to_string());
        }
        if !(self.base_speed > 0.0) {
            return Err("base_speed must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self::arcade()
    }
}

/// Everything one match needs, bundled per variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub physics: PhysicsConfig,
    pub power_shot: PowerShotConfig,
    pub rules: MatchConfig,
    pub bot: BotConfig,
}

impl GameConfig {
    pub fn arcade() -> Self {
        Self {
            physics: PhysicsConfig::arcade(),
            power_shot: PowerShotConfig::default(),
            rules: MatchConfig::arcade(),
            bot: BotConfig::arcade(),
        }
    }

    pub fn table() -> Self {
        Self {
            physics: PhysicsConfig::table(),
            power_shot: PowerShotConfig::default(),
            rules: MatchConfig::table(),
            bot: BotConfig::table(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.physics.validate()?;
        self.power_shot.validate()?;
        self.rules.validate()?;
        self.bot.validate()
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::arcade()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        assert!(PhysicsConfig::arcade().validate().is_ok());
        assert!(PhysicsConfig::table().validate().is_ok());
        assert!(MatchConfig::arcade().validate().is_ok());
        assert!(MatchConfig::table().validate().is_ok());
        assert!(BotConfig::arcade().validate().is_ok());
        assert!(BotConfig::table().validate().is_ok());
        assert!(PowerShotConfig::default().validate().is_ok());
        assert!(GameConfig::table().validate().is_ok());
    }

    #[test]
    fn spin_tier_escalates_with_paddle_speed() {
        let config = PhysicsConfig::arcade();
        assert_eq!(config.spin_tier(0.0), (0, 1.0));
        assert_eq!(config.spin_tier(120.0), (0, 1.0));
        assert_eq!(config.spin_tier(121.0), (1, 1.5));
        assert_eq!(config.spin_tier(500.0), (3, 4.0));
        assert_eq!(config.spin_tier(5000.0), (5, 8.0));
    }

    #[test]
    fn inverted_speed_bounds_invalid() {
        let mut config = PhysicsConfig::arcade();
        config.max_ball_speed = config.min_ball_speed - 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn gravity_without_table_invalid() {
        let mut config = PhysicsConfig::arcade();
        config.gravity = -9.8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unordered_spin_tiers_invalid() {
        let mut config = PhysicsConfig::arcade();
        config.spin_tiers.swap(0, 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn win_rule_respects_margin() {
        let first_to = WinRule { win_score: 11, margin: 1 };
        assert!(first_to.is_won(11, 10));
        let deuce = WinRule { win_score: 11, margin: 2 };
        assert!(!deuce.is_won(11, 10));
        assert!(deuce.is_won(12, 10));
        assert!(deuce.is_won(11, 8));
    }

    #[test]
    fn per_tick_matches_factor_at_reference_rate() {
        let f = per_tick(0.985, 1.0 / REFERENCE_HZ);
        assert!((f - 0.985).abs() < 1e-12);
        let two = per_tick(0.985, 2.0 / REFERENCE_HZ);
        assert!((two - 0.985 * 0.985).abs() < 1e-12);
    }

    #[test]
    fn serve_rotation_serializes_tagged() {
        let json = serde_json::to_string(&ServeRotation::Every(2)).unwrap();
        assert_eq!(json, r#"{"kind":"every","points":2}"#);
    }
}

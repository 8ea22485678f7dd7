use crate::config::PowerShotConfig;

/// Remaining times below this count as elapsed.
const TIME_EPSILON: f64 = 1e-9;

/// Timed buff that amplifies a hit, then forces a cooldown.
/// Active and cooling down are separate states, so both can never hold at once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerShot {
    Ready,
    Active { remaining: f64 },
    Cooldown { remaining: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerShotTransition {
    Expired,
    Recharged,
}

impl Default for PowerShot {
    fn default() -> Self {
        PowerShot::Ready
    }
}

impl PowerShot {
    pub fn is_ready(&self) -> bool {
        matches!(self, PowerShot::Ready)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, PowerShot::Active { .. })
    }

    pub fn cooldown_remaining(&self) -> f64 {
        match self {
            PowerShot::Cooldown { remaining } => *remaining,
            _ => 0.0,
        }
    }

    pub fn active_remaining(&self) -> f64 {
        match self {
            PowerShot::Active { remaining } => *remaining,
            _ => 0.0,
        }
    }

    /// Returns false (and changes nothing) unless the shot is ready.
    pub fn activate(&mut self, config: &PowerShotConfig) -> bool {
        if !self.is_ready() {
            return false;
        }
        *self = PowerShot::Active {
            remaining: config.duration,
        };
        true
    }

    /// Spend an active shot on a hit. The cooldown starts immediately.
    pub fn consume(&mut self, config: &PowerShotConfig) -> bool {
        if !self.is_active() {
            return false;
        }
        self.deactivate(config);
        true
    }

    fn deactivate(&mut self, config: &PowerShotConfig) {
        *self = if config.cooldown > TIME_EPSILON {
            PowerShot::Cooldown {
                remaining: config.cooldown,
            }
        } else {
            PowerShot::Ready
        };
    }

    pub fn update(&mut self, dt: f64, config: &PowerShotConfig) -> Option<PowerShotTransition> {
        match self {
            PowerShot::Ready => None,
            PowerShot::Active { remaining } => {
                *remaining -= dt;
                if *remaining <= TIME_EPSILON {
                    self.deactivate(config);
                    Some(PowerShotTransition::Expired)
                } else {
                    None
                }
            }
            PowerShot::Cooldown { remaining } => {
                *remaining -= dt;
                if *remaining <= TIME_EPSILON {
                    *self = PowerShot::Ready;
                    Some(PowerShotTransition::Recharged)
                } else {
                    None
                }
            }
        }
    }

    pub fn reset(&mut self) {
        *self = PowerShot::Ready;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 60.0;

    fn run(shot: &mut PowerShot, seconds: f64, config: &PowerShotConfig) {
        let steps = (seconds / DT).round() as usize;
        for _ in 0..steps {
            shot.update(DT, config);
        }
    }

    #[test]
    fn activates_only_when_ready() {
        let config = PowerShotConfig::default();
        let mut shot = PowerShot::default();
        assert!(shot.activate(&config));
        assert!(!shot.activate(&config), "cannot re-activate while active");
        assert!(shot.is_active());
    }

    #[test]
    fn full_duration_enters_cooldown() {
        let config = PowerShotConfig::default();
        let mut shot = PowerShot::default();
        shot.activate(&config);
        run(&mut shot, config.duration, &config);
        assert!(!shot.is_active());
        assert!((shot.cooldown_remaining() - config.cooldown).abs() < 1e-6);
        assert!(!shot.activate(&config), "cannot activate during cooldown");
    }

    #[test]
    fn full_cooldown_returns_ready() {
        let config = PowerShotConfig::default();
        let mut shot = PowerShot::default();
        shot.activate(&config);
        run(&mut shot, config.duration, &config);
        run(&mut shot, config.cooldown, &config);
        assert!(shot.is_ready());
        assert!(shot.activate(&config));
    }

    #[test]
    fn single_large_step_reports_transitions() {
        let config = PowerShotConfig::default();
        let mut shot = PowerShot::default();
        shot.activate(&config);
        assert_eq!(
            shot.update(config.duration, &config),
            Some(PowerShotTransition::Expired)
        );
        assert_eq!(
            shot.update(config.cooldown, &config),
            Some(PowerShotTransition::Recharged)
        );
    }

    #[test]
    fn consume_schedules_cooldown() {
        let config = PowerShotConfig::default();
        let mut shot = PowerShot::default();
        assert!(!shot.consume(&config));
        shot.activate(&config);
        assert!(shot.consume(&config));
        assert_eq!(shot.cooldown_remaining(), config.cooldown);
    }

    #[test]
    fn never_active_and_cooling_at_once() {
        let config = PowerShotConfig::default();
        let mut shot = PowerShot::default();
        shot.activate(&config);
        for _ in 0..1000 {
            shot.update(DT, &config);
            assert!(!(shot.is_active() && shot.cooldown_remaining() > 0.0));
            if shot.is_ready() {
                shot.activate(&config);
            }
        }
    }
}

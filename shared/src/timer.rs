/// Cancellable one-shot or periodic alarm, advanced by simulation time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Alarm {
    remaining: Option<f64>,
    period: Option<f64>,
}

impl Alarm {
    pub fn arm_once(&mut self, delay: f64) {
        self.remaining = Some(delay.max(0.0));
        self.period = None;
    }

    /// Fires every `period` seconds, first after one full period.
    pub fn arm_repeating(&mut self, period: f64) {
        self.remaining = Some(period);
        self.period = Some(period);
    }

    pub fn cancel(&mut self) {
        self.remaining = None;
        self.period = None;
    }

    pub fn is_armed(&self) -> bool {
        self.remaining.is_some()
    }

    /// Advance by `dt` and return how many times the alarm fired.
    pub fn advance(&mut self, dt: f64) -> u32 {
        let Some(mut remaining) = self.remaining else {
            return 0;
        };
        remaining -= dt;
        let mut fired = 0;
        while remaining <= 1e-9 {
            fired += 1;
            match self.period {
                Some(period) if period > 0.0 => remaining += period,
                _ => {
                    self.remaining = None;
                    return fired;
                }
            }
        }
        self.remaining = Some(remaining);
        fired
    }
}

/// Every alarm a match owns, so leaving a state can cancel them as a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchTimers {
    pub countdown: Alarm,
    pub serve: Alarm,
}

impl MatchTimers {
    pub fn cancel_all(&mut self) {
        self.countdown.cancel();
        self.serve.cancel();
    }

    pub fn any_armed(&self) -> bool {
        self.countdown.is_armed() || self.serve.is_armed()
    }
}

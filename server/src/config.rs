use std::str::FromStr;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `PINGPONG_LISTEN_ADDR`.
pub const ENV_PREFIX: &str = "PINGPONG_";

/// Who may report a point to a relayed room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreAuthority {
    /// Only the host's reports count; the guest's are dropped.
    HostOnly,
    /// Either peer may report, with no de-duplication.
    AnyPeer,
}

impl FromStr for ScoreAuthority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host-only" => Ok(Self::HostOnly),
            "any-peer" => Ok(Self::AnyPeer),
            other => Err(format!(
                "unknown score authority '{}' (expected host-only or any-peer)",
                other
            )),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub tick_rate_hz: u32,
    /// game-state snapshots per second while a room is playing
    pub broadcast_rate_hz: u32,
    pub win_score: u32,
    pub countdown_from: u32,
    pub countdown_interval: Duration,
    /// Pause between the guest joining and the first countdown tick
    pub start_delay: Duration,
    pub room_idle_timeout: Duration,
    pub sweep_interval: Duration,
    /// Step the ball on the server instead of trusting ball-hit relays
    pub authoritative_physics: bool,
    pub score_authority: ScoreAuthority,
    pub max_message_bytes: usize,
    /// Malformed messages tolerated before the socket is closed
    pub max_parse_errors: u32,
    pub max_connections: usize,
    /// Per-connection outbound queue; a peer that falls this far behind is dropped
    pub outbound_buffer: usize,
    pub rng_seed: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            tick_rate_hz: 60,
            broadcast_rate_hz: 20,
            win_score: 11,
            countdown_from: 3,
            countdown_interval: Duration::from_secs(1),
            start_delay: Duration::from_secs(2),
            room_idle_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            authoritative_physics: false,
            score_authority: ScoreAuthority::HostOnly,
            max_message_bytes: 1024,
            max_parse_errors: 5,
            max_connections: 1000,
            outbound_buffer: 256,
            rng_seed: 42,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `PINGPONG_*` environment variables.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(addr) = var("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        override_parsed(&var, "TICK_RATE_HZ", &mut config.tick_rate_hz)?;
        override_parsed(&var, "BROADCAST_RATE_HZ", &mut config.broadcast_rate_hz)?;
        override_parsed(&var, "WIN_SCORE", &mut config.win_score)?;
        override_parsed(&var, "COUNTDOWN_FROM", &mut config.countdown_from)?;
        override_millis(&var, "COUNTDOWN_INTERVAL_MS", &mut config.countdown_interval)?;
        override_millis(&var, "START_DELAY_MS", &mut config.start_delay)?;
        override_millis(&var, "ROOM_IDLE_TIMEOUT_MS", &mut config.room_idle_timeout)?;
        override_millis(&var, "SWEEP_INTERVAL_MS", &mut config.sweep_interval)?;
        override_parsed(&var, "AUTHORITATIVE_PHYSICS", &mut config.authoritative_physics)?;
        override_parsed(&var, "SCORE_AUTHORITY", &mut config.score_authority)?;
        override_parsed(&var, "MAX_MESSAGE_BYTES", &mut config.max_message_bytes)?;
        override_parsed(&var, "MAX_PARSE_ERRORS", &mut config.max_parse_errors)?;
        override_parsed(&var, "MAX_CONNECTIONS", &mut config.max_connections)?;
        override_parsed(&var, "OUTBOUND_BUFFER", &mut config.outbound_buffer)?;
        override_parsed(&var, "RNG_SEED", &mut config.rng_seed)?;
        Ok(config)
    }

    /// Validate configuration values. Returns an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate_hz == 0 || self.broadcast_rate_hz == 0 {
            return Err("tick_rate_hz and broadcast_rate_hz must be > 0".to_string());
        }
        if self.broadcast_rate_hz > self.tick_rate_hz {
            return Err(format!(
                "broadcast_rate_hz ({}) cannot exceed tick_rate_hz ({})",
                self.broadcast_rate_hz, self.tick_rate_hz
            ));
        }
        if self.win_score == 0 {
            return Err("win_score must be > 0".to_string());
        }
        if self.countdown_interval.is_zero() {
            return Err("countdown_interval must be > 0".to_string());
        }
        if self.room_idle_timeout.is_zero() || self.sweep_interval.is_zero() {
            return Err("room_idle_timeout and sweep_interval must be > 0".to_string());
        }
        if self.max_message_bytes < 64 {
            return Err(format!(
                "max_message_bytes ({}) is too small for any client message",
                self.max_message_bytes
            ));
        }
        if self.max_connections == 0 || self.outbound_buffer == 0 {
            return Err("max_connections and outbound_buffer must be > 0".to_string());
        }
        Ok(())
    }

    pub fn tick_dt(&self) -> f64 {
        1.0 / self.tick_rate_hz as f64
    }

    /// Ticks between two game-state snapshots.
    pub fn broadcast_every_n(&self) -> u64 {
        (self.tick_rate_hz / self.broadcast_rate_hz).max(1) as u64
    }
}

fn override_parsed<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    slot: &mut T,
) -> Result<(), String>
where
    T::Err: std::fmt::Display,
{
    if let Some(raw) = var(name) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| format!("{}{}: {}", ENV_PREFIX, name, e))?;
    }
    Ok(())
}

fn override_millis(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    slot: &mut Duration,
) -> Result<(), String> {
    let mut millis = slot.as_millis() as u64;
    override_parsed(var, name, &mut millis)?;
    *slot = Duration::from_millis(millis);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PINGPONG_LISTEN_ADDR", "127.0.0.1:9100"),
            ("PINGPONG_WIN_SCORE", "5"),
            ("PINGPONG_START_DELAY_MS", "250"),
            ("PINGPONG_AUTHORITATIVE_PHYSICS", "true"),
            ("PINGPONG_SCORE_AUTHORITY", "any-peer"),
        ]))
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9100");
        assert_eq!(config.win_score, 5);
        assert_eq!(config.start_delay, Duration::from_millis(250));
        assert!(config.authoritative_physics);
        assert_eq!(config.score_authority, ScoreAuthority::AnyPeer);
        assert_eq!(config.tick_rate_hz, 60);
    }

    #[test]
    fn bad_env_value_names_the_variable() {
        let err = ServerConfig::from_lookup(lookup(&[("PINGPONG_TICK_RATE_HZ", "fast")]))
            .unwrap_err();
        assert!(err.contains("PINGPONG_TICK_RATE_HZ"), "{}", err);
    }

    #[test]
    fn broadcast_faster_than_tick_is_rejected() {
        let config = ServerConfig {
            broadcast_rate_hz: 120,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn broadcast_divider() {
        let config = ServerConfig::default();
        assert_eq!(config.broadcast_every_n(), 3);
    }
}

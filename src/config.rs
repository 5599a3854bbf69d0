use std::time::Duration;

/// Matchmaking configuration
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Waiting connections required before the countdown starts
    pub min_players: usize,
    /// Maximum participants per match, bots included
    pub max_players: usize,
    /// Countdown length before the reveal phase
    pub countdown: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_players: 8,
            countdown: Duration::from_millis(3000),
        }
    }
}

impl MatchConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(min) = std::env::var("LOBBY_MIN_PLAYERS") {
            if let Ok(parsed) = min.parse::<usize>() {
                if parsed > 0 {
                    config.min_players = parsed;
                } else {
                    tracing::warn!("LOBBY_MIN_PLAYERS must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid LOBBY_MIN_PLAYERS '{}', using default", min);
            }
        }

        if let Ok(max) = std::env::var("LOBBY_MAX_PLAYERS") {
            if let Ok(parsed) = max.parse::<usize>() {
                if parsed > 0 {
                    config.max_players = parsed;
                } else {
                    tracing::warn!("LOBBY_MAX_PLAYERS must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid LOBBY_MAX_PLAYERS '{}', using default", max);
            }
        }

        if config.max_players < config.min_players {
            tracing::warn!(
                "LOBBY_MAX_PLAYERS {} below LOBBY_MIN_PLAYERS {}, raising to match",
                config.max_players,
                config.min_players
            );
            config.max_players = config.min_players;
        }

        if let Ok(ms) = std::env::var("LOBBY_COUNTDOWN_MS") {
            if let Ok(parsed) = ms.parse::<u64>() {
                config.countdown = Duration::from_millis(parsed);
            } else {
                tracing::warn!("Invalid LOBBY_COUNTDOWN_MS '{}', using default", ms);
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.min_players == 0 {
            return Err("min_players must be greater than 0".to_string());
        }
        if self.max_players < self.min_players {
            return Err("max_players must be >= min_players".to_string());
        }
        Ok(())
    }
}

/// Process-level configuration for the soak binary
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for the Prometheus metrics endpoint
    pub metrics_port: u16,
    /// Bot population for the soak arena
    pub bot_count: usize,
    pub match_config: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            bot_count: 4,
            match_config: MatchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();
        config.match_config = MatchConfig::load_or_default();

        if let Ok(port) = std::env::var("METRICS_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                if parsed > 0 {
                    config.metrics_port = parsed;
                } else {
                    tracing::warn!("METRICS_PORT must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid METRICS_PORT '{}', using default", port);
            }
        }

        if let Ok(bots) = std::env::var("BOT_COUNT") {
            if let Ok(parsed) = bots.parse::<usize>() {
                if parsed <= 100 {
                    config.bot_count = parsed;
                } else {
                    tracing::warn!("BOT_COUNT must be 0-100, using default");
                }
            } else {
                tracing::warn!("Invalid BOT_COUNT '{}', using default", bots);
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.metrics_port == 0 {
            return Err("metrics_port must be greater than 0".to_string());
        }
        self.match_config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_players, 4);
        assert_eq!(config.max_players, 8);
        assert_eq!(config.countdown, Duration::from_millis(3000));
    }

    #[test]
    fn test_validation_rejects_inverted_bounds() {
        let config = MatchConfig {
            min_players: 6,
            max_players: 4,
            countdown: Duration::from_secs(3),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_config_default_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
    }
}

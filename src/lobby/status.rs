//! Externally visible match state and the status payload broadcast to
//! connections on every mutation.

use serde::Serialize;

use crate::net::connection::PlayerInfo;

/// Match lifecycle phase. Transitions are owned exclusively by the
/// orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    Idle,
    Countdown,
    Versus,
    Active,
}

impl MatchState {
    /// Numeric encoding used for the `match_state` metrics gauge.
    pub fn as_gauge(self) -> u64 {
        match self {
            MatchState::Idle => 0,
            MatchState::Countdown => 1,
            MatchState::Versus => 2,
            MatchState::Active => 3,
        }
    }
}

/// Snapshot sent to every pooled connection after each state mutation.
#[derive(Debug, Clone, Serialize)]
pub struct MatchStatus {
    pub state: MatchState,
    pub waiting_count: usize,
    /// Live participants including bots.
    pub active_count: usize,
    pub bot_count: usize,
    pub min_players: usize,
    pub max_players: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bet_amount: Option<u64>,
    /// Whole seconds left in the countdown, absent outside of it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown_seconds: Option<u64>,
    pub participants: Vec<PlayerInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_payload_shape() {
        let status = MatchStatus {
            state: MatchState::Countdown,
            waiting_count: 3,
            active_count: 0,
            bot_count: 0,
            min_players: 4,
            max_players: 8,
            bet_amount: Some(50),
            countdown_seconds: Some(2),
            participants: vec![PlayerInfo {
                id: 7,
                name: "ada".to_string(),
                color_id: 3,
            }],
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "countdown");
        assert_eq!(json["waiting_count"], 3);
        assert_eq!(json["bet_amount"], 50);
        assert_eq!(json["countdown_seconds"], 2);
        assert_eq!(json["participants"][0]["name"], "ada");
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let status = MatchStatus {
            state: MatchState::Idle,
            waiting_count: 0,
            active_count: 0,
            bot_count: 0,
            min_players: 4,
            max_players: 8,
            bet_amount: None,
            countdown_seconds: None,
            participants: Vec::new(),
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "idle");
        assert!(json.get("bet_amount").is_none());
        assert!(json.get("countdown_seconds").is_none());
    }

    #[test]
    fn test_gauge_encoding_is_stable() {
        assert_eq!(MatchState::Idle.as_gauge(), 0);
        assert_eq!(MatchState::Countdown.as_gauge(), 1);
        assert_eq!(MatchState::Versus.as_gauge(), 2);
        assert_eq!(MatchState::Active.as_gauge(), 3);
    }
}

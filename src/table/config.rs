//! Table configuration models.

use serde::{Deserialize, Serialize};

use crate::game::entities::TimerSettings;

/// Table ID type
pub type TableId = i64;

/// Table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name
    pub name: String,

    /// Fixed buy-in collected from every player at game start
    pub buy_in: i64,

    /// Timer durations; tests shrink these
    #[serde(default)]
    pub timers: TimerSettings,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "Lily Pad".to_string(),
            buy_in: 100,
            timers: TimerSettings::default(),
        }
    }
}

impl TableConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Table name must not be empty".to_string());
        }
        if self.buy_in <= 0 {
            return Err("Buy-in must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TableConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_buy_in_rejected() {
        let config = TableConfig {
            buy_in: 0,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn timers_round_trip_as_seconds() {
        let json = r#"{
            "name": "Lily Pad",
            "buy_in": 100,
            "timers": {
                "all_pass_advance": 1,
                "trick_linger": 1,
                "draw_vote": 5,
                "forfeit": 15,
                "post_game_reset": 2
            }
        }"#;
        let config: TableConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.timers.draw_vote, std::time::Duration::from_secs(5));
        assert_eq!(config.timers.forfeit, std::time::Duration::from_secs(15));

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["timers"]["draw_vote"], 5);
    }
}

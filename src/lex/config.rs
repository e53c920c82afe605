use serde::{Deserialize, Serialize};

use crate::config::LexEnvConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub session_size: usize,
    pub recent_target: usize,
    pub weak_target: usize,
    pub unseen_target: usize,
    /// Topics attempted within this many days form the recent pool.
    pub recent_window_days: i64,
    /// Topics untouched for this many days count as unseen; misses older
    /// than this are eligible for spaced re-testing.
    pub revisit_horizon_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_size: 20,
            recent_target: 10,
            weak_target: 8,
            unseen_target: 2,
            recent_window_days: 14,
            revisit_horizon_days: 28,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpConfig {
    pub xp_per_level: u64,
    pub easy: u64,
    pub medium: u64,
    pub hard: u64,
    pub unknown: u64,
    pub time_bonus_multiplier: f64,
    /// Correct answers at or under this many seconds earn the bonus.
    pub time_bonus_threshold_secs: u32,
    pub lesson_completed: u64,
    pub homework_completed: u64,
}

impl Default for XpConfig {
    fn default() -> Self {
        Self {
            xp_per_level: 200,
            easy: 10,
            medium: 20,
            hard: 30,
            unknown: 15,
            time_bonus_multiplier: 1.2,
            time_bonus_threshold_secs: 30,
            lesson_completed: 25,
            homework_completed: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryConfig {
    pub cwa_window: usize,
    /// Session accuracy below this marks a topic weak.
    pub weak_below: f64,
    /// Session accuracy above this marks a topic strong.
    pub strong_above: f64,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            cwa_window: 50,
            weak_below: 0.70,
            strong_above: 0.85,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceConfig {
    pub inactive_after_days: i64,
    pub daily_snapshot_size: usize,
    pub leaderboard_window_days: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            inactive_after_days: 3,
            daily_snapshot_size: 50,
            leaderboard_window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexConfig {
    pub session: SessionConfig,
    pub xp: XpConfig,
    pub mastery: MasteryConfig,
    pub maintenance: MaintenanceConfig,
}

impl LexConfig {
    pub fn from_env(env: &LexEnvConfig) -> Self {
        let mut config = Self::default();
        config.session.session_size = env.session_size;
        config.xp.time_bonus_threshold_secs = env.time_bonus_secs;
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "Invalid Lex config from environment, using defaults");
            return Self::default();
        }
        config
    }

    pub fn validate(&self) -> Result<(), String> {
        let s = &self.session;
        if s.session_size == 0 {
            return Err("session_size must be positive".to_string());
        }
        if s.recent_window_days <= 0 || s.revisit_horizon_days <= 0 {
            return Err("session windows must be positive".to_string());
        }
        if self.xp.xp_per_level == 0 {
            return Err("xp_per_level must be positive".to_string());
        }
        if !(self.xp.time_bonus_multiplier >= 1.0) {
            return Err("time_bonus_multiplier must be >= 1.0".to_string());
        }
        let m = &self.mastery;
        if m.cwa_window == 0 {
            return Err("cwa_window must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&m.weak_below)
            || !(0.0..=1.0).contains(&m.strong_above)
            || m.weak_below > m.strong_above
        {
            return Err("weak/strong thresholds must satisfy 0 <= weak <= strong <= 1".to_string());
        }
        if self.maintenance.leaderboard_window_days <= 0 {
            return Err("leaderboard_window_days must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(LexConfig::default().validate().is_ok());
    }

    #[test]
    fn pool_targets_fill_a_session() {
        let s = SessionConfig::default();
        assert_eq!(s.recent_target + s.weak_target + s.unseen_target, s.session_size);
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut cfg = LexConfig::default();
        cfg.mastery.weak_below = 0.9;
        cfg.mastery.strong_above = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = LexConfig::from_env(&LexEnvConfig {
            session_size: 12,
            time_bonus_secs: 45,
        });
        assert_eq!(cfg.session.session_size, 12);
        assert_eq!(cfg.xp.time_bonus_threshold_secs, 45);

        let fallback = LexConfig::from_env(&LexEnvConfig {
            session_size: 0,
            time_bonus_secs: 45,
        });
        assert_eq!(fallback.session.session_size, 20);
    }
}

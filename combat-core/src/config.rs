//! Rule toggles for an encounter.

use serde::{Deserialize, Serialize};

/// Which d20 rolls honor the natural 20 / natural 1 overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NaturalRollPolicy {
    /// Only attack rolls auto-hit on a 20 and auto-miss on a 1.
    #[default]
    AttacksOnly,
    /// Checks and saves also auto-succeed on 20 and auto-fail on 1.
    AllD20Rolls,
}

/// Configuration for the tracker and the action resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CombatConfig {
    pub natural_rolls: NaturalRollPolicy,

    /// Tick `remainingRounds` on effects each time a round completes.
    pub effect_durations: bool,
}

impl CombatConfig {
    pub fn new() -> Self {
        Self {
            natural_rolls: NaturalRollPolicy::AttacksOnly,
            effect_durations: true,
        }
    }

    pub fn with_natural_rolls(mut self, policy: NaturalRollPolicy) -> Self {
        self.natural_rolls = policy;
        self
    }

    pub fn with_effect_durations(mut self, enabled: bool) -> Self {
        self.effect_durations = enabled;
        self
    }

    /// Load from a JSON document; absent fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self::new()
    }
}

//! Engagement policy: randomized pacing so the account does not reply to
//! every match.
//!
//! Two biased coin flips: the first decides between replying and a filler
//! post, the second picks the filler flavour. Callers own the RNG so runs
//! can be reproduced with a fixed seed.

use rand::Rng;

use crate::error::ConfigError;
use crate::pipeline::types::EngagementAction;

/// Default chance of routing a match to the reply track.
pub const DEFAULT_REPLY_PROBABILITY: f64 = 0.25;

/// Default chance, within the filler branch, of a rule reminder.
pub const DEFAULT_RULE_FILLER_PROBABILITY: f64 = 0.75;

/// Tunables for [`EngagementPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    pub reply_probability: f64,
    pub rule_filler_probability: f64,
    /// Chance, within the filler branch, of staying silent instead.
    pub silence_probability: f64,
    /// When false the filler branch always yields `Skip`.
    pub fillers_enabled: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            reply_probability: DEFAULT_REPLY_PROBABILITY,
            rule_filler_probability: DEFAULT_RULE_FILLER_PROBABILITY,
            silence_probability: 0.0,
            fillers_enabled: true,
        }
    }
}

/// Decision tree over {Reply, FillerFromRule, FillerFriendly, Skip}.
#[derive(Debug, Clone)]
pub struct EngagementPolicy {
    config: PolicyConfig,
}

impl EngagementPolicy {
    /// Validates that every probability lies in `[0, 1]`.
    pub fn new(config: PolicyConfig) -> Result<Self, ConfigError> {
        for (key, value) in [
            ("reply_probability", config.reply_probability),
            ("rule_filler_probability", config.rule_filler_probability),
            ("silence_probability", config.silence_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("{value} is not a probability"),
                });
            }
        }
        Ok(Self { config })
    }

    pub fn decide<R: Rng + ?Sized>(&self, rng: &mut R) -> EngagementAction {
        if rng.gen_bool(self.config.reply_probability) {
            return EngagementAction::Reply;
        }
        if !self.config.fillers_enabled || rng.gen_bool(self.config.silence_probability) {
            return EngagementAction::Skip;
        }
        if rng.gen_bool(self.config.rule_filler_probability) {
            EngagementAction::FillerFromRule
        } else {
            EngagementAction::FillerFriendly
        }
    }
}

impl Default for EngagementPolicy {
    fn default() -> Self {
        Self {
            config: PolicyConfig::default(),
        }
    }
}

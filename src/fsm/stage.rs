//! Dialogue stages — the persisted tag that selects a handler.

use serde::{Deserialize, Serialize};

/// The stage a user's conversation is in.
///
/// Tags are persisted as plain strings and must stay stable across
/// restarts. The profiling flow progresses linearly:
/// Initial → AwaitingInput → RegistrationStart → … → RegistrationComplete →
/// ProfilingPsychology → ProfileReady. Chat, Recommendation and Subscription
/// are reached from ProfileReady (or directly) via button presses and loop
/// on themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Initial,
    AwaitingInput,
    RegistrationStart,
    RegistrationBirthDate,
    RegistrationBirthTime,
    RegistrationBirthPlace,
    RegistrationAge,
    RegistrationComplete,
    ProfilingPsychology,
    ProfileReady,
    Chat,
    Recommendation,
    Subscription,
}

impl Stage {
    pub const ALL: [Stage; 13] = [
        Stage::Initial,
        Stage::AwaitingInput,
        Stage::RegistrationStart,
        Stage::RegistrationBirthDate,
        Stage::RegistrationBirthTime,
        Stage::RegistrationBirthPlace,
        Stage::RegistrationAge,
        Stage::RegistrationComplete,
        Stage::ProfilingPsychology,
        Stage::ProfileReady,
        Stage::Chat,
        Stage::Recommendation,
        Stage::Subscription,
    ];

    /// The persisted string tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "INITIAL",
            Stage::AwaitingInput => "AWAITING_INPUT",
            Stage::RegistrationStart => "REGISTRATION_START",
            Stage::RegistrationBirthDate => "REGISTRATION_BIRTH_DATE",
            Stage::RegistrationBirthTime => "REGISTRATION_BIRTH_TIME",
            Stage::RegistrationBirthPlace => "REGISTRATION_BIRTH_PLACE",
            Stage::RegistrationAge => "REGISTRATION_AGE",
            Stage::RegistrationComplete => "REGISTRATION_COMPLETE",
            Stage::ProfilingPsychology => "PROFILING_PSYCHOLOGY",
            Stage::ProfileReady => "PROFILE_READY",
            Stage::Chat => "CHAT",
            Stage::Recommendation => "RECOMMENDATION",
            Stage::Subscription => "SUBSCRIPTION",
        }
    }

    /// Whether this is one of the registration sub-stages (one handler
    /// serves them all).
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            Stage::RegistrationStart
                | Stage::RegistrationBirthDate
                | Stage::RegistrationBirthTime
                | Stage::RegistrationBirthPlace
                | Stage::RegistrationAge
                | Stage::RegistrationComplete
        )
    }

    /// Legal successor stages.
    ///
    /// Transitions are handler-initiated, not enforced centrally; this table
    /// is the enumerable record of which edges handlers are allowed to take.
    /// An empty slice marks a self-looping stage that never transitions on
    /// its own — it is left via dispatcher navigation, not handler code.
    pub fn successors(&self) -> &'static [Stage] {
        match self {
            Stage::Initial => &[Stage::AwaitingInput],
            Stage::AwaitingInput => &[Stage::RegistrationStart],
            Stage::RegistrationStart => &[Stage::RegistrationBirthDate],
            Stage::RegistrationBirthDate => &[Stage::RegistrationBirthTime],
            Stage::RegistrationBirthTime => &[Stage::RegistrationBirthPlace],
            Stage::RegistrationBirthPlace => &[Stage::RegistrationAge],
            Stage::RegistrationAge => &[Stage::RegistrationComplete],
            Stage::RegistrationComplete => &[Stage::ProfilingPsychology],
            Stage::ProfilingPsychology => &[Stage::ProfileReady],
            Stage::ProfileReady => &[Stage::Chat, Stage::Recommendation, Stage::Subscription],
            Stage::Chat => &[],
            Stage::Recommendation => &[],
            Stage::Subscription => &[],
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::Initial
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .find(|stage| stage.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

/// A persisted tag that does not match any known stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStage(pub String);

impl std::fmt::Display for UnknownStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown stage tag: {}", self.0)
    }
}

impl std::error::Error for UnknownStage {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn tags_round_trip() {
        for stage in Stage::ALL {
            let parsed = Stage::from_str(stage.as_str()).unwrap();
            assert_eq!(parsed, stage);
        }
    }

    #[test]
    fn display_matches_serde() {
        for stage in Stage::ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{stage}\""), "tag mismatch for {stage:?}");
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(Stage::from_str("REGISTRATION").is_err());
        assert!(Stage::from_str("").is_err());
        assert!(Stage::from_str("initial").is_err());
    }

    #[test]
    fn linear_profiling_edges() {
        let expected = [
            (Stage::Initial, Stage::AwaitingInput),
            (Stage::AwaitingInput, Stage::RegistrationStart),
            (Stage::RegistrationStart, Stage::RegistrationBirthDate),
            (Stage::RegistrationBirthDate, Stage::RegistrationBirthTime),
            (Stage::RegistrationBirthTime, Stage::RegistrationBirthPlace),
            (Stage::RegistrationBirthPlace, Stage::RegistrationAge),
            (Stage::RegistrationAge, Stage::RegistrationComplete),
            (Stage::RegistrationComplete, Stage::ProfilingPsychology),
            (Stage::ProfilingPsychology, Stage::ProfileReady),
        ];
        for (from, to) in expected {
            assert_eq!(from.successors(), &[to], "edge from {from}");
        }
    }

    #[test]
    fn steady_state_stages_have_no_edges() {
        for stage in [Stage::Chat, Stage::Recommendation, Stage::Subscription] {
            assert!(stage.successors().is_empty(), "{stage} should self-loop");
        }
    }

    #[test]
    fn profile_ready_fans_out() {
        let succ = Stage::ProfileReady.successors();
        assert!(succ.contains(&Stage::Chat));
        assert!(succ.contains(&Stage::Recommendation));
        assert!(succ.contains(&Stage::Subscription));
    }

    #[test]
    fn registration_family() {
        assert!(Stage::RegistrationStart.is_registration());
        assert!(Stage::RegistrationComplete.is_registration());
        assert!(!Stage::ProfilingPsychology.is_registration());
        assert!(!Stage::Initial.is_registration());
    }
}

//! Compliance Evaluation
//!
//! Each bonded entity judges the player's recent behavior against its policy.
//! Policies are a closed set: the declared [`PolicySpec`] is validated into a
//! [`CompliancePolicy`] when the descriptor is built, and one
//! [`ComplianceEvaluator`] per active bond holds the matching state machine.
//!
//! Input arrives as player actions and damage taken; every evaluation returns a
//! [`Verdict`]. Punishments caused by individual actions (a broken rhythm, an
//! impatient move) are collected and delivered by the next evaluation, at most
//! one punishment per evaluation.

use serde::{Deserialize, Serialize};

use bond_events::EntityId;

use crate::components::player::PlayerActionEvent;
use crate::config::{ComplianceConfig, TierProfile};
use crate::error::{BondError, BondResult};

/// Declared policy kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Wants constant action
    Aggressive,
    /// Wants restraint
    Passive,
    /// Wants actions on a steady beat
    Rhythmic,
    /// Wants long stillness after any hasty move
    Patient,
    /// Wants the player to take damage
    Sacrificial,
    /// Always satisfied
    #[default]
    Unconditional,
}

/// Policy as declared in a catalog; parameters are optional until validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySpec {
    pub kind: PolicyKind,
    pub hesitation_threshold: Option<f32>,
    pub aggression_threshold: Option<f32>,
    pub expected_window: Option<f32>,
    pub tolerance: Option<f32>,
    pub action_cooldown: Option<f32>,
    pub stillness_threshold: Option<f32>,
    pub interval: Option<f32>,
    pub minimum_sacrifice: Option<f32>,
    pub punish_damage: Option<f32>,
}

impl PolicySpec {
    /// A spec of the given kind with no parameters set.
    pub fn of(kind: PolicyKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn aggressive(hesitation_threshold: f32, punish_damage: f32) -> Self {
        Self {
            hesitation_threshold: Some(hesitation_threshold),
            punish_damage: Some(punish_damage),
            ..Self::of(PolicyKind::Aggressive)
        }
    }

    pub fn passive(aggression_threshold: f32, punish_damage: f32) -> Self {
        Self {
            aggression_threshold: Some(aggression_threshold),
            punish_damage: Some(punish_damage),
            ..Self::of(PolicyKind::Passive)
        }
    }

    pub fn rhythmic(expected_window: f32, tolerance: f32, punish_damage: f32) -> Self {
        Self {
            expected_window: Some(expected_window),
            tolerance: Some(tolerance),
            punish_damage: Some(punish_damage),
            ..Self::of(PolicyKind::Rhythmic)
        }
    }

    pub fn patient(action_cooldown: f32, stillness_threshold: f32, punish_damage: f32) -> Self {
        Self {
            action_cooldown: Some(action_cooldown),
            stillness_threshold: Some(stillness_threshold),
            punish_damage: Some(punish_damage),
            ..Self::of(PolicyKind::Patient)
        }
    }

    pub fn sacrificial(interval: f32, minimum_sacrifice: f32, punish_damage: f32) -> Self {
        Self {
            interval: Some(interval),
            minimum_sacrifice: Some(minimum_sacrifice),
            punish_damage: Some(punish_damage),
            ..Self::of(PolicyKind::Sacrificial)
        }
    }
}

/// Validated policy with every parameter present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompliancePolicy {
    Aggressive {
        hesitation_threshold: f32,
        damage: f32,
    },
    Passive {
        aggression_threshold: f32,
        damage: f32,
    },
    Rhythmic {
        expected_window: f32,
        tolerance: f32,
        damage: f32,
    },
    Patient {
        action_cooldown: f32,
        stillness_threshold: f32,
        damage: f32,
    },
    Sacrificial {
        interval: f32,
        minimum_sacrifice: f32,
        damage: f32,
    },
    Unconditional,
}

impl CompliancePolicy {
    /// Validates a declared spec.
    pub fn from_spec(entity_id: &EntityId, spec: &PolicySpec) -> BondResult<Self> {
        let kind = spec.kind;
        let require = |value: Option<f32>, name: &str, allow_zero: bool| -> BondResult<f32> {
            let misconfigured = |reason: String| BondError::PolicyMisconfiguration {
                entity_id: entity_id.clone(),
                reason,
            };
            let value = value.ok_or_else(|| {
                misconfigured(format!("{:?} policy requires {}", kind, name))
            })?;
            let valid = if allow_zero { value >= 0.0 } else { value > 0.0 };
            if valid && value.is_finite() {
                Ok(value)
            } else {
                Err(misconfigured(format!(
                    "{:?} policy has invalid {} = {}",
                    kind, name, value
                )))
            }
        };

        let policy = match kind {
            PolicyKind::Aggressive => CompliancePolicy::Aggressive {
                hesitation_threshold: require(spec.hesitation_threshold, "hesitation_threshold", false)?,
                damage: require(spec.punish_damage, "punish_damage", true)?,
            },
            PolicyKind::Passive => CompliancePolicy::Passive {
                aggression_threshold: require(spec.aggression_threshold, "aggression_threshold", false)?,
                damage: require(spec.punish_damage, "punish_damage", true)?,
            },
            PolicyKind::Rhythmic => CompliancePolicy::Rhythmic {
                expected_window: require(spec.expected_window, "expected_window", false)?,
                tolerance: require(spec.tolerance, "tolerance", true)?,
                damage: require(spec.punish_damage, "punish_damage", true)?,
            },
            PolicyKind::Patient => CompliancePolicy::Patient {
                action_cooldown: require(spec.action_cooldown, "action_cooldown", false)?,
                stillness_threshold: require(spec.stillness_threshold, "stillness_threshold", false)?,
                damage: require(spec.punish_damage, "punish_damage", true)?,
            },
            PolicyKind::Sacrificial => CompliancePolicy::Sacrificial {
                interval: require(spec.interval, "interval", false)?,
                minimum_sacrifice: require(spec.minimum_sacrifice, "minimum_sacrifice", false)?,
                damage: require(spec.punish_damage, "punish_damage", true)?,
            },
            PolicyKind::Unconditional => CompliancePolicy::Unconditional,
        };
        Ok(policy)
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            CompliancePolicy::Aggressive { .. } => PolicyKind::Aggressive,
            CompliancePolicy::Passive { .. } => PolicyKind::Passive,
            CompliancePolicy::Rhythmic { .. } => PolicyKind::Rhythmic,
            CompliancePolicy::Patient { .. } => PolicyKind::Patient,
            CompliancePolicy::Sacrificial { .. } => PolicyKind::Sacrificial,
            CompliancePolicy::Unconditional => PolicyKind::Unconditional,
        }
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub compliant: bool,
    /// Damage to deal to the player, already scaled for the tier
    pub punish: Option<f32>,
}

impl Verdict {
    pub fn compliant() -> Self {
        Self {
            compliant: true,
            punish: None,
        }
    }
}

/// Per-policy mutable state.
#[derive(Debug, Clone, PartialEq)]
enum PolicyState {
    Aggressive {
        last_action: f32,
        last_punish: Option<f32>,
    },
    Passive {
        last_action: Option<f32>,
        last_punish: Option<f32>,
    },
    Rhythmic {
        last_action: Option<f32>,
        /// Start of the current silence; a penalty re-arms it
        silence_anchor: f32,
        streak: u32,
        in_rhythm: bool,
        pending_misses: u32,
    },
    Patient {
        last_action: f32,
        last_violation: Option<f32>,
        pending_violations: u32,
    },
    Sacrificial {
        interval_start: f32,
        accumulated: f32,
        satisfied: bool,
    },
    Unconditional,
}

impl PolicyState {
    fn initial(policy: &CompliancePolicy, now: f32) -> Self {
        match policy {
            // The bond itself counts as the opening move.
            CompliancePolicy::Aggressive { .. } => PolicyState::Aggressive {
                last_action: now,
                last_punish: None,
            },
            CompliancePolicy::Passive { .. } => PolicyState::Passive {
                last_action: None,
                last_punish: None,
            },
            CompliancePolicy::Rhythmic { .. } => PolicyState::Rhythmic {
                last_action: None,
                silence_anchor: now,
                streak: 0,
                in_rhythm: true,
                pending_misses: 0,
            },
            CompliancePolicy::Patient { .. } => PolicyState::Patient {
                last_action: now,
                last_violation: None,
                pending_violations: 0,
            },
            CompliancePolicy::Sacrificial { .. } => PolicyState::Sacrificial {
                interval_start: now,
                accumulated: 0.0,
                satisfied: true,
            },
            CompliancePolicy::Unconditional => PolicyState::Unconditional,
        }
    }
}

/// Compliance state machine for one active bond.
#[derive(Debug, Clone)]
pub struct ComplianceEvaluator {
    policy: CompliancePolicy,
    state: PolicyState,
    punishment_scale: f32,
    /// 0 evaluates on every call
    check_interval: f32,
    next_check: f32,
    passive_cooldown: f32,
    compliant: bool,
}

impl ComplianceEvaluator {
    pub fn new(
        policy: CompliancePolicy,
        profile: &TierProfile,
        config: &ComplianceConfig,
        now: f32,
    ) -> Self {
        let policy = if profile.unconditional_compliance {
            CompliancePolicy::Unconditional
        } else {
            policy
        };
        let check_interval = profile.compliance_check_interval.max(0.0);
        Self {
            state: PolicyState::initial(&policy, now),
            policy,
            punishment_scale: profile.punishment_scale,
            check_interval,
            next_check: now + check_interval,
            passive_cooldown: config.passive_punish_cooldown,
            compliant: true,
        }
    }

    pub fn policy(&self) -> &CompliancePolicy {
        &self.policy
    }

    /// Last verdict's compliance flag.
    pub fn is_compliant(&self) -> bool {
        self.compliant
    }

    /// Current streak of on-beat actions (Rhythmic only).
    pub fn streak(&self) -> u32 {
        match self.state {
            PolicyState::Rhythmic { streak, .. } => streak,
            _ => 0,
        }
    }

    /// Feeds one player action. Actions must arrive in timestamp order.
    pub fn observe_action(&mut self, action: PlayerActionEvent) {
        let t = action.timestamp;
        match (&self.policy, &mut self.state) {
            (CompliancePolicy::Aggressive { .. }, PolicyState::Aggressive { last_action, last_punish }) => {
                *last_action = t;
                *last_punish = None;
            }
            (CompliancePolicy::Passive { .. }, PolicyState::Passive { last_action, .. }) => {
                *last_action = Some(t);
            }
            (
                CompliancePolicy::Rhythmic { expected_window, tolerance, .. },
                PolicyState::Rhythmic { last_action, silence_anchor, streak, in_rhythm, pending_misses },
            ) => {
                if let Some(previous) = *last_action {
                    let interval = t - previous;
                    if (interval - expected_window).abs() <= *tolerance {
                        *streak += 1;
                        *in_rhythm = true;
                    } else {
                        *streak = 0;
                        *in_rhythm = false;
                        *pending_misses += 1;
                    }
                }
                *last_action = Some(t);
                *silence_anchor = t;
            }
            (
                CompliancePolicy::Patient { action_cooldown, .. },
                PolicyState::Patient { last_action, last_violation, pending_violations },
            ) => {
                if t - *last_action < *action_cooldown {
                    *last_violation = Some(t);
                    *pending_violations += 1;
                }
                *last_action = t;
            }
            _ => {}
        }
    }

    /// Feeds damage the player took from any source other than this policy.
    pub fn observe_damage(&mut self, amount: f32) {
        if let PolicyState::Sacrificial { accumulated, .. } = &mut self.state {
            *accumulated += amount.max(0.0);
        }
    }

    /// Judges compliance at `now`.
    ///
    /// Tiers with a check interval only judge when the interval has elapsed and
    /// otherwise return the previous flag without punishment.
    pub fn evaluate(&mut self, now: f32) -> Verdict {
        if self.check_interval > 0.0 {
            if now < self.next_check {
                return Verdict {
                    compliant: self.compliant,
                    punish: None,
                };
            }
            while self.next_check <= now {
                self.next_check += self.check_interval;
            }
        }

        let verdict = self.judge(now);
        self.compliant = verdict.compliant;
        Verdict {
            compliant: verdict.compliant,
            punish: verdict.punish.map(|d| d * self.punishment_scale),
        }
    }

    fn judge(&mut self, now: f32) -> Verdict {
        let passive_cooldown = self.passive_cooldown;
        match (&self.policy, &mut self.state) {
            (
                CompliancePolicy::Aggressive { hesitation_threshold, damage },
                PolicyState::Aggressive { last_action, last_punish },
            ) => {
                if now - *last_action <= *hesitation_threshold {
                    return Verdict::compliant();
                }
                // One punishment per full hesitation window of inactivity.
                let due = last_punish.map_or(true, |p| now - p >= *hesitation_threshold);
                if due {
                    *last_punish = Some(now);
                }
                Verdict {
                    compliant: false,
                    punish: due.then_some(*damage),
                }
            }
            (
                CompliancePolicy::Passive { aggression_threshold, damage },
                PolicyState::Passive { last_action, last_punish },
            ) => {
                let calm = last_action.map_or(true, |t| now - t >= *aggression_threshold);
                if calm {
                    return Verdict::compliant();
                }
                let due = last_punish.map_or(true, |p| now - p >= passive_cooldown);
                if due {
                    *last_punish = Some(now);
                }
                Verdict {
                    compliant: false,
                    punish: due.then_some(*damage),
                }
            }
            (
                CompliancePolicy::Rhythmic { expected_window, tolerance, damage },
                PolicyState::Rhythmic { silence_anchor, streak, in_rhythm, pending_misses, .. },
            ) => {
                if now - *silence_anchor > expected_window + 2.0 * tolerance {
                    *streak = 0;
                    *in_rhythm = false;
                    *pending_misses += 1;
                    *silence_anchor = now;
                }
                if *pending_misses > 0 {
                    *pending_misses = 0;
                    return Verdict {
                        compliant: false,
                        punish: Some(*damage),
                    };
                }
                Verdict {
                    compliant: *in_rhythm,
                    punish: None,
                }
            }
            (
                CompliancePolicy::Patient { stillness_threshold, damage, .. },
                PolicyState::Patient { last_violation, pending_violations, .. },
            ) => {
                if *pending_violations > 0 {
                    *pending_violations = 0;
                    return Verdict {
                        compliant: false,
                        punish: Some(*damage),
                    };
                }
                let still = last_violation.map_or(true, |v| now - v >= *stillness_threshold);
                Verdict {
                    compliant: still,
                    punish: None,
                }
            }
            (
                CompliancePolicy::Sacrificial { interval, minimum_sacrifice, damage },
                PolicyState::Sacrificial { interval_start, accumulated, satisfied },
            ) => {
                let mut punish = None;
                while now >= *interval_start + *interval {
                    if *accumulated < *minimum_sacrifice {
                        *satisfied = false;
                        punish = Some(*damage);
                    } else {
                        *satisfied = true;
                    }
                    *accumulated = 0.0;
                    *interval_start += *interval;
                }
                Verdict {
                    compliant: *satisfied,
                    punish,
                }
            }
            _ => Verdict::compliant(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierProfile;

    fn evaluator(spec: PolicySpec, profile: TierProfile) -> ComplianceEvaluator {
        let policy = CompliancePolicy::from_spec(&EntityId::from("test"), &spec).unwrap();
        ComplianceEvaluator::new(policy, &profile, &ComplianceConfig::default(), 0.0)
    }

    fn act(eval: &mut ComplianceEvaluator, t: f32) {
        eval.observe_action(PlayerActionEvent { timestamp: t });
    }

    #[test]
    fn test_missing_parameters_are_misconfiguration() {
        let id = EntityId::from("tide_caller");
        let spec = PolicySpec {
            tolerance: Some(0.2),
            punish_damage: Some(1.0),
            ..PolicySpec::of(PolicyKind::Rhythmic)
        };
        let err = CompliancePolicy::from_spec(&id, &spec).unwrap_err();
        assert!(matches!(err, BondError::PolicyMisconfiguration { .. }));
        assert!(err.to_string().contains("expected_window"));

        let negative = PolicySpec::aggressive(-1.0, 2.0);
        assert!(CompliancePolicy::from_spec(&id, &negative).is_err());

        assert_eq!(
            CompliancePolicy::from_spec(&id, &PolicySpec::default()).unwrap(),
            CompliancePolicy::Unconditional
        );
    }

    #[test]
    fn test_aggressive_hesitation() {
        let mut eval = evaluator(PolicySpec::aggressive(2.0, 5.0), TierProfile::primary());

        assert_eq!(eval.evaluate(1.5), Verdict::compliant());

        let late = eval.evaluate(2.5);
        assert!(!late.compliant);
        assert_eq!(late.punish, Some(5.0));

        // Still hesitating but inside the same window: no extra punishment
        let again = eval.evaluate(3.0);
        assert!(!again.compliant);
        assert_eq!(again.punish, None);

        act(&mut eval, 3.1);
        assert!(eval.evaluate(3.5).compliant);
    }

    #[test]
    fn test_passive_punishment_is_rate_limited() {
        let mut eval = evaluator(PolicySpec::passive(2.0, 3.0), TierProfile::primary());
        assert!(eval.evaluate(0.1).compliant);

        act(&mut eval, 1.0);
        assert_eq!(eval.evaluate(1.0).punish, Some(3.0));
        act(&mut eval, 1.2);
        let spam = eval.evaluate(1.5);
        assert!(!spam.compliant);
        assert_eq!(spam.punish, None);
        assert_eq!(eval.evaluate(2.0).punish, Some(3.0));

        // Two seconds of calm since the last action
        assert!(eval.evaluate(3.5).compliant);
    }

    #[test]
    fn test_rhythmic_streak_and_miss() {
        let mut eval = evaluator(PolicySpec::rhythmic(1.0, 0.2, 4.0), TierProfile::primary());

        act(&mut eval, 0.5);
        act(&mut eval, 1.5);
        act(&mut eval, 2.4);
        assert_eq!(eval.streak(), 2);
        assert_eq!(eval.evaluate(2.5), Verdict::compliant());

        act(&mut eval, 2.6);
        assert_eq!(eval.streak(), 0);
        let miss = eval.evaluate(2.6);
        assert!(!miss.compliant);
        assert_eq!(miss.punish, Some(4.0));

        act(&mut eval, 3.6);
        assert!(eval.evaluate(3.6).compliant);
        assert_eq!(eval.streak(), 1);
    }

    #[test]
    fn test_rhythmic_silence_penalty() {
        let mut eval = evaluator(PolicySpec::rhythmic(1.0, 0.2, 4.0), TierProfile::primary());
        act(&mut eval, 0.5);
        act(&mut eval, 1.5);
        assert_eq!(eval.streak(), 1);

        // Window + 2 * tolerance = 1.4s of silence allowed
        assert!(eval.evaluate(2.8).compliant);
        let silent = eval.evaluate(3.0);
        assert_eq!(silent.punish, Some(4.0));
        assert_eq!(eval.streak(), 0);

        // Re-armed: no second penalty until another full silence period
        assert_eq!(eval.evaluate(3.5).punish, None);
        assert_eq!(eval.evaluate(4.5).punish, Some(4.0));
    }

    #[test]
    fn test_patient_hysteresis() {
        let mut eval = evaluator(PolicySpec::patient(2.0, 3.0, 6.0), TierProfile::primary());

        act(&mut eval, 2.5);
        assert!(eval.evaluate(2.5).compliant);

        act(&mut eval, 3.0);
        let hasty = eval.evaluate(3.0);
        assert!(!hasty.compliant);
        assert_eq!(hasty.punish, Some(6.0));

        // Not yet still long enough
        let waiting = eval.evaluate(5.5);
        assert!(!waiting.compliant);
        assert_eq!(waiting.punish, None);

        assert!(eval.evaluate(6.0).compliant);
    }

    #[test]
    fn test_sacrificial_interval_boundaries() {
        let mut eval = evaluator(PolicySpec::sacrificial(5.0, 10.0, 2.0), TierProfile::primary());

        eval.observe_damage(4.0);
        assert!(eval.evaluate(4.9).compliant);
        let short = eval.evaluate(5.0);
        assert!(!short.compliant);
        assert_eq!(short.punish, Some(2.0));

        eval.observe_damage(12.0);
        let paid = eval.evaluate(10.0);
        assert!(paid.compliant);
        assert_eq!(paid.punish, None);
    }

    #[test]
    fn test_descendant_checks_on_cadence_with_scaled_damage() {
        let mut eval = evaluator(PolicySpec::passive(2.0, 4.0), TierProfile::descendant());

        act(&mut eval, 0.2);
        // Between checks the previous flag is held without punishment
        assert_eq!(eval.evaluate(0.5), Verdict::compliant());

        let checked = eval.evaluate(1.0);
        assert!(!checked.compliant);
        assert_eq!(checked.punish, Some(2.0));

        assert!(!eval.evaluate(1.5).compliant);
        assert!(eval.evaluate(2.3).compliant);
    }

    #[test]
    fn test_junior_is_always_unconditional() {
        let mut eval = evaluator(PolicySpec::aggressive(0.1, 50.0), TierProfile::junior());
        assert_eq!(eval.policy().kind(), PolicyKind::Unconditional);
        act(&mut eval, 0.0);
        assert_eq!(eval.evaluate(100.0), Verdict::compliant());
    }
}

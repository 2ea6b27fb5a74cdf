//! Action resolution.
//!
//! An [`Action`] names an actor and one kind of d20 roll: an attack, a
//! skill check, an ability check or a saving throw. Each kind carries only
//! the configuration that makes sense for it. The [`ActionResolver`] turns
//! an action into an [`ActionOutcome`]:
//!
//! 1. Roll the base d20 (twice under advantage or disadvantage)
//! 2. Add the caller-supplied ability modifier and proficiency bonus
//! 3. Add every active effect on the actor whose target matches the roll,
//!    rolling dice for dice-based effects
//! 4. For attacks, compare against the target's armor class, with natural
//!    20 always hitting and natural 1 always missing
//!
//! Every contribution is kept as a [`ModifierTerm`] so the result can be
//! shown line by line.

use crate::abilities::{Ability, Skill};
use crate::combatant::{Combatant, CombatantId};
use crate::config::{CombatConfig, NaturalRollPolicy};
use crate::dice::{
    Advantage, D20Roll, DiceError, DiceRoll, DiceRoller, DiceSource, DiceSpec, MAX_DICE,
};
use crate::modifier::{ModifierSource, ModifierTerm, RollCategory};
use crate::tracker::{InitiativeTracker, TrackerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Errors from building or resolving an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Invalid action configuration: {0}")]
    InvalidActionConfig(String),

    #[error("Attack by '{0}' has no target")]
    MissingTarget(CombatantId),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Dice(#[from] DiceError),
}

/// The weapon used for an attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    /// Damage dice rolled on a hit, if the caller wants damage resolved too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<DiceSpec>,
}

impl Weapon {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            damage: None,
        }
    }

    pub fn with_damage(mut self, damage: DiceSpec) -> Self {
        self.damage = Some(damage);
        self
    }
}

/// What kind of roll an action makes, with its kind-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionKind {
    Attack { weapon: Weapon },
    SkillCheck { skill: Skill },
    AbilityCheck { ability: Ability },
    SavingThrow { ability: Ability },
}

impl ActionKind {
    pub fn category(&self) -> RollCategory {
        match self {
            ActionKind::Attack { .. } => RollCategory::Attack,
            ActionKind::SkillCheck { skill } => RollCategory::SkillCheck { skill: *skill },
            ActionKind::AbilityCheck { ability } => RollCategory::AbilityCheck { ability: *ability },
            ActionKind::SavingThrow { ability } => RollCategory::SavingThrow { ability: *ability },
        }
    }

    fn ability_label(&self) -> String {
        match self {
            ActionKind::Attack { .. } => "Ability modifier".to_string(),
            ActionKind::SkillCheck { skill } => format!("{} modifier", skill.ability().name()),
            ActionKind::AbilityCheck { ability } | ActionKind::SavingThrow { ability } => {
                format!("{} modifier", ability.name())
            }
        }
    }
}

/// One discrete action to resolve.
///
/// Ability modifiers and proficiency come from the character sheet and are
/// passed in already computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub actor: CombatantId,
    pub kind: ActionKind,
    #[serde(default)]
    pub ability_modifier: i32,
    #[serde(default)]
    pub proficiency_bonus: i32,
    #[serde(default)]
    pub advantage: Advantage,
}

impl Action {
    pub fn new(actor: impl Into<CombatantId>, kind: ActionKind) -> Self {
        Self {
            actor: actor.into(),
            kind,
            ability_modifier: 0,
            proficiency_bonus: 0,
            advantage: Advantage::Normal,
        }
    }

    pub fn attack(actor: impl Into<CombatantId>, weapon: Weapon) -> Self {
        Self::new(actor, ActionKind::Attack { weapon })
    }

    pub fn skill_check(actor: impl Into<CombatantId>, skill: Skill) -> Self {
        Self::new(actor, ActionKind::SkillCheck { skill })
    }

    pub fn ability_check(actor: impl Into<CombatantId>, ability: Ability) -> Self {
        Self::new(actor, ActionKind::AbilityCheck { ability })
    }

    pub fn saving_throw(actor: impl Into<CombatantId>, ability: Ability) -> Self {
        Self::new(actor, ActionKind::SavingThrow { ability })
    }

    pub fn with_ability_modifier(mut self, modifier: i32) -> Self {
        self.ability_modifier = modifier;
        self
    }

    pub fn with_proficiency_bonus(mut self, bonus: i32) -> Self {
        self.proficiency_bonus = bonus;
        self
    }

    pub fn with_advantage(mut self, advantage: Advantage) -> Self {
        self.advantage = advantage;
        self
    }

    pub fn category(&self) -> RollCategory {
        self.kind.category()
    }

    pub fn requires_target(&self) -> bool {
        matches!(self.kind, ActionKind::Attack { .. })
    }

    /// Check what the type system can't: an attack must name its weapon.
    pub fn validate(&self) -> Result<(), ActionError> {
        if let ActionKind::Attack { weapon } = &self.kind {
            if weapon.name.trim().is_empty() {
                return Err(ActionError::InvalidActionConfig(
                    "attack needs a weapon name".to_string(),
                ));
            }
            if let Some(dice) = weapon.damage {
                DiceSpec::new(dice.count, dice.sides)?;
            }
        }
        Ok(())
    }
}

/// Damage rolled for a successful attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRoll {
    pub dice: DiceRoll,
    pub modifier: i32,
    /// Dice total plus modifier, never below zero.
    pub total: u32,
    pub critical: bool,
}

/// A resolved action with its full audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub actor: CombatantId,
    pub category: RollCategory,
    pub d20: D20Roll,
    pub terms: Vec<ModifierTerm>,
    pub total: i32,
    pub target: Option<CombatantId>,
    pub target_ac: Option<i32>,
    /// Whether natural 20 / natural 1 override the comparison for this roll.
    pub natural_overrides: bool,
    pub damage: Option<DamageRoll>,
}

impl ActionOutcome {
    /// The kept d20 face.
    pub fn base_roll(&self) -> u32 {
        self.d20.kept
    }

    pub fn modifier_total(&self) -> i32 {
        self.terms.iter().map(|t| t.value).fold(0, i32::saturating_add)
    }

    pub fn is_critical(&self) -> bool {
        self.natural_overrides && self.d20.is_natural_20()
    }

    pub fn is_fumble(&self) -> bool {
        self.natural_overrides && self.d20.is_natural_1()
    }

    /// Compare against an armor class. Natural 20 always hits and natural 1
    /// always misses, checked before the comparison.
    pub fn did_hit(&self, armor_class: i32) -> bool {
        self.beats(armor_class)
    }

    /// Hit or miss against the resolved target, if it had an armor class.
    pub fn hit(&self) -> Option<bool> {
        if self.category != RollCategory::Attack {
            return None;
        }
        self.target_ac.map(|ac| self.did_hit(ac))
    }

    /// Compare a check or save against a difficulty class.
    pub fn meets_dc(&self, dc: i32) -> bool {
        self.beats(dc)
    }

    fn beats(&self, threshold: i32) -> bool {
        if self.is_critical() {
            return true;
        }
        if self.is_fumble() {
            return false;
        }
        self.total >= threshold
    }

    /// One-line breakdown, e.g. `attack roll: [(4), 17] +3 (Strength modifier) = 20`.
    pub fn breakdown(&self) -> String {
        let mut parts = vec![format!("{}: {}", self.category, self.d20)];
        parts.extend(self.terms.iter().map(|t| t.to_string()));
        format!("{} = {}", parts.join(" "), self.total)
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.breakdown())?;
        match (self.hit(), self.target_ac) {
            (Some(true), Some(ac)) if self.is_critical() => write!(f, " vs AC {ac}: critical hit"),
            (Some(true), Some(ac)) => write!(f, " vs AC {ac}: hit"),
            (Some(false), Some(ac)) => write!(f, " vs AC {ac}: miss"),
            _ => Ok(()),
        }
    }
}

/// Resolves actions into outcomes.
#[derive(Debug, Clone, Default)]
pub struct ActionResolver {
    config: CombatConfig,
}

impl ActionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CombatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Resolve an action using the actor's effects and target held by a tracker.
    pub fn resolve_in<S: DiceSource>(
        &self,
        tracker: &InitiativeTracker,
        action: &Action,
        target: Option<&CombatantId>,
        roller: &mut DiceRoller<S>,
    ) -> Result<ActionOutcome, ActionError> {
        let effects = tracker.active_effects(&action.actor)?;
        let target = match target {
            Some(id) => Some(
                tracker
                    .get(id)
                    .ok_or_else(|| TrackerError::UnknownCombatant(id.clone()))?,
            ),
            None => None,
        };
        self.resolve(action, effects, target, roller)
    }

    /// Resolve an action against an explicit effect list and optional target.
    ///
    /// Effects whose target does not match the action's roll are skipped,
    /// including tags this version does not recognize.
    pub fn resolve<S: DiceSource>(
        &self,
        action: &Action,
        active_effects: &[ModifierSource],
        target: Option<&Combatant>,
        roller: &mut DiceRoller<S>,
    ) -> Result<ActionOutcome, ActionError> {
        action.validate()?;
        if action.requires_target() && target.is_none() {
            return Err(ActionError::MissingTarget(action.actor.clone()));
        }

        let category = action.category();
        let d20 = roller.roll_d20(action.advantage);

        let mut terms = Vec::new();
        if action.ability_modifier != 0 {
            terms.push(ModifierTerm::flat(
                action.kind.ability_label(),
                action.ability_modifier,
            ));
        }
        if action.proficiency_bonus != 0 {
            terms.push(ModifierTerm::flat(
                "Proficiency bonus",
                action.proficiency_bonus,
            ));
        }
        for effect in active_effects.iter().filter(|e| e.applies(category)) {
            terms.push(effect.contribution(roller));
        }

        let total = terms
            .iter()
            .map(|t| t.value)
            .fold(d20.kept as i32, i32::saturating_add);
        let natural_overrides = match category {
            RollCategory::Attack => true,
            _ => self.config.natural_rolls == NaturalRollPolicy::AllD20Rolls,
        };

        let mut outcome = ActionOutcome {
            actor: action.actor.clone(),
            category,
            d20,
            terms,
            total,
            target: target.map(|t| t.id.clone()),
            target_ac: target.and_then(|t| t.effective_armor_class()),
            natural_overrides,
            damage: None,
        };

        if let ActionKind::Attack { weapon } = &action.kind {
            if let (Some(true), Some(dice)) = (outcome.hit(), weapon.damage) {
                outcome.damage = Some(Self::roll_damage(
                    dice,
                    action.ability_modifier,
                    outcome.is_critical(),
                    roller,
                )?);
            }
        }

        debug!(
            actor = %outcome.actor,
            category = %outcome.category,
            base = outcome.d20.kept,
            total = outcome.total,
            hit = ?outcome.hit(),
            "Action resolved"
        );
        Ok(outcome)
    }

    /// A critical hit doubles the number of damage dice, not the modifier.
    /// The doubled count is capped at [`MAX_DICE`].
    fn roll_damage<S: DiceSource>(
        dice: DiceSpec,
        modifier: i32,
        critical: bool,
        roller: &mut DiceRoller<S>,
    ) -> Result<DamageRoll, ActionError> {
        let count = if critical {
            dice.count.saturating_mul(2).min(MAX_DICE)
        } else {
            dice.count
        };
        let roll = roller.roll_spec(DiceSpec::new(count, dice.sides)?);
        let total = i32::try_from(roll.total)
            .unwrap_or(i32::MAX)
            .saturating_add(modifier)
            .max(0) as u32;
        Ok(DamageRoll {
            dice: roll,
            modifier,
            total,
            critical,
        })
    }
}

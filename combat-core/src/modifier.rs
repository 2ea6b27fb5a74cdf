//! Buffs, debuffs and situational bonuses.
//!
//! A [`ModifierSource`] is a named adjustment attached to one combatant. Its
//! [`EffectTarget`] decides which rolls it touches; the resolver only pulls
//! effects whose target matches the [`RollCategory`] being resolved.

use crate::abilities::{Ability, Skill};
use crate::dice::{DiceRoller, DiceSource, DiceSpec};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of roll being resolved, used to select matching effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RollCategory {
    Attack,
    SkillCheck { skill: Skill },
    AbilityCheck { ability: Ability },
    SavingThrow { ability: Ability },
}

impl fmt::Display for RollCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollCategory::Attack => write!(f, "attack roll"),
            RollCategory::SkillCheck { skill } => write!(f, "{skill} check"),
            RollCategory::AbilityCheck { ability } => write!(f, "{} check", ability.name()),
            RollCategory::SavingThrow { ability } => write!(f, "{} saving throw", ability.name()),
        }
    }
}

/// What an effect applies to.
///
/// Serialized as a short tag string (`"attack"`, `"ac"`, `"save:wisdom"`).
/// Tags this version does not know load as [`EffectTarget::Other`] and never
/// match any roll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EffectTarget {
    /// Attack rolls.
    Attack,
    /// The bearer's armor class when they are the target of an attack.
    ArmorClass,
    /// Ability checks with one ability, including skills keyed off it.
    AbilityCheck(Ability),
    /// Checks with one skill.
    SkillCheck(Skill),
    /// Every skill check.
    AllSkillChecks,
    /// Saving throws with one ability.
    SavingThrow(Ability),
    /// Every saving throw.
    AllSavingThrows,
    Other(String),
}

impl EffectTarget {
    /// Whether an effect with this target contributes to a roll of `category`.
    pub fn matches(&self, category: RollCategory) -> bool {
        match (self, category) {
            (EffectTarget::Attack, RollCategory::Attack) => true,
            (EffectTarget::AbilityCheck(a), RollCategory::AbilityCheck { ability }) => *a == ability,
            (EffectTarget::AbilityCheck(a), RollCategory::SkillCheck { skill }) => {
                *a == skill.ability()
            }
            (EffectTarget::SkillCheck(s), RollCategory::SkillCheck { skill }) => *s == skill,
            (EffectTarget::AllSkillChecks, RollCategory::SkillCheck { .. }) => true,
            (EffectTarget::SavingThrow(a), RollCategory::SavingThrow { ability }) => *a == ability,
            (EffectTarget::AllSavingThrows, RollCategory::SavingThrow { .. }) => true,
            _ => false,
        }
    }

    pub fn tag(&self) -> String {
        match self {
            EffectTarget::Attack => "attack".to_string(),
            EffectTarget::ArmorClass => "ac".to_string(),
            EffectTarget::AbilityCheck(a) => format!("ability:{}", a.key()),
            EffectTarget::SkillCheck(s) => format!("skill:{}", s.key()),
            EffectTarget::AllSkillChecks => "skills".to_string(),
            EffectTarget::SavingThrow(a) => format!("save:{}", a.key()),
            EffectTarget::AllSavingThrows => "saves".to_string(),
            EffectTarget::Other(tag) => tag.clone(),
        }
    }

    /// Parse a tag string. Never fails; unrecognized tags become `Other`.
    pub fn parse(tag: &str) -> Self {
        let normalized = tag.trim().to_lowercase();
        let known = match normalized.split_once(':') {
            None => match normalized.as_str() {
                "attack" => Some(EffectTarget::Attack),
                "ac" | "armor-class" => Some(EffectTarget::ArmorClass),
                "skills" => Some(EffectTarget::AllSkillChecks),
                "saves" => Some(EffectTarget::AllSavingThrows),
                _ => None,
            },
            Some(("ability", name)) => name.parse().ok().map(EffectTarget::AbilityCheck),
            Some(("skill", name)) => name.parse().ok().map(EffectTarget::SkillCheck),
            Some(("save", name)) => name.parse().ok().map(EffectTarget::SavingThrow),
            Some(_) => None,
        };
        known.unwrap_or_else(|| EffectTarget::Other(tag.to_string()))
    }
}

impl From<String> for EffectTarget {
    fn from(tag: String) -> Self {
        EffectTarget::parse(&tag)
    }
}

impl From<EffectTarget> for String {
    fn from(target: EffectTarget) -> Self {
        target.tag()
    }
}

impl fmt::Display for EffectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// How a modifier adjusts a roll.
///
/// Penalties subtract their magnitude whatever its stored sign, so records
/// written as either `2` or `-2` behave the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ModifierKind {
    FlatBonus { magnitude: i32 },
    FlatPenalty { magnitude: i32 },
    DiceBonus { magnitude: DiceSpec },
}

impl ModifierKind {
    /// The fixed value of a flat modifier; `None` for dice.
    pub fn flat_value(&self) -> Option<i32> {
        match self {
            ModifierKind::FlatBonus { magnitude } => Some(*magnitude),
            ModifierKind::FlatPenalty { magnitude } => Some(magnitude.saturating_abs().saturating_neg()),
            ModifierKind::DiceBonus { .. } => None,
        }
    }
}

/// A named effect attached to a combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierSource {
    pub name: String,
    #[serde(flatten)]
    pub kind: ModifierKind,
    pub applies_to: EffectTarget,
    /// Rounds left before the effect lapses; `None` lasts until removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_rounds: Option<u32>,
}

impl ModifierSource {
    pub fn new(name: impl Into<String>, kind: ModifierKind, applies_to: EffectTarget) -> Self {
        Self {
            name: name.into(),
            kind,
            applies_to,
            remaining_rounds: None,
        }
    }

    pub fn flat_bonus(name: impl Into<String>, magnitude: i32, applies_to: EffectTarget) -> Self {
        Self::new(name, ModifierKind::FlatBonus { magnitude }, applies_to)
    }

    pub fn flat_penalty(name: impl Into<String>, magnitude: i32, applies_to: EffectTarget) -> Self {
        Self::new(name, ModifierKind::FlatPenalty { magnitude }, applies_to)
    }

    pub fn dice_bonus(name: impl Into<String>, dice: DiceSpec, applies_to: EffectTarget) -> Self {
        Self::new(name, ModifierKind::DiceBonus { magnitude: dice }, applies_to)
    }

    pub fn with_duration(mut self, rounds: u32) -> Self {
        self.remaining_rounds = Some(rounds);
        self
    }

    pub fn applies(&self, category: RollCategory) -> bool {
        self.applies_to.matches(category)
    }

    /// Count down one round. Returns true once the effect has run out.
    pub fn tick(&mut self) -> bool {
        match self.remaining_rounds.as_mut() {
            Some(rounds) => {
                *rounds = rounds.saturating_sub(1);
                *rounds == 0
            }
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_rounds == Some(0)
    }

    /// Evaluate this modifier, rolling its dice if it has any.
    pub fn contribution<S: DiceSource>(&self, roller: &mut DiceRoller<S>) -> ModifierTerm {
        match &self.kind {
            ModifierKind::DiceBonus { magnitude } => {
                let roll = roller.roll_spec(*magnitude);
                ModifierTerm {
                    source: self.name.clone(),
                    value: i32::try_from(roll.total).unwrap_or(i32::MAX),
                    rolls: roll.rolls,
                }
            }
            flat => ModifierTerm::flat(self.name.clone(), flat.flat_value().unwrap_or(0)),
        }
    }
}

/// One line of an action's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierTerm {
    pub source: String,
    pub value: i32,
    /// Dice thrown for this term; empty for flat values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rolls: Vec<u32>,
}

impl ModifierTerm {
    pub fn flat(source: impl Into<String>, value: i32) -> Self {
        Self {
            source: source.into(),
            value,
            rolls: Vec::new(),
        }
    }
}

impl fmt::Display for ModifierTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.value < 0 { '-' } else { '+' };
        write!(f, "{sign}{} ({})", self.value.abs(), self.source)?;
        if !self.rolls.is_empty() {
            let faces: Vec<String> = self.rolls.iter().map(|r| r.to_string()).collect();
            write!(f, " [{}]", faces.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_tag_round_trip_for_known_targets() {
        for tag in ["attack", "ac", "skills", "saves", "save:dexterity", "ability:strength", "skill:sleight-of-hand"] {
            assert!(!matches!(EffectTarget::parse(tag), EffectTarget::Other(_)), "{tag}");
            assert_eq!(EffectTarget::parse(tag).tag(), tag);
        }
    }

    #[test]
    fn test_unknown_tag_is_kept_and_never_matches() {
        let target = EffectTarget::parse("damage:fire");
        assert_eq!(target, EffectTarget::Other("damage:fire".to_string()));
        assert!(!target.matches(RollCategory::Attack));
        assert_eq!(target.tag(), "damage:fire");
    }

    #[test]
    fn test_matching_rules() {
        let stealth = RollCategory::SkillCheck { skill: Skill::Stealth };
        assert!(EffectTarget::AbilityCheck(Ability::Dexterity).matches(stealth));
        assert!(EffectTarget::AllSkillChecks.matches(stealth));
        assert!(!EffectTarget::AbilityCheck(Ability::Strength).matches(stealth));
        assert!(!EffectTarget::AbilityCheck(Ability::Dexterity)
            .matches(RollCategory::SavingThrow { ability: Ability::Dexterity }));
        assert!(EffectTarget::AllSavingThrows
            .matches(RollCategory::SavingThrow { ability: Ability::Wisdom }));
        assert!(!EffectTarget::ArmorClass.matches(RollCategory::Attack));
    }

    #[test]
    fn test_serialized_shape() {
        let bless = ModifierSource::dice_bonus(
            "Bless",
            DiceSpec::new(1, 4).unwrap(),
            EffectTarget::Attack,
        );
        let json = serde_json::to_value(&bless).unwrap();
        assert_eq!(json["name"], "Bless");
        assert_eq!(json["kind"], "dice-bonus");
        assert_eq!(json["magnitude"]["sides"], 4);
        assert_eq!(json["appliesTo"], "attack");
        assert!(json.get("remainingRounds").is_none());

        let raw = r#"{"name":"Bane","kind":"flat-penalty","magnitude":-2,"appliesTo":"save:wisdom","remainingRounds":3}"#;
        let bane: ModifierSource = serde_json::from_str(raw).unwrap();
        assert_eq!(bane.kind.flat_value(), Some(-2));
        assert_eq!(bane.applies_to, EffectTarget::SavingThrow(Ability::Wisdom));
        assert_eq!(bane.remaining_rounds, Some(3));
    }

    #[test]
    fn test_penalty_sign_is_normalized() {
        assert_eq!(ModifierKind::FlatPenalty { magnitude: 2 }.flat_value(), Some(-2));
        assert_eq!(ModifierKind::FlatPenalty { magnitude: -2 }.flat_value(), Some(-2));
        assert_eq!(
            ModifierKind::FlatPenalty { magnitude: i32::MIN }.flat_value(),
            Some(-i32::MAX)
        );
    }

    #[test]
    fn test_invalid_dice_bonus_fails_to_load() {
        let zero_dice = r#"{"name":"Broken","kind":"dice-bonus","magnitude":{"count":0,"sides":6},"appliesTo":"attack"}"#;
        let err = serde_json::from_str::<ModifierSource>(zero_dice).unwrap_err();
        assert!(err.to_string().contains("Invalid dice spec"), "{err}");

        let one_sided = r#"{"name":"Broken","kind":"dice-bonus","magnitude":{"count":1,"sides":1},"appliesTo":"attack"}"#;
        assert!(serde_json::from_str::<ModifierSource>(one_sided).is_err());
    }

    #[test]
    fn test_dice_contribution_rolls() {
        let mut roller = DiceRoller::with_source(ScriptedDice::new([3]));
        let bless = ModifierSource::dice_bonus("Bless", DiceSpec::new(1, 4).unwrap(), EffectTarget::Attack);
        let term = bless.contribution(&mut roller);
        assert_eq!(term.value, 3);
        assert_eq!(term.rolls, vec![3]);
        assert_eq!(term.to_string(), "+3 (Bless) [3]");
    }

    #[test]
    fn test_duration_ticks_down() {
        let mut effect = ModifierSource::flat_bonus("Shield of Faith", 2, EffectTarget::ArmorClass)
            .with_duration(2);
        assert!(!effect.tick());
        assert!(effect.tick());
        assert!(effect.is_expired());

        let mut permanent = ModifierSource::flat_bonus("Ring", 1, EffectTarget::ArmorClass);
        assert!(!permanent.tick());
    }
}

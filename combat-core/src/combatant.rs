//! Per-entry combat records.
//!
//! Hit point arithmetic lives here but is only reachable through the
//! [`InitiativeTracker`](crate::tracker::InitiativeTracker), which owns every
//! combatant once it joins an encounter.

use crate::modifier::{EffectTarget, ModifierSource, RollCategory};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a combatant within an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombatantId(pub String);

impl CombatantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id for ad-hoc entries.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CombatantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CombatantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Who or what a combatant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CombatantKind {
    PlayerCharacter,
    NonPlayerCharacter,
    #[default]
    Monster,
    Custom,
}

impl CombatantKind {
    pub fn name(&self) -> &'static str {
        match self {
            CombatantKind::PlayerCharacter => "Player Character",
            CombatantKind::NonPlayerCharacter => "NPC",
            CombatantKind::Monster => "Monster",
            CombatantKind::Custom => "Custom",
        }
    }
}

/// Combat participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub kind: CombatantKind,
    #[serde(default)]
    pub initiative_score: i32,
    pub hp: u32,
    pub max_hp: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_hp: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armor_class: Option<i32>,
    #[serde(default)]
    pub active_effects: Vec<ModifierSource>,
}

impl Combatant {
    /// A combatant at full health.
    pub fn new(
        id: impl Into<CombatantId>,
        name: impl Into<String>,
        kind: CombatantKind,
        max_hp: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            initiative_score: 0,
            hp: max_hp,
            max_hp,
            temp_hp: None,
            armor_class: None,
            active_effects: Vec::new(),
        }
    }

    /// Set current HP, clamped to `max_hp`.
    pub fn with_hp(mut self, hp: u32) -> Self {
        self.hp = hp.min(self.max_hp);
        self
    }

    pub fn with_temp_hp(mut self, temp_hp: u32) -> Self {
        self.temp_hp = Some(temp_hp);
        self
    }

    pub fn with_armor_class(mut self, armor_class: i32) -> Self {
        self.armor_class = Some(armor_class);
        self
    }

    pub fn with_initiative(mut self, score: i32) -> Self {
        self.initiative_score = score;
        self
    }

    pub fn with_effect(mut self, effect: ModifierSource) -> Self {
        self.active_effects.push(effect);
        self
    }

    pub fn temp_hp(&self) -> u32 {
        self.temp_hp.unwrap_or(0)
    }

    pub fn is_down(&self) -> bool {
        self.hp == 0
    }

    /// Armor class after flat `ac` effects. Dice-based AC effects are ignored.
    pub fn effective_armor_class(&self) -> Option<i32> {
        let base = self.armor_class?;
        let bonus: i32 = self
            .active_effects
            .iter()
            .filter(|e| e.applies_to == EffectTarget::ArmorClass)
            .filter_map(|e| e.kind.flat_value())
            .fold(0i32, i32::saturating_add);
        Some(base.saturating_add(bonus))
    }

    /// Effects that contribute to a roll of the given category, in attachment order.
    pub fn effects_for(&self, category: RollCategory) -> impl Iterator<Item = &ModifierSource> {
        self.active_effects
            .iter()
            .filter(move |e| e.applies(category))
    }

    /// Re-establish `hp <= max_hp` after loading untrusted data.
    pub(crate) fn normalize(&mut self) {
        self.hp = self.hp.min(self.max_hp);
    }

    /// Temp HP absorbs first; the remainder comes off HP, floored at zero.
    pub(crate) fn take_damage(&mut self, amount: u32) -> HpChange {
        let before = self.hp_state();
        if amount == 0 {
            return HpChange::between(before, before);
        }

        let temp = self.temp_hp();
        let absorbed = temp.min(amount);
        if self.temp_hp.is_some() {
            self.temp_hp = Some(temp - absorbed);
        }
        self.hp = self.hp.saturating_sub(amount - absorbed);

        HpChange::between(before, self.hp_state())
    }

    /// Restore HP up to `max_hp`. Never touches temp HP.
    pub(crate) fn heal(&mut self, amount: u32) -> HpChange {
        let before = self.hp_state();
        self.hp = self.hp.saturating_add(amount).min(self.max_hp);
        HpChange::between(before, self.hp_state())
    }

    /// Temp HP pools don't stack: the new value replaces the old one.
    pub(crate) fn set_temp_hp(&mut self, amount: u32) -> HpChange {
        let before = self.hp_state();
        self.temp_hp = Some(amount);
        HpChange::between(before, self.hp_state())
    }

    pub(crate) fn apply_delta(&mut self, delta: i32) -> HpChange {
        if delta < 0 {
            self.take_damage(delta.unsigned_abs())
        } else {
            self.heal(delta as u32)
        }
    }

    /// Count down timed effects, returning the ones that lapsed.
    pub(crate) fn tick_effects(&mut self) -> Vec<ModifierSource> {
        let mut expired = Vec::new();
        let mut kept = Vec::with_capacity(self.active_effects.len());
        for mut effect in self.active_effects.drain(..) {
            if effect.tick() {
                expired.push(effect);
            } else {
                kept.push(effect);
            }
        }
        self.active_effects = kept;
        expired
    }

    fn hp_state(&self) -> (u32, u32) {
        (self.hp, self.temp_hp())
    }
}

/// What an HP mutation did, for narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpChange {
    pub hp_before: u32,
    pub hp_after: u32,
    pub temp_before: u32,
    pub temp_after: u32,
}

impl HpChange {
    fn between((hp_before, temp_before): (u32, u32), (hp_after, temp_after): (u32, u32)) -> Self {
        Self {
            hp_before,
            hp_after,
            temp_before,
            temp_after,
        }
    }

    /// Signed change in real HP.
    pub fn hp_delta(&self) -> i64 {
        self.hp_after as i64 - self.hp_before as i64
    }

    /// Temp HP consumed by damage.
    pub fn temp_absorbed(&self) -> u32 {
        self.temp_before.saturating_sub(self.temp_after)
    }

    pub fn dropped_to_zero(&self) -> bool {
        self.hp_before > 0 && self.hp_after == 0
    }

    pub fn is_noop(&self) -> bool {
        self.hp_before == self.hp_after && self.temp_before == self.temp_after
    }
}

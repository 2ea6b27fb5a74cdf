//! Initiative order and the combat state machine.
//!
//! The tracker moves between two states. In setup, combatants are added,
//! removed and ordered freely. Once combat starts, the existing order is
//! frozen: newcomers are appended and departures shift the turn pointer so
//! it keeps referring to the right combatant. Ending combat returns to setup
//! with the roster intact.
//!
//! All HP and effect changes go through the tracker so the roster
//! invariants hold after every command.

use crate::combatant::{Combatant, CombatantId, HpChange};
use crate::config::CombatConfig;
use crate::dice::{DiceRoller, DiceSource};
use crate::modifier::ModifierSource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from roster and state machine commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("Combatant '{0}' is already in the encounter")]
    DuplicateId(CombatantId),

    #[error("No combatant with id '{0}'")]
    UnknownCombatant(CombatantId),

    #[error("Cannot start combat with an empty roster")]
    EmptyRoster,

    #[error("Combat is not active")]
    NotActive,

    #[error("Combat is already active")]
    AlreadyActive,
}

/// Snapshot of one encounter, suitable for storing and restoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterState {
    pub round: u32,
    pub turn_index: usize,
    pub is_active: bool,
    pub combatants: Vec<Combatant>,
}

impl EncounterState {
    pub fn new() -> Self {
        Self {
            round: 1,
            turn_index: 0,
            is_active: false,
            combatants: Vec::new(),
        }
    }

    /// Repair a snapshot that may have been edited outside the engine.
    ///
    /// Out-of-range numbers are clamped. Duplicate ids can't be repaired
    /// without guessing which entry is real, so they are rejected.
    pub(crate) fn normalize(&mut self) -> Result<(), TrackerError> {
        ensure_unique_ids(&self.combatants)?;
        for combatant in &mut self.combatants {
            combatant.normalize();
        }
        self.round = self.round.max(1);
        if self.combatants.is_empty() {
            self.is_active = false;
            self.turn_index = 0;
        } else if self.turn_index >= self.combatants.len() {
            self.turn_index = self.combatants.len() - 1;
        }
        Ok(())
    }
}

/// Fails with the first id that appears more than once.
pub(crate) fn ensure_unique_ids(combatants: &[Combatant]) -> Result<(), TrackerError> {
    let mut seen = HashSet::with_capacity(combatants.len());
    for combatant in combatants {
        if !seen.insert(&combatant.id) {
            return Err(TrackerError::DuplicateId(combatant.id.clone()));
        }
    }
    Ok(())
}

impl Default for EncounterState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of an initiative roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeRoll {
    pub combatant: CombatantId,
    pub roll: u32,
    pub bonus: i32,
    pub total: i32,
}

/// An effect that ran out when a round ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiredEffect {
    pub combatant: CombatantId,
    pub effect: ModifierSource,
}

/// Where the turn pointer landed after [`InitiativeTracker::advance_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnChange {
    pub round: u32,
    pub turn_index: usize,
    pub current: CombatantId,
    pub new_round: bool,
    pub expired_effects: Vec<ExpiredEffect>,
}

/// Owns the roster of an encounter and runs its turn order.
#[derive(Debug, Clone, Default)]
pub struct InitiativeTracker {
    state: EncounterState,
    config: CombatConfig,
}

impl InitiativeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CombatConfig) -> Self {
        Self {
            state: EncounterState::new(),
            config,
        }
    }

    /// Resume from a stored snapshot.
    pub fn from_snapshot(mut state: EncounterState, config: CombatConfig) -> Result<Self, TrackerError> {
        state.normalize()?;
        Ok(Self { state, config })
    }

    pub fn snapshot(&self) -> &EncounterState {
        &self.state
    }

    pub fn into_snapshot(self) -> EncounterState {
        self.state
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn is_active(&self) -> bool {
        self.state.is_active
    }

    pub fn round(&self) -> u32 {
        self.state.round
    }

    pub fn turn_index(&self) -> usize {
        self.state.turn_index
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.state.combatants
    }

    pub fn len(&self) -> usize {
        self.state.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.combatants.is_empty()
    }

    pub fn get(&self, id: &CombatantId) -> Option<&Combatant> {
        self.state.combatants.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &CombatantId) -> bool {
        self.get(id).is_some()
    }

    /// The combatant whose turn it is, or `None` outside combat.
    pub fn current_combatant(&self) -> Option<&Combatant> {
        if !self.state.is_active {
            return None;
        }
        self.state.combatants.get(self.state.turn_index)
    }

    /// Whoever acts after the current combatant.
    pub fn up_next(&self) -> Option<&Combatant> {
        if !self.state.is_active || self.state.combatants.is_empty() {
            return None;
        }
        let next = (self.state.turn_index + 1) % self.state.combatants.len();
        self.state.combatants.get(next)
    }

    // ------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------

    /// Append a combatant to the end of the order.
    pub fn add_combatant(&mut self, mut combatant: Combatant) -> Result<(), TrackerError> {
        if self.contains(&combatant.id) {
            return Err(TrackerError::DuplicateId(combatant.id));
        }
        combatant.normalize();
        debug!(id = %combatant.id, name = %combatant.name, active = self.state.is_active, "Combatant added");
        self.state.combatants.push(combatant);
        Ok(())
    }

    /// Remove a combatant, keeping the turn pointer on the right entry.
    ///
    /// Removing an entry before the pointer shifts it back by one. Removing
    /// the entry whose turn it is leaves the pointer in place, so whoever was
    /// up next inherits the turn; if that entry was last in the order the
    /// turn passes to the top of the next round.
    pub fn remove_combatant(&mut self, id: &CombatantId) -> Result<Combatant, TrackerError> {
        let index = self.index_of(id)?;
        let removed = self.state.combatants.remove(index);
        debug!(id = %removed.id, index, "Combatant removed");

        if !self.state.is_active {
            return Ok(removed);
        }

        if self.state.combatants.is_empty() {
            info!(round = self.state.round, "Last combatant removed, combat ends");
            self.state.is_active = false;
            self.state.turn_index = 0;
        } else if index < self.state.turn_index {
            self.state.turn_index -= 1;
        } else if self.state.turn_index >= self.state.combatants.len() {
            self.state.turn_index = 0;
            self.complete_round();
        }

        Ok(removed)
    }

    /// Reset to an empty encounter.
    pub fn clear(&mut self) {
        info!(combatants = self.state.combatants.len(), "Encounter cleared");
        self.state = EncounterState::new();
    }

    // ------------------------------------------------------------------
    // Initiative
    // ------------------------------------------------------------------

    /// Roll a d20 plus `bonus` and store it as the combatant's score.
    ///
    /// The order is left alone; call [`sort_by_initiative`](Self::sort_by_initiative)
    /// to apply it.
    pub fn roll_initiative<S: DiceSource>(
        &mut self,
        id: &CombatantId,
        bonus: i32,
        roller: &mut DiceRoller<S>,
    ) -> Result<InitiativeRoll, TrackerError> {
        let combatant = self.combatant_mut(id)?;
        let roll = roller.roll_die(20);
        let total = (roll as i32).saturating_add(bonus);
        combatant.initiative_score = total;
        debug!(id = %id, roll, bonus, total, "Initiative rolled");
        Ok(InitiativeRoll {
            combatant: id.clone(),
            roll,
            bonus,
            total,
        })
    }

    /// Manually set a combatant's initiative score.
    pub fn set_initiative(&mut self, id: &CombatantId, score: i32) -> Result<(), TrackerError> {
        self.combatant_mut(id)?.initiative_score = score;
        Ok(())
    }

    /// Order by initiative, highest first. Ties keep their current order.
    pub fn sort_by_initiative(&mut self) -> Result<(), TrackerError> {
        if self.state.is_active {
            return Err(TrackerError::AlreadyActive);
        }
        // `sort_by` is stable
        self.state
            .combatants
            .sort_by(|a, b| b.initiative_score.cmp(&a.initiative_score));
        Ok(())
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    pub fn start_combat(&mut self) -> Result<(), TrackerError> {
        if self.state.is_active {
            return Err(TrackerError::AlreadyActive);
        }
        if self.state.combatants.is_empty() {
            return Err(TrackerError::EmptyRoster);
        }
        self.state.is_active = true;
        self.state.round = 1;
        self.state.turn_index = 0;
        info!(combatants = self.state.combatants.len(), "Combat started");
        Ok(())
    }

    /// Pass the turn to the next combatant, wrapping into a new round.
    pub fn advance_turn(&mut self) -> Result<TurnChange, TrackerError> {
        if !self.state.is_active {
            return Err(TrackerError::NotActive);
        }

        self.state.turn_index += 1;
        let new_round = self.state.turn_index >= self.state.combatants.len();
        let expired_effects = if new_round {
            self.state.turn_index = 0;
            self.complete_round()
        } else {
            Vec::new()
        };

        let current = self.state.combatants[self.state.turn_index].id.clone();
        debug!(round = self.state.round, turn = self.state.turn_index, current = %current, "Turn advanced");

        Ok(TurnChange {
            round: self.state.round,
            turn_index: self.state.turn_index,
            current,
            new_round,
            expired_effects,
        })
    }

    /// Return to setup. Round and turn are kept for display until the next start.
    pub fn end_combat(&mut self) {
        if self.state.is_active {
            info!(round = self.state.round, "Combat ended");
        }
        self.state.is_active = false;
    }

    fn complete_round(&mut self) -> Vec<ExpiredEffect> {
        self.state.round += 1;
        if !self.config.effect_durations {
            return Vec::new();
        }

        let mut expired = Vec::new();
        for combatant in &mut self.state.combatants {
            for effect in combatant.tick_effects() {
                debug!(id = %combatant.id, effect = %effect.name, "Effect expired");
                expired.push(ExpiredEffect {
                    combatant: combatant.id.clone(),
                    effect,
                });
            }
        }
        expired
    }

    // ------------------------------------------------------------------
    // Hit points
    // ------------------------------------------------------------------

    pub fn apply_damage(&mut self, id: &CombatantId, amount: u32) -> Result<HpChange, TrackerError> {
        let combatant = self.combatant_mut(id)?;
        let change = combatant.take_damage(amount);
        if change.dropped_to_zero() {
            info!(id = %id, name = %combatant.name, "Combatant dropped to 0 HP");
        }
        Ok(change)
    }

    pub fn apply_healing(&mut self, id: &CombatantId, amount: u32) -> Result<HpChange, TrackerError> {
        Ok(self.combatant_mut(id)?.heal(amount))
    }

    /// Replace (never add to) the combatant's temp HP.
    pub fn set_temp_hp(&mut self, id: &CombatantId, amount: u32) -> Result<HpChange, TrackerError> {
        Ok(self.combatant_mut(id)?.set_temp_hp(amount))
    }

    /// Negative deltas are damage, positive deltas are healing.
    pub fn apply_delta(&mut self, id: &CombatantId, delta: i32) -> Result<HpChange, TrackerError> {
        let combatant = self.combatant_mut(id)?;
        let change = combatant.apply_delta(delta);
        if change.dropped_to_zero() {
            info!(id = %id, name = %combatant.name, "Combatant dropped to 0 HP");
        }
        Ok(change)
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    pub fn active_effects(&self, id: &CombatantId) -> Result<&[ModifierSource], TrackerError> {
        self.get(id)
            .map(|c| c.active_effects.as_slice())
            .ok_or_else(|| TrackerError::UnknownCombatant(id.clone()))
    }

    pub fn add_effect(&mut self, id: &CombatantId, effect: ModifierSource) -> Result<(), TrackerError> {
        let combatant = self.combatant_mut(id)?;
        debug!(id = %id, effect = %effect.name, applies_to = %effect.applies_to, "Effect applied");
        combatant.active_effects.push(effect);
        Ok(())
    }

    /// Remove the first effect with the given name.
    pub fn remove_effect(
        &mut self,
        id: &CombatantId,
        name: &str,
    ) -> Result<Option<ModifierSource>, TrackerError> {
        let combatant = self.combatant_mut(id)?;
        let removed = combatant
            .active_effects
            .iter()
            .position(|e| e.name == name)
            .map(|i| combatant.active_effects.remove(i));
        Ok(removed)
    }

    pub fn clear_effects(&mut self, id: &CombatantId) -> Result<Vec<ModifierSource>, TrackerError> {
        Ok(std::mem::take(&mut self.combatant_mut(id)?.active_effects))
    }

    fn index_of(&self, id: &CombatantId) -> Result<usize, TrackerError> {
        self.state
            .combatants
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| TrackerError::UnknownCombatant(id.clone()))
    }

    fn combatant_mut(&mut self, id: &CombatantId) -> Result<&mut Combatant, TrackerError> {
        self.state
            .combatants
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| TrackerError::UnknownCombatant(id.clone()))
    }
}

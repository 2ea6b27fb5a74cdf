//! Testing utilities for the combat engine.
//!
//! This module provides tools for deterministic tests:
//! - `ScriptedDice` replays fixed die faces instead of random ones
//! - `roster` builds a quick list of combatants
//! - `init_tracing` routes engine logs to the test output

use crate::combatant::{Combatant, CombatantKind};
use crate::dice::DiceSource;
use std::collections::VecDeque;

/// A dice source that returns scripted faces in order.
///
/// Faces are clamped into `[1, sides]` for the die being rolled. Once the
/// script runs out the source keeps returning 1, and
/// [`exhausted_rolls`](Self::exhausted_rolls) counts how often that happened.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    faces: VecDeque<u32>,
    requested: Vec<u32>,
    exhausted: usize,
}

impl ScriptedDice {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
            requested: Vec::new(),
            exhausted: 0,
        }
    }

    /// Queue more faces.
    pub fn push(&mut self, faces: impl IntoIterator<Item = u32>) {
        self.faces.extend(faces);
    }

    /// Faces not yet consumed.
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }

    /// Die sizes requested so far, in order.
    pub fn requested(&self) -> &[u32] {
        &self.requested
    }

    pub fn exhausted_rolls(&self) -> usize {
        self.exhausted
    }
}

impl DiceSource for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.requested.push(sides);
        match self.faces.pop_front() {
            Some(face) => face.clamp(1, sides.max(1)),
            None => {
                self.exhausted += 1;
                1
            }
        }
    }
}

/// Monsters with 10 HP and AC 12, one per id, in the given order.
pub fn roster(ids: &[&str]) -> Vec<Combatant> {
    ids.iter()
        .map(|id| Combatant::new(*id, id.to_uppercase(), CombatantKind::Monster, 10).with_armor_class(12))
        .collect()
}

/// Install a test-friendly `tracing` subscriber. Safe to call repeatedly.
#[cfg(test)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

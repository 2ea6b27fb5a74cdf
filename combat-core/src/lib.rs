//! Tabletop RPG combat engine.
//!
//! This crate provides:
//! - Dice rolling with advantage/disadvantage and standard notation
//! - Combatant records with hit point, temp HP and armor class handling
//! - An initiative tracker that runs rounds and turns
//! - Action resolution for attacks, checks and saving throws, with named
//!   modifiers attributed in every result
//! - Snapshot persistence keyed by campaign
//!
//! # Quick Start
//!
//! ```ignore
//! use combat_core::{
//!     Action, ActionResolver, Combatant, CombatantKind, DiceRoller, InitiativeTracker, Weapon,
//! };
//!
//! let mut tracker = InitiativeTracker::new();
//! tracker.add_combatant(Combatant::new("thorin", "Thorin", CombatantKind::PlayerCharacter, 28))?;
//! tracker.add_combatant(Combatant::new("goblin", "Goblin", CombatantKind::Monster, 7).with_armor_class(15))?;
//!
//! let mut dice = DiceRoller::new();
//! tracker.roll_initiative(&"thorin".into(), 1, &mut dice)?;
//! tracker.roll_initiative(&"goblin".into(), 2, &mut dice)?;
//! tracker.sort_by_initiative()?;
//! tracker.start_combat()?;
//!
//! let attack = Action::attack("thorin", Weapon::new("Battleaxe"))
//!     .with_ability_modifier(3)
//!     .with_proficiency_bonus(2);
//! let outcome = ActionResolver::new().resolve_in(&tracker, &attack, Some(&"goblin".into()), &mut dice)?;
//! println!("{outcome}");
//!
//! tracker.advance_turn()?;
//! ```

pub mod abilities;
pub mod action;
pub mod combatant;
pub mod config;
pub mod dice;
pub mod modifier;
pub mod persist;
pub mod testing;
pub mod tracker;

// Primary public API
pub use abilities::{Ability, ParseNameError, Skill};
pub use action::{
    Action, ActionError, ActionKind, ActionOutcome, ActionResolver, DamageRoll, Weapon,
};
pub use combatant::{Combatant, CombatantId, CombatantKind, HpChange};
pub use config::{CombatConfig, NaturalRollPolicy};
pub use dice::{
    Advantage, D20Roll, DiceError, DiceExpression, DiceRoll, DiceRoller, DiceSource, DiceSpec,
    RandomDice, RollResult,
};
pub use modifier::{EffectTarget, ModifierKind, ModifierSource, ModifierTerm, RollCategory};
pub use persist::{CampaignStore, PersistError, SavedSnapshot, SnapshotKind};
pub use tracker::{EncounterState, InitiativeRoll, InitiativeTracker, TrackerError, TurnChange};

//! QA tests for saving and resuming encounters.
//!
//! These tests verify that an encounter saved mid-combat resumes exactly
//! where it stopped, and that the store rejects bad keys and stale versions.

use combat_core::persist::SAVE_VERSION;
use combat_core::testing::roster;
use combat_core::{
    CampaignStore, CombatConfig, Combatant, CombatantId, EffectTarget, InitiativeTracker, ModifierSource,
    PersistError, SavedSnapshot, SnapshotKind,
};
use tempfile::TempDir;

fn id(s: &str) -> CombatantId {
    CombatantId::new(s)
}

#[tokio::test]
async fn qa_resume_mid_combat() {
    let dir = TempDir::new().unwrap();
    let store = CampaignStore::new(dir.path());

    let mut tracker = InitiativeTracker::new();
    for combatant in roster(&["a", "b", "c"]) {
        tracker.add_combatant(combatant).unwrap();
    }
    tracker
        .add_effect(
            &id("c"),
            ModifierSource::flat_bonus("Haste", 2, EffectTarget::ArmorClass).with_duration(1),
        )
        .unwrap();
    tracker.start_combat().unwrap();
    tracker.advance_turn().unwrap();
    tracker.set_temp_hp(&id("a"), 6).unwrap();
    tracker.apply_damage(&id("a"), 8).unwrap();

    store.save_encounter("crypt", tracker.snapshot()).await.unwrap();
    drop(tracker);

    let state = store.load_encounter("crypt").await.unwrap().unwrap();
    let mut resumed = InitiativeTracker::from_snapshot(state, CombatConfig::default()).unwrap();
    assert!(resumed.is_active());
    assert_eq!(resumed.current_combatant().unwrap().id, id("b"));
    assert_eq!(resumed.get(&id("a")).unwrap().hp, 8);
    assert_eq!(resumed.get(&id("c")).unwrap().effective_armor_class(), Some(14));

    resumed.advance_turn().unwrap();
    let wrap = resumed.advance_turn().unwrap();
    assert_eq!(wrap.round, 2);
    assert_eq!(wrap.expired_effects.len(), 1);
    assert_eq!(resumed.get(&id("c")).unwrap().effective_armor_class(), Some(12));
}

#[tokio::test]
async fn qa_campaigns_are_isolated() {
    let dir = TempDir::new().unwrap();
    let store = CampaignStore::new(dir.path());

    store.save_characters("one", &roster(&["x"])).await.unwrap();
    store.save_characters("two", &roster(&["y", "z"])).await.unwrap();

    assert_eq!(store.load_characters("one").await.unwrap().unwrap().len(), 1);
    assert_eq!(store.load_characters("two").await.unwrap().unwrap().len(), 2);
    assert!(store.load_encounter("one").await.unwrap().is_none());

    store.delete("one", SnapshotKind::Characters).await.unwrap();
    assert!(store.load_characters("one").await.unwrap().is_none());
    assert!(store.load_characters("two").await.unwrap().is_some());
}

#[tokio::test]
async fn qa_stale_version_rejected() {
    let dir = TempDir::new().unwrap();
    let store = CampaignStore::new(dir.path());
    let path = store.path_for("old", SnapshotKind::Characters).unwrap();
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    tokio::fs::write(&path, r#"{"version": 0, "savedAt": "0", "payload": []}"#)
        .await
        .unwrap();

    let err = store.load_characters("old").await.unwrap_err();
    assert!(matches!(
        err,
        PersistError::VersionMismatch { expected: SAVE_VERSION, found: 0 }
    ));
}

#[tokio::test]
async fn qa_path_escape_rejected() {
    let dir = TempDir::new().unwrap();
    let store = CampaignStore::new(dir.path());
    let err = store
        .save_characters("../outside", &roster(&["x"]))
        .await
        .unwrap_err();
    assert!(matches!(err, PersistError::InvalidKey(_)));
}

#[test]
fn qa_envelope_round_trip_in_memory() {
    let snapshot = SavedSnapshot::new(roster(&["a"]));
    let json = snapshot.to_json().unwrap();
    let back = SavedSnapshot::<Vec<Combatant>>::from_json(&json).unwrap();
    assert_eq!(back, snapshot);
}

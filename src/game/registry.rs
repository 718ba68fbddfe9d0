//! Player Registry
//!
//! The authoritative per-client view of every player in the session. Entries
//! are only ever added or corrected in place, never removed: a disconnect is
//! routed through the defeat path so game-over accounting stays stable no
//! matter how a player left.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use tracing::{debug, warn};

use crate::config::{SessionConfig, SpawnPoint};
use crate::game::player::{Player, PlayerId};

/// Registry of all known players plus the monotonically growing defeated
/// set the game-over consensus is derived from.
///
/// Backed by a `BTreeMap` so the winner scan iterates in a stable order.
#[derive(Debug)]
pub struct PlayerRegistry {
    players: BTreeMap<PlayerId, Player>,
    defeated: BTreeSet<PlayerId>,
    local_id: Option<PlayerId>,
    max_health: i32,
    spawn_points: Vec<SpawnPoint>,
}

impl PlayerRegistry {
    /// Create an empty registry bound to the session's spawn table.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            players: BTreeMap::new(),
            defeated: BTreeSet::new(),
            local_id: None,
            max_health: config.max_health,
            spawn_points: config.spawn_points.clone(),
        }
    }

    /// Register a new player, or correct an already known one in place.
    ///
    /// An out-of-range spawn index is substituted with a uniformly random
    /// valid one; registration never fails over it. A re-registration
    /// updates name and visuals but never duplicates the entry and never
    /// changes `is_local`.
    pub fn register_or_update(
        &mut self,
        id: PlayerId,
        name: &str,
        spawn_index: i32,
        is_local: bool,
    ) -> &Player {
        let slot = self.resolve_spawn_index(spawn_index);
        let spawn = self.spawn_points[slot].clone();

        if let Some(existing) = self.players.get_mut(&id) {
            existing.update_identity(name, &spawn);
            return &self.players[&id];
        }

        // Only the first local registration claims the local seat.
        let local = is_local && self.local_id.is_none();
        if local {
            self.local_id = Some(id.clone());
        } else if is_local {
            warn!(%id, "local player already assigned, registering as remote");
        }

        let player = Player::new(id.clone(), name, slot, &spawn, self.max_health, local);
        self.players.insert(id.clone(), player);
        &self.players[&id]
    }

    /// Clamp a wire-supplied spawn index into the table, substituting a
    /// random slot when it is out of range.
    fn resolve_spawn_index(&self, spawn_index: i32) -> usize {
        let len = self.spawn_points.len();
        if spawn_index >= 0 && (spawn_index as usize) < len {
            spawn_index as usize
        } else {
            debug!(spawn_index, "spawn index not recognized, using a random one");
            rand::thread_rng().gen_range(0..len)
        }
    }

    /// Look up a player.
    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Look up a player mutably.
    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// The id claimed by the local player, if one registered yet.
    pub fn local_id(&self) -> Option<&PlayerId> {
        self.local_id.as_ref()
    }

    /// Whether the given id belongs to the local player.
    pub fn is_local(&self, id: &PlayerId) -> bool {
        self.local_id.as_ref() == Some(id)
    }

    /// Record a defeat. Idempotent: a duplicate signal neither double-counts
    /// nor re-runs the player-side transition. Returns true only when the
    /// player transitioned into `Defeated` this call.
    pub fn mark_defeated(&mut self, id: &PlayerId) -> bool {
        let Some(player) = self.players.get_mut(id) else {
            debug!(%id, "defeat signal for unregistered player");
            return false;
        };

        self.defeated.insert(id.clone());
        player.defeat()
    }

    /// Disconnect path. The entry stays in the registry; departure is
    /// indistinguishable from defeat for game-over accounting. Unknown ids
    /// are logged and ignored.
    pub fn unregister(&mut self, id: &PlayerId) -> bool {
        if !self.players.contains_key(id) {
            debug!(%id, "player already removed");
            return false;
        }

        debug!(%id, "player left the session");
        self.mark_defeated(id)
    }

    /// Pending -> Active for every currently registered player. Fired by
    /// the all-players-ready broadcast.
    pub fn activate_all(&mut self) {
        for player in self.players.values_mut() {
            player.activate();
        }
    }

    /// Gate off every player's action intake. Fired at session end.
    pub fn suspend_all(&mut self) {
        for player in self.players.values_mut() {
            player.suspend();
        }
    }

    /// Number of registered players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Number of defeated players.
    pub fn defeated_count(&self) -> usize {
        self.defeated.len()
    }

    /// Whether the given player is in the defeated set.
    pub fn is_defeated(&self, id: &PlayerId) -> bool {
        self.defeated.contains(id)
    }

    /// Whether only one player (at most) is still standing.
    ///
    /// `>=` rather than `==` keeps the check robust should the count ever
    /// be evaluated after more defeats landed than strictly necessary.
    pub fn is_game_over(&self) -> bool {
        self.defeated.len() >= self.players.len().saturating_sub(1)
    }

    /// Derive the winner: the one registered id not in the defeated set.
    /// Falls back to the local id when everyone is down, so a result is
    /// always produced once a local player exists.
    pub fn winner(&self) -> Option<PlayerId> {
        let mut winner = self.local_id.clone();
        for id in self.players.keys() {
            if !self.defeated.contains(id) {
                winner = Some(id.clone());
            }
        }
        winner
    }

    /// Iterate all players.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> PlayerRegistry {
        PlayerRegistry::new(&SessionConfig::default())
    }

    fn id(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    #[test]
    fn test_register_assigns_spawn_slot() {
        let mut reg = registry();
        let player = reg.register_or_update(id("a"), "Alice", 2, false);
        assert_eq!(player.spawn_slot, 2);
        assert_eq!(player.display_name, "Alice");
        assert_eq!(reg.player_count(), 1);
    }

    #[test]
    fn test_out_of_range_spawn_index_is_substituted() {
        let mut reg = registry();
        let n = SessionConfig::default().spawn_points.len();

        for (i, bad) in [-1, -40, n as i32, 99].iter().enumerate() {
            let pid = id(&format!("p{i}"));
            let player = reg.register_or_update(pid, "X", *bad, false);
            assert!(player.spawn_slot < n);
        }
    }

    #[test]
    fn test_reregistration_updates_in_place() {
        let mut reg = registry();
        reg.register_or_update(id("a"), "OldName", 0, false);
        let player = reg.register_or_update(id("a"), "NewName", 1, false);

        assert_eq!(player.display_name, "NewName");
        assert_eq!(reg.player_count(), 1);
    }

    #[test]
    fn test_reregistration_never_changes_is_local() {
        let mut reg = registry();
        reg.register_or_update(id("a"), "Alice", 0, true);
        let player = reg.register_or_update(id("a"), "Alice", 0, false);
        assert!(player.is_local);
        assert_eq!(reg.local_id(), Some(&id("a")));
    }

    #[test]
    fn test_at_most_one_local_player() {
        let mut reg = registry();
        reg.register_or_update(id("a"), "Alice", 0, true);
        let second = reg.register_or_update(id("b"), "Bob", 1, true);

        assert!(!second.is_local);
        assert_eq!(reg.local_id(), Some(&id("a")));
    }

    #[test]
    fn test_mark_defeated_is_idempotent() {
        let mut reg = registry();
        reg.register_or_update(id("a"), "Alice", 0, false);
        reg.activate_all();

        assert!(reg.mark_defeated(&id("a")));
        assert!(!reg.mark_defeated(&id("a")));
        assert_eq!(reg.defeated_count(), 1);

        let player = reg.get(&id("a")).unwrap();
        assert_eq!(player.health(), 0);
        assert!(player.is_disabled());
    }

    #[test]
    fn test_defeated_set_is_subset_of_registry() {
        let mut reg = registry();
        reg.register_or_update(id("a"), "Alice", 0, false);

        // Unknown id never enters the defeated set.
        assert!(!reg.mark_defeated(&id("ghost")));
        assert_eq!(reg.defeated_count(), 0);

        reg.mark_defeated(&id("a"));
        assert!(reg.is_defeated(&id("a")));
        assert!(reg.get(&id("a")).is_some());
    }

    #[test]
    fn test_unregister_routes_to_defeat() {
        let mut reg = registry();
        reg.register_or_update(id("a"), "Alice", 0, false);
        reg.register_or_update(id("b"), "Bob", 1, false);
        reg.activate_all();

        assert!(reg.unregister(&id("a")));

        // Entry is still present, just defeated.
        assert_eq!(reg.player_count(), 2);
        assert!(reg.is_defeated(&id("a")));
        assert!(reg.get(&id("a")).unwrap().is_disabled());

        // Unknown id is a silent no-op.
        assert!(!reg.unregister(&id("ghost")));
    }

    #[test]
    fn test_disconnect_is_equivalent_to_defeat_for_winner() {
        let build = |defeat_via_unregister: bool| {
            let mut reg = registry();
            for (pid, slot) in [("a", 0), ("b", 1), ("c", 2)] {
                reg.register_or_update(id(pid), pid, slot, pid == "c");
            }
            reg.activate_all();
            if defeat_via_unregister {
                reg.unregister(&id("a"));
            } else {
                reg.mark_defeated(&id("a"));
            }
            reg.mark_defeated(&id("b"));
            reg.winner()
        };

        assert_eq!(build(true), build(false));
        assert_eq!(build(true), Some(id("c")));
    }

    #[test]
    fn test_game_over_threshold() {
        let mut reg = registry();
        for (pid, slot) in [("a", 0), ("b", 1), ("c", 2), ("d", 3)] {
            reg.register_or_update(id(pid), pid, slot, false);
        }
        reg.activate_all();

        reg.mark_defeated(&id("a"));
        assert!(!reg.is_game_over());
        reg.mark_defeated(&id("b"));
        assert!(!reg.is_game_over());
        reg.mark_defeated(&id("c"));
        assert!(reg.is_game_over());
        assert_eq!(reg.winner(), Some(id("d")));
    }

    #[test]
    fn test_winner_falls_back_to_local_when_all_defeated() {
        let mut reg = registry();
        reg.register_or_update(id("a"), "Alice", 0, false);
        reg.register_or_update(id("b"), "Bob", 1, true);
        reg.activate_all();

        reg.mark_defeated(&id("a"));
        reg.mark_defeated(&id("b"));
        assert_eq!(reg.winner(), Some(id("b")));
    }

    proptest! {
        /// Any sequence of registrations for the same id leaves exactly one
        /// entry, with the latest name winning.
        #[test]
        fn prop_single_entry_latest_name_wins(
            names in proptest::collection::vec("[a-z]{1,8}", 1..10),
            indices in proptest::collection::vec(-5i32..10, 1..10),
        ) {
            let mut reg = registry();
            let n = SessionConfig::default().spawn_points.len();

            for (name, idx) in names.iter().zip(indices.iter().cycle()) {
                reg.register_or_update(id("p"), name, *idx, false);
            }

            prop_assert_eq!(reg.player_count(), 1);
            let player = reg.get(&id("p")).unwrap();
            prop_assert_eq!(&player.display_name, names.last().unwrap());
            prop_assert!(player.spawn_slot < n);
        }

        /// Defeat signals are idempotent no matter how often they repeat.
        #[test]
        fn prop_repeated_defeats_count_once(repeats in 1usize..20) {
            let mut reg = registry();
            reg.register_or_update(id("a"), "Alice", 0, false);
            reg.register_or_update(id("b"), "Bob", 1, false);
            reg.activate_all();

            let mut transitions = 0;
            for _ in 0..repeats {
                if reg.mark_defeated(&id("a")) {
                    transitions += 1;
                }
            }

            prop_assert_eq!(transitions, 1);
            prop_assert_eq!(reg.defeated_count(), 1);
        }
    }
}

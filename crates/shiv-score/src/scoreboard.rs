//! Per-participant statistics and the leader designation.
//!
//! The scoreboard is a replicated map of entries plus a replicated
//! "current leader" variable. The ranking is recomputed from the full
//! collection on every change, never patched incrementally; the leader is
//! recomputed (not streamed) under the same rule on every node.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shiv_replication::{
    MapEvent, ParticipantId, Principal, ReplicatedMap, ReplicatedVar, SubscriptionId,
    VarPermission,
};
use shiv_rpc::ScoreEntryWire;

// ---------------------------------------------------------------------------
// ScoreEntry
// ---------------------------------------------------------------------------

/// One participant's statistics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    /// Display name; "User{id}" until registered through chat.
    pub name: String,
    /// Kill counter.
    pub kills: u32,
    /// Death counter.
    pub deaths: u32,
    /// Whether the display name has been registered (set once).
    pub name_set: bool,
}

impl ScoreEntry {
    /// A zeroed entry with the default placeholder name.
    pub fn new(id: ParticipantId) -> Self {
        Self {
            name: format!("User{}", id.0),
            kills: 0,
            deaths: 0,
            name_set: false,
        }
    }
}

impl From<&ScoreEntry> for ScoreEntryWire {
    fn from(entry: &ScoreEntry) -> Self {
        ScoreEntryWire {
            name: entry.name.clone(),
            kills: entry.kills,
            deaths: entry.deaths,
            name_set: entry.name_set,
        }
    }
}

impl From<ScoreEntryWire> for ScoreEntry {
    fn from(wire: ScoreEntryWire) -> Self {
        ScoreEntry {
            name: wire.name,
            kills: wire.kills,
            deaths: wire.deaths,
            name_set: wire.name_set,
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Sorts entries by the ranking comparator: descending kills, then
/// descending deaths, then ascending name (case-sensitive). A deterministic
/// total order whenever names are unique; equal triples keep a stable
/// relative order within one recomputation.
pub fn sorted_ranking<'a, I>(entries: I) -> Vec<(ParticipantId, ScoreEntry)>
where
    I: Iterator<Item = (&'a ParticipantId, &'a ScoreEntry)>,
{
    let mut rows: Vec<(ParticipantId, ScoreEntry)> =
        entries.map(|(id, entry)| (*id, entry.clone())).collect();
    // Pre-sort by id so the input's map order never leaks into ties.
    rows.sort_by_key(|(id, _)| *id);
    rows.sort_by(|(_, a), (_, b)| {
        b.kills
            .cmp(&a.kills)
            .then_with(|| b.deaths.cmp(&a.deaths))
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

/// Renders a ranking as the scoreboard surface shows it, one
/// `"Name | K n | D m"` line per entry.
pub fn ranking_text(rows: &[(ParticipantId, ScoreEntry)]) -> String {
    rows.iter()
        .map(|(_, entry)| format!("{} | K {} | D {}", entry.name, entry.kills, entry.deaths))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Scoreboard
// ---------------------------------------------------------------------------

/// The authoritative scoreboard: replicated entries, the leader variable,
/// and the archive of disconnected participants' statistics.
pub struct Scoreboard {
    players: ReplicatedMap<ParticipantId, ScoreEntry>,
    leader: ReplicatedVar<Option<ParticipantId>>,
    offline: HashMap<ParticipantId, ScoreEntry>,
}

impl Scoreboard {
    /// Creates an empty scoreboard.
    pub fn new() -> Self {
        Self {
            players: ReplicatedMap::new(VarPermission::authority_to_everyone()),
            leader: ReplicatedVar::new(None, VarPermission::authority_to_everyone()),
            offline: HashMap::new(),
        }
    }

    /// Creates the participant's entry, restoring archived statistics if
    /// they reconnected under the same id.
    pub fn on_connect(&mut self, id: ParticipantId) {
        let entry = self
            .offline
            .remove(&id)
            .unwrap_or_else(|| ScoreEntry::new(id));
        if let Err(err) = self.players.add(id, entry, Principal::Authority) {
            // Connect for an id that is already seated: a wiring mistake,
            // not a reason to crash the session.
            tracing::warn!(%id, %err, "scoreboard connect ignored");
        }
    }

    /// Archives the participant's entry. Statistics survive for a later
    /// reconnect under the same id.
    pub fn on_disconnect(&mut self, id: ParticipantId) {
        match self.players.remove(&id, Principal::Authority) {
            Ok(entry) => {
                self.offline.insert(id, entry);
            }
            Err(err) => tracing::warn!(%id, %err, "scoreboard disconnect ignored"),
        }
    }

    /// Increments a participant's kill counter, creating a zeroed entry
    /// first if absent.
    pub fn add_kill(&mut self, id: ParticipantId) {
        self.bump(id, |entry| entry.kills += 1);
    }

    /// Increments a participant's death counter, creating a zeroed entry
    /// first if absent.
    pub fn add_death(&mut self, id: ParticipantId) {
        self.bump(id, |entry| entry.deaths += 1);
    }

    fn bump(&mut self, id: ParticipantId, apply: impl FnOnce(&mut ScoreEntry)) {
        let mut entry = match self.players.get(&id) {
            Some(entry) => entry.clone(),
            None => ScoreEntry::new(id),
        };
        let existed = self.players.contains_key(&id);
        apply(&mut entry);
        let result = if existed {
            self.players.set(id, entry, Principal::Authority)
        } else {
            self.players.add(id, entry, Principal::Authority)
        };
        if let Err(err) = result {
            tracing::warn!(%id, %err, "scoreboard update ignored");
        }
    }

    /// Registers a participant's display name. Creates the entry if absent.
    pub fn set_name(&mut self, id: ParticipantId, name: String) {
        let mut entry = match self.players.get(&id) {
            Some(entry) => entry.clone(),
            None => ScoreEntry::new(id),
        };
        let existed = self.players.contains_key(&id);
        entry.name = name;
        entry.name_set = true;
        let result = if existed {
            self.players.set(id, entry, Principal::Authority)
        } else {
            self.players.add(id, entry, Principal::Authority)
        };
        if let Err(err) = result {
            tracing::warn!(%id, %err, "name registration ignored");
        }
    }

    /// Looks up an entry.
    pub fn entry(&self, id: ParticipantId) -> Option<&ScoreEntry> {
        self.players.get(&id)
    }

    /// Iterates over all seated entries (unspecified order).
    pub fn entries(&self) -> impl Iterator<Item = (&ParticipantId, &ScoreEntry)> {
        self.players.iter()
    }

    /// Number of seated entries.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the scoreboard has no seated entries.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// The full ranking in comparator order.
    pub fn ranking(&self) -> Vec<(ParticipantId, ScoreEntry)> {
        sorted_ranking(self.players.iter())
    }

    /// The current leader designation.
    pub fn leader(&self) -> Option<ParticipantId> {
        *self.leader.value()
    }

    /// Recomputes the leader after a collection change.
    ///
    /// The current leader is retained while still seated and still holding
    /// the max kill count. Otherwise, if any entry has kills, the first
    /// entry in comparator order among those at max kills becomes leader;
    /// with no kills anywhere the leader clears to none. Returns the new
    /// designation when it changed (the caller broadcasts it).
    pub fn recompute_leader(&mut self) -> Option<Option<ParticipantId>> {
        let max_kills = self
            .players
            .iter()
            .map(|(_, entry)| entry.kills)
            .max()
            .unwrap_or(0);

        let current = *self.leader.value();
        let retained = max_kills > 0
            && current
                .and_then(|id| self.players.get(&id))
                .is_some_and(|entry| entry.kills == max_kills);
        if retained {
            return None;
        }

        let new_leader = if max_kills > 0 {
            self.ranking()
                .into_iter()
                .find(|(_, entry)| entry.kills == max_kills)
                .map(|(id, _)| id)
        } else {
            None
        };

        if new_leader == current {
            return None;
        }
        // Authority principal; the write cannot be denied.
        let _ = self.leader.write(new_leader, Principal::Authority);
        Some(new_leader)
    }

    /// Registers a callback for entry changes (added/removed/updated).
    pub fn subscribe_changes<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&MapEvent<ParticipantId>) + 'static,
    {
        self.players.subscribe(callback)
    }
}

impl Default for Scoreboard {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(rows: &[(u64, &str, u32, u32)]) -> Scoreboard {
        let mut board = Scoreboard::new();
        for &(id, name, kills, deaths) in rows {
            let id = ParticipantId(id);
            board.on_connect(id);
            board.set_name(id, name.to_string());
            for _ in 0..kills {
                board.add_kill(id);
            }
            for _ in 0..deaths {
                board.add_death(id);
            }
        }
        board
    }

    #[test]
    fn test_ranking_orders_by_kills_deaths_then_name() {
        let board = board_with(&[
            (1, "Cleo", 2, 0),
            (2, "Alice", 5, 1),
            (3, "Bob", 5, 3),
            (4, "Dora", 5, 3),
        ]);
        let names: Vec<_> = board
            .ranking()
            .into_iter()
            .map(|(_, entry)| entry.name)
            .collect();
        // Bob and Dora tie on kills and deaths; the name breaks the tie.
        assert_eq!(names, vec!["Bob", "Dora", "Alice", "Cleo"]);
    }

    #[test]
    fn test_ranking_is_idempotent() {
        let board = board_with(&[(1, "Alice", 3, 1), (2, "Bob", 3, 1), (3, "Cleo", 0, 4)]);
        let first = board.ranking();
        let second = board.ranking();
        assert_eq!(first, second);
    }

    #[test]
    fn test_leader_none_iff_no_kills() {
        let mut board = board_with(&[(1, "Alice", 0, 2), (2, "Bob", 0, 0)]);
        assert_eq!(board.recompute_leader(), None);
        assert_eq!(board.leader(), None);

        board.add_kill(ParticipantId(2));
        assert_eq!(board.recompute_leader(), Some(Some(ParticipantId(2))));
        let max = board.entries().map(|(_, e)| e.kills).max().unwrap();
        assert_eq!(board.entry(ParticipantId(2)).unwrap().kills, max);
    }

    #[test]
    fn test_leader_retained_while_tied_at_max() {
        let mut board = board_with(&[(1, "Alice", 2, 0), (2, "Bob", 1, 0)]);
        assert_eq!(board.recompute_leader(), Some(Some(ParticipantId(1))));

        // Bob catches up to the same kill count: Alice keeps the crown.
        board.add_kill(ParticipantId(2));
        assert_eq!(board.recompute_leader(), None);
        assert_eq!(board.leader(), Some(ParticipantId(1)));

        // Bob passes her: the crown moves.
        board.add_kill(ParticipantId(2));
        assert_eq!(board.recompute_leader(), Some(Some(ParticipantId(2))));
    }

    #[test]
    fn test_leader_clears_when_leader_leaves_and_no_kills_remain() {
        let mut board = board_with(&[(1, "Alice", 3, 0), (2, "Bob", 0, 1)]);
        board.recompute_leader();
        assert_eq!(board.leader(), Some(ParticipantId(1)));

        board.on_disconnect(ParticipantId(1));
        assert_eq!(board.recompute_leader(), Some(None));
        assert_eq!(board.leader(), None);
    }

    #[test]
    fn test_disconnect_archives_and_reconnect_restores() {
        let mut board = board_with(&[(7, "Alice", 4, 2)]);
        board.on_disconnect(ParticipantId(7));
        assert!(board.entry(ParticipantId(7)).is_none());

        board.on_connect(ParticipantId(7));
        let entry = board.entry(ParticipantId(7)).unwrap();
        assert_eq!(entry.kills, 4);
        assert_eq!(entry.deaths, 2);
        assert_eq!(entry.name, "Alice");
        assert!(entry.name_set);
    }

    #[test]
    fn test_kill_for_unknown_id_creates_zeroed_entry_first() {
        let mut board = Scoreboard::new();
        board.add_kill(ParticipantId(9));
        let entry = board.entry(ParticipantId(9)).unwrap();
        assert_eq!(entry.kills, 1);
        assert_eq!(entry.deaths, 0);
        assert_eq!(entry.name, "User9");
    }

    #[test]
    fn test_change_events_fire_per_mutation() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut board = Scoreboard::new();
        let events = Rc::new(RefCell::new(0));
        let events_probe = Rc::clone(&events);
        board.subscribe_changes(move |_| *events_probe.borrow_mut() += 1);

        board.on_connect(ParticipantId(1));
        board.add_kill(ParticipantId(1));
        board.on_disconnect(ParticipantId(1));
        assert_eq!(*events.borrow(), 3);
    }

    #[test]
    fn test_ranking_text_render() {
        let board = board_with(&[(1, "Alice", 2, 1), (2, "Bob", 0, 3)]);
        let text = ranking_text(&board.ranking());
        assert_eq!(text, "Alice | K 2 | D 1\nBob | K 0 | D 3");
    }
}

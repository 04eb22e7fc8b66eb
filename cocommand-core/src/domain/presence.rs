use crate::domain::{Actor, ActorId, ActorMeta, Timestamp};
use instant::Duration;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Default span after which an actor no longer counts towards a quorum
pub const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_secs(30);

/// Tracks which actors are attached to one session and when each was last seen
///
/// Holds at most one record per actor. A record older than the liveness window
/// is excluded from [`snapshot`](Self::snapshot) and
/// [`others_excluding`](Self::others_excluding) even before it is purged, so a
/// silently disconnected peer can never hold up a quorum.
#[derive(Debug, Clone)]
pub struct PresenceRegistry {
    actors: HashMap<ActorId, Actor>,
    /// Revision each purged actor had when it was removed
    purged: HashMap<ActorId, u64>,
    liveness_window: Duration,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::with_liveness_window(DEFAULT_LIVENESS_WINDOW)
    }

    pub fn with_liveness_window(liveness_window: Duration) -> Self {
        Self {
            actors: HashMap::new(),
            purged: HashMap::new(),
            liveness_window,
        }
    }

    pub fn liveness_window(&self) -> Duration {
        self.liveness_window
    }

    /// Merge `meta` into the actor's record and stamp it as seen now
    ///
    /// Creates the record on first update. Bumps the revision so peers
    /// receiving the record know it is fresh.
    pub fn update(&mut self, actor_id: &ActorId, meta: &ActorMeta) -> Actor {
        let actor = self
            .actors
            .entry(actor_id.clone())
            .or_insert_with(|| Actor::new(actor_id.clone()));

        actor.apply(meta);
        actor.revision += 1;
        actor.last_seen = Timestamp::now();

        actor.clone()
    }

    /// Heartbeat: bump revision and stamp as seen now, without changing metadata
    pub fn touch(&mut self, actor_id: &ActorId) -> Option<Actor> {
        let actor = self.actors.get_mut(actor_id)?;
        actor.revision += 1;
        actor.last_seen = Timestamp::now();
        Some(actor.clone())
    }

    /// Apply a record received from a peer
    ///
    /// The record's own `last_seen` comes from another clock and is ignored. The
    /// local stamp is refreshed only when the record is new or carries a newer
    /// revision. A record older than the one held is ignored, and a purged
    /// actor is only re-admitted at a revision above the one it was purged at.
    /// Returns true if the registry changed.
    pub fn observe(&mut self, incoming: Actor) -> bool {
        let now = Timestamp::now();

        match self.actors.get_mut(&incoming.id) {
            Some(existing) if incoming.revision < existing.revision => false,
            Some(existing) if incoming.revision == existing.revision => {
                let changed = existing.role != incoming.role || existing.ready != incoming.ready;
                if changed {
                    existing.role = incoming.role;
                    existing.ready = incoming.ready;
                }
                changed
            }
            Some(existing) => {
                existing.role = incoming.role;
                existing.ready = incoming.ready;
                existing.revision = incoming.revision;
                existing.last_seen = now;
                true
            }
            None => {
                if let Some(&purged_at) = self.purged.get(&incoming.id) {
                    if incoming.revision <= purged_at {
                        return false;
                    }
                    self.purged.remove(&incoming.id);
                }

                let mut actor = incoming;
                actor.last_seen = now;
                self.actors.insert(actor.id.clone(), actor);
                true
            }
        }
    }

    /// Apply a full presence snapshot
    ///
    /// Actors absent from the snapshot have left and are dropped, except `keep`
    /// (the local actor, which may not have reached the transport yet).
    /// Returns true if the registry changed.
    pub fn apply_snapshot(&mut self, actors: Vec<Actor>, keep: &ActorId) -> bool {
        let present: HashSet<ActorId> = actors.iter().map(|a| a.id.clone()).collect();

        let before = self.actors.len();
        self.actors.retain(|id, _| id == keep || present.contains(id));
        let mut changed = self.actors.len() != before;

        // Gone from the transport: a later record is a fresh attach
        self.purged.retain(|id, _| present.contains(id));

        for actor in actors {
            changed |= self.observe(actor);
        }

        changed
    }

    pub fn get(&self, actor_id: &ActorId) -> Option<&Actor> {
        self.actors.get(actor_id)
    }

    pub fn remove(&mut self, actor_id: &ActorId) -> Option<Actor> {
        self.actors.remove(actor_id)
    }

    pub fn is_live(&self, actor_id: &ActorId) -> bool {
        self.is_live_at(actor_id, Timestamp::now())
    }

    pub fn is_live_at(&self, actor_id: &ActorId, now: Timestamp) -> bool {
        self.actors
            .get(actor_id)
            .map(|actor| !actor.is_stale_at(now, self.liveness_window))
            .unwrap_or(false)
    }

    /// Live actors, sorted by id
    pub fn snapshot(&self) -> Vec<Actor> {
        self.snapshot_at(Timestamp::now())
    }

    pub fn snapshot_at(&self, now: Timestamp) -> Vec<Actor> {
        let mut live: Vec<Actor> = self
            .actors
            .values()
            .filter(|actor| !actor.is_stale_at(now, self.liveness_window))
            .cloned()
            .collect();
        live.sort_by(|a, b| a.id.cmp(&b.id));
        live
    }

    /// Live actors other than `self_id`: the quorum for an approval request
    pub fn others_excluding(&self, self_id: &ActorId) -> BTreeSet<ActorId> {
        self.others_excluding_at(self_id, Timestamp::now())
    }

    pub fn others_excluding_at(&self, self_id: &ActorId, now: Timestamp) -> BTreeSet<ActorId> {
        self.actors
            .values()
            .filter(|actor| &actor.id != self_id)
            .filter(|actor| !actor.is_stale_at(now, self.liveness_window))
            .map(|actor| actor.id.clone())
            .collect()
    }

    /// Remove records not refreshed for `max_age`
    /// Returns the removed actor ids
    pub fn purge_stale(&mut self, max_age: Duration) -> Vec<ActorId> {
        self.purge_stale_at(max_age, Timestamp::now())
    }

    pub fn purge_stale_at(&mut self, max_age: Duration, now: Timestamp) -> Vec<ActorId> {
        self.purge(max_age, now, None)
    }

    /// Like [`purge_stale`](Self::purge_stale) but never removes `keep`
    pub fn purge_stale_except(&mut self, max_age: Duration, keep: &ActorId) -> Vec<ActorId> {
        self.purge(max_age, Timestamp::now(), Some(keep))
    }

    fn purge(
        &mut self,
        max_age: Duration,
        now: Timestamp,
        keep: Option<&ActorId>,
    ) -> Vec<ActorId> {
        let stale: Vec<ActorId> = self
            .actors
            .values()
            .filter(|actor| Some(&actor.id) != keep)
            .filter(|actor| actor.is_stale_at(now, max_age))
            .map(|actor| actor.id.clone())
            .collect();

        for id in &stale {
            if let Some(actor) = self.actors.remove(id) {
                self.purged.insert(actor.id, actor.revision);
            }
        }

        if !stale.is_empty() {
            tracing::debug!("Purged {} stale presence record(s)", stale.len());
        }

        stale
    }

    pub fn clear(&mut self) {
        self.actors.clear();
        self.purged.clear();
    }

    /// Number of records, live or not
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CommandRole;

    fn actor(id: &str) -> ActorId {
        ActorId::new(id).unwrap()
    }

    fn far_future() -> Timestamp {
        Timestamp::now().plus(Duration::from_secs(3600))
    }

    #[test]
    fn test_update_creates_and_merges() {
        let mut registry = PresenceRegistry::new();
        let alice = actor("alice");

        let first = registry.update(
            &alice,
            &ActorMeta::default().with_role(CommandRole::Strategist),
        );
        assert_eq!(first.revision, 1);
        assert!(!first.ready);

        let second = registry.update(&alice, &ActorMeta::default().with_ready(true));
        assert_eq!(second.revision, 2);
        assert_eq!(second.role, Some(CommandRole::Strategist));
        assert!(second.ready);

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_others_excluding_self() {
        let mut registry = PresenceRegistry::new();
        registry.update(&actor("alice"), &ActorMeta::default());
        registry.update(&actor("bob"), &ActorMeta::default());
        registry.update(&actor("carol"), &ActorMeta::default());

        let others = registry.others_excluding(&actor("alice"));
        assert_eq!(others.len(), 2);
        assert!(others.contains(&actor("bob")));
        assert!(!others.contains(&actor("alice")));
    }

    #[test]
    fn test_stale_actor_excluded_from_quorum_before_purge() {
        let mut registry = PresenceRegistry::with_liveness_window(Duration::from_secs(30));
        registry.update(&actor("alice"), &ActorMeta::default());
        registry.update(&actor("bob"), &ActorMeta::default());

        let later = far_future();
        assert!(registry.others_excluding_at(&actor("alice"), later).is_empty());
        assert!(registry.snapshot_at(later).is_empty());
        assert!(!registry.is_live_at(&actor("bob"), later));

        // Still stored until purged
        assert_eq!(registry.len(), 2);
        let purged = registry.purge_stale_at(Duration::from_secs(60), later);
        assert_eq!(purged.len(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_purge_keeps_local_actor() {
        let mut registry = PresenceRegistry::new();
        registry.update(&actor("alice"), &ActorMeta::default());
        registry.update(&actor("bob"), &ActorMeta::default());

        let purged = registry.purge_stale_except(Duration::ZERO, &actor("alice"));

        assert_eq!(purged, vec![actor("bob")]);
        assert!(registry.get(&actor("alice")).is_some());
    }

    #[test]
    fn test_observe_refreshes_only_on_newer_revision() {
        let mut registry = PresenceRegistry::new();
        let bob = actor("bob");

        let mut remote = Actor::new(bob.clone());
        remote.revision = 3;
        assert!(registry.observe(remote.clone()));

        // Mark the local stamp, then replay the same revision
        let marker = Timestamp::from_millis(u64::MAX);
        registry.actors.get_mut(&bob).unwrap().last_seen = marker;
        assert!(!registry.observe(remote.clone()));
        assert_eq!(registry.get(&bob).unwrap().last_seen, marker);

        remote.revision = 4;
        assert!(registry.observe(remote));
        assert_ne!(registry.get(&bob).unwrap().last_seen, marker);
        assert_eq!(registry.get(&bob).unwrap().revision, 4);
    }

    #[test]
    fn test_observe_ignores_older_metadata() {
        let mut registry = PresenceRegistry::new();
        let bob = actor("bob");

        let mut newer = Actor::new(bob.clone());
        newer.revision = 5;
        newer.role = Some(CommandRole::Diplomat);
        newer.ready = true;
        registry.observe(newer);

        let mut late = Actor::new(bob.clone());
        late.revision = 4;
        late.role = Some(CommandRole::Economist);
        assert!(!registry.observe(late));

        let held = registry.get(&bob).unwrap();
        assert_eq!(held.role, Some(CommandRole::Diplomat));
        assert!(held.ready);
        assert_eq!(held.revision, 5);
    }

    #[test]
    fn test_purged_actor_needs_newer_revision_to_return() {
        let mut registry = PresenceRegistry::new();
        let alice = actor("alice");
        let bob = actor("bob");
        registry.update(&alice, &ActorMeta::default());

        let mut remote = Actor::new(bob.clone());
        remote.revision = 2;
        registry.observe(remote.clone());
        assert_eq!(registry.purge_stale_except(Duration::ZERO, &alice), vec![bob.clone()]);

        // Same record replayed by the next snapshot
        assert!(!registry.apply_snapshot(vec![remote.clone()], &alice));
        assert!(registry.get(&bob).is_none());
        assert!(!registry.others_excluding(&alice).contains(&bob));

        remote.revision = 3;
        assert!(registry.observe(remote));
        assert!(registry.is_live(&bob));
    }

    #[test]
    fn test_purged_actor_returns_after_leaving_transport() {
        let mut registry = PresenceRegistry::new();
        let alice = actor("alice");
        let bob = actor("bob");
        registry.update(&alice, &ActorMeta::default());

        let mut remote = Actor::new(bob.clone());
        remote.revision = 7;
        registry.observe(remote);
        registry.purge_stale_except(Duration::ZERO, &alice);

        registry.apply_snapshot(Vec::new(), &alice);

        // Re-attached with a fresh registry, revision starts over
        let mut rejoined = Actor::new(bob.clone());
        rejoined.revision = 1;
        assert!(registry.apply_snapshot(vec![rejoined], &alice));
        assert!(registry.get(&bob).is_some());
    }

    #[test]
    fn test_observe_ignores_remote_clock() {
        let mut registry = PresenceRegistry::new();
        let mut remote = Actor::new(actor("bob"));
        remote.last_seen = Timestamp::from_millis(u64::MAX / 2);

        registry.observe(remote);
        assert!(registry.get(&actor("bob")).unwrap().last_seen <= Timestamp::now());
    }

    #[test]
    fn test_apply_snapshot_drops_absent_but_keeps_self() {
        let mut registry = PresenceRegistry::new();
        let alice = actor("alice");
        registry.update(&alice, &ActorMeta::default());
        registry.observe(Actor::new(actor("bob")));
        registry.observe(Actor::new(actor("carol")));

        let changed = registry.apply_snapshot(vec![Actor::new(actor("carol"))], &alice);

        assert!(changed);
        assert!(registry.get(&alice).is_some());
        assert!(registry.get(&actor("bob")).is_none());
        assert!(registry.get(&actor("carol")).is_some());
    }

    #[test]
    fn test_touch_unknown_actor() {
        let mut registry = PresenceRegistry::new();
        assert!(registry.touch(&actor("ghost")).is_none());

        registry.update(&actor("alice"), &ActorMeta::default());
        let touched = registry.touch(&actor("alice")).unwrap();
        assert_eq!(touched.revision, 2);
    }

    #[test]
    fn test_snapshot_sorted() {
        let mut registry = PresenceRegistry::new();
        registry.update(&actor("zed"), &ActorMeta::default());
        registry.update(&actor("amy"), &ActorMeta::default());

        let ids: Vec<String> = registry
            .snapshot()
            .into_iter()
            .map(|a| a.id.to_string())
            .collect();
        assert_eq!(ids, vec!["amy", "zed"]);
    }
}

//! Nearby-box tracking and collection triggers
//!
//! The index remembers uncollected boxes the store subscription reports
//! within the retain radius of the player (`known`, twice the query radius)
//! and keeps the subset within the query radius (`active`), which is what
//! the map shows. Anything farther is dropped on arrival and evicted as the
//! player moves on. Each position sample yields the boxes inside the
//! collection radius. A box is flagged once and then stays in flight until
//! its attempt finishes; a resolved box is not flagged again while it is
//! within the retain radius, even if a stale event re-announces it.

use crate::config::LootConfig;
use crate::geo::{self, Position};
use crate::loot::{BoxId, LootBox};
use crate::store::{ChangeEvent, ChangeKind};
use std::collections::{HashMap, HashSet};

/// Changes to the active set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveDelta {
    pub added: Vec<BoxId>,
    pub removed: Vec<BoxId>,
}

impl ActiveDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Result of feeding one position sample to the index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProximityTick {
    /// Boxes to attempt now, nearest first; already marked in flight
    pub triggered: Vec<BoxId>,
    pub delta: ActiveDelta,
}

/// Tracks nearby uncollected boxes for one session
#[derive(Debug, Clone)]
pub struct ProximityIndex {
    known: HashMap<BoxId, LootBox>,
    active: HashMap<BoxId, LootBox>,
    in_flight: HashSet<BoxId>,
    /// Where each resolved box was, if known, so it can age out
    resolved: HashMap<BoxId, Option<Position>>,
    last_position: Option<Position>,
    collection_radius_m: f64,
    query_radius_m: f64,
    retain_radius_m: f64,
}

impl Default for ProximityIndex {
    fn default() -> Self {
        Self::from_config(&LootConfig::default())
    }
}

impl ProximityIndex {
    pub fn new(collection_radius_m: f64, query_radius_m: f64) -> Self {
        Self {
            known: HashMap::new(),
            active: HashMap::new(),
            in_flight: HashSet::new(),
            resolved: HashMap::new(),
            last_position: None,
            collection_radius_m,
            query_radius_m,
            retain_radius_m: query_radius_m * 2.0,
        }
    }

    pub fn from_config(config: &LootConfig) -> Self {
        Self::new(config.collection_radius_m, config.query_radius_m)
    }

    pub fn collection_radius(&self) -> f64 {
        self.collection_radius_m
    }

    pub fn last_position(&self) -> Option<&Position> {
        self.last_position.as_ref()
    }

    pub fn get(&self, id: &BoxId) -> Option<&LootBox> {
        self.active.get(id)
    }

    pub fn is_active(&self, id: &BoxId) -> bool {
        self.active.contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_in_flight(&self, id: &BoxId) -> bool {
        self.in_flight.contains(id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Boxes remembered, active or not
    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Distance beyond which boxes are forgotten
    pub fn retain_radius(&self) -> f64 {
        self.retain_radius_m
    }

    /// Active boxes, nearest first when a position is known
    pub fn nearby(&self) -> Vec<LootBox> {
        let mut boxes: Vec<LootBox> = self.active.values().cloned().collect();
        match &self.last_position {
            Some(position) => boxes.sort_by(|a, b| {
                a.distance_from(position)
                    .total_cmp(&b.distance_from(position))
                    .then_with(|| a.id.cmp(&b.id))
            }),
            None => boxes.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        boxes
    }

    fn in_query_range(&self, loot_box: &LootBox) -> bool {
        self.last_position
            .as_ref()
            .is_some_and(|p| loot_box.distance_from(p) <= self.query_radius_m)
    }

    fn beyond_retain(&self, at: &Position) -> bool {
        self.last_position
            .as_ref()
            .is_some_and(|p| geo::distance(p, at) > self.retain_radius_m)
    }

    fn forget(&mut self, id: &BoxId, delta: &mut ActiveDelta) {
        self.known.remove(id);
        if self.active.remove(id).is_some() {
            delta.removed.push(id.clone());
        }
    }

    /// Apply one subscription event
    pub fn on_store_event(&mut self, event: &ChangeEvent) -> ActiveDelta {
        let mut delta = ActiveDelta::default();
        let loot_box = &event.loot_box;

        let far = self.beyond_retain(&loot_box.position());

        if loot_box.collected {
            if !far {
                self.resolved
                    .insert(loot_box.id.clone(), Some(loot_box.position()));
            }
            self.forget(&loot_box.id, &mut delta);
        } else if event.kind == ChangeKind::Removed
            || far
            || self.resolved.contains_key(&loot_box.id)
        {
            self.forget(&loot_box.id, &mut delta);
        } else {
            self.known.insert(loot_box.id.clone(), loot_box.clone());
            if self.in_query_range(loot_box) {
                if self
                    .active
                    .insert(loot_box.id.clone(), loot_box.clone())
                    .is_none()
                {
                    delta.added.push(loot_box.id.clone());
                }
            } else if self.active.remove(&loot_box.id).is_some() {
                delta.removed.push(loot_box.id.clone());
            }
        }

        if !delta.is_empty() {
            log::debug!(
                "Proximity index: +{} -{} ({} active)",
                delta.added.len(),
                delta.removed.len(),
                self.active.len()
            );
        }
        delta
    }

    /// Move to `position` and flag boxes inside the collection radius
    pub fn on_position(&mut self, position: Position) -> ProximityTick {
        self.last_position = Some(position);
        self.evict_distant(&position);

        let mut delta = ActiveDelta::default();
        let in_range: Vec<LootBox> = self
            .known
            .values()
            .filter(|b| self.in_query_range(b))
            .cloned()
            .collect();
        let in_range_ids: HashSet<&BoxId> = in_range.iter().map(|b| &b.id).collect();

        let departed: Vec<BoxId> = self
            .active
            .keys()
            .filter(|id| !in_range_ids.contains(id))
            .cloned()
            .collect();
        for id in departed {
            self.active.remove(&id);
            delta.removed.push(id);
        }
        for loot_box in &in_range {
            if !self.active.contains_key(&loot_box.id) {
                delta.added.push(loot_box.id.clone());
            }
            self.active.insert(loot_box.id.clone(), loot_box.clone());
        }

        let mut candidates: Vec<(f64, BoxId)> = self
            .active
            .values()
            .filter(|b| !b.collected && !self.in_flight.contains(&b.id))
            .map(|b| (b.distance_from(&position), b.id.clone()))
            .filter(|(d, _)| *d <= self.collection_radius_m)
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let triggered: Vec<BoxId> = candidates.into_iter().map(|(_, id)| id).collect();
        for id in &triggered {
            self.in_flight.insert(id.clone());
        }

        if !triggered.is_empty() {
            log::debug!("Proximity triggered {} box(es)", triggered.len());
        }
        ProximityTick { triggered, delta }
    }

    fn evict_distant(&mut self, position: &Position) {
        let retain = self.retain_radius_m;
        let before = self.known.len() + self.resolved.len();

        // In-flight boxes stay until their attempt finishes
        let in_flight = &self.in_flight;
        self.known.retain(|id, b| {
            in_flight.contains(id) || geo::distance(position, &b.position()) <= retain
        });
        self.resolved.retain(|_, at| {
            at.map_or(true, |at| geo::distance(position, &at) <= retain)
        });

        let evicted = before - self.known.len() - self.resolved.len();
        if evicted > 0 {
            log::debug!("Proximity index forgot {} distant box(es)", evicted);
        }
    }

    /// Mark a box in flight outside a position tick
    ///
    /// Returns `false` if it is already in flight or resolved.
    pub fn begin(&mut self, id: &BoxId) -> bool {
        if self.resolved.contains_key(id) {
            return false;
        }
        self.in_flight.insert(id.clone())
    }

    /// Finish an attempt
    ///
    /// A resolved box (collected by anyone, or gone) leaves the index for
    /// good; an unresolved one may be flagged again on a later sample.
    pub fn finish(&mut self, id: &BoxId, resolved: bool) -> ActiveDelta {
        let mut delta = ActiveDelta::default();
        self.in_flight.remove(id);
        if resolved {
            // A clicked box may never have been known; it was in reach of
            // the player, so the player's position stands in for it
            let at = self
                .known
                .get(id)
                .map(LootBox::position)
                .or(self.last_position);
            self.resolved.insert(id.clone(), at);
            self.forget(id, &mut delta);
        }
        delta
    }

    /// Drop everything, e.g. when tracking stops
    pub fn clear(&mut self) {
        self.known.clear();
        self.active.clear();
        self.in_flight.clear();
        self.resolved.clear();
        self.last_position = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loot::{LootTier, UserId};
    use chrono::Utc;

    fn box_at(id: &str, position: &Position) -> LootBox {
        LootBox {
            id: BoxId::from(id),
            latitude: position.latitude,
            longitude: position.longitude,
            tier: LootTier::Common,
            contents: Vec::new(),
            collected: false,
            created_by: UserId::from("maker"),
            created_at: Utc::now(),
            collected_by: None,
            collected_at: None,
        }
    }

    fn origin() -> Position {
        Position::new(40.0, -74.0)
    }

    #[test]
    fn test_flags_once_until_resolved() {
        let mut index = ProximityIndex::default();
        let here = origin();
        index.on_position(here);
        index.on_store_event(&ChangeEvent::added(box_at(
            "near",
            &geo::offset(&here, 0.0, 12.0),
        )));

        let first = index.on_position(here);
        assert_eq!(first.triggered, vec![BoxId::from("near")]);
        assert!(index.is_in_flight(&BoxId::from("near")));

        let second = index.on_position(here);
        assert!(second.triggered.is_empty());

        index.finish(&BoxId::from("near"), true);
        assert!(!index.is_active(&BoxId::from("near")));
        assert!(index.on_position(here).triggered.is_empty());
    }

    #[test]
    fn test_unresolved_attempt_can_retrigger() {
        let mut index = ProximityIndex::default();
        let here = origin();
        index.on_position(here);
        index.on_store_event(&ChangeEvent::added(box_at("b", &here)));

        assert_eq!(index.on_position(here).triggered.len(), 1);
        index.finish(&BoxId::from("b"), false);
        assert_eq!(index.on_position(here).triggered.len(), 1);
    }

    #[test]
    fn test_outside_collection_radius_not_triggered() {
        let mut index = ProximityIndex::default();
        let here = origin();
        index.on_position(here);
        let delta = index.on_store_event(&ChangeEvent::added(box_at(
            "far",
            &geo::offset(&here, 1.0, 300.0),
        )));

        assert_eq!(delta.added, vec![BoxId::from("far")]);
        assert!(index.on_position(here).triggered.is_empty());
    }

    #[test]
    fn test_query_radius_bounds_active_set() {
        let mut index = ProximityIndex::default();
        let here = origin();
        index.on_position(here);
        let distant = box_at("distant", &geo::offset(&here, 0.0, 1500.0));

        assert!(index.on_store_event(&ChangeEvent::added(distant)).is_empty());
        assert_eq!(index.active_count(), 0);

        let tick = index.on_position(geo::offset(&here, 0.0, 1000.0));
        assert_eq!(tick.delta.added, vec![BoxId::from("distant")]);

        let tick = index.on_position(here);
        assert_eq!(tick.delta.removed, vec![BoxId::from("distant")]);
    }

    #[test]
    fn test_collected_event_removes_and_blocks_stale_add() {
        let mut index = ProximityIndex::default();
        let here = origin();
        index.on_position(here);
        let loot_box = box_at("x", &here);
        index.on_store_event(&ChangeEvent::added(loot_box.clone()));

        let collected = loot_box.clone().into_collected(UserId::from("rival"), Utc::now());
        let delta = index.on_store_event(&ChangeEvent::modified(collected));
        assert_eq!(delta.removed, vec![BoxId::from("x")]);

        index.on_store_event(&ChangeEvent::added(loot_box));
        assert!(!index.is_active(&BoxId::from("x")));
        assert!(index.on_position(here).triggered.is_empty());
    }

    #[test]
    fn test_triggered_nearest_first() {
        let mut index = ProximityIndex::default();
        let here = origin();
        index.on_position(here);
        index.on_store_event(&ChangeEvent::added(box_at("b", &geo::offset(&here, 0.0, 15.0))));
        index.on_store_event(&ChangeEvent::added(box_at("a", &geo::offset(&here, 2.0, 5.0))));

        let tick = index.on_position(here);
        assert_eq!(tick.triggered, vec![BoxId::from("a"), BoxId::from("b")]);
    }

    #[test]
    fn test_begin_respects_in_flight_and_resolved() {
        let mut index = ProximityIndex::default();
        let id = BoxId::from("click");

        assert!(index.begin(&id));
        assert!(!index.begin(&id));
        index.finish(&id, true);
        assert!(!index.begin(&id));
    }

    #[test]
    fn test_distant_events_do_not_accumulate() {
        let mut index = ProximityIndex::default();
        index.on_position(Position::new(0.0, 0.0));
        let elsewhere = Position::new(45.0, 90.0);

        for n in 0..5_000 {
            let loot_box = box_at(&format!("far-{n}"), &elsewhere);
            index.on_store_event(&ChangeEvent::added(loot_box.clone()));
            let collected = loot_box.into_collected(UserId::from("rival"), Utc::now());
            index.on_store_event(&ChangeEvent::modified(collected));
        }
        for _ in 0..10 {
            index.on_position(Position::new(0.0, 0.0));
        }

        assert_eq!(index.known_count(), 0);
        assert_eq!(index.resolved_count(), 0);
        assert_eq!(index.active_count(), 0);
    }

    #[test]
    fn test_walking_away_evicts_known_and_resolved() {
        let mut index = ProximityIndex::default();
        let here = origin();
        index.on_position(here);
        index.on_store_event(&ChangeEvent::added(box_at("kept", &geo::offset(&here, 0.0, 500.0))));
        index.on_store_event(&ChangeEvent::added(box_at("done", &here)));
        index.on_position(here);
        index.finish(&BoxId::from("done"), true);
        assert_eq!((index.known_count(), index.resolved_count()), (1, 1));

        let tick = index.on_position(geo::offset(&here, 3.0, 3_000.0));
        assert_eq!(tick.delta.removed, vec![BoxId::from("kept")]);
        assert_eq!((index.known_count(), index.resolved_count()), (0, 0));
    }

    #[test]
    fn test_in_flight_box_survives_eviction() {
        let mut index = ProximityIndex::default();
        let here = origin();
        index.on_position(here);
        index.on_store_event(&ChangeEvent::added(box_at("grab", &here)));
        assert_eq!(index.on_position(here).triggered.len(), 1);

        index.on_position(geo::offset(&here, 0.0, 5_000.0));
        assert_eq!(index.known_count(), 1);
        assert!(index.is_in_flight(&BoxId::from("grab")));

        index.finish(&BoxId::from("grab"), true);
        assert_eq!(index.known_count(), 0);
    }

    #[test]
    fn test_no_position_means_nothing_active() {
        let mut index = ProximityIndex::default();
        index.on_store_event(&ChangeEvent::added(box_at("a", &origin())));
        assert_eq!(index.active_count(), 0);

        let tick = index.on_position(origin());
        assert_eq!(tick.delta.added, vec![BoxId::from("a")]);
        assert_eq!(tick.triggered, vec![BoxId::from("a")]);
    }
}

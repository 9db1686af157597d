//! In-memory store for tests, demos and offline play
//!
//! Holds both collections behind mutexes. Every transaction runs with its
//! collection locked, which gives the same per-document serialization a real
//! document database provides. Transient failures can be injected to
//! exercise retry paths.

use super::{
    ChangeEvent, ChangeStream, InventoryMutator, InventoryStore, LootBoxFilter, LootBoxMutator,
    LootBoxStore, Mutation, SortOrder, StoreError, StoreResult, Transacted,
};
use crate::inventory::UserInventory;
use crate::loot::{BoxId, LootBox, UserId};
use futures::channel::mpsc::{self, UnboundedSender};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Subscriber {
    filter: LootBoxFilter,
    tx: UnboundedSender<ChangeEvent>,
}

/// Number of upcoming calls, per operation class, that fail transiently
#[derive(Debug, Default)]
struct FaultPlan {
    box_reads: AtomicUsize,
    box_writes: AtomicUsize,
    inventory_reads: AtomicUsize,
    inventory_writes: AtomicUsize,
}

impl FaultPlan {
    fn trip(counter: &AtomicUsize, what: &str) -> StoreResult<()> {
        let tripped = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            Err(StoreError::Transient(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
struct Inner {
    boxes: Mutex<HashMap<BoxId, LootBox>>,
    inventories: Mutex<HashMap<UserId, UserInventory>>,
    subscribers: Mutex<Vec<Subscriber>>,
    faults: FaultPlan,
    box_commits: AtomicUsize,
}

/// Shared in-memory store; clones see the same data
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` loot box reads fail transiently
    pub fn fail_next_box_reads(&self, n: usize) {
        self.inner.faults.box_reads.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` loot box writes (creates and transactions) fail
    pub fn fail_next_box_writes(&self, n: usize) {
        self.inner.faults.box_writes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` inventory reads fail transiently
    pub fn fail_next_inventory_reads(&self, n: usize) {
        self.inner.faults.inventory_reads.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` inventory transactions fail transiently
    pub fn fail_next_inventory_writes(&self, n: usize) {
        self.inner.faults.inventory_writes.store(n, Ordering::SeqCst);
    }

    /// Number of loot boxes stored
    pub fn loot_box_count(&self) -> usize {
        self.inner.boxes.lock().len()
    }

    /// Number of committed loot box writes (creates and replacements)
    pub fn box_commit_count(&self) -> usize {
        self.inner.box_commits.load(Ordering::SeqCst)
    }

    /// Direct read of a box, bypassing fault injection
    pub fn peek_loot_box(&self, id: &BoxId) -> Option<LootBox> {
        self.inner.boxes.lock().get(id).cloned()
    }

    /// Direct read of an inventory, bypassing fault injection
    pub fn peek_inventory(&self, user: &UserId) -> Option<UserInventory> {
        self.inner.inventories.lock().get(user).cloned()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|s| !s.tx.is_closed());
        subscribers.len()
    }

    /// Fan a committed change out to subscribers. Called with the box map
    /// locked so delivery order matches commit order.
    fn notify(&self, before: Option<&LootBox>, after: &LootBox) {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|sub| {
            let was = before.is_some_and(|b| sub.filter.matches(b));
            let is = sub.filter.matches(after);
            let event = match (was, is) {
                (false, true) => ChangeEvent::added(after.clone()),
                (true, true) => ChangeEvent::modified(after.clone()),
                (true, false) => ChangeEvent::removed(after.clone()),
                (false, false) => return !sub.tx.is_closed(),
            };
            sub.tx.unbounded_send(event).is_ok()
        });
    }

    fn sorted(mut boxes: Vec<LootBox>, order: SortOrder) -> Vec<LootBox> {
        match order {
            SortOrder::NewestFirst => boxes.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::OldestFirst => boxes.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
        boxes
    }
}

#[async_trait::async_trait]
impl LootBoxStore for MemoryStore {
    async fn create_loot_box(&self, loot_box: LootBox) -> StoreResult<BoxId> {
        FaultPlan::trip(&self.inner.faults.box_writes, "loot box write")?;

        let mut boxes = self.inner.boxes.lock();
        if boxes.contains_key(&loot_box.id) {
            return Err(StoreError::Rejected(format!(
                "loot box {} already exists",
                loot_box.id
            )));
        }

        let id = loot_box.id.clone();
        self.notify(None, &loot_box);
        boxes.insert(id.clone(), loot_box);
        self.inner.box_commits.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn get_loot_box(&self, id: &BoxId) -> StoreResult<Option<LootBox>> {
        FaultPlan::trip(&self.inner.faults.box_reads, "loot box read")?;
        Ok(self.inner.boxes.lock().get(id).cloned())
    }

    async fn transact_loot_box(
        &self,
        id: &BoxId,
        mutator: LootBoxMutator<'_>,
    ) -> StoreResult<Transacted<LootBox>> {
        FaultPlan::trip(&self.inner.faults.box_writes, "loot box transaction")?;

        let mut boxes = self.inner.boxes.lock();
        let Some(current) = boxes.get(id) else {
            return Ok(Transacted::Missing);
        };

        match mutator(current) {
            Mutation::Keep => Ok(Transacted::Unchanged(current.clone())),
            Mutation::Replace(next) => {
                let before = current.clone();
                self.notify(Some(&before), &next);
                boxes.insert(id.clone(), next.clone());
                self.inner.box_commits.fetch_add(1, Ordering::SeqCst);
                Ok(Transacted::Written(next))
            }
        }
    }

    async fn query_loot_boxes(
        &self,
        filter: &LootBoxFilter,
        order: SortOrder,
        limit: usize,
    ) -> StoreResult<Vec<LootBox>> {
        FaultPlan::trip(&self.inner.faults.box_reads, "loot box query")?;

        let matching: Vec<LootBox> = self
            .inner
            .boxes
            .lock()
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();

        let mut result = Self::sorted(matching, order);
        result.truncate(limit);
        Ok(result)
    }

    async fn subscribe_loot_boxes(&self, filter: LootBoxFilter) -> StoreResult<ChangeStream> {
        FaultPlan::trip(&self.inner.faults.box_reads, "loot box subscription")?;

        let (tx, rx) = mpsc::unbounded();

        // Snapshot and registration happen under the box lock so no commit
        // can slip between them.
        let boxes = self.inner.boxes.lock();
        let initial: Vec<LootBox> = boxes.values().filter(|b| filter.matches(b)).cloned().collect();
        for loot_box in Self::sorted(initial, SortOrder::NewestFirst) {
            // Receiver is alive, the send cannot fail here
            let _ = tx.unbounded_send(ChangeEvent::added(loot_box));
        }
        self.inner.subscribers.lock().push(Subscriber { filter, tx });
        drop(boxes);

        Ok(rx.boxed())
    }
}

#[async_trait::async_trait]
impl InventoryStore for MemoryStore {
    async fn get_inventory(&self, user: &UserId) -> StoreResult<Option<UserInventory>> {
        FaultPlan::trip(&self.inner.faults.inventory_reads, "inventory read")?;
        Ok(self.inner.inventories.lock().get(user).cloned())
    }

    async fn transact_inventory(
        &self,
        user: &UserId,
        mutator: InventoryMutator<'_>,
    ) -> StoreResult<Transacted<UserInventory>> {
        FaultPlan::trip(&self.inner.faults.inventory_writes, "inventory transaction")?;

        let mut inventories = self.inner.inventories.lock();
        let current = inventories
            .get(user)
            .cloned()
            .unwrap_or_else(|| UserInventory::new(user.clone()));

        match mutator(current.clone()) {
            Mutation::Keep => Ok(Transacted::Unchanged(current)),
            Mutation::Replace(next) => {
                inventories.insert(user.clone(), next.clone());
                Ok(Transacted::Written(next))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loot::LootTier;
    use crate::store::ChangeKind;
    use chrono::{Duration, Utc};
    use futures::executor::block_on;

    fn new_box(minutes_ago: i64) -> LootBox {
        LootBox {
            id: BoxId::generate(),
            latitude: 0.0,
            longitude: 0.0,
            tier: LootTier::Common,
            contents: Vec::new(),
            collected: false,
            created_by: UserId::from("maker"),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            collected_by: None,
            collected_at: None,
        }
    }

    fn collect(user: &str) -> impl Fn(&LootBox) -> Mutation<LootBox> + Send + Sync {
        let user = UserId::from(user);
        move |b: &LootBox| {
            if b.collected {
                Mutation::Keep
            } else {
                Mutation::Replace(b.clone().into_collected(user.clone(), Utc::now()))
            }
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = MemoryStore::new();
        let lb = new_box(0);
        let id = block_on(store.create_loot_box(lb.clone())).unwrap();
        assert_eq!(block_on(store.get_loot_box(&id)).unwrap(), Some(lb));
        assert_eq!(store.loot_box_count(), 1);
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let store = MemoryStore::new();
        let lb = new_box(0);
        block_on(store.create_loot_box(lb.clone())).unwrap();
        assert!(matches!(
            block_on(store.create_loot_box(lb)),
            Err(StoreError::Rejected(_))
        ));
    }

    #[test]
    fn test_transaction_outcomes() {
        let store = MemoryStore::new();
        let lb = new_box(0);
        block_on(store.create_loot_box(lb.clone())).unwrap();

        let first = block_on(store.transact_loot_box(&lb.id, &collect("a"))).unwrap();
        assert!(matches!(first, Transacted::Written(ref b) if b.collected));

        let second = block_on(store.transact_loot_box(&lb.id, &collect("b"))).unwrap();
        match second {
            Transacted::Unchanged(b) => assert_eq!(b.collected_by, Some(UserId::from("a"))),
            other => panic!("unexpected {other:?}"),
        }

        let missing = block_on(store.transact_loot_box(&BoxId::from("nope"), &collect("a")));
        assert_eq!(missing.unwrap(), Transacted::Missing);
    }

    #[test]
    fn test_query_orders_and_limits() {
        let store = MemoryStore::new();
        let old = new_box(10);
        let mid = new_box(5);
        let new = new_box(0);
        for b in [&mid, &old, &new] {
            block_on(store.create_loot_box(b.clone())).unwrap();
        }

        let newest =
            block_on(store.query_loot_boxes(&LootBoxFilter::uncollected(), SortOrder::NewestFirst, 2))
                .unwrap();
        assert_eq!(newest.iter().map(|b| &b.id).collect::<Vec<_>>(), vec![&new.id, &mid.id]);

        let oldest =
            block_on(store.query_loot_boxes(&LootBoxFilter::default(), SortOrder::OldestFirst, 10))
                .unwrap();
        assert_eq!(oldest[0].id, old.id);
    }

    #[test]
    fn test_subscription_snapshot_then_changes() {
        let store = MemoryStore::new();
        let existing = new_box(1);
        block_on(store.create_loot_box(existing.clone())).unwrap();

        let mut stream = block_on(store.subscribe_loot_boxes(LootBoxFilter::uncollected())).unwrap();
        let first = block_on(stream.next()).unwrap();
        assert_eq!(first.kind, ChangeKind::Added);
        assert_eq!(first.loot_box.id, existing.id);

        block_on(store.transact_loot_box(&existing.id, &collect("a"))).unwrap();
        let removal = block_on(stream.next()).unwrap();
        assert_eq!(removal.kind, ChangeKind::Removed);
        assert!(removal.loot_box.collected);
    }

    #[test]
    fn test_dropped_subscription_pruned() {
        let store = MemoryStore::new();
        let stream = block_on(store.subscribe_loot_boxes(LootBoxFilter::default())).unwrap();
        assert_eq!(store.subscriber_count(), 1);
        drop(stream);
        block_on(store.create_loot_box(new_box(0))).unwrap();
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_injected_faults_are_transient_and_consumed() {
        let store = MemoryStore::new();
        store.fail_next_box_writes(1);
        let lb = new_box(0);
        let err = block_on(store.create_loot_box(lb.clone())).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.loot_box_count(), 0);
        assert!(block_on(store.create_loot_box(lb)).is_ok());
    }

    #[test]
    fn test_inventory_created_lazily() {
        let store = MemoryStore::new();
        let user = UserId::from("u");
        assert!(block_on(store.get_inventory(&user)).unwrap().is_none());

        let keep = block_on(store.transact_inventory(&user, &|_| Mutation::Keep)).unwrap();
        assert!(matches!(keep, Transacted::Unchanged(ref inv) if inv.user_id == user));
        assert!(store.peek_inventory(&user).is_none());

        block_on(store.transact_inventory(&user, &|mut inv| {
            inv.total_boxes_collected += 1;
            Mutation::Replace(inv)
        }))
        .unwrap();
        assert_eq!(store.peek_inventory(&user).unwrap().total_boxes_collected, 1);
    }
}

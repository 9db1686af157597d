//! Concurrent collection against a shared store

use chrono::Utc;
use geoloot::{
    BoxId, CollectOutcome, CollectionCoordinator, InventoryStore, LootBox, LootBoxStore,
    LootTier, MemoryStore, MockSpawner, RetryPolicy, UserId, default_catalog,
};
use std::sync::Arc;

fn coordinator(store: &MemoryStore) -> CollectionCoordinator<MemoryStore, MockSpawner> {
    CollectionCoordinator::new(
        Arc::new(store.clone()),
        MockSpawner::new(),
        RetryPolicy::default(),
    )
}

async fn spawn_box(store: &MemoryStore, items: usize) -> LootBox {
    let catalog = default_catalog();
    let loot_box = LootBox {
        id: BoxId::generate(),
        latitude: 35.68,
        longitude: 139.69,
        tier: LootTier::Rare,
        contents: catalog.into_iter().take(items).collect(),
        collected: false,
        created_by: UserId::from("maker"),
        created_at: Utc::now(),
        collected_by: None,
        collected_at: None,
    };
    store.create_loot_box(loot_box.clone()).await.unwrap();
    loot_box
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_devices_race_for_one_box() {
    let store = MemoryStore::new();

    for _ in 0..50 {
        let loot_box = spawn_box(&store, 3).await;
        let user = UserId::from("alice");

        let a = {
            let coordinator = coordinator(&store);
            let (id, user) = (loot_box.id.clone(), user.clone());
            tokio::spawn(async move { coordinator.attempt_collect(&id, &user).await })
        };
        let b = {
            let coordinator = coordinator(&store);
            let (id, user) = (loot_box.id.clone(), user.clone());
            tokio::spawn(async move { coordinator.attempt_collect(&id, &user).await })
        };

        let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        let won = outcomes.iter().filter(|o| o.is_collected()).count();
        let lost = outcomes
            .iter()
            .filter(|o| **o == CollectOutcome::AlreadyCollected)
            .count();
        assert_eq!((won, lost), (1, 1), "{outcomes:?}");
    }

    let inventory = store.get_inventory(&UserId::from("alice")).await.unwrap().unwrap();
    assert_eq!(inventory.total_boxes_collected, 50);
    assert_eq!(inventory.total_items(), 150);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_players_one_winner() {
    let store = MemoryStore::new();
    let loot_box = spawn_box(&store, 2).await;

    let mut handles = Vec::new();
    for n in 0..8 {
        let coordinator = coordinator(&store);
        let id = loot_box.id.clone();
        let user = UserId::from(format!("player-{n}"));
        handles.push(tokio::spawn(async move {
            let outcome = coordinator.attempt_collect(&id, &user).await.unwrap();
            (user, outcome)
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (user, outcome) = handle.await.unwrap();
        if outcome.is_collected() {
            winners.push(user);
        } else {
            assert_eq!(outcome, CollectOutcome::AlreadyCollected);
        }
    }

    assert_eq!(winners.len(), 1);
    let stored = store.get_loot_box(&loot_box.id).await.unwrap().unwrap();
    assert_eq!(stored.collected_by.as_ref(), Some(&winners[0]));

    for n in 0..8 {
        let user = UserId::from(format!("player-{n}"));
        let credited = store.get_inventory(&user).await.unwrap();
        assert_eq!(credited.is_some(), user == winners[0]);
    }
}

#[tokio::test]
async fn test_missing_box_is_not_found_without_writes() {
    let store = MemoryStore::new();
    let coordinator = coordinator(&store);

    let outcome = coordinator
        .attempt_collect(&BoxId::from("does-not-exist"), &UserId::from("alice"))
        .await
        .unwrap();

    assert_eq!(outcome, CollectOutcome::NotFound);
    assert_eq!(store.loot_box_count(), 0);
    assert_eq!(store.box_commit_count(), 0);
    assert!(store.get_inventory(&UserId::from("alice")).await.unwrap().is_none());
    assert_eq!(coordinator.metrics().not_found(), 1);
}

#[tokio::test]
async fn test_collected_box_stays_collected() {
    let store = MemoryStore::new();
    let coordinator = coordinator(&store);
    let loot_box = spawn_box(&store, 1).await;

    coordinator
        .attempt_collect(&loot_box.id, &UserId::from("first"))
        .await
        .unwrap();
    let claimed = store.get_loot_box(&loot_box.id).await.unwrap().unwrap();

    for _ in 0..3 {
        let outcome = coordinator
            .attempt_collect(&loot_box.id, &UserId::from("late"))
            .await
            .unwrap();
        assert_eq!(outcome, CollectOutcome::AlreadyCollected);
    }

    let after = store.get_loot_box(&loot_box.id).await.unwrap().unwrap();
    assert_eq!(after, claimed);
    assert_eq!((after.latitude, after.longitude), (loot_box.latitude, loot_box.longitude));
}

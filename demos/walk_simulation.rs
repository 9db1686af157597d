//! Simulated walk through a park with another player's boxes scattered around
//!
//! Run with `cargo run --example walk_simulation`.

use futures::executor::block_on;
use geoloot::{
    geo, BoxId, ClickOutcome, CollectOutcome, FixedIdentity, LootBoxStore, LootConfig,
    LootGenerator, LootSession, ManualLocationProvider, MemoryStore, MockSpawner, Position,
    UserId,
};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let spawner = MockSpawner::queued();
    let config = LootConfig::default();

    // Someone walked here earlier and left boxes behind
    let start = Position::new(40.7829, -73.9654);
    let rival = LootGenerator::seeded(&config, 1)?;
    for i in 0..6 {
        let origin = geo::offset(&start, 0.1 * f64::from(i), 60.0 * f64::from(i + 1));
        let loot_box = rival.generate(&origin, &UserId::from("rival"));
        block_on(store.create_loot_box(loot_box))?;
    }

    let session = LootSession::with_generator(
        config.clone(),
        LootGenerator::seeded(&config, 2)?,
        Arc::new(store.clone()),
        spawner.clone(),
        &FixedIdentity(UserId::from("demo-walker")),
        Arc::new(ManualLocationProvider::new()),
    )?;
    let mut streams = block_on(session.start())?;
    let listener = session.change_listener();

    println!("Walking north from {}", geo::format_coordinates(&start));
    let mut here = start;
    for step in 0..50 {
        let report = block_on(session.on_position(here))?;
        if let Some(spawned) = &report.spawned {
            println!(
                "[{step:02}] spawned {} {} away",
                spawned.describe(),
                geo::format_distance(spawned.distance_from(&here))
            );
        }
        spawner.run_queued();
        streams.changes.pump_ready(&*listener);

        for id in &report.dispatched {
            if let Some((done, outcome)) = session.last_collect().get() {
                if &done == id {
                    println!("[{step:02}] collect {}: {}", id, describe(&outcome));
                }
            }
        }

        here = geo::offset(&here, 0.1, 12.0);
    }

    // Tap something that no longer exists
    if let ClickOutcome::Attempted(outcome) = block_on(session.on_box_clicked(&BoxId::from("stale")))? {
        println!("stale marker: {}", describe(&outcome));
    }

    let walked = block_on(session.stop());
    let inventory = block_on(session.inventory())?;
    println!("Walked {}", geo::format_distance(walked.cumulative_distance));
    println!("{}", inventory.summary());
    for line in &inventory.items {
        println!("  {} x{} ({})", line.item.name, line.quantity, line.item.rarity);
    }

    let metrics = session.metrics();
    println!(
        "spawns {}/{} committed, {} collected, {} lost races",
        metrics.spawns_committed(),
        metrics.spawns_requested(),
        metrics.collections(),
        metrics.conflicts()
    );
    Ok(())
}

fn describe(outcome: &CollectOutcome) -> String {
    match outcome {
        CollectOutcome::Collected(loot) => format!("got {} item(s)", loot.items.len()),
        CollectOutcome::AlreadyCollected => "already collected".to_string(),
        CollectOutcome::NotFound => "not found".to_string(),
    }
}

//! Statistical and geometric properties of loot generation

use geoloot::{geo, LootConfig, LootGenerator, LootTier, Position, UserId, WeightedSampler};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_tier_distribution_chi_squared() {
    let config = LootConfig::default();
    let generator = LootGenerator::seeded(&config, 0x5eed).unwrap();
    let draws = 100_000;

    let mut observed = [0u32; 5];
    for _ in 0..draws {
        let tier = generator.select_tier();
        let slot = LootTier::ALL.iter().position(|t| *t == tier).unwrap();
        observed[slot] += 1;
    }

    let chi_squared: f64 = LootTier::ALL
        .iter()
        .zip(observed.iter())
        .map(|(tier, &count)| {
            let expected = draws as f64 * f64::from(tier.default_weight()) / 100.0;
            let diff = f64::from(count) - expected;
            diff * diff / expected
        })
        .sum();

    // 4 degrees of freedom, p = 0.001
    assert!(chi_squared < 18.47, "chi^2 = {chi_squared}, observed {observed:?}");
}

#[test]
fn test_sampler_walks_weights_in_order() {
    let sampler = WeightedSampler::new(
        LootTier::ALL
            .iter()
            .map(|t| (*t, t.default_weight()))
            .collect(),
    )
    .unwrap();

    assert_eq!(sampler.pick(1), LootTier::Common);
    assert_eq!(sampler.pick(50), LootTier::Common);
    assert_eq!(sampler.pick(51), LootTier::Uncommon);
    assert_eq!(sampler.pick(80), LootTier::Uncommon);
    assert_eq!(sampler.pick(95), LootTier::Rare);
    assert_eq!(sampler.pick(99), LootTier::Epic);
    assert_eq!(sampler.pick(100), LootTier::Legendary);
}

#[test]
fn test_spawn_location_within_ring() {
    let generator = LootGenerator::seeded(&LootConfig::default(), 99).unwrap();
    let origins = [
        Position::new(0.0, 0.0),
        Position::new(37.7749, -122.4194),
        Position::new(-33.8688, 151.2093),
        Position::new(59.9, 10.75),
    ];

    for origin in &origins {
        for _ in 0..10_000 {
            let point = generator.spawn_location(origin, 10.0, 50.0);
            let d = geo::distance(origin, &point);
            assert!(
                (10.0 - 1e-3..=50.0 + 1e-3).contains(&d),
                "{d}m from {origin:?}"
            );
        }
    }
}

#[test]
fn test_bundle_sizes_stay_in_range() {
    let generator = LootGenerator::seeded(&LootConfig::default(), 4).unwrap();

    for tier in LootTier::ALL {
        let range = tier.bundle_range();
        let mut seen_min = usize::MAX;
        let mut seen_max = 0;
        for _ in 0..2_000 {
            let n = generator.bundle_size(tier);
            assert!(range.contains(&n), "{tier}: {n}");
            seen_min = seen_min.min(n);
            seen_max = seen_max.max(n);
        }
        assert_eq!(seen_min, *range.start());
        assert_eq!(seen_max, *range.end());
    }
}

#[test]
fn test_generated_boxes_respect_rarity_pool() {
    let generator = LootGenerator::seeded(&LootConfig::default(), 21).unwrap();
    let origin = Position::new(52.52, 13.405);
    let user = UserId::from("spawner");

    for _ in 0..2_000 {
        let loot_box = generator.generate(&origin, &user);
        assert!(!loot_box.collected);
        assert_eq!(loot_box.created_by, user);
        assert!(loot_box.tier.bundle_range().contains(&loot_box.contents.len()));
        assert!(loot_box.contents.iter().all(|item| item.rarity <= loot_box.tier));
    }
}

#[test]
fn test_select_items_repeats_when_pool_is_small() {
    let generator = LootGenerator::seeded(&LootConfig::default(), 8).unwrap();
    let items = generator.select_items(LootTier::Common, 40);

    assert_eq!(items.len(), 40);
    assert!(items.iter().all(|i| i.rarity == LootTier::Common));

    let mut ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert!(ids.len() < 40);
}

#[test]
fn test_same_seed_same_boxes() {
    let config = LootConfig::default();
    let a = LootGenerator::seeded(&config, 1234).unwrap();
    let b = LootGenerator::seeded(&config, 1234).unwrap();
    let origin = Position::new(1.0, 1.0);
    let user = UserId::from("u");

    for _ in 0..50 {
        let x = a.generate(&origin, &user);
        let y = b.generate(&origin, &user);
        assert_eq!(x.tier, y.tier);
        assert_eq!(x.contents, y.contents);
        assert_eq!(x.latitude, y.latitude);
        assert_eq!(x.longitude, y.longitude);
    }
}

#[test]
fn test_custom_rng_source() {
    let generator =
        LootGenerator::with_rng(&LootConfig::default(), StdRng::seed_from_u64(3)).unwrap();
    assert_eq!(generator.catalog().len(), 15);
}

//! Built-in item catalog

use super::tier::{Item, ItemCategory, LootTier};

/// The default catalog: three items for each rarity
pub fn default_catalog() -> Vec<Item> {
    use ItemCategory::*;
    use LootTier::*;

    vec![
        Item::new("health_potion_small", "Small Health Potion", Consumable, Common, 10, "Restores 50 HP"),
        Item::new("coins_small", "Gold Coins", Currency, Common, 25, "25 gold coins"),
        Item::new("bread", "Bread", Consumable, Common, 5, "Basic food item"),
        Item::new("health_potion_medium", "Health Potion", Consumable, Uncommon, 30, "Restores 100 HP"),
        Item::new("coins_medium", "Gold Coins", Currency, Uncommon, 50, "50 gold coins"),
        Item::new("iron_sword", "Iron Sword", Equipment, Uncommon, 75, "A sturdy iron sword"),
        Item::new("health_potion_large", "Greater Health Potion", Consumable, Rare, 60, "Restores 200 HP"),
        Item::new("coins_large", "Gold Coins", Currency, Rare, 100, "100 gold coins"),
        Item::new("steel_armor", "Steel Armor", Equipment, Rare, 150, "Protective steel armor"),
        Item::new("elixir", "Elixir of Power", Consumable, Epic, 200, "Grants temporary power boost"),
        Item::new("enchanted_bow", "Enchanted Bow", Equipment, Epic, 300, "A magical bow with increased damage"),
        Item::new("gems", "Precious Gems", Collectible, Epic, 250, "Rare gemstones"),
        Item::new("phoenix_feather", "Phoenix Feather", Collectible, Legendary, 1000, "Legendary phoenix feather"),
        Item::new("dragons_blade", "Dragon's Blade", Equipment, Legendary, 500, "A legendary sword forged by dragons"),
        Item::new("treasure_chest", "Ancient Treasure", Collectible, Legendary, 750, "Ancient treasure of immense value"),
    ]
}

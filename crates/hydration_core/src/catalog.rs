//! Static beverage catalog offered by the drink picker.

use schemars::JsonSchema;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, JsonSchema)]
pub struct DrinkType {
    pub id: &'static str,
    pub name: &'static str,
}

pub const DEFAULT_DRINK_TYPE: &str = "water";

pub const DRINK_TYPES: [DrinkType; 17] = [
    DrinkType { id: "coffee", name: "Coffee" },
    DrinkType { id: "tea", name: "Tea" },
    DrinkType { id: "water", name: "Water" },
    DrinkType { id: "mineral_water", name: "Mineral Water" },
    DrinkType { id: "juice", name: "Fruit Juice" },
    DrinkType { id: "energy_drink", name: "Energy Drink" },
    DrinkType { id: "sports_drink", name: "Sports Drink" },
    DrinkType { id: "protein_drink", name: "Protein Drink" },
    DrinkType { id: "smoothie", name: "Smoothie" },
    DrinkType { id: "milk", name: "Milk" },
    DrinkType { id: "skimmed_milk", name: "Skimmed Milk" },
    DrinkType { id: "hot_chocolate", name: "Hot Chocolate" },
    DrinkType { id: "soup", name: "Soup" },
    DrinkType { id: "soda", name: "Soda" },
    DrinkType { id: "beer", name: "Beer" },
    DrinkType { id: "wine", name: "Wine" },
    DrinkType { id: "liquor", name: "Liquor" },
];

pub fn drink_type(id: &str) -> Option<&'static DrinkType> {
    DRINK_TYPES.iter().find(|t| t.id == id)
}

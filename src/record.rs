//! A module for monster records and decoding them from upstream payloads.

use std::collections::BTreeMap;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Monster IDs as used by the upstream API.
pub type MonsterId = u32;

/// The races monsters can belong to.
pub const RACES: [&str; 10] = [
    "formless",
    "undead",
    "brute",
    "plant",
    "insect",
    "fish",
    "demon",
    "demihuman",
    "angel",
    "dragon",
];

/// The monster types.
pub const MONSTER_TYPES: [&str; 3] = ["normal", "boss", "shadow"];

/// The elements found as keys of a monster's elemental damage table.
pub const ELEMENTS: [&str; 10] = [
    "neutral", "poison", "earth", "shadow", "water", "undead", "fire", "holy", "wind", "ghost",
];

/// A normalized snapshot of one monster.
///
/// Records are created once per ID and never change afterwards; this is also the shape stored in
/// the cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonsterRecord {
    pub id: MonsterId,
    pub name: String,
    pub level: u32,
    /// Lower-cased, empty when upstream doesn't say.
    pub race: String,
    /// Lower-cased, empty when upstream doesn't say.
    #[serde(rename = "type")]
    pub monster_type: String,
    #[serde(rename = "elementalDamage")]
    pub elemental_damage: BTreeMap<String, f64>,
    pub maps: Vec<MapSpawn>,
    pub drops: Vec<String>,
}

/// A map the monster spawns on and how many of it spawn there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSpawn {
    pub name: String,
    pub amount: u32,
}

impl MonsterRecord {
    /// Decodes an upstream `/monsters/{id}` body into a record.
    ///
    /// Missing fields fall back to their defaults, but fields of the wrong shape fail the whole
    /// decode so partial records never leak out.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::record::MonsterRecord;
    ///
    /// let record = MonsterRecord::decode(1002, r#"{"monster_info": "Poring", "race": "Plant"}"#).unwrap();
    ///
    /// assert_eq!(record.name, "Poring");
    /// assert_eq!(record.race, "plant");
    /// assert_eq!(record.level, 0);
    /// assert!(record.drops.is_empty());
    /// ```
    pub fn decode(id: MonsterId, body: &str) -> Result<Self> {
        let raw: RawMonster =
            serde_json::from_str(body).map_err(|e| Error::decode(format!("monster {id}: {e}")))?;

        Ok(Self {
            id,
            name: raw.monster_info.unwrap_or_else(|| format!("Monster {id}")),
            level: raw.main_stats.level,
            race: raw.race.to_lowercase(),
            monster_type: raw.monster_type.to_lowercase(),
            elemental_damage: raw.elemental_damage.into_iter().map(|(k, v)| (k, v.0)).collect(),
            maps: raw
                .maps
                .into_iter()
                .map(|m| MapSpawn {
                    name: m.name,
                    amount: m.amount,
                })
                .collect(),
            drops: raw.drops.into_iter().map(|d| d.name).collect(),
        })
    }

    /// Names of the maps the monster spawns on, in upstream order.
    pub fn map_names(&self) -> impl Iterator<Item = &str> {
        self.maps.iter().map(|m| m.name.as_str())
    }

    /// The display label of the monster's maps, `"unknown"` when there are none.
    pub fn map_label(&self) -> String {
        if self.maps.is_empty() {
            "unknown".to_owned()
        } else {
            self.map_names().collect::<Vec<_>>().join(", ")
        }
    }
}

//
// Upstream schema
//

#[derive(Deserialize)]
struct RawMonster {
    #[serde(default)]
    monster_info: Option<String>,
    #[serde(default)]
    main_stats: RawStats,
    #[serde(default)]
    race: String,
    #[serde(default, rename = "type")]
    monster_type: String,
    #[serde(default)]
    maps: Vec<RawMap>,
    #[serde(default, rename = "elementalDamage")]
    elemental_damage: BTreeMap<String, Numeric>,
    #[serde(default)]
    drops: Vec<RawDrop>,
}

#[derive(Default, Deserialize)]
struct RawStats {
    #[serde(default, deserialize_with = "count")]
    level: u32,
}

#[derive(Deserialize)]
struct RawMap {
    #[serde(default = "unknown_map")]
    name: String,
    #[serde(default, deserialize_with = "count")]
    amount: u32,
}

#[derive(Deserialize)]
struct RawDrop {
    #[serde(default = "unknown_item")]
    name: String,
}

fn unknown_map() -> String {
    "Unknown".to_owned()
}

fn unknown_item() -> String {
    "Unknown item".to_owned()
}

/// A number that upstream may send as a JSON number or as a numeric string such as `"150%"`.
struct Numeric(f64);

impl<'de> Deserialize<'de> for Numeric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let number = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
            _ => None,
        };

        number
            .filter(|n: &f64| n.is_finite())
            .map(Numeric)
            .ok_or_else(|| de::Error::custom(format!("expected a number, found {value}")))
    }
}

/// A non-negative integer, possibly sent as a string.
fn count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let Numeric(n) = Numeric::deserialize(deserializer)?;

    if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(de::Error::custom(format!("expected a non-negative integer, found {n}")));
    }

    Ok(n as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WOLF: &str = r#"{
        "monster_info": "Wolf",
        "main_stats": { "level": "23" },
        "race": "Brute",
        "type": "Normal",
        "maps": [{ "name": "prt_fild08", "amount": 70 }, { "name": "pay_fild01" }],
        "elementalDamage": { "fire": 100, "earth": "150%" },
        "drops": [{ "name": "Wolf Claw" }, {}]
    }"#;

    #[test]
    fn decode() {
        let record = MonsterRecord::decode(1013, WOLF).unwrap();

        assert_eq!(record.id, 1013);
        assert_eq!(record.name, "Wolf");
        assert_eq!(record.level, 23);
        assert_eq!(record.race, "brute");
        assert_eq!(record.monster_type, "normal");
        assert_eq!(
            record.maps,
            vec![
                MapSpawn {
                    name: "prt_fild08".to_owned(),
                    amount: 70
                },
                MapSpawn {
                    name: "pay_fild01".to_owned(),
                    amount: 0
                }
            ]
        );
        assert_eq!(record.elemental_damage.get("fire"), Some(&100.0));
        assert_eq!(record.elemental_damage.get("earth"), Some(&150.0));
        assert_eq!(record.drops, vec!["Wolf Claw", "Unknown item"]);
    }

    #[test]
    fn decode_defaults() {
        let record = MonsterRecord::decode(4242, "{}").unwrap();

        assert_eq!(record.name, "Monster 4242");
        assert_eq!(record.level, 0);
        assert_eq!(record.race, "");
        assert_eq!(record.monster_type, "");
        assert!(record.maps.is_empty());
        assert!(record.elemental_damage.is_empty());
        assert!(record.drops.is_empty());
    }

    #[test]
    fn decode_fails_closed() {
        // Not JSON at all.
        assert!(MonsterRecord::decode(1, "<html>").is_err());
        // Wrong shapes.
        assert!(MonsterRecord::decode(1, r#"{"drops": "Jellopy"}"#).is_err());
        assert!(MonsterRecord::decode(1, r#"{"main_stats": {"level": -3}}"#).is_err());
        assert!(MonsterRecord::decode(1, r#"{"main_stats": {"level": "high"}}"#).is_err());
        assert!(MonsterRecord::decode(1, r#"{"elementalDamage": {"fire": []}}"#).is_err());
        assert!(MonsterRecord::decode(1, "42").is_err());
    }

    #[test]
    fn map_label() {
        let mut record = MonsterRecord::decode(1013, WOLF).unwrap();
        assert_eq!(record.map_label(), "prt_fild08, pay_fild01");

        record.maps.clear();
        assert_eq!(record.map_label(), "unknown");
    }

    #[test]
    fn cache_shape() {
        let record = MonsterRecord::decode(1013, WOLF).unwrap();
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["type"], "normal");
        assert_eq!(value["elementalDamage"]["fire"], 100.0);
        assert_eq!(value["maps"][0]["amount"], 70);
        assert_eq!(value["drops"][0], "Wolf Claw");
    }
}

//! A module for assembling drop graphs from a range of monster IDs.

use std::{
    collections::{BTreeMap, BTreeSet},
    ops::RangeInclusive,
};

use tracing::{info, warn};

use crate::{
    cache::Store,
    error::{Error, Result},
    fetch::{Fetcher, Source},
    graph::Graph,
    record::{MonsterId, MonsterRecord, ELEMENTS, MONSTER_TYPES, RACES},
};

/// An inclusive, non-empty range of monster IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IdRange {
    start: MonsterId,
    end: MonsterId,
}

impl IdRange {
    /// Creates the range `start..=end`, rejecting an `end` before `start`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::builder::IdRange;
    ///
    /// let range = IdRange::new(1002, 1004).unwrap();
    /// assert_eq!(range.ids().collect::<Vec<_>>(), vec![1002, 1003, 1004]);
    ///
    /// assert!(IdRange::new(1004, 1002).is_err());
    /// ```
    pub fn new(start: MonsterId, end: MonsterId) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidRange {
                what: "id",
                start,
                end,
            });
        }

        Ok(Self { start, end })
    }

    /// A range holding a single ID.
    pub fn single(id: MonsterId) -> Self {
        Self { start: id, end: id }
    }

    pub fn start(&self) -> MonsterId {
        self.start
    }

    pub fn end(&self) -> MonsterId {
        self.end
    }

    /// Returns the number of IDs in the range.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    /// Always `false`, ranges hold at least one ID.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The IDs in ascending order.
    pub fn ids(&self) -> RangeInclusive<MonsterId> {
        self.start..=self.end
    }
}

/// The predicates a monster must satisfy to enter the graph.
///
/// All set predicates must hold, unset ones always pass. Strings are compared case-insensitively
/// and an empty string leaves the predicate unset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterCriteria {
    ids: IdRange,
    levels: RangeInclusive<u32>,
    race: Option<String>,
    monster_type: Option<String>,
    weakness: Option<String>,
}

impl FilterCriteria {
    /// The default level bounds.
    pub const LEVELS: RangeInclusive<u32> = 1..=999;

    /// Creates criteria for the ID range with the default level bounds and nothing else set.
    pub fn new(ids: IdRange) -> Self {
        Self {
            ids,
            levels: Self::LEVELS,
            race: None,
            monster_type: None,
            weakness: None,
        }
    }

    /// Restricts levels to `min..=max`, rejecting a `max` below `min`.
    pub fn levels(mut self, min: u32, max: u32) -> Result<Self> {
        if max < min {
            return Err(Error::InvalidRange {
                what: "level",
                start: min,
                end: max,
            });
        }

        self.levels = min..=max;
        Ok(self)
    }

    pub fn race(mut self, race: &str) -> Self {
        self.race = predicate("race", race, &RACES);
        self
    }

    pub fn monster_type(mut self, monster_type: &str) -> Self {
        self.monster_type = predicate("type", monster_type, &MONSTER_TYPES);
        self
    }

    /// Requires the element to be a key of the monster's elemental damage table.
    ///
    /// The element is lower-cased like every predicate and then compared exactly, as upstream
    /// keys are lower-case.
    pub fn weakness(mut self, element: &str) -> Self {
        self.weakness = predicate("element", element, &ELEMENTS);
        self
    }

    pub fn id_range(&self) -> IdRange {
        self.ids
    }

    /// Checks the record against every predicate but the ID range.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::builder::{FilterCriteria, IdRange};
    /// use dropnet::record::MonsterRecord;
    ///
    /// let wolf = MonsterRecord::decode(
    ///     1013,
    ///     r#"{"monster_info": "Wolf", "main_stats": {"level": 23}, "race": "Brute"}"#,
    /// )
    /// .unwrap();
    /// let criteria = FilterCriteria::new(IdRange::single(1013));
    ///
    /// assert!(criteria.clone().race("brute").matches(&wolf));
    /// assert!(!criteria.clone().race("plant").matches(&wolf));
    /// assert!(!criteria.levels(1, 10).unwrap().matches(&wolf));
    /// ```
    pub fn matches(&self, record: &MonsterRecord) -> bool {
        if !self.levels.contains(&record.level) {
            return false;
        }
        if matches!(&self.race, Some(race) if *race != record.race) {
            return false;
        }
        if matches!(&self.monster_type, Some(t) if *t != record.monster_type) {
            return false;
        }
        if let Some(element) = &self.weakness {
            return record.elemental_damage.contains_key(element);
        }

        true
    }
}

/// Normalizes a predicate, unset when blank. Values outside `known` are kept but can't match
/// anything upstream serves, so they're logged.
fn predicate(what: &'static str, value: &str, known: &[&str]) -> Option<String> {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return None;
    }
    if !known.contains(&value.as_str()) {
        warn!(what, value = %value, "unknown filter value");
    }

    Some(value)
}

/// How far a build has got.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    /// The completed share, in `[0, 1]`. An empty workload is complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }

        self.processed as f64 / self.total as f64
    }
}

/// One spawn of a monster on a map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnRow {
    pub map: String,
    pub monster: String,
    pub amount: u32,
}

/// The result of a build.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Build {
    pub graph: Graph,
    /// IDs upstream couldn't resolve.
    pub not_found: BTreeSet<MonsterId>,
    /// How many of the monsters in the graph spawn on each map.
    pub map_counts: BTreeMap<String, usize>,
    /// Every spawn of every resolved monster in the range, filtered out or not, in ID order.
    pub spawns: Vec<SpawnRow>,
}

/// Builds the drop graph of the monsters in the criteria's ID range that pass its predicates.
///
/// IDs are fetched in parallel but processed in ascending order, so identical fetch results and
/// criteria always produce the same build. `on_progress` is called as each ID completes.
pub fn build<S, C, F>(fetcher: &Fetcher<S, C>, criteria: &FilterCriteria, on_progress: F) -> Build
where
    S: Source,
    C: Store + Send,
    F: Fn(Progress) + Sync,
{
    let ids: Vec<MonsterId> = criteria.id_range().ids().collect();
    let mut build = Build::default();
    let mut filtered_out = 0;

    for (id, record) in fetcher.fetch_all(&ids, on_progress) {
        let Some(record) = record else {
            build.not_found.insert(id);
            continue;
        };

        build.spawns.extend(record.maps.iter().map(|spawn| SpawnRow {
            map: spawn.name.clone(),
            monster: record.name.clone(),
            amount: spawn.amount,
        }));

        if !criteria.matches(&record) {
            filtered_out += 1;
            continue;
        }

        build.insert(&record);
    }

    info!(
        nodes = build.graph.node_count(),
        edges = build.graph.edge_count(),
        not_found = build.not_found.len(),
        filtered_out,
        "built drop graph"
    );

    build
}

impl Build {
    fn insert(&mut self, record: &MonsterRecord) {
        self.graph.insert_monster(&record.name, record.map_label());

        for map in record.map_names() {
            *self.map_counts.entry(map.to_owned()).or_default() += 1;
        }
        for item in &record.drops {
            self.graph.insert_drop(&record.name, item);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{
        cache::MemoryStore,
        fetch::Response,
        graph::{NodeData, NodeKey},
    };

    /// Serves fixed bodies, `404` for anything else.
    struct Fixtures(HashMap<MonsterId, &'static str>);

    impl Source for Fixtures {
        fn request(&self, id: MonsterId) -> Result<Response> {
            Ok(match self.0.get(&id) {
                Some(body) => Response::Body((*body).to_owned()),
                None => Response::Status(404),
            })
        }
    }

    fn fetcher() -> Fetcher<Fixtures, MemoryStore> {
        let fixtures = Fixtures(HashMap::from([
            (
                1,
                r#"{"monster_info": "Poring", "main_stats": {"level": 1}, "race": "plant",
                    "maps": [{"name": "prt_fild08", "amount": 60}],
                    "elementalDamage": {"fire": 100, "wind": 175},
                    "drops": [{"name": "Jellopy"}, {"name": "Sticky Mucus"}]}"#,
            ),
            (
                3,
                r#"{"monster_info": "Wolf", "main_stats": {"level": 23}, "race": "brute",
                    "maps": [{"name": "prt_fild08", "amount": 5}, {"name": "pay_fild01", "amount": 70}],
                    "type": "Normal",
                    "drops": [{"name": "Wolf Claw"}, {"name": "Jellopy"}]}"#,
            ),
            (
                5,
                r#"{"monster_info": "Vagabond Wolf", "main_stats": {"level": 93}, "race": "Brute",
                    "type": "Boss", "maps": [{"name": "pay_fild10", "amount": 1}],
                    "elementalDamage": {"fire": 150, "earth": 50},
                    "drops": [{"name": "Wolf Claw"}, {"name": "Vagabond's Skull"}]}"#,
            ),
        ]));

        Fetcher::new(fixtures, MemoryStore::new()).with_concurrency(2)
    }

    #[test]
    fn id_range() {
        let range = IdRange::new(5, 5).unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range, IdRange::single(5));

        assert!(matches!(
            IdRange::new(10, 9),
            Err(Error::InvalidRange {
                what: "id",
                start: 10,
                end: 9
            })
        ));
    }

    #[test]
    fn level_bounds() {
        let criteria = FilterCriteria::new(IdRange::single(1));

        assert!(criteria.clone().levels(3, 3).is_ok());
        assert!(matches!(
            criteria.levels(50, 1),
            Err(Error::InvalidRange { what: "level", .. })
        ));
    }

    #[test]
    fn empty_predicates_are_unset() {
        let criteria = FilterCriteria::new(IdRange::single(1))
            .race("")
            .monster_type("  ")
            .weakness("");

        assert_eq!(criteria, FilterCriteria::new(IdRange::single(1)));
    }

    #[test]
    fn weakness() {
        let poring = MonsterRecord::decode(1, r#"{"main_stats": {"level": 1}, "elementalDamage": {"fire": 100}}"#)
            .unwrap();
        let criteria = FilterCriteria::new(IdRange::single(1));

        assert!(criteria.clone().weakness("Fire").matches(&poring));
        assert!(!criteria.weakness("ghost").matches(&poring));

        // Keys are compared exactly once the element is lower-cased.
        let shouting = MonsterRecord::decode(1, r#"{"main_stats": {"level": 1}, "elementalDamage": {"Fire": 100}}"#)
            .unwrap();
        assert!(!FilterCriteria::new(IdRange::single(1))
            .weakness("fire")
            .matches(&shouting));
    }

    #[test]
    fn known_predicate_values() {
        let criteria = FilterCriteria::new(IdRange::single(1)).levels(0, 0).unwrap();

        for race in RACES {
            let body = format!(r#"{{"race": "{}"}}"#, race.to_uppercase());
            let record = MonsterRecord::decode(1, &body).unwrap();
            assert!(criteria.clone().race(race).matches(&record), "{race}");
        }
        for monster_type in MONSTER_TYPES {
            let body = format!(r#"{{"type": "{monster_type}"}}"#);
            let record = MonsterRecord::decode(1, &body).unwrap();
            assert!(criteria.clone().monster_type(monster_type).matches(&record), "{monster_type}");
        }
        for element in ELEMENTS {
            let body = format!(r#"{{"elementalDamage": {{"{element}": 100}}}}"#);
            let record = MonsterRecord::decode(1, &body).unwrap();
            assert!(criteria.clone().weakness(element).matches(&record), "{element}");
        }

        // Unknown values are kept, so they filter everything out.
        let unknown = criteria.race("dinosaur");
        assert_eq!(unknown.race.as_deref(), Some("dinosaur"));
        assert!(!unknown.matches(&MonsterRecord::decode(1, r#"{"race": "brute"}"#).unwrap()));
    }

    #[test]
    fn progress_fraction() {
        assert_eq!(Progress { processed: 1, total: 4 }.fraction(), 0.25);
        assert_eq!(Progress { processed: 0, total: 0 }.fraction(), 1.0);
    }

    #[test]
    fn build_everything() {
        let criteria = FilterCriteria::new(IdRange::new(1, 4).unwrap());
        let build = build(&fetcher(), &criteria, |_| ());

        assert_eq!(build.graph.node_count(), 5);
        assert_eq!(build.graph.edge_count(), 4);
        assert_eq!(build.not_found, BTreeSet::from([2, 4]));
        assert_eq!(
            build.graph.node(&NodeKey::monster("Wolf")),
            Some(&NodeData::Monster {
                map_label: "prt_fild08, pay_fild01".to_owned()
            })
        );
        assert_eq!(
            build.map_counts,
            BTreeMap::from([("pay_fild01".to_owned(), 1), ("prt_fild08".to_owned(), 2)])
        );
        assert_eq!(build.spawns.len(), 3);
        assert_eq!(
            build.spawns[0],
            SpawnRow {
                map: "prt_fild08".to_owned(),
                monster: "Poring".to_owned(),
                amount: 60
            }
        );
    }

    #[test]
    fn build_filtered() {
        let criteria = FilterCriteria::new(IdRange::new(1, 3).unwrap()).race("Brute");
        let build = build(&fetcher(), &criteria, |_| ());

        assert_eq!(build.graph.node_count(), 3);
        assert!(!build.graph.contains_node(&NodeKey::monster("Poring")));
        assert!(!build.graph.contains_node(&NodeKey::item("Sticky Mucus")));
        assert_eq!(build.map_counts.get("prt_fild08"), Some(&1));

        // The spawn table ignores the filters.
        assert_eq!(build.spawns.len(), 3);
    }

    #[test]
    fn build_by_type() {
        let ids = IdRange::new(1, 5).unwrap();

        let bosses = build(&fetcher(), &FilterCriteria::new(ids).monster_type("boss"), |_| ());
        assert_eq!(bosses.graph.node_count(), 3);
        assert!(bosses.graph.contains_node(&NodeKey::monster("Vagabond Wolf")));
        assert!(bosses.graph.contains_node(&NodeKey::item("Wolf Claw")));
        assert!(bosses.graph.contains_node(&NodeKey::item("Vagabond's Skull")));
        assert_eq!(bosses.map_counts, BTreeMap::from([("pay_fild10".to_owned(), 1)]));

        // Race and type must both hold, so the normal Wolf is left out.
        let criteria = FilterCriteria::new(ids).race("brute").monster_type("boss");
        let brute_bosses = build(&fetcher(), &criteria, |_| ());
        assert_eq!(brute_bosses.graph, bosses.graph);
        assert!(!brute_bosses.graph.contains_node(&NodeKey::monster("Wolf")));

        let normal_brutes = build(
            &fetcher(),
            &FilterCriteria::new(ids).race("brute").monster_type("normal"),
            |_| (),
        );
        assert!(normal_brutes.graph.contains_node(&NodeKey::monster("Wolf")));
        assert!(!normal_brutes.graph.contains_node(&NodeKey::monster("Vagabond Wolf")));

        // A weakness only Poring and the boss carry narrows brutes down to the boss.
        let fire_brutes = build(
            &fetcher(),
            &FilterCriteria::new(ids).race("brute").weakness("fire"),
            |_| (),
        );
        assert_eq!(fire_brutes.graph, bosses.graph);

        let none = build(
            &fetcher(),
            &FilterCriteria::new(ids).monster_type("boss").weakness("wind"),
            |_| (),
        );
        assert_eq!(none.graph.node_count(), 0);
        assert_eq!(none.spawns.len(), 4);
    }

    #[test]
    fn build_reports_progress() {
        let criteria = FilterCriteria::new(IdRange::new(1, 4).unwrap());
        let seen = std::sync::Mutex::new(Vec::new());

        build(&fetcher(), &criteria, |p| seen.lock().unwrap().push(p));

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|p| p.total == 4));
        assert!(seen.iter().any(|p| p.fraction() == 1.0));
    }
}

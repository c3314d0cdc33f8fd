//! A module for persisting monster records between runs.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    error::{Error, Result},
    record::{MonsterId, MonsterRecord},
};

/// A mapping from monster ID to its normalized record.
///
/// Implementations assume a single writer.
pub trait Store {
    fn get(&self, id: MonsterId) -> Option<MonsterRecord>;

    fn put(&mut self, id: MonsterId, record: MonsterRecord) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A non-durable store, useful for tests and dry runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    records: HashMap<MonsterId, MonsterRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, id: MonsterId) -> Option<MonsterRecord> {
        self.records.get(&id).cloned()
    }

    fn put(&mut self, id: MonsterId, record: MonsterRecord) -> Result<()> {
        self.records.insert(id, record);
        Ok(())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// A store backed by a single JSON document mapping string-encoded IDs to records.
///
/// The whole document is loaded on open and rewritten after every [`put`](Store::put).
///
/// # Examples
///
/// ```
/// use dropnet::cache::{JsonFileStore, Store};
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = JsonFileStore::open(dir.path().join("monster_cache.json")).unwrap();
///
/// assert!(store.is_empty());
/// ```
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: BTreeMap<MonsterId, MonsterRecord>,
}

impl JsonFileStore {
    /// Loads the store from `path`, an absent file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records = match fs::read_to_string(&path) {
            Ok(contents) => parse_document(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), records = records.len(), "opened monster cache");

        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the whole document, via a sibling temporary file so readers never see a torn
    /// write.
    fn flush(&self) -> Result<()> {
        let document: BTreeMap<String, &MonsterRecord> = self
            .records
            .iter()
            .map(|(id, record)| (id.to_string(), record))
            .collect();

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");

        fs::write(&tmp, serde_json::to_vec(&document)?)?;
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

impl Store for JsonFileStore {
    fn get(&self, id: MonsterId) -> Option<MonsterRecord> {
        self.records.get(&id).cloned()
    }

    fn put(&mut self, id: MonsterId, record: MonsterRecord) -> Result<()> {
        self.records.insert(id, record);
        self.flush()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

fn parse_document(contents: &str) -> Result<BTreeMap<MonsterId, MonsterRecord>> {
    let document: BTreeMap<String, MonsterRecord> = serde_json::from_str(contents)?;

    document
        .into_iter()
        .map(|(key, record)| {
            key.parse::<MonsterId>()
                .map(|id| (id, record))
                .map_err(|_| Error::decode(format!("cache key {key:?} isn't a monster ID")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MapSpawn;

    fn poring() -> MonsterRecord {
        MonsterRecord {
            id: 1002,
            name: "Poring".to_owned(),
            level: 1,
            race: "plant".to_owned(),
            monster_type: "normal".to_owned(),
            elemental_damage: [("fire".to_owned(), 125.0)].into_iter().collect(),
            maps: vec![MapSpawn {
                name: "prt_fild08".to_owned(),
                amount: 30,
            }],
            drops: vec!["Jellopy".to_owned(), "Sticky Mucus".to_owned()],
        }
    }

    #[test]
    fn memory_store() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get(1002), None);

        store.put(1002, poring()).unwrap();

        assert_eq!(store.get(1002), Some(poring()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("cache.json")).unwrap();

        assert!(store.is_empty());
        // Nothing is written until the first put.
        assert!(!store.path().exists());
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.put(1002, poring()).unwrap();
        drop(store);

        let reloaded = JsonFileStore::open(&path).unwrap();
        assert_eq!(reloaded.get(1002), Some(poring()));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn keys_are_string_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.put(1002, poring()).unwrap();

        let document: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["1002"]["name"], "Poring");
        assert_eq!(document["1002"]["type"], "normal");
    }

    #[test]
    fn reject_malformed_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        fs::write(&path, "not json").unwrap();
        assert!(matches!(JsonFileStore::open(&path), Err(Error::Json(_))));

        let record = serde_json::to_string(&poring()).unwrap();
        fs::write(&path, format!(r#"{{"poring": {record}}}"#)).unwrap();
        assert!(matches!(JsonFileStore::open(&path), Err(Error::Decode(_))));
    }
}

//! Block registry: canonical block names and property sets to numeric state
//! ids.
//!
//! Names are normalized (namespace stripped, uppercased) and properties are
//! sorted by name before lookup, so the same state always resolves to the same
//! id whatever order the source listed its properties in.

use crate::error::{RegistryLoadError, ResolveError};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Numeric block state id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BlockStateId(pub u16);

impl fmt::Display for BlockStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strips a `namespace:` prefix and uppercases the rest.
pub fn normalize_block_name(name: &str) -> String {
    let path = match name.find(':') {
        Some(index) => &name[index + 1..],
        None => name,
    };

    path.to_uppercase()
}

/// Normalized block name with properties sorted by property name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockStateKey {
    name: String,
    properties: Vec<(String, String)>,
}

impl BlockStateKey {
    pub fn new<I, K, V>(name: &str, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut properties: Vec<(String, String)> = properties
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        properties.sort();

        BlockStateKey {
            name: normalize_block_name(name),
            properties,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// `key1=value1,key2=value2` in property name order.
    pub fn descriptor(&self) -> String {
        descriptor(self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

impl fmt::Display for BlockStateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.properties.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.descriptor())
        }
    }
}

fn descriptor<'a, I: Iterator<Item = (&'a str, &'a str)>>(properties: I) -> String {
    properties
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",")
}

/// One block type with all of its states.
#[derive(Debug, Clone)]
pub struct BlockEntry {
    name: String,
    default_id: BlockStateId,
    /// Valid values per property name.
    properties: BTreeMap<String, Vec<String>>,
    /// State descriptor to id.
    states: HashMap<String, BlockStateId>,
}

impl BlockEntry {
    pub fn new(name: &str, default_id: BlockStateId) -> Self {
        BlockEntry {
            name: normalize_block_name(name),
            default_id,
            properties: BTreeMap::new(),
            states: HashMap::new(),
        }
    }

    /// Adds a property-qualified state, recording its values as valid.
    pub fn with_state(mut self, properties: &[(&str, &str)], id: BlockStateId) -> Self {
        let mut sorted = properties.to_vec();
        sorted.sort();

        for (key, value) in &sorted {
            let values = self.properties.entry((*key).to_owned()).or_default();

            if !values.iter().any(|known| known == *value) {
                values.push((*value).to_owned());
            }
        }

        if !sorted.is_empty() {
            self.states.insert(descriptor(sorted.into_iter()), id);
        }

        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_id(&self) -> BlockStateId {
        self.default_id
    }

    pub fn properties(&self) -> &BTreeMap<String, Vec<String>> {
        &self.properties
    }

    /// Looks up a state by its sorted descriptor.
    pub fn state(&self, descriptor: &str) -> Option<BlockStateId> {
        self.states.get(descriptor).copied()
    }
}

/// Immutable table of every known block.
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    blocks: HashMap<String, BlockEntry>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        BlockRegistry::default()
    }

    /// Adds an entry. The first entry registered under a normalized name wins.
    pub fn insert(&mut self, entry: BlockEntry) -> bool {
        if self.blocks.contains_key(&entry.name) {
            warn!(
                target: "anvil-convert",
                "Block {} registered twice, keeping the first", entry.name
            );
            return false;
        }

        self.blocks.insert(entry.name.clone(), entry);
        true
    }

    pub fn get(&self, name: &str) -> Option<&BlockEntry> {
        self.blocks.get(&normalize_block_name(name))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Id of the block's default state.
    pub fn resolve_default(&self, name: &str) -> Result<BlockStateId, ResolveError> {
        self.get(name)
            .map(BlockEntry::default_id)
            .ok_or_else(|| ResolveError::UnknownBlock {
                name: normalize_block_name(name),
            })
    }

    /// Id of the state with exactly these properties, in any order.
    pub fn resolve<K, V>(&self, name: &str, properties: &[(K, V)]) -> Result<BlockStateId, ResolveError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let key = BlockStateKey::new(
            name,
            properties
                .iter()
                .map(|(key, value)| (key.as_ref(), value.as_ref())),
        );

        self.resolve_key(&key)
    }

    pub fn resolve_key(&self, key: &BlockStateKey) -> Result<BlockStateId, ResolveError> {
        let entry = self
            .blocks
            .get(key.name())
            .ok_or_else(|| ResolveError::UnknownBlock {
                name: key.name().to_owned(),
            })?;

        if key.properties().is_empty() {
            return Ok(entry.default_id);
        }

        let descriptor = key.descriptor();

        entry
            .state(&descriptor)
            .ok_or_else(|| ResolveError::UnknownState {
                name: key.name().to_owned(),
                descriptor,
            })
    }

    /// Loads the `blocks.json` report produced by the vanilla data generator.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegistryLoadError> {
        let file = File::open(path)?;

        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RegistryLoadError> {
        let report: BTreeMap<String, BlockReport> = serde_json::from_reader(reader)?;

        Self::from_report(report)
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryLoadError> {
        let report: BTreeMap<String, BlockReport> = serde_json::from_str(json)?;

        Self::from_report(report)
    }

    fn from_report(report: BTreeMap<String, BlockReport>) -> Result<Self, RegistryLoadError> {
        let mut registry = BlockRegistry::new();

        for (name, block) in report {
            let default_state = block
                .states
                .iter()
                .find(|state| state.default)
                .or_else(|| match block.states.as_slice() {
                    [only] => Some(only),
                    _ => None,
                })
                .ok_or_else(|| RegistryLoadError::NoDefaultState { name: name.clone() })?;

            let mut entry = BlockEntry::new(&name, BlockStateId(default_state.id));
            entry.properties = block.properties;

            for state in &block.states {
                if state.properties.is_empty() {
                    continue;
                }

                let descriptor = descriptor(
                    state
                        .properties
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.as_str())),
                );
                entry.states.insert(descriptor, BlockStateId(state.id));
            }

            registry.insert(entry);
        }

        Ok(registry)
    }
}

#[derive(Deserialize)]
struct BlockReport {
    #[serde(default)]
    properties: BTreeMap<String, Vec<String>>,
    states: Vec<StateReport>,
}

#[derive(Deserialize)]
struct StateReport {
    id: u16,
    #[serde(default)]
    default: bool,
    /// Sorted by name, which is the descriptor order.
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "minecraft:air": { "states": [ { "id": 0, "default": true } ] },
        "minecraft:stone": { "states": [ { "id": 1 } ] },
        "minecraft:oak_log": {
            "properties": { "axis": ["x", "y", "z"] },
            "states": [
                { "id": 73, "properties": { "axis": "x" } },
                { "id": 74, "default": true, "properties": { "axis": "y" } },
                { "id": 75, "properties": { "axis": "z" } }
            ]
        },
        "minecraft:oak_stairs": {
            "properties": {
                "facing": ["north", "south"],
                "half": ["top", "bottom"],
                "waterlogged": ["true", "false"]
            },
            "states": [
                { "id": 1000, "properties": { "facing": "north", "half": "top", "waterlogged": "true" } },
                { "id": 1001, "default": true, "properties": { "facing": "north", "half": "top", "waterlogged": "false" } },
                { "id": 1002, "properties": { "facing": "south", "half": "bottom", "waterlogged": "false" } }
            ]
        }
    }"#;

    fn registry() -> BlockRegistry {
        BlockRegistry::from_json(REPORT).unwrap()
    }

    #[test]
    fn test_normalize_block_name() {
        assert_eq!(normalize_block_name("minecraft:oak_log"), "OAK_LOG");
        assert_eq!(normalize_block_name("mod:thing"), "THING");
        assert_eq!(normalize_block_name("stone"), "STONE");
    }

    #[test]
    fn test_resolve_default() {
        let registry = registry();

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.resolve_default("minecraft:stone"), Ok(BlockStateId(1)));
        assert_eq!(registry.resolve_default("OAK_LOG"), Ok(BlockStateId(74)));
    }

    #[test]
    fn test_resolve_without_properties_is_default() {
        let registry = registry();
        let empty: [(&str, &str); 0] = [];

        for name in &["minecraft:air", "minecraft:stone", "minecraft:oak_log", "oak_stairs"] {
            assert_eq!(registry.resolve(name, &empty), registry.resolve_default(name));
        }
    }

    #[test]
    fn test_resolve_is_order_independent() {
        let registry = registry();
        let permutations = [
            [("facing", "south"), ("half", "bottom"), ("waterlogged", "false")],
            [("waterlogged", "false"), ("facing", "south"), ("half", "bottom")],
            [("half", "bottom"), ("waterlogged", "false"), ("facing", "south")],
        ];

        for properties in &permutations {
            assert_eq!(
                registry.resolve("minecraft:oak_stairs", properties),
                Ok(BlockStateId(1002))
            );
        }
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = registry();

        assert_eq!(
            registry.resolve("minecraft:dirt", &[("snowy", "false")]),
            Err(ResolveError::UnknownBlock {
                name: "DIRT".to_owned()
            })
        );
        assert_eq!(
            registry.resolve("minecraft:oak_log", &[("axis", "w")]),
            Err(ResolveError::UnknownState {
                name: "OAK_LOG".to_owned(),
                descriptor: "axis=w".to_owned()
            })
        );
    }

    #[test]
    fn test_descriptor_is_sorted() {
        let key = BlockStateKey::new(
            "minecraft:oak_stairs",
            vec![("waterlogged", "false"), ("facing", "north"), ("half", "top")],
        );

        assert_eq!(key.descriptor(), "facing=north,half=top,waterlogged=false");
        assert_eq!(
            key.to_string(),
            "OAK_STAIRS[facing=north,half=top,waterlogged=false]"
        );
    }

    #[test]
    fn test_entry_builder() {
        let entry = BlockEntry::new("minecraft:grass_block", BlockStateId(9))
            .with_state(&[("snowy", "true")], BlockStateId(8))
            .with_state(&[("snowy", "false")], BlockStateId(9));

        let mut registry = BlockRegistry::new();
        assert!(registry.insert(entry.clone()));
        assert!(!registry.insert(entry));

        assert_eq!(
            registry.get("grass_block").unwrap().properties()["snowy"],
            vec!["true".to_owned(), "false".to_owned()]
        );
        assert_eq!(
            registry.resolve("minecraft:grass_block", &[("snowy", "true")]),
            Ok(BlockStateId(8))
        );
    }

    #[test]
    fn test_block_without_default_state() {
        let json = r#"{ "minecraft:odd": { "states": [ { "id": 1 }, { "id": 2 } ] } }"#;

        match BlockRegistry::from_json(json) {
            Err(RegistryLoadError::NoDefaultState { name }) => assert_eq!(name, "minecraft:odd"),
            other => panic!("Expected `NoDefaultState` but got `{:?}`", other),
        }
    }
}

//! Static object pool
//!
//! String and number literals, member names and type prototype objects are
//! hoisted out of the instruction stream into the pool and referenced by
//! index. Strings and numbers are deduplicated.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Member value stored on a static prototype object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StaticMember {
    /// `null`
    Null,
    /// Boolean constant
    Bool(bool),
    /// Number constant
    Number(f64),
    /// String constant
    String(String),
    /// Function table index
    Function(u32),
    /// Another static pool entry
    Static(u32),
}

/// Prototype object for a declared type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrototypeObject {
    /// Declared type name (instantiated generics include their arguments)
    pub type_name: String,
    /// Static index of the base prototype
    pub parent: Option<u32>,
    /// Members in declaration order
    pub members: Vec<(String, StaticMember)>,
}

impl PrototypeObject {
    /// Look up a member declared directly on this prototype
    pub fn member(&self, name: &str) -> Option<&StaticMember> {
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, value)| value)
    }
}

/// Static pool entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StaticValue {
    /// Number literal
    Number(f64),
    /// String literal or member name
    String(String),
    /// Type prototype
    Prototype(PrototypeObject),
}

/// Deduplicating pool of static values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticPool {
    entries: Vec<StaticValue>,
    #[serde(skip)]
    strings: FxHashMap<String, u32>,
    #[serde(skip)]
    numbers: FxHashMap<u64, u32>,
}

impl PartialEq for StaticPool {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl StaticPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a pool (and its dedup maps) from decoded entries
    pub fn from_entries(entries: Vec<StaticValue>) -> Self {
        let mut pool = Self::default();
        for (index, entry) in entries.iter().enumerate() {
            match entry {
                StaticValue::String(s) => {
                    pool.strings.entry(s.clone()).or_insert(index as u32);
                }
                StaticValue::Number(n) => {
                    pool.numbers.entry(n.to_bits()).or_insert(index as u32);
                }
                StaticValue::Prototype(_) => {}
            }
        }
        pool.entries = entries;
        pool
    }

    /// Add a string (deduplicated)
    pub fn add_string(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.strings.get(s) {
            return index;
        }
        let index = self.entries.len() as u32;
        self.entries.push(StaticValue::String(s.to_string()));
        self.strings.insert(s.to_string(), index);
        index
    }

    /// Add a number (deduplicated by bit pattern)
    pub fn add_number(&mut self, n: f64) -> u32 {
        let bits = n.to_bits();
        if let Some(&index) = self.numbers.get(&bits) {
            return index;
        }
        let index = self.entries.len() as u32;
        self.entries.push(StaticValue::Number(n));
        self.numbers.insert(bits, index);
        index
    }

    /// Reserve a prototype slot so it can be referenced before it is filled
    pub fn reserve_prototype(&mut self, type_name: &str) -> u32 {
        let index = self.entries.len() as u32;
        self.entries.push(StaticValue::Prototype(PrototypeObject {
            type_name: type_name.to_string(),
            parent: None,
            members: Vec::new(),
        }));
        index
    }

    /// Fill a previously reserved prototype slot
    ///
    /// Returns false when `index` does not name a prototype slot.
    pub fn set_prototype(&mut self, index: u32, object: PrototypeObject) -> bool {
        match self.entries.get_mut(index as usize) {
            Some(StaticValue::Prototype(slot)) => {
                *slot = object;
                true
            }
            _ => false,
        }
    }

    /// Get an entry
    pub fn get(&self, index: u32) -> Option<&StaticValue> {
        self.entries.get(index as usize)
    }

    /// Get a string entry
    pub fn string(&self, index: u32) -> Option<&str> {
        match self.get(index) {
            Some(StaticValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Get a prototype entry
    pub fn prototype(&self, index: u32) -> Option<&PrototypeObject> {
        match self.get(index) {
            Some(StaticValue::Prototype(p)) => Some(p),
            _ => None,
        }
    }

    /// All entries in index order
    pub fn entries(&self) -> &[StaticValue] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_and_numbers_deduplicate() {
        let mut pool = StaticPool::new();
        let a = pool.add_string("hello");
        let n = pool.add_number(2.5);
        assert_eq!(pool.add_string("hello"), a);
        assert_eq!(pool.add_number(2.5), n);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_prototype_reserve_then_fill() {
        let mut pool = StaticPool::new();
        let slot = pool.reserve_prototype("Point");
        let filled = pool.set_prototype(
            slot,
            PrototypeObject {
                type_name: "Point".to_string(),
                parent: None,
                members: vec![("x".to_string(), StaticMember::Number(0.0))],
            },
        );
        assert!(filled);
        let proto = pool.prototype(slot).unwrap();
        assert_eq!(proto.member("x"), Some(&StaticMember::Number(0.0)));
    }

    #[test]
    fn test_set_prototype_rejects_non_prototype_slot() {
        let mut pool = StaticPool::new();
        let s = pool.add_string("x");
        assert!(!pool.set_prototype(s, PrototypeObject::default()));
    }

    #[test]
    fn test_from_entries_restores_dedup() {
        let mut pool = StaticPool::new();
        pool.add_string("a");
        pool.add_number(1.0);
        let mut rebuilt = StaticPool::from_entries(pool.entries().to_vec());
        assert_eq!(rebuilt.add_string("a"), 0);
        assert_eq!(rebuilt.add_number(1.0), 1);
        assert_eq!(rebuilt, pool);
    }
}

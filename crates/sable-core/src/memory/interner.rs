use rustc_hash::{FxBuildHasher, FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};

use crate::memory::{Arena, HeapObject, ObjHandle, ObjectKind};

pub fn hash_str(s: &str) -> u64 {
    let mut hasher = FxHasher::default();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Weak map from string hash to the heap slot holding the interned
/// `StringObject`. Collisions are resolved by probing to the next hash key;
/// each `StringObject` records the key it was filed under so the sweep can
/// drop exactly the entries whose strings died.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    map: FxHashMap<u64, ObjHandle>,
}

impl StringTable {
    pub fn new() -> Self {
        Self {
            map: FxHashMap::with_capacity_and_hasher(256, FxBuildHasher),
        }
    }

    pub fn get(&self, key: u64) -> Option<ObjHandle> {
        self.map.get(&key).copied()
    }

    pub fn insert(&mut self, key: u64, handle: ObjHandle) {
        self.map.insert(key, handle);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drops every entry whose string was not marked this cycle. Must run
    /// after the mark phase and before the sweep frees unmarked slots,
    /// otherwise the table would resurrect dangling handles.
    pub fn sweep(&mut self, objects: &Arena<HeapObject>) {
        self.map.retain(|_, handle| {
            objects
                .get(*handle)
                .map(|object| object.is_marked)
                .unwrap_or(false)
        });
    }
}

pub fn is_same_string(object: &HeapObject, s: &str) -> bool {
    match &object.kind {
        ObjectKind::String(string) => &*string.chars == s,
        _ => false,
    }
}

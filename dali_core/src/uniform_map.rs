// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uniform-name to property bindings.
//!
//! A [`UniformMap`] is a small insertion-ordered list. Lookups are linear;
//! maps rarely exceed a couple of dozen entries. Every mutation bumps the
//! [change counter](UniformMap::change_counter), which uniform-block writers
//! compare against their cached layout.

use alloc::borrow::Cow;
use alloc::vec::Vec;
use core::ops::Index;

use crate::property::PropertyIndex;
use crate::property_owner::OwnerId;

/// Seed of the uniform-name hash.
const HASH_SEED: u64 = 5381;

/// Hashes a uniform name.
///
/// DJB2 over the UTF-8 bytes: `hash = hash * 33 + byte`.
#[must_use]
pub fn calculate_hash(name: &str) -> u64 {
    name.bytes().fold(HASH_SEED, |hash, byte| {
        hash.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}

/// The property a uniform reads its value from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformSource {
    /// Object owning the property.
    pub owner: OwnerId,
    /// Property within the owner.
    pub property: PropertyIndex,
}

/// One uniform binding with its precomputed hashes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformPropertyMapping {
    uniform_name: Cow<'static, str>,
    source: UniformSource,
    name_hash: u64,
    name_hash_without_array: u64,
    array_index: Option<u32>,
}

impl UniformPropertyMapping {
    /// Creates a mapping, parsing a trailing `[N]` array index.
    ///
    /// The index is only extracted when the closing bracket is the last
    /// character, so `uLights[2].color` names a struct member and keeps no
    /// index, while `uOffsets[3]` has index 3.
    #[must_use]
    pub fn new(uniform_name: impl Into<Cow<'static, str>>, source: UniformSource) -> Self {
        let uniform_name = uniform_name.into();
        let name_hash = calculate_hash(&uniform_name);
        let (name_hash_without_array, array_index) = match split_array_index(&uniform_name) {
            Some((prefix, index)) => (calculate_hash(prefix), Some(index)),
            None => (name_hash, None),
        };
        Self {
            uniform_name,
            source,
            name_hash,
            name_hash_without_array,
            array_index,
        }
    }

    /// The uniform name as written.
    #[must_use]
    pub fn uniform_name(&self) -> &str {
        &self.uniform_name
    }

    /// Where the value comes from.
    #[must_use]
    pub fn source(&self) -> UniformSource {
        self.source
    }

    /// Hash of the full name.
    #[must_use]
    pub fn name_hash(&self) -> u64 {
        self.name_hash
    }

    /// Hash of the name without its trailing `[N]`, or the full hash when
    /// there is no trailing index.
    #[must_use]
    pub fn name_hash_without_array(&self) -> u64 {
        self.name_hash_without_array
    }

    /// The trailing array index, if any.
    #[must_use]
    pub fn array_index(&self) -> Option<u32> {
        self.array_index
    }
}

fn split_array_index(name: &str) -> Option<(&str, u32)> {
    let inner = name.strip_suffix(']')?;
    let open = inner.rfind('[')?;
    let index = inner[open + 1..].parse().ok()?;
    Some((&name[..open], index))
}

/// Insertion-ordered uniform bindings of one object.
#[derive(Clone, Debug, Default)]
pub struct UniformMap {
    mappings: Vec<UniformPropertyMapping>,
    change_counter: u64,
}

impl UniformMap {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mappings: Vec::new(),
            change_counter: 0,
        }
    }

    /// Appends a mapping. Duplicate names are not detected.
    pub fn add(&mut self, mapping: UniformPropertyMapping) {
        self.mappings.push(mapping);
        self.mapping_changed();
    }

    /// Removes the first mapping named `uniform_name`.
    ///
    /// The change counter advances whether or not a mapping was found.
    pub fn remove(&mut self, uniform_name: &str) -> Option<UniformPropertyMapping> {
        let hash = calculate_hash(uniform_name);
        let removed = self
            .position(hash, uniform_name)
            .map(|index| self.mappings.remove(index));
        self.mapping_changed();
        removed
    }

    /// Finds the mapping named `uniform_name`.
    #[must_use]
    pub fn find(&self, uniform_name: &str) -> Option<&UniformPropertyMapping> {
        let hash = calculate_hash(uniform_name);
        self.position(hash, uniform_name).map(|index| &self.mappings[index])
    }

    /// Number of mappings.
    #[must_use]
    pub fn count(&self) -> usize {
        self.mappings.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Mapping at `index`, in insertion order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&UniformPropertyMapping> {
        self.mappings.get(index)
    }

    /// Iterates mappings in insertion order.
    pub fn iter(&self) -> core::slice::Iter<'_, UniformPropertyMapping> {
        self.mappings.iter()
    }

    /// Monotonic counter bumped by every add and remove.
    #[must_use]
    pub fn change_counter(&self) -> u64 {
        self.change_counter
    }

    fn position(&self, hash: u64, uniform_name: &str) -> Option<usize> {
        self.mappings
            .iter()
            .position(|m| m.name_hash == hash && m.uniform_name == uniform_name)
    }

    fn mapping_changed(&mut self) {
        self.change_counter += 1;
    }
}

impl Index<usize> for UniformMap {
    type Output = UniformPropertyMapping;

    fn index(&self, index: usize) -> &UniformPropertyMapping {
        &self.mappings[index]
    }
}

impl<'a> IntoIterator for &'a UniformMap {
    type Item = &'a UniformPropertyMapping;
    type IntoIter = core::slice::Iter<'a, UniformPropertyMapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.mappings.iter()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::memory_pool::MemoryPoolKey;

    fn source(property: u32) -> UniformSource {
        UniformSource {
            owner: OwnerId::Node(MemoryPoolKey::from_raw(0, 0)),
            property: PropertyIndex(property),
        }
    }

    #[test]
    fn djb2_hash() {
        assert_eq!(calculate_hash(""), 5381);
        assert_eq!(calculate_hash("a"), 5381 * 33 + 97);
    }

    #[test]
    fn trailing_array_index_is_parsed() {
        let m = UniformPropertyMapping::new("uOffsets[3]", source(0));
        assert_eq!(m.array_index(), Some(3));
        assert_eq!(m.name_hash_without_array(), calculate_hash("uOffsets"));
        assert_eq!(m.name_hash(), calculate_hash("uOffsets[3]"));
    }

    #[test]
    fn struct_member_keeps_no_index() {
        let m = UniformPropertyMapping::new("uLights[2].color", source(0));
        assert_eq!(m.array_index(), None);
        assert_eq!(m.name_hash_without_array(), m.name_hash());
    }

    #[test]
    fn plain_name_has_no_index() {
        let m = UniformPropertyMapping::new("uColor", source(0));
        assert_eq!(m.array_index(), None);
    }

    #[test]
    fn find_and_remove_first_match() {
        let mut map = UniformMap::new();
        map.add(UniformPropertyMapping::new("uColor", source(1)));
        map.add(UniformPropertyMapping::new("uSize", source(2)));
        map.add(UniformPropertyMapping::new("uColor", source(3)));
        assert_eq!(map.find("uColor").map(|m| m.source().property), Some(PropertyIndex(1)));

        let removed = map.remove("uColor").expect("mapping present");
        assert_eq!(removed.source().property, PropertyIndex(1));
        assert_eq!(map.find("uColor").map(|m| m.source().property), Some(PropertyIndex(3)));
        assert_eq!(map[0].uniform_name(), "uSize");
        assert!(map.find("uMissing").is_none());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add(u8),
        Remove(u8),
        Find(u8),
        Count,
        Get(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0_u8..4).prop_map(Op::Add),
            (0_u8..4).prop_map(Op::Remove),
            (0_u8..4).prop_map(Op::Find),
            Just(Op::Count),
            (0_u8..4).prop_map(Op::Get),
        ]
    }

    proptest! {
        #[test]
        fn change_counter_moves_only_on_mutation(ops in proptest::collection::vec(op(), 0..64)) {
            let names = ["uA", "uB", "uC[1]", "uD"];
            let mut map = UniformMap::new();
            for op in ops {
                let before = map.change_counter();
                match op {
                    Op::Add(i) => {
                        map.add(UniformPropertyMapping::new(names[usize::from(i)], source(0)));
                        prop_assert!(map.change_counter() > before);
                    }
                    Op::Remove(i) => {
                        map.remove(names[usize::from(i)]);
                        prop_assert!(map.change_counter() > before);
                    }
                    Op::Find(i) => {
                        let _ = map.find(names[usize::from(i)]);
                        prop_assert_eq!(map.change_counter(), before);
                    }
                    Op::Count => {
                        let _ = map.count();
                        prop_assert_eq!(map.change_counter(), before);
                    }
                    Op::Get(i) => {
                        let _ = map.get(usize::from(i));
                        prop_assert_eq!(map.change_counter(), before);
                    }
                }
            }
        }
    }
}

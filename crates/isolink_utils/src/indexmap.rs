//! Insertion-ordered maps keyed with the rustc hasher.
//!
//! Iteration order is part of this linker's output contract: module trees,
//! dependency lists, and import tables all serialize in the order entries
//! arrived, and identical inputs must produce byte-identical bundles. Plain
//! hash maps cannot give that, so every ordered collection goes through
//! these aliases. The keys are short path segments and symbol names hashed
//! by a build tool on trusted input, which is the case where FxHasher's
//! speed is worth its missing DoS resistance.

use std::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;

pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

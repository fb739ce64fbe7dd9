//! Attribute storage: a nested container as produced by a hierarchical
//! module, plus the flat path-keyed store the graph actually reads from.
//!
//! The flat store is built by a one-time flattening pass at module-load
//! time; after that, every access is a plain map lookup by dotted path.

use rustc_hash::FxHashMap;

use crate::tensor::TensorData;

/// A nested attribute container. Leaves hold tensor values; interior
/// entries hold sub-trees. Insertion order is preserved so flattening is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct AttrTree {
    entries: Vec<(String, AttrEntry)>,
}

#[derive(Debug, Clone)]
pub enum AttrEntry {
    Value(TensorData),
    Tree(AttrTree),
}

impl AttrTree {
    pub fn new() -> Self {
        AttrTree::default()
    }

    /// Sets a leaf value, replacing any existing entry of the same name.
    pub fn set(&mut self, name: &str, value: TensorData) -> &mut Self {
        self.set_entry(name, AttrEntry::Value(value));
        self
    }

    /// Sets a sub-tree, replacing any existing entry of the same name.
    pub fn set_tree(&mut self, name: &str, tree: AttrTree) -> &mut Self {
        self.set_entry(name, AttrEntry::Tree(tree));
        self
    }

    fn set_entry(&mut self, name: &str, entry: AttrEntry) {
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| n == name) {
            slot.1 = entry;
        } else {
            self.entries.push((name.to_string(), entry));
        }
    }
}

/// Flat, path-keyed view of an attribute hierarchy.
#[derive(Debug, Clone, Default)]
pub struct Attrs {
    values: FxHashMap<String, TensorData>,
}

impl Attrs {
    pub fn new() -> Self {
        Attrs::default()
    }

    /// Flattens a nested hierarchy into dotted paths (`"sub.inner.weight"`).
    pub fn from_tree(tree: &AttrTree) -> Self {
        let mut attrs = Attrs::new();
        flatten_into(&mut attrs.values, "", tree);
        attrs
    }

    pub fn get(&self, path: &str) -> Option<&TensorData> {
        self.values.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    /// Inserts a value under `path`, replacing any existing entry.
    pub fn insert(&mut self, path: impl Into<String>, value: TensorData) {
        self.values.insert(path.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

fn flatten_into(out: &mut FxHashMap<String, TensorData>, prefix: &str, tree: &AttrTree) {
    for (name, entry) in &tree.entries {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match entry {
            AttrEntry::Value(value) => {
                out.insert(path, value.clone());
            }
            AttrEntry::Tree(subtree) => flatten_into(out, &path, subtree),
        }
    }
}

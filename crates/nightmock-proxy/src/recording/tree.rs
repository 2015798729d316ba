//! The variant tree: `method -> segments... -> query -> body -> {response text: Record}`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{Node, Record, VariantMap};

/// Outcome of removing a node from the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    NotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantTree {
    root: BTreeMap<String, Node>,
}

impl VariantTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn root(&self) -> &BTreeMap<String, Node> {
        &self.root
    }

    fn node_at(&self, path: &[String]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.get(first)?;
        for key in rest {
            node = node.as_branch()?.get(key)?;
        }
        Some(node)
    }

    fn node_at_mut(&mut self, path: &[String]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.get_mut(first)?;
        for key in rest {
            node = match node {
                Node::Branch(children) => children.get_mut(key)?,
                Node::Record(_) => return None,
            };
        }
        Some(node)
    }

    /// Variants stored at a fingerprint prefix. A legacy bare record reads as
    /// a single-entry map keyed by its response text.
    pub fn variants_at(&self, prefix: &[String]) -> Option<VariantMap> {
        let variants: VariantMap = match self.node_at(prefix)? {
            Node::Record(record) => {
                let mut map = VariantMap::new();
                map.insert(record.response.clone(), record.clone());
                map
            }
            Node::Branch(children) => children
                .iter()
                .filter_map(|(key, node)| match node {
                    Node::Record(record) => Some((key.clone(), record.clone())),
                    Node::Branch(_) => None,
                })
                .collect(),
        };
        if variants.is_empty() {
            None
        } else {
            Some(variants)
        }
    }

    pub fn record_at(&self, prefix: &[String], key: &str) -> Option<&Record> {
        match self.node_at(prefix)? {
            Node::Record(record) if record.response == key => Some(record),
            Node::Record(_) => None,
            Node::Branch(children) => match children.get(key)? {
                Node::Record(record) => Some(record),
                Node::Branch(_) => None,
            },
        }
    }

    /// Descend to the variant map at `prefix`, creating branches as needed.
    pub fn insert_or_get(&mut self, prefix: &[String]) -> &mut BTreeMap<String, Node> {
        let mut children = &mut self.root;
        for key in prefix {
            children = children
                .entry(key.clone())
                .or_insert_with(Node::empty_branch)
                .as_branch_mut();
        }
        children
    }

    /// Insert a variant unless one with the same key exists. Returns whether
    /// the tree changed.
    pub fn put_variant(&mut self, prefix: &[String], key: &str, record: Record) -> bool {
        let variants = self.insert_or_get(prefix);
        if variants.contains_key(key) {
            return false;
        }
        variants.insert(key.to_string(), Node::Record(record));
        true
    }

    /// Insert or overwrite a variant.
    pub fn upsert_variant(&mut self, prefix: &[String], key: &str, record: Record) {
        self.insert_or_get(prefix)
            .insert(key.to_string(), Node::Record(record));
    }

    pub fn delete_variant(&mut self, prefix: &[String], key: &str) -> Removal {
        let mut path = prefix.to_vec();
        path.push(key.to_string());
        self.delete_at_path(&path)
    }

    /// Remove the node at `path` and prune every ancestor left empty,
    /// stopping at the root map.
    pub fn delete_at_path(&mut self, path: &[String]) -> Removal {
        if path.is_empty() {
            return Removal::NotFound;
        }
        if remove_and_prune(&mut self.root, path) {
            return Removal::Removed;
        }
        // `[.., body, key]` addressing a legacy bare record at the body slot.
        if let Some((key, prefix)) = path.split_last() {
            if matches!(self.node_at(prefix), Some(Node::Record(r)) if &r.response == key) {
                return self.delete_at_path(prefix);
            }
        }
        Removal::NotFound
    }

    /// Re-key a variant after its response text was edited.
    pub fn replace_variant_key(
        &mut self,
        prefix: &[String],
        old_key: &str,
        new_text: &str,
    ) -> Removal {
        let Some(mut record) = self.record_at(prefix, old_key).cloned() else {
            return Removal::NotFound;
        };
        record.response = new_text.to_string();
        record.modified_at = Some(Utc::now());

        let variants = self.insert_or_get(prefix);
        variants.remove(old_key);
        variants.insert(new_text.to_string(), Node::Record(record));
        Removal::Removed
    }

    /// Overwrite the variant stored under `key` at `prefix`. Without a key,
    /// or when the key is not stored there, the whole body slot becomes a
    /// single bare record. The slot must already exist. Missing timestamps
    /// are filled in.
    pub fn replace_record(
        &mut self,
        prefix: &[String],
        key: Option<&str>,
        mut record: Record,
    ) -> Removal {
        let Some(slot) = self.node_at_mut(prefix) else {
            return Removal::NotFound;
        };
        record.fill_timestamps(Utc::now());
        match key {
            Some(key)
                if slot
                    .as_branch()
                    .is_some_and(|c| matches!(c.get(key), Some(Node::Record(_)))) =>
            {
                slot.as_branch_mut()
                    .insert(key.to_string(), Node::Record(record));
            }
            _ => *slot = Node::Record(record),
        }
        Removal::Removed
    }

    pub fn clear(&mut self) {
        self.root.clear();
    }

    /// Number of records in the whole tree.
    pub fn variant_count(&self) -> usize {
        fn count(node: &Node) -> usize {
            match node {
                Node::Record(_) => 1,
                Node::Branch(children) => children.values().map(count).sum(),
            }
        }
        self.root.values().map(count).sum()
    }
}

fn remove_and_prune(children: &mut BTreeMap<String, Node>, path: &[String]) -> bool {
    let Some((first, rest)) = path.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return children.remove(first).is_some();
    }
    let removed = match children.get_mut(first) {
        Some(Node::Branch(grandchildren)) => remove_and_prune(grandchildren, rest),
        _ => false,
    };
    if removed && children.get(first).is_some_and(Node::is_empty_branch) {
        children.remove(first);
    }
    removed
}

/// Default variant: the record with the most recent `createdAt` (falling
/// back to `modifiedAt`, then `recordedAt`). On ties the last key in key
/// order wins.
pub fn select_default(variants: &VariantMap) -> Option<&Record> {
    variants.values().max_by_key(|record| record.recency())
}

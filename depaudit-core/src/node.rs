//! Package-prefix compaction of class → origin maps.
//!
//! Class names are split on `.` into a trie. Compaction walks it
//! post-order: a subtree whose classes all share one origin set becomes a
//! single `**` entry, and the classes directly inside a package that share
//! one origin set become a single `*` entry. Flattening joins the path
//! segments back with `.`.
//!
//! ```text
//! java.lang.String -> {a}          java.lang.** -> {a}
//! java.lang.Object -> {a}    =>    java.util.** -> {b}
//! java.util.Date   -> {b}
//! ```

use std::collections::{BTreeMap, BTreeSet};

/// Key covering every class directly inside a package.
pub const PACKAGE_WILDCARD: &str = "*";
/// Key covering every class in a package and all its subpackages.
pub const SUBTREE_WILDCARD: &str = "**";

/// One package level of the prefix trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node<T> {
    children: BTreeMap<String, Node<T>>,
    classes: BTreeMap<String, BTreeSet<T>>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: BTreeMap::new(),
            classes: BTreeMap::new(),
        }
    }
}

impl<T: Ord + Clone> Node<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a dotted class name with its origin set.
    pub fn insert(&mut self, class_name: &str, origins: BTreeSet<T>) {
        let (package, simple_name) = match class_name.rsplit_once('.') {
            Some((package, simple_name)) => (Some(package), simple_name),
            None => (None, class_name),
        };
        let mut node = self;
        for segment in package.into_iter().flat_map(|p| p.split('.')) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.classes.insert(simple_name.to_string(), origins);
    }

    /// Collapse uniform subtrees and packages in place.
    pub fn compact(&mut self) {
        for child in self.children.values_mut() {
            child.compact();
        }

        if let Some(origins) = single(self.all_origin_sets()) {
            self.children.clear();
            self.classes.clear();
            self.classes.insert(SUBTREE_WILDCARD.to_string(), origins);
            return;
        }

        if let Some(origins) = single(self.classes.values().collect()) {
            self.classes.clear();
            self.classes.insert(PACKAGE_WILDCARD.to_string(), origins);
        }
    }

    /// Flatten the trie into `prefix -> origins` entries.
    pub fn flatten(&self) -> BTreeMap<String, BTreeSet<T>> {
        let mut out = BTreeMap::new();
        self.flatten_into("", &mut out);
        out
    }

    /// Distinct origin sets of every class in this subtree.
    fn all_origin_sets(&self) -> BTreeSet<&BTreeSet<T>> {
        let mut sets: BTreeSet<&BTreeSet<T>> = self.classes.values().collect();
        for child in self.children.values() {
            sets.extend(child.all_origin_sets());
        }
        sets
    }

    fn flatten_into(&self, prefix: &str, out: &mut BTreeMap<String, BTreeSet<T>>) {
        for (name, origins) in &self.classes {
            out.insert(join(prefix, name), origins.clone());
        }
        for (segment, child) in &self.children {
            child.flatten_into(&join(prefix, segment), out);
        }
    }
}

impl<T: Ord + Clone> FromIterator<(String, BTreeSet<T>)> for Node<T> {
    fn from_iter<I: IntoIterator<Item = (String, BTreeSet<T>)>>(iter: I) -> Self {
        let mut root = Node::new();
        for (class_name, origins) in iter {
            root.insert(&class_name, origins);
        }
        root
    }
}

/// Build, compact and flatten in one step.
pub fn compact<T, I>(entries: I) -> BTreeMap<String, BTreeSet<T>>
where
    T: Ord + Clone,
    I: IntoIterator<Item = (String, BTreeSet<T>)>,
{
    let mut root: Node<T> = entries.into_iter().collect();
    root.compact();
    root.flatten()
}

fn single<T: Clone>(sets: BTreeSet<&BTreeSet<T>>) -> Option<BTreeSet<T>> {
    if sets.len() == 1 {
        sets.into_iter().next().cloned()
    } else {
        None
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}

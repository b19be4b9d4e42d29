//! Persistent ordered map used by every versioned container.
//!
//! An AVL tree whose nodes are shared through `Arc`. Inserting or removing a
//! key copies only the path from the root to that key; every other subtree is
//! shared with the previous version. Cloning a map is O(1), so a long-lived
//! "current" report can be merged against a stream of new reports without
//! copying everything it holds.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type Link<K, V> = Option<Arc<TreeNode<K, V>>>;

struct TreeNode<K, V> {
    key: K,
    value: V,
    height: usize,
    left: Link<K, V>,
    right: Link<K, V>,
}

fn height<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |n| n.height)
}

fn make<K, V>(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Arc<TreeNode<K, V>> {
    let height = 1 + height(&left).max(height(&right));
    Arc::new(TreeNode { key, value, height, left, right })
}

/// Rebuilds a node from its parts, rotating when the two subtrees differ in
/// height by more than one. Callers only ever unbalance a node by one level.
fn balance<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
) -> Arc<TreeNode<K, V>> {
    let hl = height(&left);
    let hr = height(&right);

    if hl > hr + 1 {
        if let Some(l) = left.as_deref() {
            if height(&l.left) >= height(&l.right) {
                let new_right = make(key, value, l.right.clone(), right);
                return make(l.key.clone(), l.value.clone(), l.left.clone(), Some(new_right));
            }
            if let Some(lr) = l.right.as_deref() {
                let new_left = make(l.key.clone(), l.value.clone(), l.left.clone(), lr.left.clone());
                let new_right = make(key, value, lr.right.clone(), right);
                return make(lr.key.clone(), lr.value.clone(), Some(new_left), Some(new_right));
            }
        }
    } else if hr > hl + 1 {
        if let Some(r) = right.as_deref() {
            if height(&r.right) >= height(&r.left) {
                let new_left = make(key, value, left, r.left.clone());
                return make(r.key.clone(), r.value.clone(), Some(new_left), r.right.clone());
            }
            if let Some(rl) = r.left.as_deref() {
                let new_left = make(key, value, left, rl.left.clone());
                let new_right = make(r.key.clone(), r.value.clone(), rl.right.clone(), r.right.clone());
                return make(rl.key.clone(), rl.value.clone(), Some(new_left), Some(new_right));
            }
        }
    }

    make(key, value, left, right)
}

fn insert_at<K: Ord + Clone, V: Clone>(
    link: &Link<K, V>,
    key: K,
    value: V,
) -> (Arc<TreeNode<K, V>>, bool) {
    match link {
        None => (make(key, value, None, None), true),
        Some(n) => match key.cmp(&n.key) {
            Ordering::Less => {
                let (left, added) = insert_at(&n.left, key, value);
                (balance(n.key.clone(), n.value.clone(), Some(left), n.right.clone()), added)
            }
            Ordering::Greater => {
                let (right, added) = insert_at(&n.right, key, value);
                (balance(n.key.clone(), n.value.clone(), n.left.clone(), Some(right)), added)
            }
            Ordering::Equal => (make(key, value, n.left.clone(), n.right.clone()), false),
        },
    }
}

fn remove_min<K: Clone, V: Clone>(node: &TreeNode<K, V>) -> (K, V, Link<K, V>) {
    match &node.left {
        None => (node.key.clone(), node.value.clone(), node.right.clone()),
        Some(left) => {
            let (key, value, rest) = remove_min(left);
            let rebuilt = balance(node.key.clone(), node.value.clone(), rest, node.right.clone());
            (key, value, Some(rebuilt))
        }
    }
}

/// `None` when the key was not present (the caller keeps the old root).
fn remove_at<K, V, Q>(link: &Link<K, V>, key: &Q) -> Option<Link<K, V>>
where
    K: Borrow<Q> + Clone,
    V: Clone,
    Q: Ord + ?Sized,
{
    let n = link.as_ref()?;
    match key.cmp(n.key.borrow()) {
        Ordering::Less => remove_at(&n.left, key)
            .map(|left| Some(balance(n.key.clone(), n.value.clone(), left, n.right.clone()))),
        Ordering::Greater => remove_at(&n.right, key)
            .map(|right| Some(balance(n.key.clone(), n.value.clone(), n.left.clone(), right))),
        Ordering::Equal => Some(match (&n.left, &n.right) {
            (None, right) => right.clone(),
            (left, None) => left.clone(),
            (left, Some(right)) => {
                let (k, v, rest) = remove_min(right);
                Some(balance(k, v, left.clone(), rest))
            }
        }),
    }
}

/// Immutable sorted map with structural sharing.
pub struct PersistentMap<K, V> {
    root: Link<K, V>,
    len: usize,
}

impl<K, V> Clone for PersistentMap<K, V> {
    fn clone(&self) -> Self {
        Self { root: self.root.clone(), len: self.len }
    }
}

impl<K, V> Default for PersistentMap<K, V> {
    fn default() -> Self {
        Self { root: None, len: 0 }
    }
}

impl<K, V> PersistentMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter { stack: Vec::new(), remaining: self.len };
        iter.push_left(self.root.as_deref());
        iter
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    /// True when both maps are the very same version (shared root).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<K: Ord + Clone, V: Clone> PersistentMap<K, V> {
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut link = self.root.as_deref();
        while let Some(n) = link {
            match key.cmp(n.key.borrow()) {
                Ordering::Less => link = n.left.as_deref(),
                Ordering::Greater => link = n.right.as_deref(),
                Ordering::Equal => return Some(&n.value),
            }
        }
        None
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Returns a new map with `key` bound to `value`; `self` is untouched.
    pub fn insert(&self, key: K, value: V) -> Self {
        let (root, added) = insert_at(&self.root, key, value);
        Self { root: Some(root), len: if added { self.len + 1 } else { self.len } }
    }

    /// Returns a new map without `key`. Absent keys return a cheap clone.
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match remove_at(&self.root, key) {
            Some(root) => Self { root, len: self.len - 1 },
            None => self.clone(),
        }
    }

    /// Combines two maps. Keys present on one side only are copied as is;
    /// keys present on both sides get `f(key, left, right)`, always with the
    /// receiver's value as `left` whichever side ends up being walked.
    pub fn merge_with<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(&K, &V, &V) -> V,
    {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }

        if self.len >= other.len {
            other.iter().fold(self.clone(), |acc, (k, theirs)| {
                let merged = match acc.get(k) {
                    Some(mine) => f(k, mine, theirs),
                    None => theirs.clone(),
                };
                acc.insert(k.clone(), merged)
            })
        } else {
            self.iter().fold(other.clone(), |acc, (k, mine)| {
                let merged = match acc.get(k) {
                    Some(theirs) => f(k, mine, theirs),
                    None => mine.clone(),
                };
                acc.insert(k.clone(), merged)
            })
        }
    }
}

impl<K: Ord + Clone, V: Clone> FromIterator<(K, V)> for PersistentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |acc, (k, v)| acc.insert(k, v))
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for PersistentMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        if self.ptr_eq(other) {
            return true;
        }
        self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<K: Eq, V: Eq> Eq for PersistentMap<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// In-order iterator over a [`PersistentMap`].
pub struct Iter<'a, K, V> {
    stack: Vec<&'a TreeNode<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left(&mut self, mut link: Option<&'a TreeNode<K, V>>) {
        while let Some(n) = link {
            self.stack.push(n);
            link = n.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.stack.pop()?;
        self.push_left(n.right.as_deref());
        self.remaining -= 1;
        Some((&n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<'a, K, V> IntoIterator for &'a PersistentMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

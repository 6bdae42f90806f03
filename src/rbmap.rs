//! A persistent ordered map based on red-black trees.
//!
//! [`RbMap`] is immutable: [`insert`](RbMap::insert) returns a new map and
//! leaves the receiver untouched. Subtrees are shared between the old and
//! new maps through [`Arc`], so an insert allocates only the path from the
//! root to the changed position. Cloning a map is a reference count bump,
//! which is what makes scope snapshot and restore in the elaborator cheap:
//! a scope holds a clone of every table it might need to roll back.
//!
//! The balancing scheme is the classic functional red-black insertion:
//! inserts paint the new node red, [`balance1`]/[`balance2`] rotate away
//! red-red violations on the way back up, and the root is repainted black.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Color {
  Red,
  Black,
}

#[derive(Debug)]
struct Node<K, V> {
  color: Color,
  left: RbMap<K, V>,
  key: K,
  value: V,
  right: RbMap<K, V>,
}

impl<K, V> Node<K, V> {
  fn into_map(self) -> RbMap<K, V> { RbMap(Some(Arc::new(self))) }
}

/// A persistent ordered map. See the [module docs](self).
#[derive(Debug)]
pub struct RbMap<K, V>(Option<Arc<Node<K, V>>>);

impl<K, V> Default for RbMap<K, V> {
  fn default() -> Self { Self(None) }
}
impl<K, V> Clone for RbMap<K, V> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

fn black<K, V>(left: RbMap<K, V>, key: K, value: V, right: RbMap<K, V>) -> RbMap<K, V> {
  Node { color: Color::Black, left, key, value, right }.into_map()
}

/// Rebuilds a black node whose freshly inserted left child `l` may carry a
/// red-red violation. Returns the balanced replacement node.
fn balance1<K: Clone, V: Clone>(l: Node<K, V>, key: K, value: V, right: RbMap<K, V>) -> Node<K, V> {
  if l.color == Color::Red {
    if let Some(ll) = l.left.red_root() {
      return Node {
        color: Color::Red,
        left: black(ll.left.clone(), ll.key.clone(), ll.value.clone(), ll.right.clone()),
        key: l.key.clone(),
        value: l.value.clone(),
        right: black(l.right.clone(), key, value, right),
      }
    }
    if let Some(lr) = l.right.red_root() {
      return Node {
        color: Color::Red,
        left: black(l.left.clone(), l.key.clone(), l.value.clone(), lr.left.clone()),
        key: lr.key.clone(),
        value: lr.value.clone(),
        right: black(lr.right.clone(), key, value, right),
      }
    }
  }
  Node { color: Color::Black, left: l.into_map(), key, value, right }
}

/// Mirror image of [`balance1`], for a freshly inserted right child.
fn balance2<K: Clone, V: Clone>(left: RbMap<K, V>, key: K, value: V, r: Node<K, V>) -> Node<K, V> {
  if r.color == Color::Red {
    if let Some(rl) = r.left.red_root() {
      return Node {
        color: Color::Red,
        left: black(left, key, value, rl.left.clone()),
        key: rl.key.clone(),
        value: rl.value.clone(),
        right: black(rl.right.clone(), r.key.clone(), r.value.clone(), r.right.clone()),
      }
    }
    if let Some(rr) = r.right.red_root() {
      return Node {
        color: Color::Red,
        left: black(left, key, value, r.left.clone()),
        key: r.key.clone(),
        value: r.value.clone(),
        right: black(rr.left.clone(), rr.key.clone(), rr.value.clone(), rr.right.clone()),
      }
    }
  }
  Node { color: Color::Black, left, key, value, right: r.into_map() }
}

impl<K, V> RbMap<K, V> {
  /// The empty map.
  #[must_use]
  pub fn new() -> Self { Self(None) }

  fn root(&self) -> Option<&Node<K, V>> { self.0.as_deref() }

  fn red_root(&self) -> Option<&Node<K, V>> {
    self.root().filter(|n| n.color == Color::Red)
  }

  /// Is the map empty?
  #[must_use]
  pub fn is_empty(&self) -> bool { self.0.is_none() }

  /// The number of entries, by walking the tree.
  #[must_use]
  pub fn len(&self) -> usize { self.iter().count() }

  /// Looks up a key, returning the associated value if present.
  pub fn get<Q>(&self, key: &Q) -> Option<&V>
  where
    K: Borrow<Q>,
    Q: Ord + ?Sized,
  {
    let mut t = self;
    while let Some(n) = t.root() {
      match key.cmp(n.key.borrow()) {
        Ordering::Less => t = &n.left,
        Ordering::Greater => t = &n.right,
        Ordering::Equal => return Some(&n.value),
      }
    }
    None
  }

  /// Does the map contain this key?
  pub fn contains_key<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Ord + ?Sized,
  {
    self.get(key).is_some()
  }

  /// An in-order iterator over the entries.
  pub fn iter(&self) -> Iter<'_, K, V> {
    let mut it = Iter { stack: vec![] };
    it.push_left(self);
    it
  }
}

impl<K: Ord + Clone, V: Clone> RbMap<K, V> {
  /// Returns a new map with `key` bound to `value`, overwriting any
  /// previous binding. The receiver is unchanged.
  #[must_use]
  pub fn insert(&self, key: K, value: V) -> Self {
    let mut root = self.ins(key, value);
    root.color = Color::Black;
    root.into_map()
  }

  fn ins(&self, key: K, value: V) -> Node<K, V> {
    let Some(n) = self.root() else {
      return Node { color: Color::Red, left: Self::new(), key, value, right: Self::new() }
    };
    match key.cmp(&n.key) {
      Ordering::Less => {
        let l = n.left.ins(key, value);
        match n.color {
          Color::Black => balance1(l, n.key.clone(), n.value.clone(), n.right.clone()),
          Color::Red => Node {
            color: Color::Red,
            left: l.into_map(),
            key: n.key.clone(),
            value: n.value.clone(),
            right: n.right.clone(),
          },
        }
      }
      Ordering::Greater => {
        let r = n.right.ins(key, value);
        match n.color {
          Color::Black => balance2(n.left.clone(), n.key.clone(), n.value.clone(), r),
          Color::Red => Node {
            color: Color::Red,
            left: n.left.clone(),
            key: n.key.clone(),
            value: n.value.clone(),
            right: r.into_map(),
          },
        }
      }
      Ordering::Equal => Node {
        color: n.color,
        left: n.left.clone(),
        key,
        value,
        right: n.right.clone(),
      },
    }
  }
}

/// In-order iterator over an [`RbMap`].
#[must_use]
#[derive(Debug)]
pub struct Iter<'a, K, V> {
  stack: Vec<&'a Node<K, V>>,
}

impl<'a, K, V> Iter<'a, K, V> {
  fn push_left(&mut self, mut t: &'a RbMap<K, V>) {
    while let Some(n) = t.root() {
      self.stack.push(n);
      t = &n.left;
    }
  }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
  type Item = (&'a K, &'a V);
  fn next(&mut self) -> Option<Self::Item> {
    let n = self.stack.pop()?;
    self.push_left(&n.right);
    Some((&n.key, &n.value))
  }
}

impl<'a, K, V> IntoIterator for &'a RbMap<K, V> {
  type Item = (&'a K, &'a V);
  type IntoIter = Iter<'a, K, V>;
  fn into_iter(self) -> Iter<'a, K, V> { self.iter() }
}

impl<K: Ord + Clone, V: Clone> FromIterator<(K, V)> for RbMap<K, V> {
  fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
    iter.into_iter().fold(Self::new(), |m, (k, v)| m.insert(k, v))
  }
}

impl<K: PartialEq, V: PartialEq> PartialEq for RbMap<K, V> {
  fn eq(&self, other: &Self) -> bool { self.iter().eq(other.iter()) }
}
impl<K: Eq, V: Eq> Eq for RbMap<K, V> {}

/// A persistent ordered set, a thin wrapper around [`RbMap`]`<K, ()>`.
#[derive(Debug, PartialEq, Eq)]
pub struct RbSet<K>(RbMap<K, ()>);

impl<K> Default for RbSet<K> {
  fn default() -> Self { Self(RbMap::new()) }
}
impl<K> Clone for RbSet<K> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<K> RbSet<K> {
  /// The empty set.
  #[must_use]
  pub fn new() -> Self { Self::default() }

  /// Is the set empty?
  #[must_use]
  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// The number of elements.
  #[must_use]
  pub fn len(&self) -> usize { self.0.len() }

  /// Does the set contain this element?
  pub fn contains<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Ord + ?Sized,
  {
    self.0.contains_key(key)
  }

  /// An in-order iterator over the elements.
  pub fn iter(&self) -> impl Iterator<Item = &K> {
    self.0.iter().map(|(k, ())| k)
  }
}

impl<K: Ord + Clone> RbSet<K> {
  /// Returns a new set with `key` added. The receiver is unchanged.
  #[must_use]
  pub fn insert(&self, key: K) -> Self { Self(self.0.insert(key, ())) }
}

impl<K: Ord + Clone> FromIterator<K> for RbSet<K> {
  fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
    Self(iter.into_iter().map(|k| (k, ())).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Checks the red-black invariants, returning the black height:
  /// no red node has a red child, and every path has the same black count.
  fn check_invariants<K: Ord, V>(t: &RbMap<K, V>) -> usize {
    match t.root() {
      None => 1,
      Some(n) => {
        if n.color == Color::Red {
          assert!(n.left.red_root().is_none(), "red-red violation (left)");
          assert!(n.right.red_root().is_none(), "red-red violation (right)");
        }
        let hl = check_invariants(&n.left);
        let hr = check_invariants(&n.right);
        assert_eq!(hl, hr, "unequal black height");
        hl + usize::from(n.color == Color::Black)
      }
    }
  }

  fn collect_ptrs<K, V>(t: &RbMap<K, V>, out: &mut Vec<*const ()>) {
    if let Some(arc) = &t.0 {
      out.push(Arc::as_ptr(arc).cast());
      collect_ptrs(&arc.left, out);
      collect_ptrs(&arc.right, out);
    }
  }

  #[test]
  fn sorted_iteration_and_overwrite() {
    let m: RbMap<u32, &str> =
      [(3, "c"), (1, "a"), (2, "b"), (1, "a2")].into_iter().collect();
    assert_eq!(m.len(), 3);
    let entries: Vec<_> = m.iter().map(|(&k, &v)| (k, v)).collect();
    assert_eq!(entries, vec![(1, "a2"), (2, "b"), (3, "c")]);
    assert_eq!(m.get(&1), Some(&"a2"));
    assert_eq!(m.get(&4), None);
    check_invariants(&m);
  }

  #[test]
  fn balanced_under_adversarial_orders() {
    let ascending: RbMap<u32, u32> = (0..100).map(|i| (i, i)).collect();
    let descending: RbMap<u32, u32> = (0..100).rev().map(|i| (i, i)).collect();
    check_invariants(&ascending);
    check_invariants(&descending);
    assert!(ascending.iter().map(|(&k, _)| k).eq(0..100));
    assert!(descending.iter().map(|(&k, _)| k).eq(0..100));
  }

  #[test]
  fn persistence() {
    let old: RbMap<u32, u32> = (0..10).map(|i| (i, i)).collect();
    let new = old.insert(100, 100).insert(5, 500);
    // the old snapshot is unaffected by later inserts
    assert_eq!(old.len(), 10);
    assert_eq!(old.get(&100), None);
    assert_eq!(old.get(&5), Some(&5));
    assert_eq!(new.get(&100), Some(&100));
    assert_eq!(new.get(&5), Some(&500));
    check_invariants(&old);
    check_invariants(&new);
  }

  #[test]
  fn inserts_share_structure() {
    let old: RbMap<u32, u32> = (0..15).map(|i| (i, i)).collect();
    let new = old.insert(15, 15);
    let (mut old_ptrs, mut new_ptrs) = (vec![], vec![]);
    collect_ptrs(&old, &mut old_ptrs);
    collect_ptrs(&new, &mut new_ptrs);
    let shared = old_ptrs.iter().filter(|p| new_ptrs.contains(p)).count();
    assert!(shared > 0, "insert should reuse untouched subtrees");
  }

  #[test]
  fn set_wrapper() {
    let s: RbSet<&str> = ["b", "a", "c", "a"].into_iter().collect();
    assert_eq!(s.len(), 3);
    assert!(s.contains(&"a"));
    assert!(!s.contains(&"d"));
    let elems: Vec<_> = s.iter().copied().collect();
    assert_eq!(elems, vec!["a", "b", "c"]);
  }
}

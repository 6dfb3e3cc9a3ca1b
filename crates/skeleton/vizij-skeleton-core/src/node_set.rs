//! Membership sets over node/object/morph indices.
//!
//! Membership drives both ownership ("first writer wins") and the dense rank
//! used to address packed keyframe data, so iteration is always in ascending
//! index order.

use bit_set::BitSet;
use serde::{Deserialize, Serialize};

/// Serialized as the ascending list of members.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<usize>", into = "Vec<usize>")]
pub struct NodeSet(BitSet);

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set containing every index in `0..count`.
    pub fn with_all(count: usize) -> Self {
        (0..count).collect()
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        self.0.insert(index);
    }

    #[inline]
    pub fn clear(&mut self, index: usize) {
        self.0.remove(index);
    }

    #[inline]
    pub fn test(&self, index: usize) -> bool {
        self.0.contains(index)
    }

    pub fn clear_all(&mut self) {
        self.0.clear();
    }

    pub fn union_with(&mut self, other: &NodeSet) {
        self.0.union_with(&other.0);
    }

    pub fn subtract(&mut self, other: &NodeSet) {
        self.0.difference_with(&other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count(&self) -> usize {
        self.0.len()
    }

    /// Members in ascending order.
    pub fn iter(&self) -> bit_set::Iter<'_, u32> {
        self.0.iter()
    }
}

impl PartialEq for NodeSet {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for NodeSet {}

impl FromIterator<usize> for NodeSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        NodeSet(iter.into_iter().collect())
    }
}

impl From<Vec<usize>> for NodeSet {
    fn from(members: Vec<usize>) -> Self {
        members.into_iter().collect()
    }
}

impl From<NodeSet> for Vec<usize> {
    fn from(set: NodeSet) -> Self {
        set.iter().collect()
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = usize;
    type IntoIter = bit_set::Iter<'a, u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_all_covers_exact_range() {
        let s = NodeSet::with_all(70);
        assert_eq!(s.count(), 70);
        assert!(s.test(69));
        assert!(!s.test(70));
        assert!(NodeSet::with_all(0).is_empty());
    }

    #[test]
    fn union_and_subtract() {
        let mut a: NodeSet = [1, 3, 5, 100].into_iter().collect();
        let b: NodeSet = [3, 4, 100].into_iter().collect();

        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u.iter().collect::<Vec<_>>(), vec![1, 3, 4, 5, 100]);

        a.subtract(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 5]);
    }

    #[test]
    fn equality_ignores_capacity() {
        let mut a: NodeSet = [1].into_iter().collect();
        a.set(200);
        a.clear(200);
        let b: NodeSet = [1].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_as_member_list() {
        let s: NodeSet = [0, 2, 65].into_iter().collect();
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "[0,2,65]");
        let back: NodeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}

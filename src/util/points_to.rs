//! A hybrid sparse/dense points-to set: a small inline `Vec` while the set
//! stays below `SMALL_SET_CAPACITY`, promoted to a `BitVec` once it grows
//! past that. This is the O(|δ|)-enumeration-friendly "Briggs-Torczon
//! style sparse set" the solver's delta propagation needs, reused for
//! every node's `pts`/`prev_pts`/`flow_to`.

use std::fmt::Debug;

use super::bit_vec::{BitIter, BitVec, Idx};

const SMALL_SET_CAPACITY: usize = 32;

pub trait PointsToSet<T: Idx>: Clone + Default {
    fn new() -> Self;
    fn clear(&mut self);
    fn count(&self) -> usize;
    fn contains(&self, e: T) -> bool;
    fn is_empty(&self) -> bool;
    fn superset(&self, other: &Self) -> bool;
    /// Returns whether `e` was newly inserted.
    fn insert(&mut self, e: T) -> bool;
    fn remove(&mut self, e: T) -> bool;
    /// Returns whether `self` changed.
    fn union(&mut self, other: &Self) -> bool;
    fn subtract(&mut self, other: &Self) -> bool;
    fn intersect(&mut self, other: &Self) -> bool;
    fn iter(&self) -> HybridIter<'_, T>;
}

#[derive(Clone, Debug)]
enum HybridSet<T: Idx> {
    SmallSet(Vec<T>),
    LargeSet(BitVec<T>),
}

impl<T: Idx> Default for HybridSet<T> {
    fn default() -> Self {
        HybridSet::SmallSet(Vec::new())
    }
}

#[derive(Clone, Debug)]
pub struct HybridPointsToSet<T: Idx> {
    set: HybridSet<T>,
}

impl<T: Idx> Default for HybridPointsToSet<T> {
    fn default() -> Self {
        HybridPointsToSet {
            set: HybridSet::default(),
        }
    }
}

impl<T: Idx> HybridPointsToSet<T> {
    fn promote_if_needed(&mut self) {
        if let HybridSet::SmallSet(v) = &self.set {
            if v.len() > SMALL_SET_CAPACITY {
                let bv = BitVec::from_iter(v.iter().copied());
                self.set = HybridSet::LargeSet(bv);
            }
        }
    }
}

impl<T: Idx> PointsToSet<T> for HybridPointsToSet<T> {
    fn new() -> Self {
        HybridPointsToSet {
            set: HybridSet::SmallSet(Vec::new()),
        }
    }

    fn clear(&mut self) {
        self.set = HybridSet::SmallSet(Vec::new());
    }

    fn count(&self) -> usize {
        match &self.set {
            HybridSet::SmallSet(v) => v.len(),
            HybridSet::LargeSet(bv) => bv.count(),
        }
    }

    fn contains(&self, e: T) -> bool {
        match &self.set {
            HybridSet::SmallSet(v) => v.contains(&e),
            HybridSet::LargeSet(bv) => bv.contains(e),
        }
    }

    fn is_empty(&self) -> bool {
        match &self.set {
            HybridSet::SmallSet(v) => v.is_empty(),
            HybridSet::LargeSet(bv) => bv.is_empty(),
        }
    }

    fn superset(&self, other: &Self) -> bool {
        other.iter().all(|e| self.contains(e))
    }

    fn insert(&mut self, e: T) -> bool {
        let changed = match &mut self.set {
            HybridSet::SmallSet(v) => {
                if v.contains(&e) {
                    false
                } else {
                    v.push(e);
                    true
                }
            }
            HybridSet::LargeSet(bv) => bv.insert(e),
        };
        if changed {
            self.promote_if_needed();
        }
        changed
    }

    fn remove(&mut self, e: T) -> bool {
        match &mut self.set {
            HybridSet::SmallSet(v) => {
                if let Some(pos) = v.iter().position(|x| *x == e) {
                    v.swap_remove(pos);
                    true
                } else {
                    false
                }
            }
            // We currently don't bother going back from Large to Small on removal.
            HybridSet::LargeSet(bv) => bv.remove(e),
        }
    }

    fn union(&mut self, other: &Self) -> bool {
        let mut changed = false;
        match (&mut self.set, &other.set) {
            (HybridSet::LargeSet(a), HybridSet::LargeSet(b)) => {
                changed = a.union(b);
            }
            (HybridSet::LargeSet(_), HybridSet::SmallSet(b)) => {
                for e in b {
                    changed |= self.insert(*e);
                }
            }
            (HybridSet::SmallSet(_), _) => {
                for e in other.iter() {
                    changed |= self.insert(e);
                }
            }
        }
        if changed {
            self.promote_if_needed();
        }
        changed
    }

    fn subtract(&mut self, other: &Self) -> bool {
        match &mut self.set {
            HybridSet::SmallSet(v) => {
                let before = v.len();
                v.retain(|e| !other.contains(*e));
                before != v.len()
            }
            HybridSet::LargeSet(a) => match &other.set {
                HybridSet::LargeSet(b) => a.subtract(b),
                HybridSet::SmallSet(b) => {
                    let mut changed = false;
                    for e in b {
                        changed |= a.remove(*e);
                    }
                    changed
                }
            },
        }
    }

    fn intersect(&mut self, other: &Self) -> bool {
        match &mut self.set {
            HybridSet::SmallSet(v) => {
                let before = v.len();
                v.retain(|e| other.contains(*e));
                before != v.len()
            }
            HybridSet::LargeSet(a) => {
                let before = a.count();
                match &other.set {
                    HybridSet::LargeSet(b) => {
                        a.intersect(b);
                    }
                    HybridSet::SmallSet(b) => {
                        let kept = BitVec::from_iter(b.iter().copied().filter(|e| a.contains(*e)));
                        *a = kept;
                    }
                }
                // Converting back down to Small when the result is tiny keeps
                // later delta-enumeration cheap.
                if a.count() <= SMALL_SET_CAPACITY {
                    let small: Vec<T> = a.iter().collect();
                    let changed = before != small.len();
                    self.set = HybridSet::SmallSet(small);
                    return changed;
                }
                before != a.count()
            }
        }
    }

    fn iter(&self) -> HybridIter<'_, T> {
        match &self.set {
            HybridSet::SmallSet(v) => HybridIter::SmallIter(v.iter()),
            HybridSet::LargeSet(bv) => HybridIter::LargeIter(bv.iter()),
        }
    }
}

pub enum HybridIter<'a, T: Idx> {
    SmallIter(std::slice::Iter<'a, T>),
    LargeIter(BitIter<'a, T>),
}

impl<'a, T: Idx> Iterator for HybridIter<'a, T> {
    type Item = T;
    fn next(&mut self) -> Option<T> {
        match self {
            HybridIter::SmallIter(it) => it.next().copied(),
            HybridIter::LargeIter(it) => it.next(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::Rng;
    use std::collections::HashSet;

    fn random_set(n: usize, max: u32) -> HashSet<u32> {
        let mut rng = rand::thread_rng();
        (0..n).map(|_| rng.gen_range(0..max)).collect()
    }

    fn to_hybrid(s: &HashSet<u32>) -> HybridPointsToSet<u32> {
        let mut h = HybridPointsToSet::new();
        for e in s {
            h.insert(*e);
        }
        h
    }

    fn as_set<T: Idx + std::hash::Hash + Eq>(h: &HybridPointsToSet<T>) -> HashSet<T> {
        h.iter().collect()
    }

    #[test]
    fn small_set_test() {
        let s = random_set(10, 1000);
        let h = to_hybrid(&s);
        assert_eq!(as_set(&h), s);
        assert_eq!(h.count(), s.len());
    }

    #[test]
    fn large_set_test() {
        let s = random_set(100, 1000);
        let h = to_hybrid(&s);
        assert_eq!(as_set(&h), s);
        assert_eq!(h.count(), s.len());
    }

    #[test]
    fn small_set_union_large_set() {
        let a = random_set(5, 1000);
        let b = random_set(100, 1000);
        let mut ha = to_hybrid(&a);
        let hb = to_hybrid(&b);
        ha.union(&hb);
        assert_eq!(as_set(&ha), a.union(&b).copied().collect());
    }

    #[test]
    fn large_set_union_small_set() {
        let a = random_set(100, 1000);
        let b = random_set(5, 1000);
        let mut ha = to_hybrid(&a);
        let hb = to_hybrid(&b);
        ha.union(&hb);
        assert_eq!(as_set(&ha), a.union(&b).copied().collect());
    }

    #[test]
    fn large_set_union_large_set() {
        let a = random_set(100, 1000);
        let b = random_set(100, 1000);
        let mut ha = to_hybrid(&a);
        let hb = to_hybrid(&b);
        ha.union(&hb);
        assert_eq!(as_set(&ha), a.union(&b).copied().collect());
    }

    #[test]
    fn subtract_test() {
        let a = random_set(100, 1000);
        let b = random_set(50, 1000);
        let mut ha = to_hybrid(&a);
        let hb = to_hybrid(&b);
        ha.subtract(&hb);
        assert_eq!(as_set(&ha), a.difference(&b).copied().collect());
    }

    #[test]
    fn intersect_test() {
        let a = random_set(100, 1000);
        let b = random_set(100, 1000);
        let mut ha = to_hybrid(&a);
        let hb = to_hybrid(&b);
        ha.intersect(&hb);
        assert_eq!(as_set(&ha), a.intersection(&b).copied().collect());
    }

    #[test]
    fn insert_reports_change() {
        let mut h: HybridPointsToSet<u32> = HybridPointsToSet::new();
        assert!(h.insert(3));
        assert!(!h.insert(3));
    }
}

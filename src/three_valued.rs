//! Three-valued domain (`All` / `Some(set)` / `None`) shared by the Routing
//! Picker (routing-value sets) and the Index Expression Builder (time
//! intervals). Both are the same lattice algebra applied to different value
//! domains, so the algebra itself is factored out once here rather than
//! duplicated per caller.
//!
//! - `All` (⊤): unconstrained — every possible value is a candidate.
//! - `None` (⊥): no value can satisfy the constraint.
//! - `Some(set)`: exactly the given set of values are candidates.

use std::collections::BTreeSet;

///
/// ThreeValued
///

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ThreeValued<T: Ord + Clone> {
    All,
    Some(BTreeSet<T>),
    None,
}

impl<T: Ord + Clone> ThreeValued<T> {
    #[must_use]
    pub fn singleton(value: T) -> Self {
        Self::Some(BTreeSet::from([value]))
    }

    #[must_use]
    pub fn from_set(set: BTreeSet<T>) -> Self {
        if set.is_empty() { Self::None } else { Self::Some(set) }
    }

    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Intersection: used to combine sibling `AllOf` branches, and to
    /// combine per-field results across multiple routing fields (§4.3).
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        match (self, other) {
            (Self::None, _) | (_, Self::None) => Self::None,
            (Self::All, other) => other,
            (this, Self::All) => this,
            (Self::Some(a), Self::Some(b)) => {
                Self::from_set(a.intersection(&b).cloned().collect())
            }
        }
    }

    /// Union: used to combine `AnyOf` branches (§4.3, §4.4). If any operand
    /// is `All`, the union is `All` (must cover every shard/month one branch
    /// might touch).
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        match (self, other) {
            (Self::All, _) | (_, Self::All) => Self::All,
            (Self::None, other) => other,
            (this, Self::None) => this,
            (Self::Some(a), Self::Some(b)) => Self::Some(a.union(&b).cloned().collect()),
        }
    }

    /// Set difference: used for `Not{Leaf{equal_to_any_of}}` combined in a
    /// sibling AND with a concrete `equal_to_any_of` set (§4.3).
    #[must_use]
    pub fn difference(self, other: &BTreeSet<T>) -> Self {
        match self {
            Self::All | Self::None => self,
            Self::Some(a) => Self::from_set(a.difference(other).cloned().collect()),
        }
    }

    /// Fold an iterator of per-branch results with [`Self::intersect`],
    /// starting from the identity element `All`.
    #[must_use]
    pub fn intersect_all(items: impl IntoIterator<Item = Self>) -> Self {
        items.into_iter().fold(Self::All, Self::intersect)
    }

    /// Fold an iterator of per-branch results with [`Self::union`], starting
    /// from the identity element `None`.
    #[must_use]
    pub fn union_all(items: impl IntoIterator<Item = Self>) -> Self {
        items.into_iter().fold(Self::None, Self::union)
    }
}

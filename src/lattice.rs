//! Least-upper-bound computation over the class hierarchy and mapping of
//! classes to table value types.

use crate::hierarchy::ClassHierarchy;
use crate::identity::ClassId;
use crate::well_known::WellKnown;

/// A value type in a synthesized call signature: an upper-bound class, a
/// nullability bit, and a boxed bit. The boxed bit forces a heap/reference
/// representation even for classes with a natural unboxed representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueType {
    pub class: ClassId,
    pub nullable: bool,
    pub boxed: bool,
}

/// Upper-bound queries over the class hierarchy.
pub struct TypeLattice<'a> {
    hierarchy: &'a ClassHierarchy,
    top_class: ClassId,
    /// Depth per class id; roots are 0. Filled in id order, which is
    /// superclass-first by the hierarchy invariant.
    depths: Vec<u32>,
}

impl<'a> TypeLattice<'a> {
    pub fn new(hierarchy: &'a ClassHierarchy, well_known: &WellKnown) -> Self {
        let mut depths = Vec::with_capacity(hierarchy.class_count());
        for class in hierarchy.classes() {
            let depth = match class.super_id {
                Some(super_id) => depths[super_id.index() as usize] + 1,
                None => 0,
            };
            depths.push(depth);
        }
        Self {
            hierarchy,
            top_class: well_known.top_class,
            depths,
        }
    }

    /// Least common ancestor of a class set. The empty set and sets spanning
    /// unrelated hierarchies map to the top class.
    pub fn upper_bound(&self, classes: impl IntoIterator<Item = ClassId>) -> ClassId {
        let mut classes = classes.into_iter();
        let Some(first) = classes.next() else {
            return self.top_class;
        };
        classes.fold(first, |bound, class| {
            self.least_common_ancestor(bound, class)
        })
    }

    fn depth(&self, class: ClassId) -> u32 {
        self.depths[class.index() as usize]
    }

    fn least_common_ancestor(&self, mut a: ClassId, mut b: ClassId) -> ClassId {
        // Lift the deeper class to the shallower one's depth, then walk both
        // chains in lockstep until they meet. Chains that run out without
        // meeting are unrelated roots.
        while self.depth(a) > self.depth(b) {
            let Some(super_id) = self.hierarchy.class(a).super_id else {
                return self.top_class;
            };
            a = super_id;
        }
        while self.depth(b) > self.depth(a) {
            let Some(super_id) = self.hierarchy.class(b).super_id else {
                return self.top_class;
            };
            b = super_id;
        }
        while a != b {
            match (
                self.hierarchy.class(a).super_id,
                self.hierarchy.class(b).super_id,
            ) {
                (Some(sa), Some(sb)) => {
                    a = sa;
                    b = sb;
                }
                _ => return self.top_class,
            }
        }
        a
    }

    /// Materialize a table value type. Pure: the boxed bit records exactly
    /// the caller's `ensure_boxed` request.
    pub fn value_type_for(&self, class: ClassId, nullable: bool, ensure_boxed: bool) -> ValueType {
        ValueType {
            class,
            nullable,
            boxed: ensure_boxed,
        }
    }
}

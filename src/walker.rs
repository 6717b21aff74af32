//! Superclass-first hierarchy traversal.
//!
//! The walker populates every selector's `class_id → implementation` map.
//! Each class first inherits its superclass's selector set (carrying over
//! the implementations the superclass would dispatch to), then its own
//! declared members are interned on top: concrete declarations override
//! inherited targets, abstract ones only fill gaps.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::errors::BuildError;
use crate::hierarchy::{ClassHierarchy, DispatchMetadata, MemberKind, MemberRef};
use crate::identity::SelectorId;
use crate::registry::SelectorRegistry;
use crate::well_known::WellKnown;

pub(crate) struct HierarchyWalker<'a> {
    hierarchy: &'a ClassHierarchy,
    metadata: &'a DispatchMetadata,
    well_known: &'a WellKnown,
    /// Selector sets per processed class, indexed by class id.
    per_class_selectors: Vec<FxHashSet<SelectorId>>,
}

impl<'a> HierarchyWalker<'a> {
    pub fn new(
        hierarchy: &'a ClassHierarchy,
        metadata: &'a DispatchMetadata,
        well_known: &'a WellKnown,
    ) -> Self {
        Self {
            hierarchy,
            metadata,
            well_known,
            per_class_selectors: Vec::with_capacity(hierarchy.class_count()),
        }
    }

    pub fn run(&mut self, registry: &mut SelectorRegistry) -> Result<(), BuildError> {
        for class in self.hierarchy.classes() {
            let mut working: FxHashSet<SelectorId> = FxHashSet::default();

            // The machine-primitive root sits outside the object hierarchy
            // and inherits nothing.
            if let Some(super_id) = class.super_id
                && !self.well_known.is_wasm_base(class.id)
            {
                working = self.per_class_selectors[super_id.index() as usize].clone();
                for &selector in &working {
                    let accumulator = registry.get_mut(selector);
                    let inherited =
                        accumulator.targets.get(&super_id).copied().ok_or_else(|| {
                            BuildError::internal_with_context(
                                "processed superclass has no target for an inherited selector",
                                format!("class {} selector {}", class.name, selector.index()),
                            )
                        })?;
                    accumulator.targets.insert(class.id, inherited);
                }
            }

            // The synthetic top has no declarations of its own; it
            // dispatches through the root object class's members.
            let source = if class.has_source {
                class
            } else {
                self.hierarchy.class(self.well_known.object_class)
            };
            for &member_id in &source.members {
                let decl = self.hierarchy.member(member_id);
                if !decl.is_instance {
                    continue;
                }
                let mut refs: SmallVec<[MemberRef; 2]> = SmallVec::new();
                match &decl.kind {
                    MemberKind::Field { has_setter, .. } => {
                        refs.push(MemberRef::getter(member_id));
                        if *has_setter {
                            refs.push(MemberRef::setter(member_id));
                        }
                    }
                    MemberKind::Method { .. } => {
                        refs.push(MemberRef::method(member_id));
                        if self.metadata.has_tear_off_uses(member_id) {
                            refs.push(MemberRef::tear_off(member_id));
                        }
                    }
                    MemberKind::Getter { .. } => refs.push(MemberRef::getter(member_id)),
                    MemberKind::Setter { .. } => refs.push(MemberRef::setter(member_id)),
                }

                for reference in refs {
                    let selector =
                        registry.intern(self.hierarchy, self.metadata, self.well_known, reference)?;
                    let accumulator = registry.get_mut(selector);
                    if decl.is_abstract {
                        // Never clobber an inherited concrete target.
                        accumulator.targets.entry(class.id).or_insert(reference);
                    } else {
                        accumulator.targets.insert(class.id, reference);
                    }
                    working.insert(selector);
                }
            }

            self.per_class_selectors.push(working);
        }

        tracing::debug!(
            classes = self.hierarchy.class_count(),
            selectors = registry.selectors.len(),
            "hierarchy walk complete"
        );
        Ok(())
    }
}

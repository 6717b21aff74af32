//! Build orchestration: validate, walk, finalize, pack, resolve.
//!
//! [`DispatchTableBuilder`] owns nothing mutable across phases; it borrows
//! the driver's hierarchy, metadata, and designations, runs the phases in
//! order, and returns a [`DispatchOutput`], the only form downstream code
//! ever sees. Everything in the output is frozen.

use rustc_hash::FxHashMap;

use crate::errors::BuildError;
use crate::hierarchy::{ClassHierarchy, DispatchMetadata, MemberRef};
use crate::identity::SelectorId;
use crate::lattice::TypeLattice;
use crate::packer::{DispatchTable, FunctionRegistry, PackStats, TablePacker};
use crate::registry::SelectorRegistry;
use crate::selector::Selector;
use crate::signature::SignatureSynthesis;
use crate::walker::HierarchyWalker;
use crate::well_known::WellKnown;

pub struct DispatchTableBuilder<'a> {
    hierarchy: &'a ClassHierarchy,
    metadata: &'a DispatchMetadata,
    well_known: &'a WellKnown,
}

impl<'a> DispatchTableBuilder<'a> {
    pub fn new(
        hierarchy: &'a ClassHierarchy,
        metadata: &'a DispatchMetadata,
        well_known: &'a WellKnown,
    ) -> Self {
        Self {
            hierarchy,
            metadata,
            well_known,
        }
    }

    /// Run the full build. Single-threaded, no suspension; fails fast on
    /// the first structural error.
    pub fn build(self, functions: &dyn FunctionRegistry) -> Result<DispatchOutput, BuildError> {
        self.hierarchy.validate()?;

        let mut registry = SelectorRegistry::new();
        HierarchyWalker::new(self.hierarchy, self.metadata, self.well_known)
            .run(&mut registry)?;

        let lattice = TypeLattice::new(self.hierarchy, self.well_known);
        let synthesis = SignatureSynthesis::new(self.hierarchy, self.well_known, &lattice);

        let SelectorRegistry {
            selectors,
            by_ref,
            dynamic_getters,
            dynamic_setters,
            dynamic_methods,
        } = registry;

        let mut finalized: FxHashMap<SelectorId, Selector> =
            FxHashMap::with_capacity_and_hasher(selectors.len(), Default::default());
        for (id, accumulator) in selectors {
            let signature = synthesis.synthesize(&accumulator)?;
            finalized.insert(id, accumulator.finalize(self.hierarchy, signature));
        }

        // The dynamic-miss fallback stays dispatchable even with no direct
        // polymorphic call sites.
        let keep_alive = self
            .well_known
            .no_such_method
            .and_then(|member| self.metadata.selector_id(MemberRef::method(member)));

        let mut packer = TablePacker::new();
        let stats = packer.pack(&mut finalized, keep_alive)?;
        let entries = packer.into_entries();
        let table = DispatchTable::resolve(&entries, functions);

        Ok(DispatchOutput {
            selectors: finalized,
            by_ref,
            dynamic_getters,
            dynamic_setters,
            dynamic_methods,
            entries,
            table,
            stats,
        })
    }
}

/// Finalized build results. Read-only; safe to share once `build` returns.
#[derive(Debug)]
pub struct DispatchOutput {
    selectors: FxHashMap<SelectorId, Selector>,
    by_ref: FxHashMap<MemberRef, SelectorId>,
    dynamic_getters: FxHashMap<String, Vec<SelectorId>>,
    dynamic_setters: FxHashMap<String, Vec<SelectorId>>,
    dynamic_methods: FxHashMap<String, Vec<SelectorId>>,
    /// Packed slots at the member level, before function resolution.
    entries: Vec<Option<MemberRef>>,
    table: DispatchTable,
    stats: PackStats,
}

impl DispatchOutput {
    pub fn selector(&self, id: SelectorId) -> Option<&Selector> {
        self.selectors.get(&id)
    }

    /// The selector a member ref dispatches through.
    pub fn selector_for(&self, reference: MemberRef) -> Option<&Selector> {
        self.by_ref
            .get(&reference)
            .and_then(|id| self.selectors.get(id))
    }

    pub fn selectors(&self) -> impl Iterator<Item = &Selector> {
        self.selectors.values()
    }

    pub fn dynamic_getter_selectors(&self, name: &str) -> impl Iterator<Item = &Selector> {
        self.dynamic_index(&self.dynamic_getters, name)
    }

    pub fn dynamic_setter_selectors(&self, name: &str) -> impl Iterator<Item = &Selector> {
        self.dynamic_index(&self.dynamic_setters, name)
    }

    pub fn dynamic_method_selectors(&self, name: &str) -> impl Iterator<Item = &Selector> {
        self.dynamic_index(&self.dynamic_methods, name)
    }

    fn dynamic_index<'s>(
        &'s self,
        index: &'s FxHashMap<String, Vec<SelectorId>>,
        name: &str,
    ) -> impl Iterator<Item = &'s Selector> {
        index
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.selectors.get(id))
    }

    /// The emitted table resource (nullable function references).
    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// Member-level view of the packed slots.
    pub fn table_entries(&self) -> &[Option<MemberRef>] {
        &self.entries
    }

    pub fn stats(&self) -> PackStats {
        self.stats
    }
}

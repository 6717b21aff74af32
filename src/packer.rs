//! Row-displacement packing of selector rows into one flat table.
//!
//! Each live selector's row is the set of slots `offset + class_id` for its
//! non-abstract classes. Rows are placed widest-first (hotter rows break
//! ties) into the smallest offset where no occupied slot collides. Offsets
//! may be negative as long as every written slot index stays non-negative;
//! the candidate `first_available - min(class_ids)` guarantees that by
//! construction.

use rustc_hash::FxHashMap;
use std::fmt;

use crate::errors::BuildError;
use crate::hierarchy::MemberRef;
use crate::identity::{FunctionRef, SelectorId};
use crate::selector::Selector;

/// Resolves table entries to compiled function references. Implemented by
/// the driver's function store.
pub trait FunctionRegistry {
    fn existing_function(&self, target: MemberRef) -> Option<FunctionRef>;
}

/// Map-backed [`FunctionRegistry`] for tests and simple drivers.
#[derive(Debug, Clone, Default)]
pub struct MapFunctionRegistry {
    functions: FxHashMap<MemberRef, FunctionRef>,
}

impl MapFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: MemberRef, function: FunctionRef) {
        self.functions.insert(target, function);
    }
}

impl FunctionRegistry for MapFunctionRegistry {
    fn existing_function(&self, target: MemberRef) -> Option<FunctionRef> {
        self.functions.get(&target).copied()
    }
}

/// The emitted table resource. Slots are nullable function references;
/// unoccupied slots stay at the null default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable {
    slots: Vec<Option<FunctionRef>>,
}

impl DispatchTable {
    pub(crate) fn resolve(
        entries: &[Option<MemberRef>],
        functions: &dyn FunctionRegistry,
    ) -> Self {
        let slots = entries
            .iter()
            .map(|entry| entry.and_then(|target| functions.existing_function(target)))
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Option<FunctionRef>] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<FunctionRef> {
        self.slots.get(index).copied().flatten()
    }
}

impl fmt::Display for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let occupied = self.slots.iter().filter(|slot| slot.is_some()).count();
        writeln!(f, "dispatch table: {} slots, {} occupied", self.len(), occupied)?;
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(function) = slot {
                writeln!(f, "  [{index:>6}] fn {}", function.index())?;
            }
        }
        Ok(())
    }
}

/// Summary of a packing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackStats {
    pub table_len: usize,
    pub occupied: usize,
    pub live_selectors: usize,
}

impl PackStats {
    pub fn fill_ratio(&self) -> f64 {
        if self.table_len == 0 {
            return 1.0;
        }
        self.occupied as f64 / self.table_len as f64
    }
}

#[derive(Debug, Default)]
pub(crate) struct TablePacker {
    entries: Vec<Option<MemberRef>>,
    first_available: usize,
}

impl TablePacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign offsets to every live selector and fill the table. A selector
    /// is live when call sites dispatch through it polymorphically, or when
    /// it is the `keep_alive` selector (the dynamic-miss fallback).
    pub fn pack(
        &mut self,
        selectors: &mut FxHashMap<SelectorId, Selector>,
        keep_alive: Option<SelectorId>,
    ) -> Result<PackStats, BuildError> {
        let mut live: Vec<(u64, SelectorId)> = selectors
            .values()
            .filter(|selector| {
                (selector.call_count() > 0 && selector.target_count() > 1)
                    || Some(selector.id()) == keep_alive
            })
            .map(|selector| (selector.sort_weight(), selector.id()))
            .collect();
        // Widest and hottest rows first; ties break by id for determinism.
        live.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        for &(_, id) in &live {
            let selector = selectors
                .get_mut(&id)
                .expect("live selector present in the selector map");
            self.place(selector)?;
        }

        let stats = PackStats {
            table_len: self.entries.len(),
            occupied: self.entries.iter().filter(|entry| entry.is_some()).count(),
            live_selectors: live.len(),
        };
        tracing::debug!(
            table_len = stats.table_len,
            occupied = stats.occupied,
            live = stats.live_selectors,
            "dispatch table packed"
        );
        Ok(stats)
    }

    fn place(&mut self, selector: &mut Selector) -> Result<(), BuildError> {
        let class_ids = selector.class_ids();
        let Some(&min_class) = class_ids.first() else {
            // A row with no concrete classes occupies nothing.
            selector.set_offset(0);
            return Ok(());
        };

        // Align the leftmost occupied slot with the first free one; every
        // later slot index is then non-negative. Probe upward on collision;
        // termination is guaranteed once the whole row lies past the end.
        let mut offset = self.first_available as i64 - min_class.index() as i64;
        while !self.fits(selector, offset) {
            offset += 1;
        }

        for &class in class_ids {
            let index = (offset + class.index() as i64) as usize;
            if index >= self.entries.len() {
                self.entries.resize(index + 1, None);
            }
            if self.entries[index].is_some() {
                return Err(BuildError::internal_with_context(
                    "row placement writes into an occupied slot",
                    format!("selector {} slot {index}", selector.id().index()),
                ));
            }
            let target = selector.target(class).ok_or_else(|| {
                BuildError::internal_with_context(
                    "selector row lists a class with no target",
                    format!("selector {} class {}", selector.id().index(), class.index()),
                )
            })?;
            self.entries[index] = Some(target);
        }
        selector.set_offset(offset as i32);

        while self.first_available < self.entries.len()
            && self.entries[self.first_available].is_some()
        {
            self.first_available += 1;
        }
        if self.first_available > self.entries.len() {
            return Err(BuildError::internal(
                "first available slot advanced past the table end",
            ));
        }
        Ok(())
    }

    fn fits(&self, selector: &Selector, offset: i64) -> bool {
        selector.class_ids().iter().all(|&class| {
            let index = offset + class.index() as i64;
            index >= 0
                && (index as usize >= self.entries.len()
                    || self.entries[index as usize].is_none())
        })
    }

    pub fn into_entries(self) -> Vec<Option<MemberRef>> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{ClassDescriptor, ClassHierarchy, MemberDecl, MemberKind, ParamShape};
    use crate::identity::{ClassId, MemberId};
    use crate::param_info::ParameterInfo;
    use crate::selector::SelectorAccumulator;
    use crate::signature::CallSignature;
    use smallvec::SmallVec;

    // One concrete member per class keeps target refs distinct, so every
    // selector row counts as polymorphic.
    fn world(class_count: u32) -> ClassHierarchy {
        let classes = (0..class_count)
            .map(|id| ClassDescriptor {
                id: ClassId::new(id),
                name: format!("C{id}"),
                super_id: None,
                is_abstract: false,
                has_source: true,
                members: Vec::new(),
            })
            .collect();
        let members = (0..class_count)
            .map(|id| MemberDecl {
                id: MemberId::new(id),
                class_id: ClassId::new(id),
                name: "m".to_string(),
                is_abstract: false,
                is_instance: true,
                kind: MemberKind::Method {
                    shape: ParamShape::default(),
                    return_type: None,
                },
            })
            .collect();
        ClassHierarchy::new(classes, members)
    }

    fn selector(
        hierarchy: &ClassHierarchy,
        id: u32,
        class_ids: &[u32],
        call_count: u32,
    ) -> Selector {
        let mut accumulator = SelectorAccumulator::new(
            SelectorId::new(id),
            format!("s{id}"),
            call_count,
            ParameterInfo::default(),
            0,
        );
        for &class in class_ids {
            accumulator
                .targets
                .insert(ClassId::new(class), MemberRef::method(MemberId::new(class)));
        }
        accumulator.finalize(
            hierarchy,
            CallSignature {
                inputs: SmallVec::new(),
                outputs: SmallVec::new(),
            },
        )
    }

    fn pack(
        hierarchy: &ClassHierarchy,
        specs: &[(u32, &[u32], u32)],
    ) -> (FxHashMap<SelectorId, Selector>, Vec<Option<MemberRef>>, PackStats) {
        let mut selectors: FxHashMap<SelectorId, Selector> = specs
            .iter()
            .map(|&(id, class_ids, count)| {
                (SelectorId::new(id), selector(hierarchy, id, class_ids, count))
            })
            .collect();
        let mut packer = TablePacker::new();
        let stats = packer.pack(&mut selectors, None).unwrap();
        let entries = packer.into_entries();
        (selectors, entries, stats)
    }

    fn assert_placement(selectors: &FxHashMap<SelectorId, Selector>, entries: &[Option<MemberRef>]) {
        for selector in selectors.values() {
            let Some(offset) = selector.offset() else {
                continue;
            };
            for &class in selector.class_ids() {
                let index = (offset as i64 + class.index() as i64) as usize;
                assert_eq!(entries[index], selector.target(class));
            }
        }
    }

    #[test]
    fn width_beats_heat_and_rows_displace() {
        let hierarchy = world(7);
        let (selectors, entries, stats) = pack(
            &hierarchy,
            &[(1, &[0, 1, 2, 3], 1), (2, &[4, 5], 100), (3, &[6], 1)],
        );

        // Weights: s1 = 41, s2 = 120, s3 = 11. s2 lands first with its row
        // pulled back to the table start.
        assert_eq!(selectors[&SelectorId::new(2)].offset(), Some(-4));
        assert_eq!(selectors[&SelectorId::new(1)].offset(), Some(2));
        assert_eq!(selectors[&SelectorId::new(3)].offset(), Some(0));
        assert_eq!(entries.len(), 7);
        assert_eq!(stats.occupied, 7);
        assert_placement(&selectors, &entries);
    }

    #[test]
    fn collisions_probe_upward_and_gaps_fill() {
        let hierarchy = world(4);
        let (selectors, entries, _) = pack(
            &hierarchy,
            &[(1, &[0, 2], 10), (2, &[0, 1], 5), (3, &[1], 1)],
        );

        // s1 (weight 30) takes slots 0 and 2. s2 (weight 25) starts at the
        // gap but its second slot collides until offset 3. s3 (weight 11)
        // drops into the gap at slot 1.
        assert_eq!(selectors[&SelectorId::new(1)].offset(), Some(0));
        assert_eq!(selectors[&SelectorId::new(2)].offset(), Some(3));
        assert_eq!(selectors[&SelectorId::new(3)].offset(), Some(0));
        assert_eq!(entries.iter().filter(|entry| entry.is_some()).count(), 5);
        assert_placement(&selectors, &entries);
    }

    #[test]
    fn cold_and_singular_selectors_get_no_offset() {
        let hierarchy = world(3);
        let (selectors, entries, stats) = pack(
            &hierarchy,
            &[(1, &[0, 1], 0), (2, &[2], 50)],
        );

        // s1 has targets but no calls; s2 is hot but monomorphic.
        assert_eq!(selectors[&SelectorId::new(1)].offset(), None);
        assert_eq!(selectors[&SelectorId::new(2)].offset(), None);
        assert!(entries.is_empty());
        assert_eq!(stats.live_selectors, 0);
        assert_eq!(stats.table_len, 0);
    }

    #[test]
    fn keep_alive_selector_is_packed_without_calls() {
        let hierarchy = world(2);
        let (selectors, entries, _) = pack_with_keep_alive(&hierarchy);

        assert!(selectors[&SelectorId::new(9)].offset().is_some());
        assert_eq!(entries.iter().filter(|entry| entry.is_some()).count(), 2);
    }

    fn pack_with_keep_alive(
        hierarchy: &ClassHierarchy,
    ) -> (FxHashMap<SelectorId, Selector>, Vec<Option<MemberRef>>, PackStats) {
        let mut selectors: FxHashMap<SelectorId, Selector> = [(
            SelectorId::new(9),
            selector(hierarchy, 9, &[0, 1], 0),
        )]
        .into_iter()
        .collect();
        let mut packer = TablePacker::new();
        let stats = packer.pack(&mut selectors, Some(SelectorId::new(9))).unwrap();
        let entries = packer.into_entries();
        (selectors, entries, stats)
    }

    #[test]
    fn resolved_table_reads_nullable_function_refs() {
        let hierarchy = world(2);
        let (_, entries, _) = pack(&hierarchy, &[(1, &[0, 1], 3)]);

        let mut functions = MapFunctionRegistry::new();
        functions.insert(MemberRef::method(MemberId::new(0)), FunctionRef::new(7));
        let table = DispatchTable::resolve(&entries, &functions);

        assert_eq!(table.len(), entries.len());
        assert_eq!(table.slot(0), Some(FunctionRef::new(7)));
        // Class 1's member has no compiled function; its slot stays null.
        assert_eq!(table.slot(1), None);
    }
}

//! Selectors: equivalence classes of polymorphic call sites.
//!
//! A selector lives in two phases. During the hierarchy walk it is a
//! [`SelectorAccumulator`]: targets and parameter info grow monotonically.
//! Finalization freezes it into a [`Selector`], the only form the public
//! API exposes. The walk populates, the packer and the driver consume.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::hierarchy::{ClassHierarchy, MemberRef};
use crate::identity::{ClassId, SelectorId};
use crate::param_info::ParameterInfo;
use crate::signature::CallSignature;

/// Mutable selector state while the hierarchy walk is running.
#[derive(Debug, Clone)]
pub(crate) struct SelectorAccumulator {
    pub id: SelectorId,
    pub name: String,
    pub call_count: u32,
    pub param_info: ParameterInfo,
    /// 0 or 1; 1 if any implementation returns a value.
    pub return_count: usize,
    /// Every class with access to the member, abstract classes included,
    /// mapped to the implementation it dispatches to.
    pub targets: BTreeMap<ClassId, MemberRef>,
}

impl SelectorAccumulator {
    pub fn new(
        id: SelectorId,
        name: String,
        call_count: u32,
        param_info: ParameterInfo,
        return_count: usize,
    ) -> Self {
        Self {
            id,
            name,
            call_count,
            param_info,
            return_count,
            targets: BTreeMap::new(),
        }
    }

    /// Freeze into the immutable form, deriving the per-class dispatch row.
    pub fn finalize(self, hierarchy: &ClassHierarchy, signature: CallSignature) -> Selector {
        let class_ids: Vec<ClassId> = self
            .targets
            .keys()
            .copied()
            .filter(|&class| !hierarchy.class(class).is_abstract)
            .collect();

        let concrete: FxHashSet<MemberRef> = self
            .targets
            .values()
            .copied()
            .filter(|reference| !hierarchy.member(reference.member).is_abstract)
            .collect();
        let target_count = concrete.len();
        let singular_target = if target_count == 1 {
            concrete.into_iter().next()
        } else {
            None
        };

        Selector {
            id: self.id,
            name: self.name,
            call_count: self.call_count,
            param_info: self.param_info,
            return_count: self.return_count,
            targets: self.targets,
            class_ids,
            target_count,
            singular_target,
            signature,
            offset: None,
        }
    }
}

/// A finalized selector: read-only after the build.
#[derive(Debug, Clone)]
pub struct Selector {
    id: SelectorId,
    name: String,
    call_count: u32,
    param_info: ParameterInfo,
    return_count: usize,
    targets: BTreeMap<ClassId, MemberRef>,
    class_ids: Vec<ClassId>,
    target_count: usize,
    singular_target: Option<MemberRef>,
    signature: CallSignature,
    offset: Option<i32>,
}

impl Selector {
    pub fn id(&self) -> SelectorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call_count(&self) -> u32 {
        self.call_count
    }

    pub fn param_info(&self) -> &ParameterInfo {
        &self.param_info
    }

    pub fn return_count(&self) -> usize {
        self.return_count
    }

    pub fn targets(&self) -> &BTreeMap<ClassId, MemberRef> {
        &self.targets
    }

    pub fn target(&self, class: ClassId) -> Option<MemberRef> {
        self.targets.get(&class).copied()
    }

    /// Non-abstract classes dispatching through this selector, ascending.
    pub fn class_ids(&self) -> &[ClassId] {
        &self.class_ids
    }

    /// Number of distinct concrete implementations across all targets.
    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// The unique concrete implementation, when there is exactly one. Such
    /// selectors are inlinable at the call site and receive no offset.
    pub fn singular_target(&self) -> Option<MemberRef> {
        self.singular_target
    }

    /// The unified callable signature accepting every implementation.
    pub fn signature(&self) -> &CallSignature {
        &self.signature
    }

    /// Base offset into the dispatch table. `None` for selectors that need
    /// no dispatch.
    pub fn offset(&self) -> Option<i32> {
        self.offset
    }

    pub(crate) fn set_offset(&mut self, offset: i32) {
        self.offset = Some(offset);
    }

    /// Packing priority: wide rows place first while the table is sparse;
    /// among similar widths, hotter selectors get smaller offsets and thus
    /// smaller call-site encodings.
    pub(crate) fn sort_weight(&self) -> u64 {
        self.class_ids.len() as u64 * 10 + self.call_count as u64
    }
}

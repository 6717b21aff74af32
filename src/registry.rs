//! Selector interning and the dynamic-call name indexes.
//!
//! Selectors are interned by the id the attribute metadata assigns; the
//! registry owns the mutable accumulators for the duration of the hierarchy
//! walk. Name-keyed indexes for dynamic getter/setter/method resolution are
//! built incrementally as refs are interned.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;

use crate::errors::BuildError;
use crate::hierarchy::{
    ClassHierarchy, DispatchMetadata, MemberKind, MemberRef, MemberRole,
};
use crate::identity::SelectorId;
use crate::param_info::ParameterInfo;
use crate::selector::SelectorAccumulator;
use crate::well_known::{CALL_MEMBER_NAME, WellKnown};

#[derive(Debug, Default)]
pub(crate) struct SelectorRegistry {
    pub selectors: FxHashMap<SelectorId, SelectorAccumulator>,
    /// Every interned ref, mapped to the selector it dispatches through.
    pub by_ref: FxHashMap<MemberRef, SelectorId>,
    pub dynamic_getters: FxHashMap<String, Vec<SelectorId>>,
    pub dynamic_setters: FxHashMap<String, Vec<SelectorId>>,
    pub dynamic_methods: FxHashMap<String, Vec<SelectorId>>,
}

fn role_name(role: MemberRole) -> &'static str {
    match role {
        MemberRole::Method => "method",
        MemberRole::Getter => "getter",
        MemberRole::Setter => "setter",
        MemberRole::TearOff => "tear-off",
    }
}

/// Outputs a ref produces when called: getters and tear-offs always return
/// a value, setters never do, methods according to their declaration.
fn return_count(kind: &MemberKind, role: MemberRole) -> usize {
    match role {
        MemberRole::Getter | MemberRole::TearOff => 1,
        MemberRole::Setter => 0,
        MemberRole::Method => match kind {
            MemberKind::Method { return_type, .. } => usize::from(return_type.is_some()),
            _ => 0,
        },
    }
}

impl SelectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a ref: resolve its selector id, create or merge the
    /// accumulator, and index it for dynamic calls where applicable.
    pub fn intern(
        &mut self,
        hierarchy: &ClassHierarchy,
        metadata: &DispatchMetadata,
        well_known: &WellKnown,
        reference: MemberRef,
    ) -> Result<SelectorId, BuildError> {
        let decl = hierarchy.member(reference.member);
        let Some(id) = metadata.selector_id(reference) else {
            return Err(BuildError::SelectorMetadataMissing {
                member: decl.name.clone(),
                role: role_name(reference.role),
            });
        };

        let info = ParameterInfo::from_member(decl, reference.role);
        let returns = return_count(&decl.kind, reference.role);
        match self.selectors.entry(id) {
            Entry::Occupied(mut entry) => {
                let accumulator = entry.get_mut();
                accumulator.param_info.merge(&info, &accumulator.name)?;
                accumulator.return_count = accumulator.return_count.max(returns);
            }
            Entry::Vacant(entry) => {
                entry.insert(SelectorAccumulator::new(
                    id,
                    decl.name.clone(),
                    metadata.call_count(id),
                    info,
                    returns,
                ));
            }
        }
        self.by_ref.insert(reference, id);

        let dynamic = metadata.called_dynamically(reference) || decl.name == CALL_MEMBER_NAME;
        if dynamic && !well_known.is_wasm_type(hierarchy, decl.class_id) {
            let index = match reference.role {
                MemberRole::Getter | MemberRole::TearOff => &mut self.dynamic_getters,
                MemberRole::Setter => &mut self.dynamic_setters,
                MemberRole::Method => &mut self.dynamic_methods,
            };
            let entries = index.entry(decl.name.clone()).or_default();
            if !entries.contains(&id) {
                entries.push(id);
            }
        }

        Ok(id)
    }

    pub fn get_mut(&mut self, id: SelectorId) -> &mut SelectorAccumulator {
        self.selectors
            .get_mut(&id)
            .expect("selector interned before target writes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{
        ClassDescriptor, MemberAttrs, MemberDecl, ParamShape, TypeRef,
    };
    use crate::identity::{ClassId, MemberId};

    fn fixture() -> (ClassHierarchy, DispatchMetadata, WellKnown) {
        let object = ClassDescriptor {
            id: ClassId::new(0),
            name: "Object".to_string(),
            super_id: None,
            is_abstract: false,
            has_source: true,
            members: vec![MemberId::new(0), MemberId::new(1)],
        };
        let members = vec![
            MemberDecl {
                id: MemberId::new(0),
                class_id: ClassId::new(0),
                name: "toString".to_string(),
                is_abstract: false,
                is_instance: true,
                kind: MemberKind::Method {
                    shape: ParamShape::default(),
                    return_type: Some(TypeRef::non_nullable(ClassId::new(0))),
                },
            },
            MemberDecl {
                id: MemberId::new(1),
                class_id: ClassId::new(0),
                name: "call".to_string(),
                is_abstract: false,
                is_instance: true,
                kind: MemberKind::Method {
                    shape: ParamShape::default(),
                    return_type: None,
                },
            },
        ];

        let mut metadata = DispatchMetadata::new();
        metadata.set_attrs(
            MemberId::new(0),
            MemberAttrs {
                getter_selector: Some(SelectorId::new(10)),
                method_or_setter_selector: Some(SelectorId::new(11)),
                method_or_setter_called_dynamically: true,
                ..Default::default()
            },
        );
        metadata.set_attrs(
            MemberId::new(1),
            MemberAttrs {
                getter_selector: Some(SelectorId::new(12)),
                method_or_setter_selector: Some(SelectorId::new(13)),
                ..Default::default()
            },
        );
        metadata.set_call_count(SelectorId::new(11), 4);

        let well_known = WellKnown {
            object_class: ClassId::new(0),
            top_class: ClassId::new(0),
            wasm_types_base: None,
            no_such_method: None,
            function_class: ClassId::new(0),
            type_class: ClassId::new(0),
            equality_name: "==".to_string(),
        };

        (ClassHierarchy::new(vec![object], members), metadata, well_known)
    }

    #[test]
    fn intern_creates_selector_with_metadata_call_count() {
        let (hierarchy, metadata, well_known) = fixture();
        let mut registry = SelectorRegistry::new();

        let id = registry
            .intern(
                &hierarchy,
                &metadata,
                &well_known,
                MemberRef::method(MemberId::new(0)),
            )
            .unwrap();

        assert_eq!(id, SelectorId::new(11));
        let accumulator = &registry.selectors[&id];
        assert_eq!(accumulator.call_count, 4);
        assert_eq!(accumulator.return_count, 1);
        assert_eq!(accumulator.name, "toString");
    }

    #[test]
    fn dynamically_called_methods_are_name_indexed() {
        let (hierarchy, metadata, well_known) = fixture();
        let mut registry = SelectorRegistry::new();

        registry
            .intern(
                &hierarchy,
                &metadata,
                &well_known,
                MemberRef::method(MemberId::new(0)),
            )
            .unwrap();

        assert_eq!(
            registry.dynamic_methods["toString"],
            vec![SelectorId::new(11)]
        );
        assert!(registry.dynamic_getters.is_empty());
    }

    #[test]
    fn call_member_is_always_dynamic() {
        let (hierarchy, metadata, well_known) = fixture();
        let mut registry = SelectorRegistry::new();

        registry
            .intern(
                &hierarchy,
                &metadata,
                &well_known,
                MemberRef::method(MemberId::new(1)),
            )
            .unwrap();

        assert_eq!(registry.dynamic_methods["call"], vec![SelectorId::new(13)]);
    }

    #[test]
    fn missing_selector_metadata_is_fatal() {
        let (hierarchy, _metadata, well_known) = fixture();
        let mut registry = SelectorRegistry::new();

        let mut bare = DispatchMetadata::new();
        bare.set_attrs(MemberId::new(0), MemberAttrs::default());
        let err = registry
            .intern(
                &hierarchy,
                &bare,
                &well_known,
                MemberRef::method(MemberId::new(0)),
            )
            .unwrap_err();
        assert!(matches!(err, BuildError::SelectorMetadataMissing { .. }));
    }
}

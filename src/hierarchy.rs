//! Input data model for dispatch table construction.
//!
//! The driver hands the builder a [`ClassHierarchy`] (class descriptors in
//! superclass-first order plus member declarations) and a
//! [`DispatchMetadata`] (selector-id assignment, dynamic-call flags, and
//! call-count estimates). Both are immutable for the builder's lifetime.

use rustc_hash::FxHashMap;

use crate::errors::BuildError;
use crate::identity::{ClassId, MemberId, SelectorId};

/// A source type resolved to its representing class plus nullability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub class: ClassId,
    pub nullable: bool,
}

impl TypeRef {
    pub fn non_nullable(class: ClassId) -> Self {
        Self {
            class,
            nullable: false,
        }
    }

    pub fn nullable(class: ClassId) -> Self {
        Self {
            class,
            nullable: true,
        }
    }
}

/// A positional parameter declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDecl {
    pub ty: TypeRef,
    /// Covariant by class or by declaration; either forces a boxed
    /// representation so the callee can run its type check.
    pub is_covariant: bool,
}

/// A named parameter declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedParamDecl {
    pub name: String,
    pub ty: TypeRef,
    pub is_required: bool,
    pub is_covariant: bool,
}

/// Full parameter shape of a method declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamShape {
    pub type_param_count: u32,
    pub positional: Vec<ParamDecl>,
    /// Positional parameters at index >= this count are optional.
    pub required_positional: usize,
    pub named: Vec<NamedParamDecl>,
}

/// What kind of member a declaration is. Closed set: the builder matches
/// exhaustively and the driver cannot extend it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Field {
        field_type: TypeRef,
        has_setter: bool,
        /// Covariant field: its implicit setter takes a covariant parameter.
        is_covariant: bool,
    },
    Method {
        shape: ParamShape,
        /// `None` is a void return.
        return_type: Option<TypeRef>,
    },
    Getter {
        return_type: TypeRef,
    },
    Setter {
        param_type: TypeRef,
        is_covariant: bool,
    },
}

/// A member declaration on a specific class.
#[derive(Debug, Clone)]
pub struct MemberDecl {
    pub id: MemberId,
    pub class_id: ClassId,
    pub name: String,
    pub is_abstract: bool,
    /// Static members never dispatch; the walker skips them.
    pub is_instance: bool,
    pub kind: MemberKind,
}

/// The role under which a member participates in dispatch. A field
/// contributes a Getter ref and possibly a Setter ref; a method contributes
/// a Method ref and possibly a TearOff ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberRole {
    Method,
    Getter,
    Setter,
    TearOff,
}

/// The unit stored in selector target maps and table slots: a member seen
/// through one of its dispatch roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberRef {
    pub member: MemberId,
    pub role: MemberRole,
}

impl MemberRef {
    pub fn method(member: MemberId) -> Self {
        Self {
            member,
            role: MemberRole::Method,
        }
    }

    pub fn getter(member: MemberId) -> Self {
        Self {
            member,
            role: MemberRole::Getter,
        }
    }

    pub fn setter(member: MemberId) -> Self {
        Self {
            member,
            role: MemberRole::Setter,
        }
    }

    pub fn tear_off(member: MemberId) -> Self {
        Self {
            member,
            role: MemberRole::TearOff,
        }
    }
}

/// A class in the hierarchy.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    pub id: ClassId,
    pub name: String,
    pub super_id: Option<ClassId>,
    pub is_abstract: bool,
    /// False for the synthetic top class, which has no source declaration
    /// and dispatches through the root object class's members.
    pub has_source: bool,
    pub members: Vec<MemberId>,
}

/// The program's class hierarchy: classes indexed by [`ClassId`] in
/// superclass-first order, members indexed by [`MemberId`].
#[derive(Debug, Clone, Default)]
pub struct ClassHierarchy {
    classes: Vec<ClassDescriptor>,
    members: Vec<MemberDecl>,
}

impl ClassHierarchy {
    pub fn new(classes: Vec<ClassDescriptor>, members: Vec<MemberDecl>) -> Self {
        Self { classes, members }
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.iter()
    }

    pub fn class(&self, id: ClassId) -> &ClassDescriptor {
        &self.classes[id.index() as usize]
    }

    pub fn member(&self, id: MemberId) -> &MemberDecl {
        &self.members[id.index() as usize]
    }

    /// Whether `class` is `ancestor` or a transitive subclass of it.
    pub fn descends_from(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.class(id).super_id;
        }
        false
    }

    /// Depth of a class in the hierarchy; roots are depth 0.
    pub fn depth(&self, class: ClassId) -> u32 {
        let mut depth = 0;
        let mut current = self.class(class).super_id;
        while let Some(id) = current {
            depth += 1;
            current = self.class(id).super_id;
        }
        depth
    }

    /// Validate the dense-id and superclass-first invariants the walker
    /// relies on.
    pub fn validate(&self) -> Result<(), BuildError> {
        for (index, class) in self.classes.iter().enumerate() {
            if class.id.index() as usize != index {
                return Err(BuildError::HierarchyMalformed {
                    class: class.name.clone(),
                    reason: format!(
                        "class id {} at position {index} breaks dense ordering",
                        class.id.index()
                    ),
                });
            }
            if let Some(super_id) = class.super_id
                && super_id.index() >= class.id.index()
            {
                return Err(BuildError::HierarchyMalformed {
                    class: class.name.clone(),
                    reason: format!(
                        "superclass {} has not been processed before its subclass",
                        super_id.index()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Per-member attribute metadata supplied by the driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberAttrs {
    pub getter_selector: Option<SelectorId>,
    pub method_or_setter_selector: Option<SelectorId>,
    pub getter_called_dynamically: bool,
    pub method_or_setter_called_dynamically: bool,
    pub has_tear_off_uses: bool,
}

/// Selector-id assignment, dynamic-call flags, and call-count estimates.
#[derive(Debug, Clone, Default)]
pub struct DispatchMetadata {
    attrs: FxHashMap<MemberId, MemberAttrs>,
    call_counts: FxHashMap<SelectorId, u32>,
}

impl DispatchMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attrs(&mut self, member: MemberId, attrs: MemberAttrs) {
        self.attrs.insert(member, attrs);
    }

    pub fn set_call_count(&mut self, selector: SelectorId, count: u32) {
        self.call_counts.insert(selector, count);
    }

    pub fn attrs(&self, member: MemberId) -> Option<&MemberAttrs> {
        self.attrs.get(&member)
    }

    /// The selector id a ref dispatches through: getter/tear-off roles use
    /// the getter selector, method/setter roles the method-or-setter
    /// selector.
    pub fn selector_id(&self, reference: MemberRef) -> Option<SelectorId> {
        let attrs = self.attrs.get(&reference.member)?;
        match reference.role {
            MemberRole::Getter | MemberRole::TearOff => attrs.getter_selector,
            MemberRole::Method | MemberRole::Setter => attrs.method_or_setter_selector,
        }
    }

    /// Whether a ref is reachable through name-only call sites.
    pub fn called_dynamically(&self, reference: MemberRef) -> bool {
        let Some(attrs) = self.attrs.get(&reference.member) else {
            return false;
        };
        match reference.role {
            MemberRole::Getter | MemberRole::TearOff => attrs.getter_called_dynamically,
            MemberRole::Method | MemberRole::Setter => attrs.method_or_setter_called_dynamically,
        }
    }

    pub fn has_tear_off_uses(&self, member: MemberId) -> bool {
        self.attrs
            .get(&member)
            .is_some_and(|attrs| attrs.has_tear_off_uses)
    }

    /// Estimated number of polymorphic call sites for a selector.
    pub fn call_count(&self, selector: SelectorId) -> u32 {
        self.call_counts.get(&selector).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(id: u32, super_id: Option<u32>) -> ClassDescriptor {
        ClassDescriptor {
            id: ClassId::new(id),
            name: format!("C{id}"),
            super_id: super_id.map(ClassId::new),
            is_abstract: false,
            has_source: true,
            members: Vec::new(),
        }
    }

    #[test]
    fn descends_from_walks_super_chain() {
        let hierarchy = ClassHierarchy::new(
            vec![class(0, None), class(1, Some(0)), class(2, Some(1))],
            Vec::new(),
        );

        assert!(hierarchy.descends_from(ClassId::new(2), ClassId::new(0)));
        assert!(hierarchy.descends_from(ClassId::new(1), ClassId::new(1)));
        assert!(!hierarchy.descends_from(ClassId::new(0), ClassId::new(2)));
        assert_eq!(hierarchy.depth(ClassId::new(2)), 2);
    }

    #[test]
    fn validate_rejects_super_after_subclass() {
        let hierarchy =
            ClassHierarchy::new(vec![class(0, None), class(1, Some(2))], Vec::new());

        assert!(matches!(
            hierarchy.validate(),
            Err(BuildError::HierarchyMalformed { .. })
        ));
    }

    #[test]
    fn selector_id_routes_by_role() {
        let mut metadata = DispatchMetadata::new();
        metadata.set_attrs(
            MemberId::new(0),
            MemberAttrs {
                getter_selector: Some(SelectorId::new(7)),
                method_or_setter_selector: Some(SelectorId::new(8)),
                ..Default::default()
            },
        );

        let member = MemberId::new(0);
        assert_eq!(
            metadata.selector_id(MemberRef::getter(member)),
            Some(SelectorId::new(7))
        );
        assert_eq!(
            metadata.selector_id(MemberRef::tear_off(member)),
            Some(SelectorId::new(7))
        );
        assert_eq!(
            metadata.selector_id(MemberRef::method(member)),
            Some(SelectorId::new(8))
        );
        assert_eq!(
            metadata.selector_id(MemberRef::setter(member)),
            Some(SelectorId::new(8))
        );
    }
}

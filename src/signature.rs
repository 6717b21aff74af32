//! Signature synthesis: folding every implementation of a selector into one
//! callable signature.
//!
//! Input slots are ordered receiver, type parameters, positionals, then
//! named parameters in name-index order. Each slot accumulates a candidate
//! class set, a nullability bit, and a boxing requirement across all
//! targets, then materializes through the lattice.

use smallvec::{SmallVec, smallvec};

use crate::errors::BuildError;
use crate::hierarchy::{ClassHierarchy, MemberKind, MemberRole, TypeRef};
use crate::identity::ClassId;
use crate::lattice::{TypeLattice, ValueType};
use crate::selector::SelectorAccumulator;
use crate::well_known::WellKnown;

/// The unified callable signature of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSignature {
    /// Receiver, type parameters, positionals, named parameters.
    pub inputs: SmallVec<[ValueType; 4]>,
    /// Empty for selectors whose implementations all return nothing.
    pub outputs: SmallVec<[ValueType; 1]>,
}

/// Per-slot accumulators over a selector's targets.
struct Slots {
    class_sets: Vec<SmallVec<[ClassId; 4]>>,
    nullable: Vec<bool>,
    boxed: Vec<bool>,
}

impl Slots {
    fn new(count: usize) -> Self {
        Self {
            class_sets: vec![SmallVec::new(); count],
            nullable: vec![false; count],
            boxed: vec![false; count],
        }
    }

    fn contribute(&mut self, slot: usize, ty: TypeRef, covariant: bool) {
        self.class_sets[slot].push(ty.class);
        self.nullable[slot] |= ty.nullable;
        self.boxed[slot] |= covariant;
    }
}

pub(crate) struct SignatureSynthesis<'a> {
    hierarchy: &'a ClassHierarchy,
    well_known: &'a WellKnown,
    lattice: &'a TypeLattice<'a>,
}

impl<'a> SignatureSynthesis<'a> {
    pub fn new(
        hierarchy: &'a ClassHierarchy,
        well_known: &'a WellKnown,
        lattice: &'a TypeLattice<'a>,
    ) -> Self {
        Self {
            hierarchy,
            well_known,
            lattice,
        }
    }

    pub fn synthesize(&self, selector: &SelectorAccumulator) -> Result<CallSignature, BuildError> {
        let info = &selector.param_info;
        let type_params = info.type_param_count() as usize;
        let positional_base = 1 + type_params;
        let named_base = positional_base + info.positional_count();
        let input_count = named_base + info.named_count();

        let mut slots = Slots::new(input_count);
        slots.boxed[0] = true;
        let mut out_classes: SmallVec<[ClassId; 4]> = SmallVec::new();
        let mut out_nullable = false;

        for (&class_id, &reference) in &selector.targets {
            slots.class_sets[0].push(class_id);
            let decl = self.hierarchy.member(reference.member);

            let output = match (reference.role, &decl.kind) {
                (MemberRole::Getter, MemberKind::Field { field_type, .. }) => Some(*field_type),
                (MemberRole::Getter, MemberKind::Getter { return_type }) => Some(*return_type),
                (MemberRole::TearOff, MemberKind::Method { .. }) => Some(TypeRef::non_nullable(
                    self.well_known.function_class,
                )),
                (
                    MemberRole::Setter,
                    MemberKind::Field {
                        field_type,
                        is_covariant,
                        ..
                    },
                ) => {
                    slots.contribute(positional_base, *field_type, *is_covariant);
                    None
                }
                (
                    MemberRole::Setter,
                    MemberKind::Setter {
                        param_type,
                        is_covariant,
                    },
                ) => {
                    slots.contribute(positional_base, *param_type, *is_covariant);
                    None
                }
                (MemberRole::Method, MemberKind::Method { shape, return_type }) => {
                    for (index, param) in shape.positional.iter().enumerate() {
                        slots.contribute(positional_base + index, param.ty, param.is_covariant);
                    }
                    for param in &shape.named {
                        let index = info.named_index(&param.name).ok_or_else(|| {
                            BuildError::internal_with_context(
                                "named parameter missing from merged parameter info",
                                format!("{}::{}", decl.name, param.name),
                            )
                        })?;
                        slots.contribute(named_base + index, param.ty, param.is_covariant);
                    }
                    *return_type
                }
                _ => {
                    return Err(BuildError::internal_with_context(
                        "member kind does not match its dispatch role",
                        decl.name.clone(),
                    ));
                }
            };

            match output {
                Some(ty) => {
                    if selector.return_count == 0 {
                        return Err(BuildError::internal_with_context(
                            "target produces more outputs than the selector's return count",
                            selector.name.clone(),
                        ));
                    }
                    out_classes.push(ty.class);
                    out_nullable |= ty.nullable;
                }
                // A target returning fewer outputs than the selector makes
                // the unified output nullable: the missing value is absent.
                None => out_nullable |= selector.return_count == 1,
            }
        }

        // Positions that may hold the default-value sentinel cannot use an
        // unboxed representation.
        for index in 0..info.positional_count() {
            slots.boxed[positional_base + index] |= info.admits_sentinel_positional(index);
        }
        for index in 0..info.named_count() {
            slots.boxed[named_base + index] |= info.admits_sentinel_named(index);
        }

        let mut inputs: SmallVec<[ValueType; 4]> = SmallVec::with_capacity(input_count);
        for slot in 0..input_count {
            let value = if slot > 0 && slot < positional_base {
                self.lattice
                    .value_type_for(self.well_known.type_class, false, false)
            } else {
                let bound = self
                    .lattice
                    .upper_bound(slots.class_sets[slot].iter().copied());
                self.lattice
                    .value_type_for(bound, slots.nullable[slot], slots.boxed[slot])
            };
            inputs.push(value);
        }

        // The surrounding runtime never passes a null counterpart to the
        // equality operator.
        if self.well_known.is_equality_name(&selector.name) && inputs.len() > 1 {
            inputs[1].nullable = false;
        }

        let outputs: SmallVec<[ValueType; 1]> = if selector.return_count == 1 {
            let bound = self.lattice.upper_bound(out_classes.iter().copied());
            smallvec![self.lattice.value_type_for(bound, out_nullable, false)]
        } else {
            SmallVec::new()
        };

        Ok(CallSignature { inputs, outputs })
    }
}

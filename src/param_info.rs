//! Least-upper-bound of parameter shapes.
//!
//! Every selector accumulates one [`ParameterInfo`]: the widest positional
//! arity, the union of named-parameter names, the (required-equal)
//! type-parameter arity, and per-position marks recording whether a position
//! may hold the default-value sentinel at a call site. A position admits the
//! sentinel when any implementation declares it optional or lacks it
//! entirely.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::BuildError;
use crate::hierarchy::{MemberDecl, MemberKind, MemberRole, ParamShape};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterInfo {
    type_param_count: u32,
    /// Sentinel marks per positional position; the length is the positional
    /// parameter count.
    positional: Vec<bool>,
    /// Named parameter names in stable insertion order.
    named: Vec<String>,
    named_index: FxHashMap<String, usize>,
    named_sentinel: Vec<bool>,
}

impl ParameterInfo {
    /// Shape of a single implementation seen through one dispatch role.
    pub fn from_member(decl: &MemberDecl, role: MemberRole) -> Self {
        match role {
            MemberRole::Getter | MemberRole::TearOff => Self::default(),
            MemberRole::Setter => Self {
                positional: vec![false],
                ..Self::default()
            },
            MemberRole::Method => match &decl.kind {
                MemberKind::Method { shape, .. } => Self::from_shape(shape),
                _ => Self::default(),
            },
        }
    }

    fn from_shape(shape: &ParamShape) -> Self {
        let positional = (0..shape.positional.len())
            .map(|index| index >= shape.required_positional)
            .collect();
        let mut info = Self {
            type_param_count: shape.type_param_count,
            positional,
            ..Self::default()
        };
        for param in &shape.named {
            info.push_named(param.name.clone(), !param.is_required);
        }
        info
    }

    fn push_named(&mut self, name: String, sentinel: bool) {
        self.named_index.insert(name.clone(), self.named.len());
        self.named.push(name);
        self.named_sentinel.push(sentinel);
    }

    /// Fold another implementation's shape into this upper bound.
    pub fn merge(&mut self, other: &ParameterInfo, selector_name: &str) -> Result<(), BuildError> {
        if self.type_param_count != other.type_param_count {
            return Err(BuildError::ParameterShapeConflict {
                selector: selector_name.to_string(),
                left: self.type_param_count,
                right: other.type_param_count,
            });
        }

        // Positional arity is the max; a position absent from either side
        // admits the sentinel.
        let count = self.positional.len().max(other.positional.len());
        let mark_at = |marks: &[bool], index: usize| marks.get(index).copied().unwrap_or(true);
        self.positional = (0..count)
            .map(|index| mark_at(&self.positional, index) || mark_at(&other.positional, index))
            .collect();

        // Named set is the union in stable insertion order; a name absent
        // from either side admits the sentinel.
        for (index, name) in other.named.iter().enumerate() {
            match self.named_index.get(name) {
                Some(&existing) => {
                    self.named_sentinel[existing] |= other.named_sentinel[index];
                }
                None => self.push_named(name.clone(), true),
            }
        }
        let other_names: FxHashSet<&str> = other.named.iter().map(String::as_str).collect();
        for (index, name) in self.named.iter().enumerate() {
            if !other_names.contains(name.as_str()) {
                self.named_sentinel[index] = true;
            }
        }

        Ok(())
    }

    pub fn type_param_count(&self) -> u32 {
        self.type_param_count
    }

    pub fn positional_count(&self) -> usize {
        self.positional.len()
    }

    pub fn named_names(&self) -> &[String] {
        &self.named
    }

    pub fn named_count(&self) -> usize {
        self.named.len()
    }

    pub fn named_index(&self, name: &str) -> Option<usize> {
        self.named_index.get(name).copied()
    }

    pub fn admits_sentinel_positional(&self, index: usize) -> bool {
        self.positional[index]
    }

    pub fn admits_sentinel_named(&self, index: usize) -> bool {
        self.named_sentinel[index]
    }

    /// Total input slots contributed beyond the receiver: type parameters,
    /// positionals, then named parameters.
    pub fn input_count(&self) -> usize {
        self.type_param_count as usize + self.positional.len() + self.named.len()
    }
}

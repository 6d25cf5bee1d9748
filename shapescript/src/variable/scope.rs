use std::collections::BTreeMap;

use crate::variable::{VarKind, Variable};

/// Variables declared directly in one block.
///
/// Each kind gets its own collection, but a name may only appear once
/// across all six. Lookups that should see enclosing blocks go through
/// [`BlockTree::lookup`](crate::block::BlockTree::lookup).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub strings: BTreeMap<String, Variable>,
    pub integers: BTreeMap<String, Variable>,
    pub doubles: BTreeMap<String, Variable>,
    pub booleans: BTreeMap<String, Variable>,
    pub arrays: BTreeMap<String, Variable>,
    pub maps: BTreeMap<String, Variable>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, kind: VarKind) -> &BTreeMap<String, Variable> {
        match kind {
            VarKind::String => &self.strings,
            VarKind::Integer => &self.integers,
            VarKind::Double => &self.doubles,
            VarKind::Boolean => &self.booleans,
            VarKind::Array => &self.arrays,
            VarKind::Map => &self.maps,
        }
    }

    fn collection_mut(&mut self, kind: VarKind) -> &mut BTreeMap<String, Variable> {
        match kind {
            VarKind::String => &mut self.strings,
            VarKind::Integer => &mut self.integers,
            VarKind::Double => &mut self.doubles,
            VarKind::Boolean => &mut self.booleans,
            VarKind::Array => &mut self.arrays,
            VarKind::Map => &mut self.maps,
        }
    }

    /// Find a variable of any kind declared in this scope.
    pub fn get(&self, name: &str) -> Option<&Variable> {
        VarKind::ALL
            .iter()
            .find_map(|kind| self.collection(*kind).get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        let kind = self.get(name)?.kind();
        self.collection_mut(kind).get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Add a variable. If the name is already taken (under any kind) the
    /// existing declaration is kept and the rejected one handed back.
    pub fn declare(&mut self, variable: Variable) -> Result<(), Variable> {
        if self.contains(&variable.name) {
            return Err(variable);
        }
        self.collection_mut(variable.kind())
            .insert(variable.name.clone(), variable);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        VarKind::ALL.iter().all(|kind| self.collection(*kind).is_empty())
    }

    pub fn len(&self) -> usize {
        VarKind::ALL.iter().map(|kind| self.collection(*kind).len()).sum()
    }

    /// All variables, grouped by kind then ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        VarKind::ALL
            .into_iter()
            .flat_map(move |kind| self.collection(kind).values())
    }
}

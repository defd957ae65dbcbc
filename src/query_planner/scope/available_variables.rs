use std::sync::Arc;

use crate::query_planner::variables::VarId;

/// Immutable scope snapshot, name -> variable. Extending produces a new
/// snapshot and leaves the old one (captured by earlier stages) untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvailableVariables {
    bindings: Arc<Vec<(String, VarId)>>,
}

impl AvailableVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope holding exactly `bindings`, as after `WITH`.
    pub fn replaced(bindings: Vec<(String, VarId)>) -> Self {
        AvailableVariables {
            bindings: Arc::new(bindings),
        }
    }

    pub fn extended(&self, name: &str, id: VarId) -> Self {
        let mut bindings = self.bindings.as_ref().clone();
        bindings.push((name.to_string(), id));
        AvailableVariables {
            bindings: Arc::new(bindings),
        }
    }

    /// Latest binding of `name`.
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    pub fn contains_var(&self, id: VarId) -> bool {
        self.bindings.iter().any(|(_, v)| *v == id)
    }

    pub fn ids(&self) -> Vec<VarId> {
        let mut ids = vec![];
        for (_, id) in self.bindings.iter() {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extending_keeps_snapshot() {
        let before = AvailableVariables::new().extended("a", VarId::from_raw(0));
        let after = before.extended("b", VarId::from_raw(1));
        assert_eq!(before.get("b"), None);
        assert_eq!(after.get("a"), Some(VarId::from_raw(0)));
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_latest_binding_wins() {
        let scope = AvailableVariables::new()
            .extended("a", VarId::from_raw(0))
            .extended("a", VarId::from_raw(5));
        assert_eq!(scope.get("a"), Some(VarId::from_raw(5)));
    }
}

//! Native library dependencies and their load order.

use crate::config::{LinkMode, RegistrarConfig};
use crate::error::{RegistrarError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A native library that must be loaded before connections are opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDependency {
    /// Base library name, without platform prefix or suffix (`sqlcipher`).
    pub name: String,
    /// Dependency that must already be loaded when this one loads.
    pub required_before: Option<String>,
    /// SQLite extension entry point to register once the library is loaded.
    pub entry_point: Option<String>,
}

impl LibraryDependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_before: None,
            entry_point: None,
        }
    }

    /// Require `other` to be loaded before this dependency.
    pub fn requires(mut self, other: impl Into<String>) -> Self {
        self.required_before = Some(other.into());
        self
    }

    pub fn with_entry_point(mut self, symbol: impl Into<String>) -> Self {
        self.entry_point = Some(symbol.into());
        self
    }
}

/// A validated set of dependencies in load order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyPlan {
    ordered: Vec<LibraryDependency>,
}

impl DependencyPlan {
    /// Validate `dependencies` and compute their load order.
    ///
    /// Prerequisites always come first. Among dependencies that are ready at
    /// the same time, declaration order is kept.
    pub fn new(dependencies: Vec<LibraryDependency>) -> Result<Self> {
        let mut seen = HashSet::new();
        for dep in &dependencies {
            if dep.name.trim().is_empty() {
                return Err(RegistrarError::InvalidPlan {
                    message: "dependency name must not be empty".to_string(),
                });
            }
            if !seen.insert(dep.name.as_str()) {
                return Err(RegistrarError::DuplicateDependency {
                    name: dep.name.clone(),
                });
            }
        }

        for dep in &dependencies {
            if let Some(ref required) = dep.required_before {
                if required == &dep.name {
                    return Err(RegistrarError::DependencyCycle {
                        names: vec![dep.name.clone()],
                    });
                }
                if !seen.contains(required.as_str()) {
                    return Err(RegistrarError::UnknownDependency {
                        name: dep.name.clone(),
                        requires: required.clone(),
                    });
                }
            }
        }

        let ordered = Self::order(dependencies)?;
        Ok(Self { ordered })
    }

    fn order(dependencies: Vec<LibraryDependency>) -> Result<Vec<LibraryDependency>> {
        let mut pending = dependencies;
        let mut loaded: HashSet<String> = HashSet::new();
        let mut ordered = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let ready = pending.iter().position(|dep| {
                dep.required_before
                    .as_ref()
                    .map_or(true, |r| loaded.contains(r))
            });

            match ready {
                Some(index) => {
                    let dep = pending.remove(index);
                    loaded.insert(dep.name.clone());
                    ordered.push(dep);
                }
                None => {
                    return Err(RegistrarError::DependencyCycle {
                        names: pending.into_iter().map(|d| d.name).collect(),
                    });
                }
            }
        }

        Ok(ordered)
    }

    /// A plan with nothing to load.
    pub fn empty() -> Self {
        Self {
            ordered: Vec::new(),
        }
    }

    /// The encryption extension followed by the engine extension.
    pub fn dynamic_default() -> Self {
        let encryption = LibraryDependency::new(RegistrarConfig::ENCRYPTION_LIBRARY);
        let engine = LibraryDependency::new(RegistrarConfig::ENGINE_LIBRARY)
            .requires(RegistrarConfig::ENCRYPTION_LIBRARY)
            .with_entry_point(RegistrarConfig::ENGINE_ENTRY_POINT);
        Self {
            ordered: vec![encryption, engine],
        }
    }

    /// Default plan for the link mode this crate was built with.
    pub fn for_link_mode(mode: LinkMode) -> Self {
        match mode {
            LinkMode::Static => Self::empty(),
            LinkMode::Dynamic => Self::dynamic_default(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LibraryDependency> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.ordered.iter().map(|d| d.name.as_str()).collect()
    }

    /// Position of each dependency in the load order.
    pub fn positions(&self) -> HashMap<&str, usize> {
        self.ordered
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.as_str(), i))
            .collect()
    }
}

impl Default for DependencyPlan {
    fn default() -> Self {
        Self::for_link_mode(LinkMode::BUILD)
    }
}

impl<'a> IntoIterator for &'a DependencyPlan {
    type Item = &'a LibraryDependency;
    type IntoIter = std::slice::Iter<'a, LibraryDependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_default_loads_encryption_first() {
        let plan = DependencyPlan::dynamic_default();
        assert_eq!(plan.names(), vec!["sqlcipher", "powersync"]);

        let engine = plan.iter().nth(1).unwrap();
        assert_eq!(engine.required_before.as_deref(), Some("sqlcipher"));
        assert_eq!(engine.entry_point.as_deref(), Some("sqlite3_powersync_init"));
    }

    #[test]
    fn test_dynamic_default_passes_validation() {
        let plan = DependencyPlan::dynamic_default();
        let validated = DependencyPlan::new(plan.iter().cloned().collect()).unwrap();
        assert_eq!(validated, plan);
    }

    #[test]
    fn test_static_plan_is_empty() {
        assert!(DependencyPlan::for_link_mode(LinkMode::Static).is_empty());
        assert_eq!(DependencyPlan::for_link_mode(LinkMode::Dynamic).len(), 2);
    }

    #[test]
    fn test_prerequisite_moves_ahead_of_declaration_order() {
        let plan = DependencyPlan::new(vec![
            LibraryDependency::new("powersync").requires("sqlcipher"),
            LibraryDependency::new("sqlcipher"),
        ])
        .unwrap();
        assert_eq!(plan.names(), vec!["sqlcipher", "powersync"]);
    }

    #[test]
    fn test_independent_dependencies_keep_declaration_order() {
        let plan = DependencyPlan::new(vec![
            LibraryDependency::new("c"),
            LibraryDependency::new("a").requires("b"),
            LibraryDependency::new("b"),
            LibraryDependency::new("d"),
        ])
        .unwrap();
        assert_eq!(plan.names(), vec!["c", "b", "a", "d"]);

        let positions = plan.positions();
        assert!(positions["b"] < positions["a"]);
    }

    #[test]
    fn test_duplicate_dependency_rejected() {
        let err = DependencyPlan::new(vec![
            LibraryDependency::new("sqlcipher"),
            LibraryDependency::new("sqlcipher"),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistrarError::DuplicateDependency { name } if name == "sqlcipher"));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let err = DependencyPlan::new(vec![LibraryDependency::new("powersync").requires("sqlcipher")])
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrarError::UnknownDependency { ref name, ref requires }
                if name == "powersync" && requires == "sqlcipher"
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = DependencyPlan::new(vec![
            LibraryDependency::new("a").requires("b"),
            LibraryDependency::new("b").requires("a"),
        ])
        .unwrap_err();
        match err {
            RegistrarError::DependencyCycle { names } => {
                assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = DependencyPlan::new(vec![LibraryDependency::new("a").requires("a")]).unwrap_err();
        assert!(matches!(err, RegistrarError::DependencyCycle { .. }));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = DependencyPlan::new(vec![LibraryDependency::new("  ")]).unwrap_err();
        assert!(matches!(err, RegistrarError::InvalidPlan { .. }));
    }
}

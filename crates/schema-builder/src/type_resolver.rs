// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Execution-time type resolution for interfaces and unions: walk a runtime
//! value's class ancestry until a registered schema model is found.

use crate::error::ResolutionError;
use crate::model::{ClassHierarchyProvider, ModelRegistry};

pub struct AbstractTypeResolver<'a> {
    registry: &'a ModelRegistry,
    hierarchy: &'a dyn ClassHierarchyProvider,
}

impl<'a> AbstractTypeResolver<'a> {
    pub fn new(registry: &'a ModelRegistry, hierarchy: &'a dyn ClassHierarchyProvider) -> Self {
        Self {
            registry,
            hierarchy,
        }
    }

    /// Concrete schema type name for a runtime value of class `class`.
    ///
    /// Exhausting the ancestry without a match is a configuration error and
    /// propagates; it must never silently produce no type.
    pub fn resolve_type(&self, class: &str) -> Result<String, ResolutionError> {
        std::iter::once(class.to_string())
            .chain(self.hierarchy.ancestors_of(class))
            .find(|candidate| self.registry.has_class(candidate))
            .map(|class| self.registry.type_name_of(&class))
            .ok_or_else(|| ResolutionError {
                class: class.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StaticHierarchy, StaticModel};
    use multiplatform_test::multiplatform_test;
    use std::sync::Arc;

    fn setup() -> (ModelRegistry, StaticHierarchy) {
        let mut hierarchy = StaticHierarchy::new();
        hierarchy.register("App\\SiteTree", None);
        hierarchy.register("App\\Page", Some("App\\SiteTree"));
        hierarchy.register("App\\EventPage", Some("App\\Page"));
        hierarchy.register("App\\Orphan", None);

        let mut registry = ModelRegistry::new();
        registry.register(Arc::new(StaticModel::new("App\\Page")));

        (registry, hierarchy)
    }

    #[multiplatform_test]
    fn resolves_registered_class_directly() {
        let (registry, hierarchy) = setup();
        let resolver = AbstractTypeResolver::new(&registry, &hierarchy);
        assert_eq!(resolver.resolve_type("App\\Page").unwrap(), "Page");
    }

    #[multiplatform_test]
    fn walks_ancestry_to_nearest_registered_model() {
        let (registry, hierarchy) = setup();
        let resolver = AbstractTypeResolver::new(&registry, &hierarchy);
        assert_eq!(resolver.resolve_type("App\\EventPage").unwrap(), "Page");
    }

    #[multiplatform_test]
    fn exhausted_ancestry_is_an_error() {
        let (registry, hierarchy) = setup();
        let resolver = AbstractTypeResolver::new(&registry, &hierarchy);
        let err = resolver.resolve_type("App\\Orphan").unwrap_err();
        assert_eq!(err.class, "App\\Orphan");
    }
}

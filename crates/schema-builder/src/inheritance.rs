// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Computed ancestor/descendant view of one class relative to the
//! schema-wide base class. Never cached beyond a single build pass.

use crate::model::ClassHierarchyProvider;

pub struct InheritanceChain<'a> {
    class: String,
    base_class: String,
    hierarchy: &'a dyn ClassHierarchyProvider,
}

impl<'a> InheritanceChain<'a> {
    pub fn new(
        class: &str,
        base_class: &str,
        hierarchy: &'a dyn ClassHierarchyProvider,
    ) -> Self {
        Self {
            class: class.to_string(),
            base_class: base_class.to_string(),
            hierarchy,
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Classes strictly between this class and the base, nearest-ancestor
    /// first.
    pub fn ancestors(&self) -> Vec<String> {
        self.hierarchy
            .ancestors_of(&self.class)
            .into_iter()
            .take_while(|ancestor| *ancestor != self.base_class)
            .collect()
    }

    /// Same classes, base-class order (root first).
    pub fn base_first_ancestors(&self) -> Vec<String> {
        let mut ancestors = self.ancestors();
        ancestors.reverse();
        ancestors
    }

    /// All transitive subclasses, canonically sorted by class name so that
    /// downstream union-member ordering is stable.
    pub fn descendants(&self) -> Vec<String> {
        self.hierarchy.descendants_of(&self.class)
    }

    /// Subclasses whose immediate parent is exactly this class.
    pub fn direct_descendants(&self) -> Vec<String> {
        self.hierarchy
            .descendants_of(&self.class)
            .into_iter()
            .filter(|descendant| {
                self.hierarchy.parent_of(descendant).as_deref() == Some(self.class.as_str())
            })
            .collect()
    }
}

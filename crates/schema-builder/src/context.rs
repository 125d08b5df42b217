// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! State owned by a single build invocation. Nothing here is process-wide:
//! two consecutive builds in one process start from a clean context.

use std::collections::HashSet;

use indexmap::IndexMap;

/// Dotted-input-path -> dotted-property-path mapping, produced while
/// building nested input types and consumed by resolver middleware.
pub type PathMapping = IndexMap<String, String>;

#[derive(Debug, Default)]
pub struct BuildContext {
    /// Inheritance roots already processed in this pass.
    touched_roots: HashSet<String>,

    /// Connection type name per fully-qualified wrapped-type string.
    connections: IndexMap<String, String>,

    /// Per query field, per plugin: the flattened path mapping.
    path_mappings: IndexMap<String, IndexMap<String, PathMapping>>,

    /// Concrete types that must stay discoverable even though no query
    /// returns them directly anymore (their queries now return an
    /// interface or union).
    reachable_types: HashSet<String>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a root is seen in this build.
    pub fn touch_root(&mut self, class: &str) -> bool {
        self.touched_roots.insert(class.to_string())
    }

    pub fn get_connection(&self, wrapped_type: &str) -> Option<&String> {
        self.connections.get(wrapped_type)
    }

    pub fn register_connection(&mut self, wrapped_type: &str, connection_name: &str) {
        self.connections
            .insert(wrapped_type.to_string(), connection_name.to_string());
    }

    pub fn connection_names(&self) -> impl Iterator<Item = &String> {
        self.connections.values()
    }

    pub fn register_path_mapping(
        &mut self,
        query_name: &str,
        plugin_id: &str,
        mapping: PathMapping,
    ) {
        self.path_mappings
            .entry(query_name.to_string())
            .or_default()
            .insert(plugin_id.to_string(), mapping);
    }

    pub fn get_path_mapping(&self, query_name: &str, plugin_id: &str) -> Option<&PathMapping> {
        self.path_mappings.get(query_name)?.get(plugin_id)
    }

    pub fn mark_reachable(&mut self, type_name: &str) {
        self.reachable_types.insert(type_name.to_string());
    }

    pub fn is_reachable(&self, type_name: &str) -> bool {
        self.reachable_types.contains(type_name)
    }

    /// Concrete types hidden behind an interface or union rewrite. Callers
    /// wiring up execution expose these to fragment/introspection handling,
    /// since no root field names them directly anymore.
    pub fn reachable_types(&self) -> impl Iterator<Item = &String> {
        self.reachable_types.iter()
    }
}

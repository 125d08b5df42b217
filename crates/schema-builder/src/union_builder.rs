// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Builds a union of a type and its schema-present descendants, and
//! rewrites queries returning the type to return the union.
//!
//! Runs after the interface builder; for a type with schema-registered
//! descendants the union rewrite overwrites the interface rewrite, making
//! "union wins" the observable precedence.

use std::collections::HashSet;

use tracing::debug;

use core_model::schema::Schema;
use core_model::type_reference::TypeReference;
use core_model::types::{ResolverRef, UnionType};

use crate::context::BuildContext;
use crate::error::SchemaBuildError;
use crate::inheritance::InheritanceChain;
use crate::interface_builder::TYPE_RESOLVER_MODULE;
use crate::model::ClassHierarchyProvider;
use crate::model_type::ModelTypes;
use crate::naming::{inheritance_union_name, interface_name, short_class_name};

pub struct InheritanceUnionBuilder<'a> {
    model_types: &'a ModelTypes,
    hierarchy: &'a dyn ClassHierarchyProvider,
    base_class: &'a str,
    formatter: fn(&str) -> String,
}

impl<'a> InheritanceUnionBuilder<'a> {
    pub fn new(
        model_types: &'a ModelTypes,
        hierarchy: &'a dyn ClassHierarchyProvider,
        base_class: &'a str,
    ) -> Self {
        Self {
            model_types,
            hierarchy,
            base_class,
            formatter: inheritance_union_name,
        }
    }

    pub fn with_formatter(mut self, formatter: fn(&str) -> String) -> Self {
        self.formatter = formatter;
        self
    }

    /// Member set of the union for `type_name`: the type itself plus every
    /// descendant with a schema model. Empty when no descendant qualifies.
    fn union_members(&self, type_name: &str, schema: &Schema) -> Vec<String> {
        let Some(model_type) = self.model_types.get(type_name) else {
            return vec![];
        };

        let chain = InheritanceChain::new(
            model_type.model.get_source_class(),
            self.base_class,
            self.hierarchy,
        );

        let descendants: Vec<String> = chain
            .descendants()
            .iter()
            .map(|class| short_class_name(class))
            .filter(|name| schema.has_type(name))
            .collect();

        if descendants.is_empty() {
            return vec![];
        }

        let mut members: Vec<String> = descendants;
        members.push(type_name.to_string());
        members
    }

    /// Creates the inheritance union for a type, a no-op when the type has
    /// no schema-present descendants.
    pub fn create_unions(
        &self,
        type_name: &str,
        schema: &mut Schema,
    ) -> Result<(), SchemaBuildError> {
        let members = self.union_members(type_name, schema);
        if members.is_empty() {
            return Ok(());
        }

        let union_name = (self.formatter)(type_name);
        debug!(type_name, union = %union_name, "creating inheritance union");

        let mut union = UnionType::new(&union_name);
        for member in members {
            union.add_type(&member);
        }
        union.type_resolver = Some(ResolverRef::named(TYPE_RESOLVER_MODULE, "resolve_type"));
        schema.add_union(union)?;

        Ok(())
    }

    /// Rewrites fields/queries returning `type_name` (or the interface the
    /// interface builder substituted for it) to return the union, only when
    /// a union was actually created.
    pub fn apply_unions_to_queries(
        &self,
        type_name: &str,
        schema: &mut Schema,
        context: &mut BuildContext,
    ) -> Result<(), SchemaBuildError> {
        let union_name = (self.formatter)(type_name);
        if schema.get_union(&union_name).is_none() {
            return Ok(());
        }

        context.mark_reachable(type_name);

        let rewritable: HashSet<String> = [
            type_name.to_string(),
            interface_name(type_name),
        ]
        .into();

        for field in schema.fields_mut() {
            let reference = TypeReference::parse(&field.typ)?;
            if rewritable.contains(reference.named_type()) {
                field.typ =
                    TypeReference::from_path(&union_name, reference.wrapper_path().to_vec())
                        .unparse();
            }
        }

        Ok(())
    }
}

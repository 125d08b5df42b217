// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Sort plugin: `{Type}SortFields` input types whose leaves are the shared
//! `SortDirection` enum. List-valued fields are not sortable.

use serde_json::Value;

use core_model::schema::Schema;
use core_model::type_reference::TypeReference;
use core_model::types::EnumType;

use crate::context::PathMapping;
use crate::error::SchemaBuildError;
use crate::model::FieldValueKind;
use crate::model_type::ModelType;
use crate::naming::sort_fields_name;
use crate::nested_input::{build_paths_from_args, NestedInputPlugin};

pub const SORT_DIRECTION_TYPE: &str = "SortDirection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

pub struct SortPlugin;

impl NestedInputPlugin for SortPlugin {
    fn identifier(&self) -> &str {
        "sort"
    }

    fn argument_name(&self) -> &str {
        "sort"
    }

    fn input_type_name(&self, type_name: &str) -> String {
        sort_fields_name(type_name)
    }

    fn leaf_node_type(&self, _scalar_type: &str) -> String {
        SORT_DIRECTION_TYPE.to_string()
    }

    fn is_leaf_node_type(&self, type_name: &str) -> bool {
        type_name == SORT_DIRECTION_TYPE
    }

    fn ensure_leaf_node_type(
        &self,
        _scalar_type: &str,
        schema: &mut Schema,
    ) -> Result<(), SchemaBuildError> {
        schema.add_enum(EnumType::new(SORT_DIRECTION_TYPE, &["ASC", "DESC"]))?;
        Ok(())
    }

    fn should_add_field(&self, model_type: &ModelType, field_name: &str) -> bool {
        match model_type.model.field_value_kind(field_name) {
            FieldValueKind::RelationList(_) => false,
            FieldValueKind::NotFound => false,
            _ => match model_type.model.get_field(field_name) {
                Some(field) => !TypeReference::parse(&field.typ)
                    .map(|reference| reference.is_list())
                    .unwrap_or(false),
                None => false,
            },
        }
    }

    fn resolver_function(&self) -> &str {
        "resolve_sort"
    }
}

/// Execution-time half of the plugin: turns a nested sort argument into an
/// ordered list of (property path, direction) pairs using the path mapping
/// the builder registered for the query.
pub fn resolve_sort(args: &Value, mapping: &PathMapping) -> Vec<(String, SortOrder)> {
    build_paths_from_args(args)
        .into_iter()
        .filter_map(|(input_path, direction)| {
            let property_path = mapping.get(&input_path)?.clone();
            let order = match direction.as_str()? {
                "ASC" => SortOrder::Ascending,
                "DESC" => SortOrder::Descending,
                _ => return None,
            };
            Some((property_path, order))
        })
        .collect()
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Filter plugin: `{Type}FilterFields` input types whose leaves are
//! per-scalar comparator types (`QueryFilter{Scalar}Comparator`).

use serde_json::Value;

use core_model::schema::Schema;
use core_model::types::{Field, Type};

use crate::context::PathMapping;
use crate::error::SchemaBuildError;
use crate::model::FieldValueKind;
use crate::model_type::ModelType;
use crate::naming::{comparator_name, filter_fields_name};
use crate::nested_input::{build_paths_from_args, NestedInputPlugin};

pub struct FilterPlugin;

impl NestedInputPlugin for FilterPlugin {
    fn identifier(&self) -> &str {
        "filter"
    }

    fn argument_name(&self) -> &str {
        "filter"
    }

    fn input_type_name(&self, type_name: &str) -> String {
        filter_fields_name(type_name)
    }

    fn leaf_node_type(&self, scalar_type: &str) -> String {
        comparator_name(scalar_type)
    }

    fn is_leaf_node_type(&self, type_name: &str) -> bool {
        type_name.starts_with("QueryFilter") && type_name.ends_with("Comparator")
    }

    fn ensure_leaf_node_type(
        &self,
        scalar_type: &str,
        schema: &mut Schema,
    ) -> Result<(), SchemaBuildError> {
        let name = comparator_name(scalar_type);
        if schema.has_type(&name) {
            return Ok(());
        }

        let mut comparator = Type::input(&name);
        comparator.add_field(Field::new("eq", scalar_type));
        comparator.add_field(Field::new("ne", scalar_type));
        comparator.add_field(Field::new("in", &format!("[{scalar_type}!]")));

        match scalar_type {
            "String" | "ID" => {
                comparator.add_field(Field::new("contains", scalar_type));
                comparator.add_field(Field::new("startsWith", scalar_type));
                comparator.add_field(Field::new("endsWith", scalar_type));
            }
            "Int" | "Float" => {
                comparator.add_field(Field::new("gt", scalar_type));
                comparator.add_field(Field::new("gte", scalar_type));
                comparator.add_field(Field::new("lt", scalar_type));
                comparator.add_field(Field::new("lte", scalar_type));
            }
            _ => {}
        }

        schema.add_type(comparator)?;
        Ok(())
    }

    fn should_add_field(&self, model_type: &ModelType, field_name: &str) -> bool {
        !matches!(
            model_type.model.field_value_kind(field_name),
            FieldValueKind::NotFound
        )
    }

    fn resolver_function(&self) -> &str {
        "resolve_filter"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub property_path: String,
    pub operator: String,
    pub value: Value,
}

/// Execution-time half of the plugin: a nested filter argument flattens
/// into conditions whose last path segment is the comparator operator and
/// whose prefix resolves through the query's path mapping.
pub fn resolve_filter(args: &Value, mapping: &PathMapping) -> Vec<FilterCondition> {
    build_paths_from_args(args)
        .into_iter()
        .filter_map(|(input_path, value)| {
            let (field_path, operator) = input_path.rsplit_once('.')?;
            let property_path = mapping.get(field_path)?.clone();
            Some(FilterCondition {
                property_path,
                operator: operator.to_string(),
                value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    #[multiplatform_test]
    fn string_comparator_carries_string_operators() {
        let mut schema = Schema::new("default");
        let plugin = FilterPlugin;
        plugin.ensure_leaf_node_type("String", &mut schema).unwrap();

        let comparator = schema.get_type("QueryFilterStringComparator").unwrap();
        assert!(comparator.is_input);
        for operator in ["eq", "ne", "in", "contains", "startsWith", "endsWith"] {
            assert!(comparator.get_field(operator).is_some(), "{operator}");
        }
        assert!(comparator.get_field("gt").is_none());
    }

    #[multiplatform_test]
    fn int_comparator_carries_range_operators() {
        let mut schema = Schema::new("default");
        let plugin = FilterPlugin;
        plugin.ensure_leaf_node_type("Int", &mut schema).unwrap();

        let comparator = schema.get_type("QueryFilterIntComparator").unwrap();
        for operator in ["eq", "ne", "in", "gt", "gte", "lt", "lte"] {
            assert!(comparator.get_field(operator).is_some(), "{operator}");
        }
        assert!(comparator.get_field("contains").is_none());
    }

    #[multiplatform_test]
    fn registering_a_comparator_twice_is_idempotent() {
        let mut schema = Schema::new("default");
        let plugin = FilterPlugin;
        plugin.ensure_leaf_node_type("String", &mut schema).unwrap();
        plugin.ensure_leaf_node_type("String", &mut schema).unwrap();
        assert!(schema.get_type("QueryFilterStringComparator").is_some());
    }

    #[multiplatform_test]
    fn filter_args_flatten_to_conditions() {
        let mut mapping = PathMapping::new();
        mapping.insert("title".to_string(), "Title".to_string());
        mapping.insert("parent.title".to_string(), "Parent.Title".to_string());

        let conditions = resolve_filter(
            &json!({ "title": { "contains": "news" }, "parent": { "title": { "eq": "Home" } } }),
            &mapping,
        );

        assert_eq!(
            conditions,
            vec![
                FilterCondition {
                    property_path: "Title".to_string(),
                    operator: "contains".to_string(),
                    value: json!("news"),
                },
                FilterCondition {
                    property_path: "Parent.Title".to_string(),
                    operator: "eq".to_string(),
                    value: json!("Home"),
                },
            ]
        );
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The nested-input engine behind the filter and sort plugins.
//!
//! Mirrors a model's relation graph as input types, bounded by
//! `max_nesting`. A relation back to a type already on the recursion path
//! becomes a self-referential field (the input type pointing to itself)
//! instead of recursing, so the builder terminates while the output type
//! graph legitimately cycles.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use core_model::schema::Schema;
use core_model::types::{Argument, Field, ResolverRef, Type};

use crate::context::{BuildContext, PathMapping};
use crate::error::SchemaBuildError;
use crate::model::FieldValueKind;
use crate::model_type::{ModelType, ModelTypes};
use crate::naming::short_class_name;

pub const INPUT_RESOLVER_MODULE: &str = "input_resolvers";

/// Per-field node of a (derived or explicit) input configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum InputFieldConfig {
    Excluded,
    Leaf,
    SelfReferential,
    SelfReferentialList,
    Nested(IndexMap<String, InputFieldConfig>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputFieldsConfig {
    All,
    Explicit(IndexMap<String, InputFieldConfig>),
}

impl InputFieldsConfig {
    /// Parses the `fields` entry of a plugin's settings: `"*"` or a nested
    /// map of `true` / `false` / sub-maps.
    pub fn from_settings(
        settings: &serde_json::Map<String, Value>,
        plugin_id: &str,
    ) -> Result<InputFieldsConfig, SchemaBuildError> {
        match settings.get("fields") {
            None => Ok(InputFieldsConfig::All),
            Some(Value::String(s)) if s == core_model::plugin::ALL => Ok(InputFieldsConfig::All),
            Some(Value::Object(map)) => {
                Ok(InputFieldsConfig::Explicit(parse_config_map(map, plugin_id)?))
            }
            Some(other) => Err(SchemaBuildError::configuration(
                plugin_id,
                format!("'fields' must be a map or '*', got {other}"),
            )),
        }
    }
}

fn parse_config_map(
    map: &serde_json::Map<String, Value>,
    plugin_id: &str,
) -> Result<IndexMap<String, InputFieldConfig>, SchemaBuildError> {
    map.iter()
        .map(|(name, value)| {
            let config = match value {
                Value::Bool(true) => InputFieldConfig::Leaf,
                Value::Bool(false) => InputFieldConfig::Excluded,
                Value::Object(nested) => {
                    InputFieldConfig::Nested(parse_config_map(nested, plugin_id)?)
                }
                other => {
                    return Err(SchemaBuildError::configuration(
                        &format!("{plugin_id}.fields.{name}"),
                        format!("expected true, false, or a map, got {other}"),
                    ));
                }
            };
            Ok((name.clone(), config))
        })
        .collect()
}

/// Plugin-specific behavior plugged into the shared engine.
pub trait NestedInputPlugin {
    fn identifier(&self) -> &str;

    /// Name of the query argument carrying the input (`filter`, `sort`).
    fn argument_name(&self) -> &str;

    /// Name of the input type generated for a model type.
    fn input_type_name(&self, type_name: &str) -> String;

    /// Terminal type a leaf field gets (`SortDirection`, a comparator).
    fn leaf_node_type(&self, scalar_type: &str) -> String;

    /// Whether a type name is one of this plugin's terminal types; path
    /// flattening stops there.
    fn is_leaf_node_type(&self, type_name: &str) -> bool;

    /// Registers the terminal type for a scalar into the schema.
    fn ensure_leaf_node_type(
        &self,
        scalar_type: &str,
        schema: &mut Schema,
    ) -> Result<(), SchemaBuildError>;

    /// Eligibility hook, e.g. sort excludes list-valued fields.
    fn should_add_field(&self, model_type: &ModelType, field_name: &str) -> bool;

    /// Storage property for a field; allows aliasing between the public
    /// field name and the underlying property.
    fn object_property(&self, model_type: &ModelType, field_name: &str) -> String {
        model_type.property_name(field_name)
    }

    /// Resolver middleware consuming the parsed argument at execution time.
    fn resolver_function(&self) -> &str;
}

pub struct NestedInputBuilder<'a> {
    plugin: &'a dyn NestedInputPlugin,
    model_types: &'a ModelTypes,
    max_nesting: usize,
}

impl<'a> NestedInputBuilder<'a> {
    pub fn new(
        plugin: &'a dyn NestedInputPlugin,
        model_types: &'a ModelTypes,
        max_nesting: usize,
    ) -> Self {
        Self {
            plugin,
            model_types,
            max_nesting,
        }
    }

    /// Applies the plugin to a model query field: builds the input type
    /// graph, registers the flattened path mapping, and attaches the
    /// argument plus resolver middleware.
    pub fn apply_to_query(
        &self,
        query_field: &mut Field,
        root_type_name: &str,
        config: &InputFieldsConfig,
        schema: &mut Schema,
        context: &mut BuildContext,
    ) -> Result<(), SchemaBuildError> {
        let root = self.model_type(root_type_name)?;

        let config_tree = match config {
            InputFieldsConfig::All => {
                self.build_all_fields_config(root, 0, &mut vec![root_type_name.to_string()])
            }
            // explicit config fully replaces the auto-derived tree
            InputFieldsConfig::Explicit(tree) => tree.clone(),
        };

        let input_type_name = self.add_input_types_to_schema(root, &config_tree, schema)?;

        let mut mapping = PathMapping::new();
        self.build_paths_from_input_type(root, &input_type_name, schema, 0, &[], &[], &mut mapping);
        debug!(
            plugin = self.plugin.identifier(),
            query = query_field.name,
            paths = mapping.len(),
            "built nested input paths"
        );
        context.register_path_mapping(&query_field.name, self.plugin.identifier(), mapping);

        query_field.add_arg(Argument::new(self.plugin.argument_name(), &input_type_name));
        query_field.resolver.middleware.push(ResolverRef::named(
            INPUT_RESOLVER_MODULE,
            self.plugin.resolver_function(),
        ));
        query_field.plugins.enable(self.plugin.identifier());

        Ok(())
    }

    fn model_type(&self, type_name: &str) -> Result<&ModelType, SchemaBuildError> {
        self.model_types.get(type_name).ok_or_else(|| {
            SchemaBuildError::configuration(
                type_name,
                format!(
                    "no model type registered for '{}' plugin input",
                    self.plugin.identifier()
                ),
            )
        })
    }

    /// Auto-derives the config tree for a model. `ancestors` is the chain
    /// of type names on the current recursion path, root included.
    pub fn build_all_fields_config(
        &self,
        model_type: &ModelType,
        depth: usize,
        ancestors: &mut Vec<String>,
    ) -> IndexMap<String, InputFieldConfig> {
        let mut config = IndexMap::new();

        for field_name in model_type.model.get_all_fields() {
            if !self.plugin.should_add_field(model_type, &field_name) {
                continue;
            }
            if model_type
                .model
                .get_blacklisted_fields()
                .contains(&field_name)
            {
                continue;
            }

            match model_type.model.field_value_kind(&field_name) {
                FieldValueKind::Scalar(_) | FieldValueKind::Enum { .. } => {
                    config.insert(field_name, InputFieldConfig::Leaf);
                }
                FieldValueKind::SingleRelation(class) | FieldValueKind::RelationList(class) => {
                    let related_type_name = short_class_name(&class);
                    let is_list = matches!(
                        model_type.model.field_value_kind(&field_name),
                        FieldValueKind::RelationList(_)
                    );

                    if ancestors.contains(&related_type_name) {
                        let sentinel = if is_list {
                            InputFieldConfig::SelfReferentialList
                        } else {
                            InputFieldConfig::SelfReferential
                        };
                        config.insert(field_name, sentinel);
                    } else if depth + 1 <= self.max_nesting {
                        if let Some(related) = self.model_types.get(&related_type_name) {
                            ancestors.push(related_type_name);
                            let subtree =
                                self.build_all_fields_config(related, depth + 1, ancestors);
                            ancestors.pop();
                            if !subtree.is_empty() {
                                config.insert(field_name, InputFieldConfig::Nested(subtree));
                            }
                        }
                    }
                    // beyond max_nesting: dropped, not an error
                }
                FieldValueKind::NotFound => {}
            }
        }

        config
    }

    /// Registers one input type per nesting level and returns the root
    /// input type name.
    pub fn add_input_types_to_schema(
        &self,
        model_type: &ModelType,
        config: &IndexMap<String, InputFieldConfig>,
        schema: &mut Schema,
    ) -> Result<String, SchemaBuildError> {
        let input_type_name = self.plugin.input_type_name(&model_type.type_name);
        let mut input_type = Type::input(&input_type_name);

        for (field_name, field_config) in config {
            let kind = model_type.model.field_value_kind(field_name);

            match field_config {
                InputFieldConfig::Excluded => {}
                InputFieldConfig::Leaf => {
                    let scalar_type = match kind {
                        FieldValueKind::Scalar(scalar) => scalar,
                        FieldValueKind::Enum { type_name, .. } => type_name,
                        FieldValueKind::SingleRelation(class)
                        | FieldValueKind::RelationList(class) => {
                            return Err(SchemaBuildError::LeafDeclaredForRelation {
                                type_name: model_type.type_name.clone(),
                                field: field_name.clone(),
                                model: class,
                            });
                        }
                        FieldValueKind::NotFound => {
                            return Err(SchemaBuildError::configuration(
                                &format!("{}.{field_name}", model_type.type_name),
                                "model has no such field",
                            ));
                        }
                    };
                    self.plugin.ensure_leaf_node_type(&scalar_type, schema)?;
                    input_type.add_field(Field::new(
                        field_name,
                        &self.plugin.leaf_node_type(&scalar_type),
                    ));
                }
                InputFieldConfig::SelfReferential => {
                    input_type.add_field(Field::new(field_name, &input_type_name));
                }
                InputFieldConfig::SelfReferentialList => {
                    input_type.add_field(Field::new(field_name, &format!("[{input_type_name}]")));
                }
                InputFieldConfig::Nested(subtree) => {
                    let related_type_name = match kind {
                        FieldValueKind::SingleRelation(class)
                        | FieldValueKind::RelationList(class) => short_class_name(&class),
                        _ => {
                            return Err(SchemaBuildError::NestedDeclaredForScalar {
                                type_name: model_type.type_name.clone(),
                                field: field_name.clone(),
                            });
                        }
                    };
                    let related = self.model_type(&related_type_name)?;
                    let nested_name = self.add_input_types_to_schema(related, subtree, schema)?;
                    input_type.add_field(Field::new(field_name, &nested_name));
                }
            }
        }

        schema.add_type(input_type)?;
        Ok(input_type_name)
    }

    /// Flattens the input type graph into dotted-input-path ->
    /// dotted-property-path entries. Recursion stops at a leaf node type;
    /// beyond `max_nesting` a nested field is treated as a terminal path.
    #[allow(clippy::too_many_arguments)]
    pub fn build_paths_from_input_type(
        &self,
        model_type: &ModelType,
        input_type_name: &str,
        schema: &Schema,
        depth: usize,
        input_prefix: &[String],
        property_prefix: &[String],
        mapping: &mut PathMapping,
    ) {
        let Some(input_type) = schema.get_type(input_type_name) else {
            return;
        };

        for field in input_type.fields.values().cloned().collect::<Vec<_>>() {
            let property = self.plugin.object_property(model_type, &field.name);
            let input_path = [input_prefix, &[field.name.clone()]].concat();
            let property_path = [property_prefix, &[property]].concat();

            let field_type_name = field.typ.trim_start_matches('[').trim_end_matches([']', '!']);

            if self.plugin.is_leaf_node_type(field_type_name) {
                mapping.insert(input_path.join("."), property_path.join("."));
                continue;
            }

            let nested = schema
                .get_type(field_type_name)
                .filter(|t| t.is_input)
                .is_some();

            if nested && depth + 1 <= self.max_nesting {
                let related_model = model_type
                    .related_model_of(&field.name)
                    .map(|class| short_class_name(&class));
                let related = related_model
                    .as_deref()
                    .and_then(|name| self.model_types.get(name))
                    .unwrap_or(model_type);
                self.build_paths_from_input_type(
                    related,
                    field_type_name,
                    schema,
                    depth + 1,
                    &input_path,
                    &property_path,
                    mapping,
                );
            } else {
                // terminal regardless of nominal nesting
                mapping.insert(input_path.join("."), property_path.join("."));
            }
        }
    }
}

/// Runtime-side counterpart of the path mapping: flattens a nested
/// argument map into dotted-path -> leaf-value pairs.
pub fn build_paths_from_args(args: &Value) -> IndexMap<String, Value> {
    let mut paths = IndexMap::new();
    flatten_args(args, &mut vec![], &mut paths);
    paths
}

fn flatten_args(value: &Value, prefix: &mut Vec<String>, paths: &mut IndexMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                prefix.push(key.clone());
                flatten_args(nested, prefix, paths);
                prefix.pop();
            }
        }
        leaf => {
            paths.insert(prefix.join("."), leaf.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    #[multiplatform_test]
    fn flattens_nested_args() {
        let paths = build_paths_from_args(&json!({
            "parent": { "title": "DESC", "parent": { "id": "ASC" } },
            "title": "ASC"
        }));

        assert_eq!(paths["parent.title"], json!("DESC"));
        assert_eq!(paths["parent.parent.id"], json!("ASC"));
        assert_eq!(paths["title"], json!("ASC"));
        assert_eq!(paths.len(), 3);
    }

    #[multiplatform_test]
    fn fields_config_parsing() {
        let settings = match json!({ "fields": { "title": true, "author": { "name": true }, "secret": false } })
        {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let config = InputFieldsConfig::from_settings(&settings, "sort").unwrap();
        match config {
            InputFieldsConfig::Explicit(tree) => {
                assert_eq!(tree["title"], InputFieldConfig::Leaf);
                assert_eq!(tree["secret"], InputFieldConfig::Excluded);
                assert!(matches!(tree["author"], InputFieldConfig::Nested(_)));
            }
            _ => panic!("expected explicit config"),
        }

        let wildcard = match json!({ "fields": "*" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(
            InputFieldsConfig::from_settings(&wildcard, "sort").unwrap(),
            InputFieldsConfig::All
        );
    }
}

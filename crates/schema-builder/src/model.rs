// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Capability interfaces over the external object-relational layer.
//!
//! The builder never performs reflection: class hierarchies come from a
//! `ClassHierarchyProvider` registry built from static metadata, and field
//! access goes through the closed `FieldValueKind` variant set.

use std::sync::Arc;

use indexmap::IndexMap;

use core_model::types::Field;

use crate::naming::short_class_name;

/// What a model field resolves to, as reported by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValueKind {
    /// Scalar leaf with its GraphQL type name (`String`, `Int`, ...).
    Scalar(String),
    /// Enum-valued field; the builder synthesizes an enum type for it.
    Enum {
        type_name: String,
        values: Vec<String>,
    },
    /// Reference to a single record of the named class.
    SingleRelation(String),
    /// Reference to a list of records of the named class.
    RelationList(String),
    NotFound,
}

/// Capability interface consumed from the excluded ORM layer.
pub trait Model {
    fn get_source_class(&self) -> &str;

    fn has_field(&self, name: &str) -> bool;

    /// Builds the schema-side field, or `None` if the model has no such
    /// field.
    fn get_field(&self, name: &str) -> Option<Field>;

    fn get_all_fields(&self) -> Vec<String>;

    /// Fields included when the configuration does not name any, e.g. `id`.
    fn get_default_fields(&self) -> IndexMap<String, String>;

    fn get_blacklisted_fields(&self) -> Vec<String>;

    fn field_value_kind(&self, name: &str) -> FieldValueKind;

    /// Storage property backing a field, when it differs from the field
    /// name.
    fn get_property_name(&self, field_name: &str) -> String {
        field_name.to_string()
    }
}

/// Ancestry metadata for the class hierarchy, registered once at startup.
pub trait ClassHierarchyProvider {
    /// Ancestors of `class`, nearest first, excluding `class` itself.
    fn ancestors_of(&self, class: &str) -> Vec<String>;

    /// All transitive subclasses, canonically sorted by class name.
    fn descendants_of(&self, class: &str) -> Vec<String>;

    fn parent_of(&self, class: &str) -> Option<String>;
}

/// `ClassHierarchyProvider` over a parent-pointer map.
#[derive(Debug, Clone, Default)]
pub struct StaticHierarchy {
    parents: IndexMap<String, Option<String>>,
}

impl StaticHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: &str, parent: Option<&str>) {
        self.parents
            .insert(class.to_string(), parent.map(str::to_string));
    }
}

impl ClassHierarchyProvider for StaticHierarchy {
    fn ancestors_of(&self, class: &str) -> Vec<String> {
        let mut ancestors = vec![];
        let mut current = class.to_string();
        while let Some(Some(parent)) = self.parents.get(&current) {
            ancestors.push(parent.clone());
            current = parent.clone();
        }
        ancestors
    }

    fn descendants_of(&self, class: &str) -> Vec<String> {
        let mut descendants: Vec<String> = self
            .parents
            .keys()
            .filter(|candidate| {
                self.ancestors_of(candidate)
                    .iter()
                    .any(|ancestor| ancestor == class)
            })
            .cloned()
            .collect();
        descendants.sort();
        descendants
    }

    fn parent_of(&self, class: &str) -> Option<String> {
        self.parents.get(class).cloned().flatten()
    }
}

/// Class-keyed registry of the models exposed through the schema.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: IndexMap<String, Arc<dyn Model>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: Arc<dyn Model>) {
        self.models
            .insert(model.get_source_class().to_string(), model);
    }

    pub fn get(&self, class: &str) -> Option<&Arc<dyn Model>> {
        self.models.get(class)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.models.contains_key(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &String> {
        self.models.keys()
    }

    /// Exposed type name for a class: its short name.
    pub fn type_name_of(&self, class: &str) -> String {
        short_class_name(class)
    }

    pub fn by_type_name(&self, type_name: &str) -> Option<&Arc<dyn Model>> {
        self.models
            .iter()
            .find(|(class, _)| short_class_name(class) == type_name)
            .map(|(_, model)| model)
    }
}

/// A `Model` over static field metadata. The production system adapts the
/// ORM behind the same interface; this implementation also backs tests.
#[derive(Debug, Clone, Default)]
pub struct StaticModel {
    source_class: String,
    fields: IndexMap<String, FieldValueKind>,
    property_names: IndexMap<String, String>,
    default_fields: IndexMap<String, String>,
    blacklist: Vec<String>,
}

impl StaticModel {
    pub fn new(source_class: &str) -> Self {
        let mut default_fields = IndexMap::new();
        default_fields.insert("id".to_string(), "ID!".to_string());
        Self {
            source_class: source_class.to_string(),
            default_fields,
            ..Self::default()
        }
    }

    pub fn with_scalar(mut self, name: &str, type_name: &str) -> Self {
        self.fields
            .insert(name.to_string(), FieldValueKind::Scalar(type_name.to_string()));
        self
    }

    pub fn with_enum(mut self, name: &str, type_name: &str, values: &[&str]) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldValueKind::Enum {
                type_name: type_name.to_string(),
                values: values.iter().map(|v| v.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_has_one(mut self, name: &str, class: &str) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldValueKind::SingleRelation(class.to_string()),
        );
        self
    }

    pub fn with_has_many(mut self, name: &str, class: &str) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldValueKind::RelationList(class.to_string()),
        );
        self
    }

    pub fn with_property_name(mut self, field: &str, property: &str) -> Self {
        self.property_names
            .insert(field.to_string(), property.to_string());
        self
    }

    pub fn with_blacklisted(mut self, name: &str) -> Self {
        self.blacklist.push(name.to_string());
        self
    }
}

impl Model for StaticModel {
    fn get_source_class(&self) -> &str {
        &self.source_class
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.default_fields.contains_key(name)
    }

    fn get_field(&self, name: &str) -> Option<Field> {
        if let Some(typ) = self.default_fields.get(name) {
            return Some(Field::new(name, typ));
        }
        match self.fields.get(name)? {
            FieldValueKind::Scalar(type_name) => Some(Field::new(name, type_name)),
            FieldValueKind::Enum { type_name, .. } => Some(Field::new(name, type_name)),
            FieldValueKind::SingleRelation(class) => {
                let type_name = short_class_name(class);
                Some(Field::new(name, &type_name).with_model(&type_name))
            }
            FieldValueKind::RelationList(class) => {
                let type_name = short_class_name(class);
                Some(Field::new(name, &format!("[{type_name}!]!")).with_model(&type_name))
            }
            FieldValueKind::NotFound => None,
        }
    }

    fn get_all_fields(&self) -> Vec<String> {
        self.default_fields
            .keys()
            .chain(self.fields.keys())
            .cloned()
            .collect()
    }

    fn get_default_fields(&self) -> IndexMap<String, String> {
        self.default_fields.clone()
    }

    fn get_blacklisted_fields(&self) -> Vec<String> {
        self.blacklist.clone()
    }

    fn field_value_kind(&self, name: &str) -> FieldValueKind {
        if let Some(typ) = self.default_fields.get(name) {
            let scalar = typ.trim_end_matches('!').to_string();
            return FieldValueKind::Scalar(scalar);
        }
        self.fields
            .get(name)
            .cloned()
            .unwrap_or(FieldValueKind::NotFound)
    }

    fn get_property_name(&self, field_name: &str) -> String {
        self.property_names
            .get(field_name)
            .cloned()
            .unwrap_or_else(|| field_name.to_string())
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Declarative build configuration, consumed as nested maps.
//!
//! Every config map position accepts either a proper map or the `"*"`
//! wildcard sentinel; a plain indexed list is rejected up front.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use core_model::plugin::{ALL, PluginConfig};

use crate::error::SchemaBuildError;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SchemaConfig {
    #[serde(default = "default_schema_name")]
    pub name: String,

    /// Root of the class hierarchy exposed through this schema.
    pub base_class: Option<String>,

    /// Fields shared by every model type (e.g. `id`), exposed through one
    /// global base interface.
    #[serde(default)]
    pub base_fields: IndexMap<String, String>,

    #[serde(default)]
    pub models: IndexMap<String, ModelConfig>,

    /// Plugins applied to every model query unless overridden per model.
    #[serde(default)]
    pub default_plugins: PluginConfig,

    #[serde(default = "default_max_nesting")]
    pub max_nesting: usize,
}

fn default_schema_name() -> String {
    "default".to_string()
}

fn default_max_nesting() -> usize {
    1
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModelConfig {
    #[serde(default)]
    pub fields: WildcardMap<FieldSetting>,

    /// Omitting the section means every registered operation, not none.
    #[serde(default = "WildcardMap::all")]
    pub operations: WildcardMap<OperationSetting>,

    #[serde(default)]
    pub plugins: PluginConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            fields: WildcardMap::default(),
            operations: WildcardMap::all(),
            plugins: PluginConfig::default(),
        }
    }
}

/// A config map position that is either the `"*"` wildcard or an explicit
/// map.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum WildcardMap<T> {
    Wildcard(String),
    Entries(IndexMap<String, T>),
}

impl<T> Default for WildcardMap<T> {
    fn default() -> Self {
        WildcardMap::Entries(IndexMap::new())
    }
}

impl<T> WildcardMap<T> {
    pub fn all() -> Self {
        WildcardMap::Wildcard(ALL.to_string())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, WildcardMap::Wildcard(s) if s == ALL)
    }

    pub fn entries(&self) -> Option<&IndexMap<String, T>> {
        match self {
            WildcardMap::Entries(map) => Some(map),
            WildcardMap::Wildcard(_) => None,
        }
    }

    fn validate(&self, name: &str) -> Result<(), SchemaBuildError> {
        match self {
            WildcardMap::Wildcard(s) if s == ALL => Ok(()),
            WildcardMap::Wildcard(other) => Err(SchemaBuildError::configuration(
                name,
                format!("expected a map or '*', got '{other}'"),
            )),
            WildcardMap::Entries(_) => Ok(()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum FieldSetting {
    Include(bool),
    Custom(FieldCustomization),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct FieldCustomization {
    /// Underlying storage property, when it differs from the field name.
    pub property: Option<String>,

    /// Explicit type expression overriding the model-derived one.
    #[serde(rename = "type")]
    pub typ: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum OperationSetting {
    Include(bool),
    Custom(OperationCustomization),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OperationCustomization {
    /// Overrides the formatter-derived operation name.
    pub name: Option<String>,

    #[serde(default)]
    pub plugins: PluginConfig,
}

impl OperationSetting {
    pub fn is_included(&self) -> bool {
        !matches!(self, OperationSetting::Include(false))
    }

    pub fn customization(&self) -> Option<&OperationCustomization> {
        match self {
            OperationSetting::Custom(custom) => Some(custom),
            OperationSetting::Include(_) => None,
        }
    }
}

impl SchemaConfig {
    pub fn from_json(value: Value) -> Result<SchemaConfig, SchemaBuildError> {
        if let Some(models) = value.get("models") {
            assert_valid_config(models, "models")?;
            if let Some(models) = models.as_object() {
                for (class, model) in models {
                    for key in ["fields", "operations", "plugins"] {
                        if let Some(section) = model.get(key) {
                            assert_valid_config(section, &format!("{class}.{key}"))?;
                        }
                    }
                }
            }
        }

        let config: SchemaConfig = serde_json::from_value(value)
            .map_err(|e| SchemaBuildError::configuration("schema", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SchemaBuildError> {
        for (class, model) in self.models.iter() {
            model.fields.validate(&format!("{class}.fields"))?;
            model.operations.validate(&format!("{class}.operations"))?;
        }
        Ok(())
    }

    pub fn model(&self, class: &str) -> Option<&ModelConfig> {
        self.models.get(class)
    }
}

/// A config map must be a proper associative map or the literal `"*"`; a
/// plain indexed list is invalid.
pub fn assert_valid_config(value: &Value, name: &str) -> Result<(), SchemaBuildError> {
    match value {
        Value::Object(_) => Ok(()),
        Value::String(s) if s == ALL => Ok(()),
        Value::Array(_) => Err(SchemaBuildError::configuration(
            name,
            "expected an associative map or '*', got an indexed list",
        )),
        other => Err(SchemaBuildError::configuration(
            name,
            format!("expected an associative map or '*', got {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    #[multiplatform_test]
    fn parses_wildcards_and_maps() {
        let config = SchemaConfig::from_json(json!({
            "models": {
                "App\\Page": {
                    "fields": "*",
                    "operations": { "read": true, "delete": false },
                    "plugins": { "paginate": { "limit": 20 } }
                }
            }
        }))
        .unwrap();

        let model = config.model("App\\Page").unwrap();
        assert!(model.fields.is_all());
        let operations = model.operations.entries().unwrap();
        assert!(operations["read"].is_included());
        assert!(!operations["delete"].is_included());
        assert!(model.plugins.has("paginate"));
    }

    #[multiplatform_test]
    fn omitted_operations_mean_all() {
        let config = SchemaConfig::from_json(json!({
            "models": { "App\\Page": { "fields": "*" } }
        }))
        .unwrap();

        assert!(config.model("App\\Page").unwrap().operations.is_all());
    }

    #[multiplatform_test]
    fn rejects_indexed_lists() {
        let err = SchemaConfig::from_json(json!({
            "models": {
                "App\\Page": { "fields": ["title", "content"] }
            }
        }))
        .unwrap_err();

        assert!(matches!(err, SchemaBuildError::Configuration { name, .. }
            if name == "App\\Page.fields"));
    }

    #[multiplatform_test]
    fn rejects_non_wildcard_strings() {
        let err = SchemaConfig::from_json(json!({
            "models": {
                "App\\Page": { "fields": "all" }
            }
        }))
        .unwrap_err();

        assert!(matches!(err, SchemaBuildError::Configuration { .. }));
    }

    #[multiplatform_test]
    fn field_customization() {
        let config = SchemaConfig::from_json(json!({
            "models": {
                "App\\Page": {
                    "fields": {
                        "title": true,
                        "content": { "property": "Content", "type": "String!" }
                    }
                }
            }
        }))
        .unwrap();

        let fields = config.model("App\\Page").unwrap().fields.entries().unwrap();
        assert!(matches!(fields["title"], FieldSetting::Include(true)));
        match &fields["content"] {
            FieldSetting::Custom(custom) => {
                assert_eq!(custom.property.as_deref(), Some("Content"));
                assert_eq!(custom.typ.as_deref(), Some("String!"));
            }
            _ => panic!("expected customization"),
        }
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The schema-side wrapper binding a `Model` to its configuration: field
//! derivation, property aliasing, operation selection, and the extra types
//! (enums) a model drags in.

use std::sync::Arc;

use indexmap::IndexMap;

use core_model::types::{EnumType, Type};

use crate::config::{FieldSetting, ModelConfig, OperationSetting};
use crate::error::SchemaBuildError;
use crate::model::{FieldValueKind, Model};

/// Model types keyed by exposed type name.
pub type ModelTypes = IndexMap<String, ModelType>;

#[derive(Clone)]
pub struct ModelType {
    pub type_name: String,
    pub model: Arc<dyn Model>,
    pub config: ModelConfig,
    property_aliases: IndexMap<String, String>,
}

impl ModelType {
    pub fn new(
        type_name: &str,
        model: Arc<dyn Model>,
        config: ModelConfig,
    ) -> Result<ModelType, SchemaBuildError> {
        let mut property_aliases = IndexMap::new();
        if let Some(entries) = config.fields.entries() {
            for (field_name, setting) in entries {
                if let FieldSetting::Custom(custom) = setting {
                    if let Some(property) = &custom.property {
                        property_aliases.insert(field_name.clone(), property.clone());
                    }
                }
            }
        }

        Ok(ModelType {
            type_name: type_name.to_string(),
            model,
            config,
            property_aliases,
        })
    }

    /// Storage property backing a field: config alias first, then the
    /// model's own aliasing.
    pub fn property_name(&self, field_name: &str) -> String {
        self.property_aliases
            .get(field_name)
            .cloned()
            .unwrap_or_else(|| self.model.get_property_name(field_name))
    }

    /// Derives the concrete object type and any enum types synthesized for
    /// enum-valued fields.
    pub fn build_type(&self) -> Result<(Type, Vec<EnumType>), SchemaBuildError> {
        let mut typ = Type::new(&self.type_name);
        let mut extra_enums = vec![];
        let blacklist = self.model.get_blacklisted_fields();

        for (field_name, customization) in self.included_fields()? {
            if blacklist.contains(&field_name) {
                if self.config.fields.is_all() {
                    // auto-derived, silently skipped
                    continue;
                }
                return Err(SchemaBuildError::configuration(
                    &format!("{}.{field_name}", self.type_name),
                    "field is blacklisted on the model",
                ));
            }

            let mut field = self.model.get_field(&field_name).ok_or_else(|| {
                SchemaBuildError::configuration(
                    &format!("{}.{field_name}", self.type_name),
                    format!(
                        "model '{}' has no such field",
                        self.model.get_source_class()
                    ),
                )
            })?;

            if let Some(typ_override) = customization.and_then(|c| c.typ) {
                field.typ = typ_override;
            }

            if let FieldValueKind::Enum { type_name, values } =
                self.model.field_value_kind(&field_name)
            {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                extra_enums.push(EnumType::new(&type_name, &values));
            }

            typ.add_field(field);
        }

        typ.plugins = self.config.plugins.clone();

        Ok((typ, extra_enums))
    }

    /// Field names selected by the configuration, with any customization.
    fn included_fields(
        &self,
    ) -> Result<Vec<(String, Option<crate::config::FieldCustomization>)>, SchemaBuildError> {
        if self.config.fields.is_all() {
            return Ok(self
                .model
                .get_all_fields()
                .into_iter()
                .map(|name| (name, None))
                .collect());
        }

        let entries = self.config.fields.entries().ok_or_else(|| {
            SchemaBuildError::configuration(&self.type_name, "invalid fields configuration")
        })?;

        let mut selected: IndexMap<String, Option<crate::config::FieldCustomization>> = self
            .model
            .get_default_fields()
            .keys()
            .map(|name| (name.clone(), None))
            .collect();

        for (name, setting) in entries {
            match setting {
                FieldSetting::Include(true) => {
                    selected.insert(name.clone(), None);
                }
                FieldSetting::Include(false) => {
                    selected.shift_remove(name);
                }
                FieldSetting::Custom(custom) => {
                    selected.insert(name.clone(), Some(custom.clone()));
                }
            }
        }

        Ok(selected.into_iter().collect())
    }

    /// Operation identifiers enabled for this model, against the full list
    /// of registered creators.
    pub fn operations<'a>(
        &'a self,
        registered: &'a [String],
    ) -> Vec<(String, Option<&'a OperationSetting>)> {
        if self.config.operations.is_all() {
            return registered.iter().map(|id| (id.clone(), None)).collect();
        }

        match self.config.operations.entries() {
            Some(entries) => entries
                .iter()
                .filter(|(_, setting)| setting.is_included())
                .map(|(id, setting)| (id.clone(), Some(setting)))
                .collect(),
            None => vec![],
        }
    }

    /// Field returning another model, if any, by name.
    pub fn related_model_of(&self, field_name: &str) -> Option<String> {
        match self.model.field_value_kind(field_name) {
            FieldValueKind::SingleRelation(class) | FieldValueKind::RelationList(class) => {
                Some(class)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use crate::model::StaticModel;
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    fn page_model() -> Arc<dyn Model> {
        Arc::new(
            StaticModel::new("App\\Page")
                .with_scalar("title", "String")
                .with_enum("status", "PageStatus", &["DRAFT", "PUBLISHED"])
                .with_scalar("secret", "String")
                .with_blacklisted("secret"),
        )
    }

    fn model_config(value: serde_json::Value) -> ModelConfig {
        let config = SchemaConfig::from_json(json!({ "models": { "App\\Page": value } })).unwrap();
        config.model("App\\Page").unwrap().clone()
    }

    #[multiplatform_test]
    fn wildcard_fields_skip_blacklist() {
        let model_type =
            ModelType::new("Page", page_model(), model_config(json!({ "fields": "*" }))).unwrap();
        let (typ, enums) = model_type.build_type().unwrap();

        assert!(typ.get_field("id").is_some());
        assert!(typ.get_field("title").is_some());
        assert!(typ.get_field("secret").is_none());
        assert_eq!(enums.len(), 1);
        assert_eq!(enums[0].name, "PageStatus");
    }

    #[multiplatform_test]
    fn explicit_blacklisted_field_is_an_error() {
        let model_type = ModelType::new(
            "Page",
            page_model(),
            model_config(json!({ "fields": { "secret": true } })),
        )
        .unwrap();
        assert!(model_type.build_type().is_err());
    }

    #[multiplatform_test]
    fn unknown_field_is_an_error() {
        let model_type = ModelType::new(
            "Page",
            page_model(),
            model_config(json!({ "fields": { "nope": true } })),
        )
        .unwrap();
        assert!(model_type.build_type().is_err());
    }

    #[multiplatform_test]
    fn default_fields_are_kept_unless_excluded() {
        let model_type = ModelType::new(
            "Page",
            page_model(),
            model_config(json!({ "fields": { "title": true } })),
        )
        .unwrap();
        let (typ, _) = model_type.build_type().unwrap();
        assert!(typ.get_field("id").is_some());

        let model_type = ModelType::new(
            "Page",
            page_model(),
            model_config(json!({ "fields": { "title": true, "id": false } })),
        )
        .unwrap();
        let (typ, _) = model_type.build_type().unwrap();
        assert!(typ.get_field("id").is_none());
    }

    #[multiplatform_test]
    fn property_alias_resolution() {
        let model_type = ModelType::new(
            "Page",
            page_model(),
            model_config(json!({ "fields": { "title": { "property": "Title" } } })),
        )
        .unwrap();
        assert_eq!(model_type.property_name("title"), "Title");
        assert_eq!(model_type.property_name("id"), "id");
    }
}

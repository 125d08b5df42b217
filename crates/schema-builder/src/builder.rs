// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The build pipeline: model types, operations, inheritance interfaces and
//! unions, then per-query plugins, then validation.
//!
//! The whole build is synchronous and fail-fast. All intermediate state
//! lives in a per-invocation `BuildContext`; two consecutive builds in one
//! process do not observe each other.

use serde_json::Value;
use tracing::{debug, info};

use core_model::schema::Schema;
use core_model::type_reference::TypeReference;
use core_model::types::ResolverRef;

use crate::config::SchemaConfig;
use crate::context::BuildContext;
use crate::error::SchemaBuildError;
use crate::filter_plugin::FilterPlugin;
use crate::interface_builder::InterfaceBuilder;
use crate::model::{ClassHierarchyProvider, ModelRegistry};
use crate::model_type::{ModelType, ModelTypes};
use crate::naming::short_class_name;
use crate::nested_input::{InputFieldsConfig, NestedInputBuilder};
use crate::operations::{default_creators, OperationCreator, OperationKind};
use crate::pagination::{PaginationConfig, PaginationPlugin};
use crate::sort_plugin::SortPlugin;
use crate::union_builder::InheritanceUnionBuilder;

pub const PERMISSION_RESOLVER_MODULE: &str = "permission_resolvers";

pub struct SchemaBuilder {
    creators: Vec<Box<dyn OperationCreator>>,
    pagination: PaginationConfig,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            creators: default_creators(),
            pagination: PaginationConfig::default(),
        }
    }

    pub fn with_pagination(mut self, config: PaginationConfig) -> Self {
        self.pagination = config;
        self
    }

    pub fn with_creator(mut self, creator: Box<dyn OperationCreator>) -> Self {
        self.creators.push(creator);
        self
    }

    pub fn build(
        &self,
        config: &SchemaConfig,
        registry: &ModelRegistry,
        hierarchy: &dyn ClassHierarchyProvider,
    ) -> Result<Schema, SchemaBuildError> {
        self.build_with_context(config, registry, hierarchy)
            .map(|(schema, _)| schema)
    }

    /// Like `build`, but also returns the build context; callers that wire
    /// up resolver middleware need the path mappings collected in it, and
    /// the reachable-type set for concrete types that queries no longer
    /// name directly after an interface or union rewrite.
    pub fn build_with_context(
        &self,
        config: &SchemaConfig,
        registry: &ModelRegistry,
        hierarchy: &dyn ClassHierarchyProvider,
    ) -> Result<(Schema, BuildContext), SchemaBuildError> {
        let mut schema = Schema::new(&config.name);
        let mut context = BuildContext::new();

        let model_types = self.populate_model_types(config, registry, &mut schema)?;
        self.populate_operations(&model_types, &mut schema)?;
        self.apply_inheritance(config, &model_types, hierarchy, &mut schema, &mut context)?;
        self.apply_plugins(config, &model_types, &mut schema, &mut context)?;

        schema.validate()?;
        info!(
            name = %schema.name,
            types = schema.types().count(),
            queries = schema.queries().count(),
            "schema build complete"
        );
        Ok((schema, context))
    }

    fn populate_model_types(
        &self,
        config: &SchemaConfig,
        registry: &ModelRegistry,
        schema: &mut Schema,
    ) -> Result<ModelTypes, SchemaBuildError> {
        let mut model_types = ModelTypes::new();

        for (class, model_config) in config.models.iter() {
            let model = registry.get(class).ok_or_else(|| {
                SchemaBuildError::configuration(class, "no model registered for this class")
            })?;
            let type_name = registry.type_name_of(class);
            debug!(class, type_name, "deriving model type");

            let model_type = ModelType::new(&type_name, model.clone(), model_config.clone())?;
            let (typ, extra_enums) = model_type.build_type()?;
            schema.add_type(typ)?;
            for enum_type in extra_enums {
                schema.add_enum(enum_type)?;
            }
            model_types.insert(type_name, model_type);
        }

        Ok(model_types)
    }

    fn populate_operations(
        &self,
        model_types: &ModelTypes,
        schema: &mut Schema,
    ) -> Result<(), SchemaBuildError> {
        let registered: Vec<String> = self
            .creators
            .iter()
            .map(|c| c.identifier().to_string())
            .collect();

        for model_type in model_types.values() {
            for (id, setting) in model_type.operations(&registered) {
                let creator = self
                    .creators
                    .iter()
                    .find(|c| c.identifier() == id)
                    .ok_or_else(|| {
                        SchemaBuildError::configuration(
                            &model_type.type_name,
                            format!("unknown operation '{id}'"),
                        )
                    })?;

                let customization = setting.and_then(|s| s.customization());
                let operation = creator.create_operation(model_type, customization)?;
                for input_type in operation.input_types {
                    schema.add_type(input_type)?;
                }
                match operation.kind {
                    OperationKind::Query => schema.add_query(operation.field),
                    OperationKind::Mutation => schema.add_mutation(operation.field),
                }
            }
        }

        Ok(())
    }

    fn apply_inheritance(
        &self,
        config: &SchemaConfig,
        model_types: &ModelTypes,
        hierarchy: &dyn ClassHierarchyProvider,
        schema: &mut Schema,
        context: &mut BuildContext,
    ) -> Result<(), SchemaBuildError> {
        let Some(base_class) = config.base_class.as_deref() else {
            return Ok(());
        };

        let interface_builder = InterfaceBuilder::new(model_types, hierarchy, base_class);
        let union_builder = InheritanceUnionBuilder::new(model_types, hierarchy, base_class);

        for model_type in model_types.values() {
            let root = inheritance_root(model_type, base_class, model_types, hierarchy);
            if !context.touch_root(&root) {
                continue;
            }
            interface_builder.create_interfaces(&root, schema)?;
            interface_builder.apply_interfaces_to_queries(&root, schema, context)?;
        }

        let base_fields: Vec<(String, String)> = config
            .base_fields
            .iter()
            .map(|(name, typ)| (name.clone(), typ.clone()))
            .collect();
        interface_builder.apply_base_interface(&base_fields, schema)?;

        // union pass runs after the interface pass so a union rewrite
        // overrides an interface rewrite for the same type
        let type_names: Vec<String> = model_types.keys().cloned().collect();
        for type_name in type_names {
            union_builder.create_unions(&type_name, schema)?;
            union_builder.apply_unions_to_queries(&type_name, schema, context)?;
        }

        Ok(())
    }

    fn apply_plugins(
        &self,
        config: &SchemaConfig,
        model_types: &ModelTypes,
        schema: &mut Schema,
        context: &mut BuildContext,
    ) -> Result<(), SchemaBuildError> {
        let query_names: Vec<String> = schema.queries().map(|q| q.name.clone()).collect();

        for query_name in query_names {
            let mut field = match schema.get_query(&query_name) {
                Some(field) => field.clone(),
                None => continue,
            };
            let Some(model_type_name) = field.model_type_name.clone() else {
                continue;
            };
            let Some(model_type) = model_types.get(&model_type_name) else {
                continue;
            };

            let mut plugins = config.default_plugins.clone();
            plugins.merge(&model_type.config.plugins);
            plugins.merge(&field.plugins);

            let mut permission_settings: Option<serde_json::Map<String, Value>> = None;

            for (plugin_id, settings) in plugins.sorted_plugins()? {
                match plugin_id.as_str() {
                    "paginate" => {
                        // model-level plugins reach every query of the
                        // model; single-record queries have nothing to
                        // paginate and are skipped
                        if TypeReference::parse(&field.typ)?.is_list() {
                            let plugin = PaginationPlugin::new(pagination_config(
                                &settings,
                                self.pagination,
                            ));
                            plugin.apply(&mut field, schema, context)?;
                        }
                    }
                    "filter" => {
                        let filter = FilterPlugin;
                        let fields = InputFieldsConfig::from_settings(&settings, "filter")?;
                        NestedInputBuilder::new(&filter, model_types, config.max_nesting)
                            .apply_to_query(
                                &mut field,
                                &model_type_name,
                                &fields,
                                schema,
                                context,
                            )?;
                    }
                    "sort" => {
                        let sort = SortPlugin;
                        let fields = InputFieldsConfig::from_settings(&settings, "sort")?;
                        NestedInputBuilder::new(&sort, model_types, config.max_nesting)
                            .apply_to_query(
                                &mut field,
                                &model_type_name,
                                &fields,
                                schema,
                                context,
                            )?;
                    }
                    "permission" => {
                        permission_settings = Some(settings);
                    }
                    other => return Err(SchemaBuildError::UnknownPlugin(other.to_string())),
                }
            }

            // permission middleware always runs after the data-shaping
            // middleware and right before the terminal resolver, regardless
            // of where the plugin appears in the sorted order
            if let Some(settings) = permission_settings {
                let function = settings
                    .get("check")
                    .and_then(Value::as_str)
                    .unwrap_or("check_permission");
                field
                    .resolver
                    .middleware
                    .push(ResolverRef::named(PERMISSION_RESOLVER_MODULE, function));
                field.plugins.enable("permission");
            }

            schema.replace_query(field);
        }

        Ok(())
    }
}

/// Topmost ancestor below `base_class` that is itself exposed as a model
/// type; the model's own type when no exposed ancestor exists.
fn inheritance_root(
    model_type: &ModelType,
    base_class: &str,
    model_types: &ModelTypes,
    hierarchy: &dyn ClassHierarchyProvider,
) -> String {
    let class = model_type.model.get_source_class();
    hierarchy
        .ancestors_of(class)
        .into_iter()
        .take_while(|ancestor| ancestor != base_class)
        .map(|ancestor| short_class_name(&ancestor))
        .filter(|name| model_types.contains_key(name))
        .last()
        .unwrap_or_else(|| model_type.type_name.clone())
}

fn pagination_config(
    settings: &serde_json::Map<String, Value>,
    defaults: PaginationConfig,
) -> PaginationConfig {
    PaginationConfig {
        default_limit: settings
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(defaults.default_limit),
        max_limit: settings
            .get("max_limit")
            .and_then(Value::as_u64)
            .unwrap_or(defaults.max_limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StaticHierarchy, StaticModel};
    use multiplatform_test::multiplatform_test;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> (ModelRegistry, StaticHierarchy) {
        let mut hierarchy = StaticHierarchy::new();
        hierarchy.register("App\\SiteTree", None);
        hierarchy.register("App\\Page", Some("App\\SiteTree"));
        hierarchy.register("App\\EventPage", Some("App\\Page"));

        let mut registry = ModelRegistry::new();
        registry.register(Arc::new(
            StaticModel::new("App\\Page")
                .with_scalar("title", "String")
                .with_has_one("parent", "App\\Page"),
        ));
        registry.register(Arc::new(
            StaticModel::new("App\\EventPage")
                .with_scalar("title", "String")
                .with_scalar("startDate", "String"),
        ));

        (registry, hierarchy)
    }

    #[multiplatform_test]
    fn builds_model_types_and_operations() {
        let (registry, hierarchy) = registry();
        let config = SchemaConfig::from_json(json!({
            "models": { "App\\Page": { "fields": "*" } }
        }))
        .unwrap();

        let schema = SchemaBuilder::new()
            .build(&config, &registry, &hierarchy)
            .unwrap();

        assert!(schema.has_type("Page"));
        assert!(schema.get_query("readPages").is_some());
        assert!(schema.get_query("readOnePage").is_some());
        assert!(schema.has_type("PageCreateInput"));
        assert!(schema.has_type("PageUpdateInput"));
    }

    #[multiplatform_test]
    fn omitted_operations_section_yields_the_full_set() {
        let (registry, hierarchy) = registry();
        let config = SchemaConfig::from_json(json!({
            "models": { "App\\Page": { "fields": "*" } }
        }))
        .unwrap();

        let schema = SchemaBuilder::new()
            .build(&config, &registry, &hierarchy)
            .unwrap();

        for query in ["readPages", "readOnePage"] {
            assert!(schema.get_query(query).is_some(), "{query} missing");
        }
        for mutation in ["createPage", "updatePage", "deletePage"] {
            assert!(schema.get_mutation(mutation).is_some(), "{mutation} missing");
        }
    }

    #[multiplatform_test]
    fn missing_model_is_a_configuration_error() {
        let (registry, hierarchy) = registry();
        let config = SchemaConfig::from_json(json!({
            "models": { "App\\Missing": { "fields": "*" } }
        }))
        .unwrap();

        let err = SchemaBuilder::new()
            .build(&config, &registry, &hierarchy)
            .unwrap_err();
        assert!(matches!(err, SchemaBuildError::Configuration { name, .. }
            if name == "App\\Missing"));
    }

    #[multiplatform_test]
    fn inheritance_pass_builds_interfaces_and_unions() {
        let (registry, hierarchy) = registry();
        let config = SchemaConfig::from_json(json!({
            "base_class": "App\\SiteTree",
            "models": {
                "App\\Page": { "fields": "*" },
                "App\\EventPage": { "fields": "*" }
            }
        }))
        .unwrap();

        let (schema, context) = SchemaBuilder::new()
            .build_with_context(&config, &registry, &hierarchy)
            .unwrap();

        assert!(schema.get_interface("PageInterface").is_some());
        assert!(schema.get_interface("EventPageInterface").is_some());
        assert!(schema.get_union("PageInheritanceUnion").is_some());
        // union wins over the interface rewrite
        assert_eq!(
            schema.get_query("readPages").unwrap().typ,
            "[PageInheritanceUnion!]!"
        );
        // a leaf type has no union, so its interface rewrite stands
        assert_eq!(
            schema.get_query("readEventPages").unwrap().typ,
            "[EventPageInterface!]!"
        );

        // the rewritten-away concrete types stay in the reachable set
        let reachable: Vec<&String> = context.reachable_types().collect();
        for type_name in ["Page", "EventPage"] {
            assert!(reachable.iter().any(|t| *t == type_name));
            assert!(schema.has_type(type_name));
        }
    }

    #[multiplatform_test]
    fn unknown_plugin_fails_the_build() {
        let (registry, hierarchy) = registry();
        let config = SchemaConfig::from_json(json!({
            "models": {
                "App\\Page": {
                    "fields": "*",
                    "plugins": { "telemetry": true }
                }
            }
        }))
        .unwrap();

        let err = SchemaBuilder::new()
            .build(&config, &registry, &hierarchy)
            .unwrap_err();
        assert!(matches!(err, SchemaBuildError::UnknownPlugin(id) if id == "telemetry"));
    }

    #[multiplatform_test]
    fn permission_middleware_runs_last() {
        let (registry, hierarchy) = registry();
        let config = SchemaConfig::from_json(json!({
            "models": {
                "App\\Page": {
                    "fields": "*",
                    "plugins": {
                        "permission": true,
                        "paginate": true
                    }
                }
            }
        }))
        .unwrap();

        let schema = SchemaBuilder::new()
            .build(&config, &registry, &hierarchy)
            .unwrap();

        let query = schema.get_query("readPages").unwrap();
        let last = query.resolver.middleware.last().unwrap();
        assert_eq!(
            last.encode(),
            format!("{PERMISSION_RESOLVER_MODULE}::check_permission")
        );
        assert_eq!(query.typ, "PageConnection!");
    }
}

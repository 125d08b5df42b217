// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Builds one interface per level of an inheritance tree and rewrites
//! queries returning a concrete type to return its interface.

use std::collections::HashSet;

use tracing::debug;

use core_model::plugin::PluginConfig;
use core_model::schema::Schema;
use core_model::type_reference::TypeReference;
use core_model::types::{Field, InterfaceType, ResolverRef};

use crate::context::BuildContext;
use crate::error::SchemaBuildError;
use crate::inheritance::InheritanceChain;
use crate::model::ClassHierarchyProvider;
use crate::model_type::ModelTypes;
use crate::naming::{base_interface_name, interface_name, short_class_name};

pub const TYPE_RESOLVER_MODULE: &str = "inheritance_resolvers";

/// Plugin identifiers safe to run against an interface (they do not depend
/// on concrete-model internals). Everything else is dropped silently when
/// fields are copied onto an interface.
const TYPE_PLUGINS: &[&str] = &["paginate", "filter", "sort"];

pub struct InterfaceBuilder<'a> {
    model_types: &'a ModelTypes,
    hierarchy: &'a dyn ClassHierarchyProvider,
    base_class: &'a str,
    formatter: fn(&str) -> String,
}

impl<'a> InterfaceBuilder<'a> {
    pub fn new(
        model_types: &'a ModelTypes,
        hierarchy: &'a dyn ClassHierarchyProvider,
        base_class: &'a str,
    ) -> Self {
        Self {
            model_types,
            hierarchy,
            base_class,
            formatter: interface_name,
        }
    }

    pub fn with_formatter(mut self, formatter: fn(&str) -> String) -> Self {
        self.formatter = formatter;
        self
    }

    /// One interface per class level, top down from the root. A branch
    /// whose class has no schema model is pruned, not an error.
    pub fn create_interfaces(
        &self,
        root_type_name: &str,
        schema: &mut Schema,
    ) -> Result<(), SchemaBuildError> {
        self.create_for_level(root_type_name, schema, &mut vec![])
    }

    fn create_for_level(
        &self,
        type_name: &str,
        schema: &mut Schema,
        ancestor_interfaces: &mut Vec<String>,
    ) -> Result<(), SchemaBuildError> {
        let Some(model_type) = self.model_types.get(type_name) else {
            return Ok(());
        };
        let Some(concrete) = schema.get_type(type_name).cloned() else {
            return Ok(());
        };

        let interface_name = (self.formatter)(type_name);
        debug!(type_name, interface = %interface_name, "creating inheritance interface");

        let mut interface = InterfaceType::new(&interface_name);
        for field in concrete.fields.values() {
            interface.add_field(field.clone());
        }
        interface.plugins = type_plugins_only(&concrete.plugins);
        interface.type_resolver = Some(ResolverRef::named(TYPE_RESOLVER_MODULE, "resolve_type"));
        schema.add_interface(interface)?;

        if let Some(concrete) = schema.get_type_mut(type_name) {
            for ancestor in ancestor_interfaces.iter() {
                concrete.add_interface(ancestor);
            }
            concrete.add_interface(&interface_name);
        }

        ancestor_interfaces.push(interface_name);
        let chain = InheritanceChain::new(
            model_type.model.get_source_class(),
            self.base_class,
            self.hierarchy,
        );
        for child_class in chain.direct_descendants() {
            self.create_for_level(&short_class_name(&child_class), schema, ancestor_interfaces)?;
        }
        ancestor_interfaces.pop();

        Ok(())
    }

    /// One global interface for the configured base fields (e.g. `id`),
    /// shared by every model type, independent of the per-class tree.
    pub fn apply_base_interface(
        &self,
        base_fields: &[(String, String)],
        schema: &mut Schema,
    ) -> Result<(), SchemaBuildError> {
        if base_fields.is_empty() {
            return Ok(());
        }

        let name = base_interface_name(&schema.name);
        let mut interface = InterfaceType::new(&name);
        for (field_name, field_type) in base_fields {
            interface.add_field(Field::new(field_name, field_type));
        }
        interface.type_resolver = Some(ResolverRef::named(TYPE_RESOLVER_MODULE, "resolve_type"));
        schema.add_interface(interface)?;

        let model_type_names: Vec<String> = self.model_types.keys().cloned().collect();
        for type_name in model_type_names {
            if let Some(typ) = schema.get_type_mut(&type_name) {
                typ.add_interface(&name);
            }
        }

        Ok(())
    }

    /// Rewrites every field/query returning a concrete type of this tree to
    /// return the matching interface. The concrete type is eagerly marked
    /// reachable so it stays discoverable.
    pub fn apply_interfaces_to_queries(
        &self,
        root_type_name: &str,
        schema: &mut Schema,
        context: &mut BuildContext,
    ) -> Result<(), SchemaBuildError> {
        let Some(root) = self.model_types.get(root_type_name) else {
            return Ok(());
        };

        let chain = InheritanceChain::new(
            root.model.get_source_class(),
            self.base_class,
            self.hierarchy,
        );
        let mut tree_types: HashSet<String> = chain
            .descendants()
            .iter()
            .map(|class| short_class_name(class))
            .collect();
        tree_types.insert(root_type_name.to_string());

        // only rewrite to interfaces that were actually created, for types
        // that still exist as first-class models
        let rewritable: HashSet<String> = tree_types
            .iter()
            .filter(|name| {
                schema.has_type(name) && schema.get_interface(&(self.formatter)(name)).is_some()
            })
            .cloned()
            .collect();

        for name in rewritable.iter() {
            context.mark_reachable(name);
        }

        for field in schema.fields_mut() {
            let reference = TypeReference::parse(&field.typ)?;
            if rewritable.contains(reference.named_type()) {
                let interface = (self.formatter)(reference.named_type());
                field.typ =
                    TypeReference::from_path(&interface, reference.wrapper_path().to_vec())
                        .unparse();
            }
        }

        Ok(())
    }
}

fn type_plugins_only(plugins: &PluginConfig) -> PluginConfig {
    let mut filtered = PluginConfig::new();
    for (id, setting) in plugins.iter() {
        if TYPE_PLUGINS.contains(&id.as_str()) {
            filtered.set(id, setting.clone());
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use crate::model::{StaticHierarchy, StaticModel};
    use crate::model_type::ModelType;
    use multiplatform_test::multiplatform_test;
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (ModelTypes, StaticHierarchy, Schema) {
        let mut hierarchy = StaticHierarchy::new();
        hierarchy.register("SiteTree", None);
        hierarchy.register("Page", Some("SiteTree"));
        hierarchy.register("EventPage", Some("Page"));

        let config = SchemaConfig::from_json(json!({
            "models": {
                "Page": { "fields": "*" },
                "EventPage": { "fields": "*" }
            }
        }))
        .unwrap();

        let mut model_types = ModelTypes::new();
        let mut schema = Schema::new("default");

        for (class, extra_field) in [("Page", "title"), ("EventPage", "startDate")] {
            let model = Arc::new(StaticModel::new(class).with_scalar(extra_field, "String"));
            let model_type = ModelType::new(
                class,
                model,
                config.model(class).unwrap().clone(),
            )
            .unwrap();
            let (typ, _) = model_type.build_type().unwrap();
            schema.add_type(typ).unwrap();
            model_types.insert(class.to_string(), model_type);
        }

        (model_types, hierarchy, schema)
    }

    #[multiplatform_test]
    fn interfaces_accumulate_down_the_tree() {
        let (model_types, hierarchy, mut schema) = setup();
        let builder = InterfaceBuilder::new(&model_types, &hierarchy, "SiteTree");
        builder.create_interfaces("Page", &mut schema).unwrap();

        let page_interface = schema.get_interface("PageInterface").unwrap();
        assert!(page_interface.fields.contains_key("title"));
        assert!(!page_interface.fields.contains_key("startDate"));

        let event_interface = schema.get_interface("EventPageInterface").unwrap();
        assert!(event_interface.fields.contains_key("startDate"));

        assert_eq!(schema.get_type("Page").unwrap().interfaces, vec!["PageInterface"]);
        assert_eq!(
            schema.get_type("EventPage").unwrap().interfaces,
            vec!["PageInterface", "EventPageInterface"]
        );
    }

    #[multiplatform_test]
    fn missing_model_branch_is_pruned() {
        let (model_types, mut hierarchy, mut schema) = setup();
        // a subclass with no schema model
        hierarchy.register("HiddenPage", Some("EventPage"));

        let builder = InterfaceBuilder::new(&model_types, &hierarchy, "SiteTree");
        builder.create_interfaces("Page", &mut schema).unwrap();
        assert!(schema.get_interface("HiddenPageInterface").is_none());
    }

    #[multiplatform_test]
    fn queries_are_rewritten_to_interfaces() {
        let (model_types, hierarchy, mut schema) = setup();
        let mut query = Field::new("readPages", "[Page!]!");
        query.model_type_name = Some("Page".to_string());
        schema.add_query(query);

        let mut context = BuildContext::new();
        let builder = InterfaceBuilder::new(&model_types, &hierarchy, "SiteTree");
        builder.create_interfaces("Page", &mut schema).unwrap();
        builder
            .apply_interfaces_to_queries("Page", &mut schema, &mut context)
            .unwrap();

        assert_eq!(schema.get_query("readPages").unwrap().typ, "[PageInterface!]!");
        assert!(context.is_reachable("Page"));
    }

    #[multiplatform_test]
    fn base_interface_spans_all_models() {
        let (model_types, hierarchy, mut schema) = setup();
        let builder = InterfaceBuilder::new(&model_types, &hierarchy, "SiteTree");
        builder
            .apply_base_interface(
                &[("id".to_string(), "ID!".to_string())],
                &mut schema,
            )
            .unwrap();

        assert!(schema.get_interface("DefaultBaseInterface").is_some());
        for type_name in ["Page", "EventPage"] {
            assert!(schema
                .get_type(type_name)
                .unwrap()
                .interfaces
                .contains(&"DefaultBaseInterface".to_string()));
        }
    }
}

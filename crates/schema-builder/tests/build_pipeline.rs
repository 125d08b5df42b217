// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! End-to-end build pipeline tests: configuration in, finished schema plus
//! runtime path mappings out.

use std::sync::Arc;

use serde_json::json;

use schema_builder::builder::SchemaBuilder;
use schema_builder::config::SchemaConfig;
use schema_builder::model::{ModelRegistry, StaticHierarchy, StaticModel};
use schema_builder::sort_plugin::{resolve_sort, SortOrder};
use schema_builder::storage::{persist_if_changed, MemoryStorage, SchemaStorage};

fn page_registry() -> (ModelRegistry, StaticHierarchy) {
    let mut hierarchy = StaticHierarchy::new();
    hierarchy.register("Page", None);

    let mut registry = ModelRegistry::new();
    registry.register(Arc::new(
        StaticModel::new("Page")
            .with_scalar("Title", "String")
            .with_has_one("Parent", "Page"),
    ));

    (registry, hierarchy)
}

#[test]
fn sorted_page_query_end_to_end() {
    let (registry, hierarchy) = page_registry();
    let config = SchemaConfig::from_json(json!({
        "models": {
            "Page": {
                "fields": "*",
                "plugins": { "sort": { "fields": "*" } }
            }
        }
    }))
    .unwrap();

    let (schema, context) = SchemaBuilder::new()
        .build_with_context(&config, &registry, &hierarchy)
        .unwrap();

    // the self-relation points the input type back at itself
    let sort_fields = schema.get_type("PageSortFields").unwrap();
    assert!(sort_fields.is_input);
    assert_eq!(sort_fields.get_field("Title").unwrap().typ, "SortDirection");
    assert_eq!(sort_fields.get_field("Parent").unwrap().typ, "PageSortFields");
    assert!(schema.get_enum("SortDirection").is_some());

    let query = schema.get_query("readPages").unwrap();
    assert!(query.args.iter().any(|a| a.name == "sort"));

    let mapping = context.get_path_mapping("readPages", "sort").unwrap();
    let resolved = resolve_sort(&json!({ "Parent": { "Title": "DESC" } }), mapping);
    assert_eq!(
        resolved,
        vec![("Parent.Title".to_string(), SortOrder::Descending)]
    );
}

#[test]
fn nesting_depth_bounds_the_input_graph() {
    let mut hierarchy = StaticHierarchy::new();
    for class in ["Article", "Section", "Chunk"] {
        hierarchy.register(class, None);
    }

    let mut registry = ModelRegistry::new();
    registry.register(Arc::new(
        StaticModel::new("Article")
            .with_scalar("name", "String")
            .with_has_one("b", "Section"),
    ));
    registry.register(Arc::new(
        StaticModel::new("Section")
            .with_scalar("name", "String")
            .with_has_one("c", "Chunk"),
    ));
    registry.register(Arc::new(
        StaticModel::new("Chunk").with_scalar("d", "String"),
    ));

    let config = SchemaConfig::from_json(json!({
        "max_nesting": 1,
        "models": {
            "Article": { "fields": "*", "plugins": { "sort": { "fields": "*" } } },
            "Section": { "fields": "*" },
            "Chunk": { "fields": "*" }
        }
    }))
    .unwrap();

    let (schema, context) = SchemaBuilder::new()
        .build_with_context(&config, &registry, &hierarchy)
        .unwrap();

    // one level of nesting exists, the second does not
    let article_sort = schema.get_type("ArticleSortFields").unwrap();
    assert_eq!(article_sort.get_field("b").unwrap().typ, "SectionSortFields");
    let section_sort = schema.get_type("SectionSortFields").unwrap();
    assert!(section_sort.get_field("name").is_some());
    assert!(section_sort.get_field("c").is_none());

    let mapping = context.get_path_mapping("readArticles", "sort").unwrap();
    assert!(mapping.contains_key("b.name"));
    assert!(mapping.keys().all(|path| !path.starts_with("b.c")));
}

#[test]
fn self_referential_input_terminates_at_zero_nesting() {
    let (registry, hierarchy) = page_registry();
    let config = SchemaConfig::from_json(json!({
        "max_nesting": 0,
        "models": {
            "Page": {
                "fields": "*",
                "plugins": { "sort": { "fields": "*" } }
            }
        }
    }))
    .unwrap();

    let (schema, context) = SchemaBuilder::new()
        .build_with_context(&config, &registry, &hierarchy)
        .unwrap();

    // the sentinel survives even when nesting is disabled entirely
    let sort_fields = schema.get_type("PageSortFields").unwrap();
    assert_eq!(sort_fields.get_field("Parent").unwrap().typ, "PageSortFields");

    // no recursion into the self-reference: it flattens as a terminal path
    let mapping = context.get_path_mapping("readPages", "sort").unwrap();
    assert_eq!(mapping.get("Parent"), Some(&"Parent".to_string()));
    assert!(!mapping.contains_key("Parent.Title"));
}

#[test]
fn filter_and_pagination_compose_on_one_query() {
    let (registry, hierarchy) = page_registry();
    let config = SchemaConfig::from_json(json!({
        "models": {
            "Page": {
                "fields": "*",
                "plugins": {
                    "paginate": { "max_limit": 100 },
                    "filter": { "fields": "*" }
                }
            }
        }
    }))
    .unwrap();

    let schema = SchemaBuilder::new()
        .build(&config, &registry, &hierarchy)
        .unwrap();

    let query = schema.get_query("readPages").unwrap();
    assert_eq!(query.typ, "PageConnection!");
    assert!(query.args.iter().any(|a| a.name == "limit"));
    assert!(query.args.iter().any(|a| a.name == "filter"));

    assert!(schema.get_type("PageFilterFields").is_some());
    assert!(schema.get_type("QueryFilterStringComparator").is_some());
    assert!(schema.get_type("PageConnection").is_some());
    assert!(schema.get_type("PageInfo").is_some());
}

#[test]
fn signature_is_stable_across_model_declaration_order() {
    let build = |models: serde_json::Value| {
        let mut hierarchy = StaticHierarchy::new();
        hierarchy.register("Page", None);
        hierarchy.register("File", None);

        let mut registry = ModelRegistry::new();
        registry.register(Arc::new(StaticModel::new("Page").with_scalar("Title", "String")));
        registry.register(Arc::new(StaticModel::new("File").with_scalar("Name", "String")));

        let config = SchemaConfig::from_json(json!({ "models": models })).unwrap();
        SchemaBuilder::new()
            .build(&config, &registry, &hierarchy)
            .unwrap()
            .get_signature()
    };

    let first = build(json!({ "Page": { "fields": "*" }, "File": { "fields": "*" } }));
    let second = build(json!({ "File": { "fields": "*" }, "Page": { "fields": "*" } }));
    assert_eq!(first, second);
}

#[test]
fn built_schema_persists_and_reloads() {
    let (registry, hierarchy) = page_registry();
    let config = SchemaConfig::from_json(json!({
        "models": { "Page": { "fields": "*" } }
    }))
    .unwrap();

    let schema = SchemaBuilder::new()
        .build(&config, &registry, &hierarchy)
        .unwrap();
    let signature = schema.get_signature();

    let mut storage = MemoryStorage::new();
    assert!(persist_if_changed(&mut storage, "default", schema).unwrap());
    assert!(storage.exists("default"));

    let restored = storage.load("default").unwrap().unwrap();
    assert_eq!(restored.signature, signature);
    assert!(restored.schema.get_query("readPages").is_some());

    // an identical rebuild is a no-op
    let rebuilt = SchemaBuilder::new()
        .build(&config, &registry, &hierarchy)
        .unwrap();
    assert!(!persist_if_changed(&mut storage, "default", rebuilt).unwrap());
}

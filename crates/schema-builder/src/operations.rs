// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! CRUD-style operation creators. Each creator produces a root field (and
//! any input types the field needs) for one model.

use core_model::types::{Argument, Field, ResolverRef, Type};

use crate::config::OperationCustomization;
use crate::error::SchemaBuildError;
use crate::model::FieldValueKind;
use crate::model_type::ModelType;
use crate::naming::{
    create_input_name, mutation_name, read_one_query_name, read_query_name, update_input_name,
};

pub const RESOLVER_MODULE: &str = "model_resolvers";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

pub struct Operation {
    pub kind: OperationKind,
    pub field: Field,
    /// Input types this operation drags into the schema.
    pub input_types: Vec<Type>,
}

pub trait OperationCreator {
    fn identifier(&self) -> &str;

    fn create_operation(
        &self,
        model_type: &ModelType,
        customization: Option<&OperationCustomization>,
    ) -> Result<Operation, SchemaBuildError>;
}

/// The built-in creator set, in registration order.
pub fn default_creators() -> Vec<Box<dyn OperationCreator>> {
    vec![
        Box::new(ReadCreator),
        Box::new(ReadOneCreator),
        Box::new(CreateCreator),
        Box::new(UpdateCreator),
        Box::new(DeleteCreator),
    ]
}

fn operation_name(default: String, customization: Option<&OperationCustomization>) -> String {
    customization
        .and_then(|c| c.name.clone())
        .unwrap_or(default)
}

fn resolver(function: &str) -> ResolverRef {
    ResolverRef::named(RESOLVER_MODULE, function)
}

/// Scalar fields usable in mutation input types. Relations are mutated
/// through their own models, not through nested writes.
fn input_fields(model_type: &ModelType, typ: &Type) -> Vec<(String, String)> {
    typ.fields
        .values()
        .filter(|field| {
            !matches!(
                model_type.model.field_value_kind(&field.name),
                FieldValueKind::SingleRelation(_) | FieldValueKind::RelationList(_)
            )
        })
        .map(|field| (field.name.clone(), field.typ.clone()))
        .collect()
}

pub struct ReadCreator;

impl OperationCreator for ReadCreator {
    fn identifier(&self) -> &str {
        "read"
    }

    fn create_operation(
        &self,
        model_type: &ModelType,
        customization: Option<&OperationCustomization>,
    ) -> Result<Operation, SchemaBuildError> {
        let type_name = &model_type.type_name;
        let name = operation_name(read_query_name(type_name), customization);

        let mut field = Field::new(&name, &format!("[{type_name}!]!")).with_model(type_name);
        field.resolver.default_resolver = Some(resolver("read_list"));
        if let Some(customization) = customization {
            field.plugins.merge(&customization.plugins);
        }

        Ok(Operation {
            kind: OperationKind::Query,
            field,
            input_types: vec![],
        })
    }
}

pub struct ReadOneCreator;

impl OperationCreator for ReadOneCreator {
    fn identifier(&self) -> &str {
        "readOne"
    }

    fn create_operation(
        &self,
        model_type: &ModelType,
        customization: Option<&OperationCustomization>,
    ) -> Result<Operation, SchemaBuildError> {
        let type_name = &model_type.type_name;
        let name = operation_name(read_one_query_name(type_name), customization);

        let mut field = Field::new(&name, type_name).with_model(type_name);
        field.add_arg(Argument::new("id", "ID!"));
        field.resolver.default_resolver = Some(resolver("read_one"));

        Ok(Operation {
            kind: OperationKind::Query,
            field,
            input_types: vec![],
        })
    }
}

pub struct CreateCreator;

impl OperationCreator for CreateCreator {
    fn identifier(&self) -> &str {
        "create"
    }

    fn create_operation(
        &self,
        model_type: &ModelType,
        customization: Option<&OperationCustomization>,
    ) -> Result<Operation, SchemaBuildError> {
        let type_name = &model_type.type_name;
        let name = operation_name(mutation_name("create", type_name), customization);

        let (typ, _) = model_type.build_type()?;
        let input_name = create_input_name(type_name);
        let mut input_type = Type::input(&input_name);
        for (field_name, field_type) in input_fields(model_type, &typ) {
            if field_name == "id" {
                continue;
            }
            input_type.add_field(Field::new(&field_name, &field_type));
        }

        let mut field = Field::new(&name, type_name).with_model(type_name);
        field.add_arg(Argument::new("input", &format!("{input_name}!")));
        field.resolver.default_resolver = Some(resolver("create"));

        Ok(Operation {
            kind: OperationKind::Mutation,
            field,
            input_types: vec![input_type],
        })
    }
}

pub struct UpdateCreator;

impl OperationCreator for UpdateCreator {
    fn identifier(&self) -> &str {
        "update"
    }

    fn create_operation(
        &self,
        model_type: &ModelType,
        customization: Option<&OperationCustomization>,
    ) -> Result<Operation, SchemaBuildError> {
        let type_name = &model_type.type_name;
        let name = operation_name(mutation_name("update", type_name), customization);

        let (typ, _) = model_type.build_type()?;
        let input_name = update_input_name(type_name);
        let mut input_type = Type::input(&input_name);
        for (field_name, field_type) in input_fields(model_type, &typ) {
            let field_type = if field_name == "id" {
                // the id selects the record, everything else is optional
                field_type
            } else {
                field_type.trim_end_matches('!').to_string()
            };
            input_type.add_field(Field::new(&field_name, &field_type));
        }

        let mut field = Field::new(&name, type_name).with_model(type_name);
        field.add_arg(Argument::new("input", &format!("{input_name}!")));
        field.resolver.default_resolver = Some(resolver("update"));

        Ok(Operation {
            kind: OperationKind::Mutation,
            field,
            input_types: vec![input_type],
        })
    }
}

pub struct DeleteCreator;

impl OperationCreator for DeleteCreator {
    fn identifier(&self) -> &str {
        "delete"
    }

    fn create_operation(
        &self,
        model_type: &ModelType,
        customization: Option<&OperationCustomization>,
    ) -> Result<Operation, SchemaBuildError> {
        let type_name = &model_type.type_name;
        let name = operation_name(mutation_name("delete", type_name), customization);

        let mut field = Field::new(&name, type_name).with_model(type_name);
        field.add_arg(Argument::new("id", "ID!"));
        field.resolver.default_resolver = Some(resolver("delete"));

        Ok(Operation {
            kind: OperationKind::Mutation,
            field,
            input_types: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use crate::model::StaticModel;
    use multiplatform_test::multiplatform_test;
    use serde_json::json;
    use std::sync::Arc;

    fn page_type() -> ModelType {
        let model = Arc::new(
            StaticModel::new("App\\Page")
                .with_scalar("title", "String!")
                .with_has_one("parent", "App\\Page"),
        );
        let config = SchemaConfig::from_json(
            json!({ "models": { "App\\Page": { "fields": "*" } } }),
        )
        .unwrap();
        ModelType::new("Page", model, config.model("App\\Page").unwrap().clone()).unwrap()
    }

    #[multiplatform_test]
    fn read_operation() {
        let op = ReadCreator.create_operation(&page_type(), None).unwrap();
        assert_eq!(op.kind, OperationKind::Query);
        assert_eq!(op.field.name, "readPages");
        assert_eq!(op.field.typ, "[Page!]!");
    }

    #[multiplatform_test]
    fn create_operation_synthesizes_input_type() {
        let op = CreateCreator.create_operation(&page_type(), None).unwrap();
        assert_eq!(op.field.name, "createPage");
        let input = &op.input_types[0];
        assert_eq!(input.name, "PageCreateInput");
        assert!(input.is_input);
        // no id, no relation
        assert!(input.get_field("id").is_none());
        assert!(input.get_field("parent").is_none());
        assert_eq!(input.get_field("title").unwrap().typ, "String!");
    }

    #[multiplatform_test]
    fn update_input_relaxes_requiredness() {
        let op = UpdateCreator.create_operation(&page_type(), None).unwrap();
        let input = &op.input_types[0];
        assert_eq!(input.get_field("id").unwrap().typ, "ID!");
        assert_eq!(input.get_field("title").unwrap().typ, "String");
    }

    #[multiplatform_test]
    fn custom_name_overrides_formatter() {
        let customization = OperationCustomization {
            name: Some("pages".to_string()),
            plugins: Default::default(),
        };
        let op = ReadCreator
            .create_operation(&page_type(), Some(&customization))
            .unwrap();
        assert_eq!(op.field.name, "pages");
    }
}

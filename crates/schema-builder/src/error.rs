// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

use core_model::plugin::PluginOrderError;
use core_model::schema::SchemaError;
use core_model::type_reference::TypeParseError;

/// Build-pass failures. All variants except `Resolution` are raised eagerly
/// during the build; no partial schema is ever persisted.
#[derive(Error, Debug)]
pub enum SchemaBuildError {
    #[error("Invalid configuration for '{name}': {message}")]
    Configuration { name: String, message: String },

    #[error("Unknown plugin '{0}'")]
    UnknownPlugin(String),

    #[error(
        "Field '{field}' on '{type_name}' is declared as a leaf but references model '{model}'"
    )]
    LeafDeclaredForRelation {
        type_name: String,
        field: String,
        model: String,
    },

    #[error("Field '{field}' on '{type_name}' is declared as nested but is a scalar")]
    NestedDeclaredForScalar { type_name: String, field: String },

    #[error(transparent)]
    TypeParse(#[from] TypeParseError),

    #[error(transparent)]
    PluginOrder(#[from] PluginOrderError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Unable to serialize schema: {0}")]
    Serialize(String),

    #[error("Unable to deserialize schema: {0}")]
    Deserialize(String),

    #[error(
        "Resolver for '{0}' is an inline closure and cannot be persisted; use a named function"
    )]
    UnserializableResolver(String),
}

impl SchemaBuildError {
    pub fn configuration(name: &str, message: impl Into<String>) -> Self {
        SchemaBuildError::Configuration {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Raised at query-execution time when a runtime value's class ancestry has
/// no registered schema type. Unlike `SchemaBuildError` this depends on
/// live data, not static configuration.
#[derive(Error, Debug)]
#[error("No schema type registered for class '{class}' or any of its ancestors")]
pub struct ResolutionError {
    pub class: String,
}

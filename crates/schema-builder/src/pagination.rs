// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Pagination plugin: wraps a list-returning field in a
//! `{Type}Connection` (edges, nodes, pageInfo) and attaches the `paginate`
//! resolver middleware.
//!
//! Connections are deduplicated per build by the field's wrapped return
//! type. Two fields returning `[Page!]!` share one `PageConnection`; a
//! field returning a differently wrapped `Page` list gets a numeric
//! suffix instead of silently reusing a connection with different node
//! wrapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use core_model::schema::Schema;
use core_model::type_reference::TypeReference;
use core_model::types::{Argument, Field, ResolverRef, Type};

use crate::context::BuildContext;
use crate::error::SchemaBuildError;
use crate::naming::{connection_name, edge_name};

pub const PAGINATE_RESOLVER_MODULE: &str = "pagination_resolvers";

pub const PAGE_INFO_TYPE: &str = "PageInfo";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 25,
            max_limit: 100,
        }
    }
}

pub struct PaginationPlugin {
    config: PaginationConfig,
}

impl PaginationPlugin {
    pub fn new(config: PaginationConfig) -> Self {
        Self { config }
    }

    /// Rewrites a list-returning field to return a connection and adds the
    /// `limit`/`offset` arguments plus the `paginate` middleware.
    pub fn apply(
        &self,
        field: &mut Field,
        schema: &mut Schema,
        context: &mut BuildContext,
    ) -> Result<(), SchemaBuildError> {
        let reference = TypeReference::parse(&field.typ)?;
        if !reference.is_list() {
            return Err(SchemaBuildError::configuration(
                &field.name,
                "pagination requires a list-returning field",
            ));
        }

        let wrapped_type = field.typ.clone();
        let connection = match context.get_connection(&wrapped_type) {
            Some(existing) => existing.clone(),
            None => {
                let name = self.register_connection_types(
                    reference.named_type(),
                    &wrapped_type,
                    schema,
                    context,
                )?;
                context.register_connection(&wrapped_type, &name);
                name
            }
        };

        field.add_arg(Argument::new(
            "limit",
            &format!("Int = {}", self.config.default_limit.min(self.config.max_limit)),
        ));
        field.add_arg(Argument::new("offset", "Int = 0"));
        field.typ = format!("{connection}!");
        field.resolver.middleware.push(ResolverRef::named(
            PAGINATE_RESOLVER_MODULE,
            "paginate",
        ));
        field.plugins.enable("paginate");

        Ok(())
    }

    fn register_connection_types(
        &self,
        node_type: &str,
        wrapped_type: &str,
        schema: &mut Schema,
        context: &BuildContext,
    ) -> Result<String, SchemaBuildError> {
        let base = connection_name(node_type);
        let name = disambiguate(&base, schema, context);
        debug!(node = node_type, connection = %name, "creating connection type");

        let edge = disambiguate(&edge_name(node_type), schema, context);
        let mut edge_type = Type::new(&edge);
        edge_type.add_field(Field::new("node", &format!("{node_type}!")));
        schema.add_type(edge_type)?;

        ensure_page_info(schema)?;

        let mut connection_type = Type::new(&name);
        connection_type.add_field(Field::new("edges", &format!("[{edge}!]!")));
        connection_type.add_field(Field::new("nodes", wrapped_type));
        connection_type.add_field(Field::new("pageInfo", &format!("{PAGE_INFO_TYPE}!")));
        schema.add_type(connection_type)?;

        Ok(name)
    }
}

/// First free name: the base, then `{base}2`, `{base}3`, ...
fn disambiguate(base: &str, schema: &Schema, context: &BuildContext) -> String {
    let taken = |name: &str| {
        schema.has_type(name) || context.connection_names().any(|existing| existing == name)
    };

    if !taken(base) {
        return base.to_string();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}{suffix}");
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

fn ensure_page_info(schema: &mut Schema) -> Result<(), SchemaBuildError> {
    if schema.has_type(PAGE_INFO_TYPE) {
        return Ok(());
    }
    let mut page_info = Type::new(PAGE_INFO_TYPE);
    page_info.add_field(Field::new("totalCount", "Int!"));
    page_info.add_field(Field::new("hasNextPage", "Boolean!"));
    page_info.add_field(Field::new("hasPreviousPage", "Boolean!"));
    schema.add_type(page_info)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "totalCount")]
    pub total_count: u64,
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
    #[serde(rename = "hasPreviousPage")]
    pub has_previous_page: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub node: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResult {
    pub edges: Vec<Edge>,
    pub nodes: Vec<Value>,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
}

/// The `paginate` middleware. A requested limit above `max_limit` is
/// clamped silently; `hasNextPage` reflects the clamped limit.
pub fn paginate(
    items: Vec<Value>,
    limit: Option<u64>,
    offset: Option<u64>,
    config: &PaginationConfig,
) -> PaginatedResult {
    let total = items.len() as u64;
    let limit = limit.unwrap_or(config.default_limit).min(config.max_limit);
    let offset = offset.unwrap_or(0);

    let nodes: Vec<Value> = items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    PaginatedResult {
        edges: nodes.iter().cloned().map(|node| Edge { node }).collect(),
        nodes,
        page_info: PageInfo {
            total_count: total,
            has_next_page: offset + limit < total,
            has_previous_page: offset > 0,
        },
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Builds a GraphQL schema from declaratively configured models: field
//! derivation, CRUD operations, inheritance interfaces/unions, and
//! filter/sort/pagination plugins, then persists the result keyed by a
//! content signature.

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod filter_plugin;
pub mod inheritance;
pub mod interface_builder;
pub mod model;
pub mod model_type;
pub mod naming;
pub mod nested_input;
pub mod operations;
pub mod pagination;
pub mod sort_plugin;
pub mod storage;
pub mod type_resolver;
pub mod union_builder;

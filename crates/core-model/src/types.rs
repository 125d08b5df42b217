// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Value objects for the schema under construction: fields, object/input
//! types, interfaces, unions, enums, and scalars.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::plugin::PluginConfig;

#[derive(Error, Debug)]
pub enum TypeMergeError {
    #[error("Cannot merge input type '{0}' with non-input type '{1}'")]
    KindMismatch(String, String),
}

#[derive(Error, Debug)]
pub enum TypeValidationError {
    #[error("Type '{0}' has no fields")]
    EmptyType(String),

    #[error("Interface '{0}' has no type resolver")]
    MissingInterfaceResolver(String),

    #[error("Union '{0}' has no type resolver")]
    MissingUnionResolver(String),

    #[error("Union '{0}' has no member types")]
    EmptyUnion(String),
}

/// A reference to resolver logic, invoked by the external execution engine.
///
/// Only `NamedFunction` survives persistence; an `InlineClosure` is usable
/// during a build pass but causes persistence to fail fast.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ResolverRef {
    NamedFunction { module: String, function: String },
    InlineClosure { context: String },
}

impl ResolverRef {
    pub fn named(module: &str, function: &str) -> Self {
        ResolverRef::NamedFunction {
            module: module.to_string(),
            function: function.to_string(),
        }
    }

    pub fn is_serializable(&self) -> bool {
        matches!(self, ResolverRef::NamedFunction { .. })
    }

    /// Encoded expression form, fed into signatures.
    pub fn encode(&self) -> String {
        match self {
            ResolverRef::NamedFunction { module, function } => {
                format!("{module}::{function}")
            }
            ResolverRef::InlineClosure { context } => format!("closure({context})"),
        }
    }
}

/// The composed resolver for a field: a default resolver bracketed by
/// ordered middleware (before) and afterware (after). This core only
/// composes the chain; invocation belongs to the execution engine.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverChain {
    pub default_resolver: Option<ResolverRef>,
    pub middleware: Vec<ResolverRef>,
    pub afterware: Vec<ResolverRef>,
}

impl ResolverChain {
    pub fn is_empty(&self) -> bool {
        self.default_resolver.is_none() && self.middleware.is_empty() && self.afterware.is_empty()
    }

    pub fn is_serializable(&self) -> bool {
        self.default_resolver
            .iter()
            .chain(self.middleware.iter())
            .chain(self.afterware.iter())
            .all(ResolverRef::is_serializable)
    }

    fn encode(&self) -> String {
        let parts: Vec<String> = self
            .middleware
            .iter()
            .chain(self.default_resolver.iter())
            .chain(self.afterware.iter())
            .map(ResolverRef::encode)
            .collect();
        parts.join("|")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    /// Type expression string, e.g. `Int = 0`.
    pub typ: String,
}

impl Argument {
    pub fn new(name: &str, typ: &str) -> Self {
        Self {
            name: name.to_string(),
            typ: typ.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// Type expression string, e.g. `[Foo!]!`.
    pub typ: String,
    pub args: Vec<Argument>,
    pub resolver: ResolverChain,
    pub plugins: PluginConfig,
    /// Set when the field returns another model's type.
    pub model_type_name: Option<String>,
}

impl Field {
    pub fn new(name: &str, typ: &str) -> Self {
        Self {
            name: name.to_string(),
            typ: typ.to_string(),
            args: vec![],
            resolver: ResolverChain::default(),
            plugins: PluginConfig::new(),
            model_type_name: None,
        }
    }

    pub fn with_model(mut self, model_type_name: &str) -> Self {
        self.model_type_name = Some(model_type_name.to_string());
        self
    }

    pub fn add_arg(&mut self, arg: Argument) {
        self.args.retain(|existing| existing.name != arg.name);
        self.args.push(arg);
    }

    /// Merges `other` into this field: `other` wins on the type and
    /// resolver, arguments are unioned by name, plugin configs are
    /// priority-merged.
    pub fn merge_with(&mut self, other: &Field) {
        self.typ = other.typ.clone();
        for arg in other.args.iter() {
            self.add_arg(arg.clone());
        }
        if !other.resolver.is_empty() {
            self.resolver = other.resolver.clone();
        }
        self.plugins.merge(&other.plugins);
        if other.model_type_name.is_some() {
            self.model_type_name = other.model_type_name.clone();
        }
    }

    pub fn signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.name);
        hasher.update(&self.typ);
        let mut args = self.args.clone();
        args.sort_by(|a, b| a.name.cmp(&b.name));
        for arg in args {
            hasher.update(&arg.name);
            hasher.update(&arg.typ);
        }
        hasher.update(self.resolver.encode());
        hasher.update(sorted_plugin_digest(&self.plugins));
        hex(hasher)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Type {
    pub name: String,
    pub fields: IndexMap<String, Field>,
    pub description: Option<String>,
    pub interfaces: Vec<String>,
    pub is_input: bool,
    pub plugins: PluginConfig,
    pub field_resolver: Option<ResolverRef>,
}

impl Type {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: IndexMap::new(),
            description: None,
            interfaces: vec![],
            is_input: false,
            plugins: PluginConfig::new(),
            field_resolver: None,
        }
    }

    pub fn input(name: &str) -> Self {
        Self {
            is_input: true,
            ..Self::new(name)
        }
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.insert(field.name.clone(), field);
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn add_interface(&mut self, interface_name: &str) {
        if !self.interfaces.iter().any(|i| i == interface_name) {
            self.interfaces.push(interface_name.to_string());
        }
    }

    /// Field-by-field union with `other`. A field present in both is merged
    /// via `Field::merge_with`, interface lists are unioned, plugin configs
    /// priority-merged. Input and non-input types never merge.
    pub fn merge_with(&mut self, other: &Type) -> Result<(), TypeMergeError> {
        if self.is_input != other.is_input {
            return Err(TypeMergeError::KindMismatch(
                other.name.clone(),
                self.name.clone(),
            ));
        }

        for (name, field) in other.fields.iter() {
            match self.fields.get_mut(name) {
                Some(existing) => existing.merge_with(field),
                None => {
                    self.fields.insert(name.clone(), field.clone());
                }
            }
        }
        for interface in other.interfaces.iter() {
            self.add_interface(interface);
        }
        self.plugins.merge(&other.plugins);
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        if other.field_resolver.is_some() {
            self.field_resolver = other.field_resolver.clone();
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), TypeValidationError> {
        if self.fields.is_empty() {
            return Err(TypeValidationError::EmptyType(self.name.clone()));
        }
        Ok(())
    }

    /// Deterministic content hash. Fields are normalized by name so that
    /// insertion order never affects the signature.
    pub fn get_signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.name);
        hasher.update([self.is_input as u8]);
        hasher.update(self.description.as_deref().unwrap_or(""));
        hasher.update(sorted_plugin_digest(&self.plugins));

        let mut interfaces = self.interfaces.clone();
        interfaces.sort();
        for interface in interfaces {
            hasher.update(interface);
        }

        let mut field_names: Vec<&String> = self.fields.keys().collect();
        field_names.sort();
        for name in field_names {
            hasher.update(self.fields[name].signature());
        }

        if let Some(resolver) = &self.field_resolver {
            hasher.update(resolver.encode());
        }

        hex(hasher)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InterfaceType {
    pub name: String,
    pub fields: IndexMap<String, Field>,
    pub description: Option<String>,
    pub type_resolver: Option<ResolverRef>,
    pub plugins: PluginConfig,
}

impl InterfaceType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: IndexMap::new(),
            description: None,
            type_resolver: None,
            plugins: PluginConfig::new(),
        }
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.insert(field.name.clone(), field);
    }

    pub fn validate(&self) -> Result<(), TypeValidationError> {
        if self.type_resolver.is_none() {
            return Err(TypeValidationError::MissingInterfaceResolver(
                self.name.clone(),
            ));
        }
        if self.fields.is_empty() {
            return Err(TypeValidationError::EmptyType(self.name.clone()));
        }
        Ok(())
    }

    pub fn get_signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.name);
        hasher.update(self.description.as_deref().unwrap_or(""));
        let mut field_names: Vec<&String> = self.fields.keys().collect();
        field_names.sort();
        for name in field_names {
            hasher.update(self.fields[name].signature());
        }
        if let Some(resolver) = &self.type_resolver {
            hasher.update(resolver.encode());
        }
        hex(hasher)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UnionType {
    pub name: String,
    /// Member type names; set semantics, canonically sorted.
    pub types: Vec<String>,
    pub description: Option<String>,
    pub type_resolver: Option<ResolverRef>,
}

impl UnionType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            types: vec![],
            description: None,
            type_resolver: None,
        }
    }

    pub fn add_type(&mut self, type_name: &str) {
        if !self.types.iter().any(|t| t == type_name) {
            self.types.push(type_name.to_string());
            self.types.sort();
        }
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.iter().any(|t| t == type_name)
    }

    pub fn validate(&self) -> Result<(), TypeValidationError> {
        if self.type_resolver.is_none() {
            return Err(TypeValidationError::MissingUnionResolver(self.name.clone()));
        }
        if self.types.is_empty() {
            return Err(TypeValidationError::EmptyUnion(self.name.clone()));
        }
        Ok(())
    }

    pub fn get_signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.name);
        hasher.update(self.description.as_deref().unwrap_or(""));
        for typ in self.types.iter() {
            hasher.update(typ);
        }
        if let Some(resolver) = &self.type_resolver {
            hasher.update(resolver.encode());
        }
        hex(hasher)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    /// Value name -> optional description.
    pub values: IndexMap<String, Option<String>>,
    pub description: Option<String>,
}

impl EnumType {
    pub fn new(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            values: values.iter().map(|v| (v.to_string(), None)).collect(),
            description: None,
        }
    }

    pub fn get_signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.name);
        let mut values: Vec<&String> = self.values.keys().collect();
        values.sort();
        for value in values {
            hasher.update(value);
        }
        hex(hasher)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScalarType {
    pub name: String,
    pub description: Option<String>,
}

impl ScalarType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
        }
    }

    pub fn get_signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.name);
        hasher.update(self.description.as_deref().unwrap_or(""));
        hex(hasher)
    }
}

fn sorted_plugin_digest(plugins: &PluginConfig) -> String {
    let mut entries: Vec<String> = plugins
        .iter()
        .map(|(id, setting)| {
            format!(
                "{id}:{}",
                serde_json::to_string(setting).unwrap_or_default()
            )
        })
        .collect();
    entries.sort();
    entries.join(";")
}

fn hex(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

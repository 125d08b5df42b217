// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Top-level registry of everything the build produces.
//!
//! Names are globally unique per kind; adding a type under an existing name
//! of the same kind merges the two definitions, a cross-kind collision is a
//! configuration error.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::{
    EnumType, Field, InterfaceType, ScalarType, Type, TypeMergeError, TypeValidationError,
    UnionType,
};

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Name '{0}' is already registered as a different kind of type")]
    KindCollision(String),

    #[error("Cannot merge type '{0}': {1}")]
    Merge(String, #[source] TypeMergeError),

    #[error(transparent)]
    Validation(#[from] TypeValidationError),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Schema {
    pub name: String,
    types: IndexMap<String, Type>,
    interfaces: IndexMap<String, InterfaceType>,
    unions: IndexMap<String, UnionType>,
    enums: IndexMap<String, EnumType>,
    scalars: IndexMap<String, ScalarType>,
    queries: IndexMap<String, Field>,
    mutations: IndexMap<String, Field>,
}

impl Schema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn assert_kind_free(&self, name: &str, kind: Kind) -> Result<(), SchemaError> {
        let taken = [
            (Kind::Type, self.types.contains_key(name)),
            (Kind::Interface, self.interfaces.contains_key(name)),
            (Kind::Union, self.unions.contains_key(name)),
            (Kind::Enum, self.enums.contains_key(name)),
            (Kind::Scalar, self.scalars.contains_key(name)),
        ]
        .into_iter()
        .any(|(other, present)| present && other != kind);

        if taken {
            Err(SchemaError::KindCollision(name.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn add_type(&mut self, typ: Type) -> Result<(), SchemaError> {
        self.assert_kind_free(&typ.name, Kind::Type)?;
        match self.types.get_mut(&typ.name) {
            Some(existing) => existing
                .merge_with(&typ)
                .map_err(|e| SchemaError::Merge(typ.name.clone(), e)),
            None => {
                self.types.insert(typ.name.clone(), typ);
                Ok(())
            }
        }
    }

    pub fn add_interface(&mut self, interface: InterfaceType) -> Result<(), SchemaError> {
        self.assert_kind_free(&interface.name, Kind::Interface)?;
        self.interfaces.insert(interface.name.clone(), interface);
        Ok(())
    }

    pub fn add_union(&mut self, union: UnionType) -> Result<(), SchemaError> {
        self.assert_kind_free(&union.name, Kind::Union)?;
        match self.unions.get_mut(&union.name) {
            Some(existing) => {
                for member in union.types.iter() {
                    existing.add_type(member);
                }
            }
            None => {
                self.unions.insert(union.name.clone(), union);
            }
        }
        Ok(())
    }

    pub fn add_enum(&mut self, enum_type: EnumType) -> Result<(), SchemaError> {
        self.assert_kind_free(&enum_type.name, Kind::Enum)?;
        self.enums.entry(enum_type.name.clone()).or_insert(enum_type);
        Ok(())
    }

    pub fn add_scalar(&mut self, scalar: ScalarType) -> Result<(), SchemaError> {
        self.assert_kind_free(&scalar.name, Kind::Scalar)?;
        self.scalars.entry(scalar.name.clone()).or_insert(scalar);
        Ok(())
    }

    pub fn add_query(&mut self, query: Field) {
        match self.queries.get_mut(&query.name) {
            Some(existing) => existing.merge_with(&query),
            None => {
                self.queries.insert(query.name.clone(), query);
            }
        }
    }

    pub fn add_mutation(&mut self, mutation: Field) {
        match self.mutations.get_mut(&mutation.name) {
            Some(existing) => existing.merge_with(&mutation),
            None => {
                self.mutations.insert(mutation.name.clone(), mutation);
            }
        }
    }

    /// Replaces a query field wholesale, keeping its registration position.
    /// Used by build passes that take a field out, rework it, and put it
    /// back without merge semantics.
    pub fn replace_query(&mut self, query: Field) {
        self.queries.insert(query.name.clone(), query);
    }

    pub fn get_type(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    pub fn get_type_mut(&mut self, name: &str) -> Option<&mut Type> {
        self.types.get_mut(name)
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get_interface(&self, name: &str) -> Option<&InterfaceType> {
        self.interfaces.get(name)
    }

    pub fn get_interface_mut(&mut self, name: &str) -> Option<&mut InterfaceType> {
        self.interfaces.get_mut(name)
    }

    pub fn get_union(&self, name: &str) -> Option<&UnionType> {
        self.unions.get(name)
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }

    pub fn get_scalar(&self, name: &str) -> Option<&ScalarType> {
        self.scalars.get(name)
    }

    pub fn get_query(&self, name: &str) -> Option<&Field> {
        self.queries.get(name)
    }

    pub fn get_mutation(&self, name: &str) -> Option<&Field> {
        self.mutations.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &Type> {
        self.types.values()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceType> {
        self.interfaces.values()
    }

    pub fn unions(&self) -> impl Iterator<Item = &UnionType> {
        self.unions.values()
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumType> {
        self.enums.values()
    }

    pub fn scalars(&self) -> impl Iterator<Item = &ScalarType> {
        self.scalars.values()
    }

    pub fn queries(&self) -> impl Iterator<Item = &Field> {
        self.queries.values()
    }

    pub fn queries_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.queries.values_mut()
    }

    pub fn mutations(&self) -> impl Iterator<Item = &Field> {
        self.mutations.values()
    }

    /// All fields across object types and root operations, for passes that
    /// rewrite return types (interface/union substitution).
    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.types
            .values_mut()
            .flat_map(|t| t.fields.values_mut())
            .chain(self.queries.values_mut())
            .chain(self.mutations.values_mut())
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        for typ in self.types.values() {
            if !typ.is_input {
                typ.validate()?;
            }
        }
        for interface in self.interfaces.values() {
            interface.validate()?;
        }
        for union in self.unions.values() {
            union.validate()?;
        }
        Ok(())
    }

    /// Deterministic hash over the whole schema, the cache key gating
    /// regeneration of downstream artifacts.
    pub fn get_signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.name);

        let mut parts: Vec<String> = vec![];
        parts.extend(self.types.values().map(|t| t.get_signature()));
        parts.extend(self.interfaces.values().map(|i| i.get_signature()));
        parts.extend(self.unions.values().map(|u| u.get_signature()));
        parts.extend(self.enums.values().map(|e| e.get_signature()));
        parts.extend(self.scalars.values().map(|s| s.get_signature()));
        parts.extend(self.queries.values().map(|q| q.signature()));
        parts.extend(self.mutations.values().map(|m| m.signature()));
        parts.sort();

        for part in parts {
            hasher.update(part);
        }

        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Type,
    Interface,
    Union,
    Enum,
    Scalar,
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplatform_test::multiplatform_test;

    #[multiplatform_test]
    fn duplicate_type_merges() {
        let mut schema = Schema::new("default");

        let mut a = Type::new("Page");
        a.add_field(Field::new("id", "ID!"));
        let mut b = Type::new("Page");
        b.add_field(Field::new("title", "String"));

        schema.add_type(a).unwrap();
        schema.add_type(b).unwrap();

        assert_eq!(schema.get_type("Page").unwrap().fields.len(), 2);
    }

    #[multiplatform_test]
    fn cross_kind_collision_is_an_error() {
        let mut schema = Schema::new("default");
        let mut typ = Type::new("Page");
        typ.add_field(Field::new("id", "ID!"));
        schema.add_type(typ).unwrap();

        let err = schema.add_union(UnionType::new("Page")).unwrap_err();
        assert!(matches!(err, SchemaError::KindCollision(name) if name == "Page"));
    }

    #[multiplatform_test]
    fn signature_is_stable_across_registration_order() {
        let build = |first: &str, second: &str| {
            let mut schema = Schema::new("default");
            for name in [first, second] {
                let mut typ = Type::new(name);
                typ.add_field(Field::new("id", "ID!"));
                schema.add_type(typ).unwrap();
            }
            schema.get_signature()
        };

        assert_eq!(build("Page", "File"), build("File", "Page"));
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Renders built schema elements as `async-graphql-parser` type
//! definitions, the form handed to the execution engine and introspection.

use async_graphql_parser::{
    Pos, Positioned,
    types::{
        BaseType, EnumType as AstEnumType, EnumValueDefinition, FieldDefinition,
        InputObjectType, InputValueDefinition, InterfaceType as AstInterfaceType, ObjectType,
        Type as AstType, TypeDefinition, TypeKind, UnionType as AstUnionType,
    },
};
use async_graphql_value::{ConstValue, Name};

use crate::schema::Schema;
use crate::type_reference::{TypeParseError, TypeReference, Wrapper};
use crate::types::{Argument, EnumType, Field, InterfaceType, ScalarType, Type, UnionType};

pub fn default_positioned<T>(value: T) -> Positioned<T> {
    Positioned::new(value, Pos::default())
}

pub fn default_positioned_name(value: &str) -> Positioned<Name> {
    default_positioned(Name::new(value))
}

pub trait FieldDefinitionProvider {
    fn field_definition(&self, schema: &Schema) -> Result<FieldDefinition, TypeParseError>;
}

pub trait TypeDefinitionProvider {
    fn type_definition(&self, schema: &Schema) -> Result<TypeDefinition, TypeParseError>;
}

fn ast_type(name: &str, path: &[Wrapper]) -> AstType {
    match path.split_first() {
        Some((Wrapper::NonNull, rest)) => {
            let mut inner = ast_type(name, rest);
            inner.nullable = false;
            inner
        }
        Some((Wrapper::List, rest)) => AstType {
            base: BaseType::List(Box::new(ast_type(name, rest))),
            nullable: true,
        },
        None => AstType {
            base: BaseType::Named(Name::new(name)),
            nullable: true,
        },
    }
}

fn parse_ast_type(type_str: &str) -> Result<(AstType, Option<Positioned<ConstValue>>), TypeParseError> {
    let reference = TypeReference::parse(type_str)?;
    let typ = ast_type(reference.named_type(), reference.wrapper_path());
    let default_value = reference.default_value().map(|raw| {
        let value = serde_json::from_str::<serde_json::Value>(raw)
            .ok()
            .and_then(|json| ConstValue::from_json(json).ok())
            .unwrap_or_else(|| ConstValue::Enum(Name::new(raw)));
        default_positioned(value)
    });
    Ok((typ, default_value))
}

fn input_value(arg: &Argument) -> Result<InputValueDefinition, TypeParseError> {
    let (typ, default_value) = parse_ast_type(&arg.typ)?;
    Ok(InputValueDefinition {
        description: None,
        name: default_positioned_name(&arg.name),
        ty: default_positioned(typ),
        default_value,
        directives: vec![],
    })
}

fn input_field(field: &Field) -> Result<InputValueDefinition, TypeParseError> {
    let (typ, default_value) = parse_ast_type(&field.typ)?;
    Ok(InputValueDefinition {
        description: None,
        name: default_positioned_name(&field.name),
        ty: default_positioned(typ),
        default_value,
        directives: vec![],
    })
}

impl FieldDefinitionProvider for Field {
    fn field_definition(&self, _schema: &Schema) -> Result<FieldDefinition, TypeParseError> {
        let (typ, _) = parse_ast_type(&self.typ)?;
        let arguments = self
            .args
            .iter()
            .map(|arg| input_value(arg).map(default_positioned))
            .collect::<Result<_, _>>()?;

        Ok(FieldDefinition {
            description: None,
            name: default_positioned_name(&self.name),
            arguments,
            ty: default_positioned(typ),
            directives: vec![],
        })
    }
}

impl TypeDefinitionProvider for Type {
    fn type_definition(&self, schema: &Schema) -> Result<TypeDefinition, TypeParseError> {
        let kind = if self.is_input {
            TypeKind::InputObject(InputObjectType {
                fields: self
                    .fields
                    .values()
                    .map(|field| input_field(field).map(default_positioned))
                    .collect::<Result<_, _>>()?,
            })
        } else {
            TypeKind::Object(ObjectType {
                implements: self
                    .interfaces
                    .iter()
                    .map(|name| default_positioned_name(name))
                    .collect(),
                fields: self
                    .fields
                    .values()
                    .map(|field| field.field_definition(schema).map(default_positioned))
                    .collect::<Result<_, _>>()?,
            })
        };

        Ok(TypeDefinition {
            extend: false,
            description: self.description.clone().map(default_positioned),
            name: default_positioned_name(&self.name),
            directives: vec![],
            kind,
        })
    }
}

impl TypeDefinitionProvider for InterfaceType {
    fn type_definition(&self, schema: &Schema) -> Result<TypeDefinition, TypeParseError> {
        Ok(TypeDefinition {
            extend: false,
            description: self.description.clone().map(default_positioned),
            name: default_positioned_name(&self.name),
            directives: vec![],
            kind: TypeKind::Interface(AstInterfaceType {
                implements: vec![],
                fields: self
                    .fields
                    .values()
                    .map(|field| field.field_definition(schema).map(default_positioned))
                    .collect::<Result<_, _>>()?,
            }),
        })
    }
}

impl TypeDefinitionProvider for UnionType {
    fn type_definition(&self, _schema: &Schema) -> Result<TypeDefinition, TypeParseError> {
        Ok(TypeDefinition {
            extend: false,
            description: self.description.clone().map(default_positioned),
            name: default_positioned_name(&self.name),
            directives: vec![],
            kind: TypeKind::Union(AstUnionType {
                members: self
                    .types
                    .iter()
                    .map(|name| default_positioned_name(name))
                    .collect(),
            }),
        })
    }
}

impl TypeDefinitionProvider for EnumType {
    fn type_definition(&self, _schema: &Schema) -> Result<TypeDefinition, TypeParseError> {
        Ok(TypeDefinition {
            extend: false,
            description: self.description.clone().map(default_positioned),
            name: default_positioned_name(&self.name),
            directives: vec![],
            kind: TypeKind::Enum(AstEnumType {
                values: self
                    .values
                    .iter()
                    .map(|(value, description)| {
                        default_positioned(EnumValueDefinition {
                            description: description.clone().map(default_positioned),
                            value: default_positioned_name(value),
                            directives: vec![],
                        })
                    })
                    .collect(),
            }),
        })
    }
}

impl TypeDefinitionProvider for ScalarType {
    fn type_definition(&self, _schema: &Schema) -> Result<TypeDefinition, TypeParseError> {
        Ok(TypeDefinition {
            extend: false,
            description: self.description.clone().map(default_positioned),
            name: default_positioned_name(&self.name),
            directives: vec![],
            kind: TypeKind::Scalar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplatform_test::multiplatform_test;

    #[multiplatform_test]
    fn wrapped_field_type() {
        let (typ, _) = parse_ast_type("[String!]!").unwrap();
        assert_eq!(typ.to_string(), "[String!]!");
    }

    #[multiplatform_test]
    fn argument_default_value() {
        let (typ, default) = parse_ast_type("Int = 5").unwrap();
        assert_eq!(typ.to_string(), "Int");
        assert_eq!(default.unwrap().node, ConstValue::from_json(5.into()).unwrap());
    }

    #[multiplatform_test]
    fn object_definition() {
        let schema = Schema::new("default");
        let mut typ = Type::new("Page");
        typ.add_field(Field::new("id", "ID!"));
        typ.add_interface("PageInterface");

        let definition = typ.type_definition(&schema).unwrap();
        assert_eq!(definition.name.node.as_str(), "Page");
        match definition.kind {
            TypeKind::Object(obj) => {
                assert_eq!(obj.fields.len(), 1);
                assert_eq!(obj.implements[0].node.as_str(), "PageInterface");
            }
            _ => panic!("expected object"),
        }
    }
}

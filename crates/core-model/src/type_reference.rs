// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Compact type-expression grammar (`String`, `[String!]!`, `Int = 5`).
//!
//! A parsed expression is a named type plus a path of wrappers ordered from
//! the outermost wrapper to the innermost, terminating at the bare name.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TypeParseError {
    #[error("Invalid type expression '{0}'")]
    Malformed(String),

    #[error("Invalid type name '{0}'")]
    InvalidName(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    List,
    NonNull,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TypeReference {
    named_type: String,
    wrapper_path: Vec<Wrapper>,
    default_value: Option<String>,
}

impl TypeReference {
    /// Parses a type expression, with an optional `= default` suffix.
    ///
    /// A single split on `=` is sufficient since the type grammar itself
    /// never contains `=`.
    pub fn parse(type_str: &str) -> Result<TypeReference, TypeParseError> {
        let (type_part, default_value) = match type_str.split_once('=') {
            Some((typ, default)) => {
                let default = default.trim();
                if default.is_empty() {
                    return Err(TypeParseError::Malformed(type_str.to_string()));
                }
                (typ.trim(), Some(default.to_string()))
            }
            None => (type_str.trim(), None),
        };

        let mut wrapper_path = vec![];
        let named_type = parse_wrappers(type_part, type_str, &mut wrapper_path)?;

        Ok(TypeReference {
            named_type,
            wrapper_path,
            default_value,
        })
    }

    pub fn from_path(named_type: &str, wrapper_path: Vec<Wrapper>) -> TypeReference {
        TypeReference {
            named_type: named_type.to_string(),
            wrapper_path,
            default_value: None,
        }
    }

    pub fn named_type(&self) -> &str {
        &self.named_type
    }

    pub fn wrapper_path(&self) -> &[Wrapper] {
        &self.wrapper_path
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn is_list(&self) -> bool {
        self.wrapper_path.contains(&Wrapper::List)
    }

    pub fn is_required(&self) -> bool {
        self.wrapper_path.contains(&Wrapper::NonNull)
    }

    /// Renders the canonical string form. Round-trips with `parse`: the
    /// output differs from the input only in whitespace around `=`.
    pub fn unparse(&self) -> String {
        let mut rendered = self.named_type.clone();
        for wrapper in self.wrapper_path.iter().rev() {
            rendered = match wrapper {
                Wrapper::NonNull => format!("{rendered}!"),
                Wrapper::List => format!("[{rendered}]"),
            };
        }
        match &self.default_value {
            Some(default) => format!("{rendered} = {default}"),
            None => rendered,
        }
    }
}

fn parse_wrappers(
    expr: &str,
    full_expr: &str,
    path: &mut Vec<Wrapper>,
) -> Result<String, TypeParseError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(TypeParseError::Malformed(full_expr.to_string()));
    }

    if let Some(inner) = expr.strip_suffix('!') {
        path.push(Wrapper::NonNull);
        return parse_wrappers(inner, full_expr, path);
    }

    if let Some(inner) = expr.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| TypeParseError::Malformed(full_expr.to_string()))?;
        path.push(Wrapper::List);
        return parse_wrappers(inner, full_expr, path);
    }

    if expr.contains(['[', ']']) {
        return Err(TypeParseError::Malformed(full_expr.to_string()));
    }

    assert_valid_name(expr)?;
    Ok(expr.to_string())
}

fn assert_valid_name(name: &str) -> Result<(), TypeParseError> {
    let mut chars = name.chars();
    let leading_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if leading_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(TypeParseError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplatform_test::multiplatform_test;

    #[multiplatform_test]
    fn plain_name() {
        let typ = TypeReference::parse("String").unwrap();
        assert_eq!(typ.named_type(), "String");
        assert!(typ.wrapper_path().is_empty());
        assert!(!typ.is_list());
        assert!(!typ.is_required());
    }

    #[multiplatform_test]
    fn wrapped_types() {
        let typ = TypeReference::parse("[String!]!").unwrap();
        assert_eq!(typ.named_type(), "String");
        assert_eq!(
            typ.wrapper_path(),
            &[Wrapper::NonNull, Wrapper::List, Wrapper::NonNull]
        );
        assert!(typ.is_list());
        assert!(typ.is_required());
    }

    #[multiplatform_test]
    fn default_value() {
        let typ = TypeReference::parse("Int = 5").unwrap();
        assert_eq!(typ.named_type(), "Int");
        assert_eq!(typ.default_value(), Some("5"));
        assert_eq!(typ.unparse(), "Int = 5");
    }

    #[multiplatform_test]
    fn round_trip() {
        for s in ["String", "String!", "[String]", "[String!]!", "[[Int]!]"] {
            assert_eq!(TypeReference::parse(s).unwrap().unparse(), s);
        }
        // whitespace around `=` is normalized
        assert_eq!(
            TypeReference::parse("Int=5").unwrap().unparse(),
            "Int = 5"
        );
    }

    #[multiplatform_test]
    fn from_path_round_trip() {
        let typ = TypeReference::parse("[Foo!]!").unwrap();
        let rebuilt = TypeReference::from_path(typ.named_type(), typ.wrapper_path().to_vec());
        assert_eq!(rebuilt.unparse(), "[Foo!]!");
    }

    #[multiplatform_test]
    fn malformed() {
        for s in ["", "[String", "String]", "[String]]", "Foo Bar", "Int ="] {
            assert!(TypeReference::parse(s).is_err(), "expected error for {s:?}");
        }
    }
}

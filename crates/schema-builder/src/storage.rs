// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Persistence of built schemas: a signature-gated cache keyed by schema
//! name.
//!
//! The on-disk layout is a fixed prefix tag, a length-prefixed header
//! (postcard), then the postcard-encoded payload. The header length is
//! written as a little-endian u64 so the format is independent of the
//! platform's pointer width.

use bytes::{Buf, Bytes};
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_model::schema::Schema;

use crate::error::SchemaBuildError;

const PREFIX_TAG: &[u8] = b"gqlschema";
const PREFIX_TAG_LEN: usize = PREFIX_TAG.len();

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
struct Header {
    format_version: String,
}

impl Header {
    fn new() -> Header {
        Header {
            format_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn check(&self, other: &Header) -> Result<(), String> {
        if self.format_version != other.format_version {
            return Err(format!(
                "Schema file version {0} does not match current version {1}",
                other.format_version, self.format_version
            ));
        }
        Ok(())
    }
}

/// A built schema in its persistable form: the schema plus the signature it
/// was built with. Construction fails when any resolver is an inline
/// closure, before any bytes are written.
#[derive(Serialize, Deserialize, Debug)]
pub struct StoreableSchema {
    pub signature: String,
    pub schema: Schema,
}

impl StoreableSchema {
    pub fn from_schema(schema: Schema) -> Result<StoreableSchema, SchemaBuildError> {
        assert_serializable(&schema)?;
        let signature = schema.get_signature();
        Ok(StoreableSchema { signature, schema })
    }
}

fn assert_serializable(schema: &Schema) -> Result<(), SchemaBuildError> {
    let fields = schema
        .types()
        .flat_map(|t| t.fields.values())
        .chain(schema.queries())
        .chain(schema.mutations());

    for field in fields {
        if !field.resolver.is_serializable() {
            return Err(SchemaBuildError::UnserializableResolver(field.name.clone()));
        }
    }
    for typ in schema.types() {
        if let Some(resolver) = &typ.field_resolver {
            if !resolver.is_serializable() {
                return Err(SchemaBuildError::UnserializableResolver(typ.name.clone()));
            }
        }
    }
    for interface in schema.interfaces() {
        if let Some(resolver) = &interface.type_resolver {
            if !resolver.is_serializable() {
                return Err(SchemaBuildError::UnserializableResolver(
                    interface.name.clone(),
                ));
            }
        }
    }
    for union in schema.unions() {
        if let Some(resolver) = &union.type_resolver {
            if !resolver.is_serializable() {
                return Err(SchemaBuildError::UnserializableResolver(union.name.clone()));
            }
        }
    }
    Ok(())
}

/// Serialize and deserialize the underlying type. The wire format carries a
/// version header; loading a file written by a different version fails
/// instead of misreading it.
pub trait SchemaSerializer {
    type Underlying;

    fn serialize(&self) -> Result<Vec<u8>, SchemaBuildError>;

    fn deserialize_reader(reader: impl std::io::Read)
        -> Result<Self::Underlying, SchemaBuildError>;

    fn deserialize(bytes: Vec<u8>) -> Result<Self::Underlying, SchemaBuildError> {
        Self::deserialize_reader(Bytes::from(bytes).reader())
    }
}

impl SchemaSerializer for StoreableSchema {
    type Underlying = Self;

    fn serialize(&self) -> Result<Vec<u8>, SchemaBuildError> {
        let header = postcard::to_stdvec(&Header::new())
            .map_err(|e| SchemaBuildError::Serialize(e.to_string()))?;
        let header_len: u64 = u64::try_from(header.len())
            .map_err(|e| SchemaBuildError::Serialize(e.to_string()))?;
        let payload = postcard::to_stdvec(self)
            .map_err(|e| SchemaBuildError::Serialize(e.to_string()))?;

        Ok([
            PREFIX_TAG.to_vec(),
            header_len.to_le_bytes().to_vec(),
            header,
            payload,
        ]
        .concat())
    }

    fn deserialize_reader(
        mut reader: impl std::io::Read,
    ) -> Result<Self::Underlying, SchemaBuildError> {
        fn error(msg: &str, io_error: Option<std::io::Error>) -> SchemaBuildError {
            SchemaBuildError::Deserialize(match io_error {
                Some(e) => format!("{msg}: {e}"),
                None => msg.to_string(),
            })
        }

        {
            let mut prefix = [0_u8; PREFIX_TAG_LEN];
            reader
                .read_exact(&mut prefix)
                .map_err(|e| error("Failed to read schema file prefix", Some(e)))?;
            if prefix != PREFIX_TAG {
                return Err(error("Invalid schema file prefix", None));
            }
        }

        let header_len = {
            let mut header_len = [0_u8; std::mem::size_of::<u64>()];
            reader
                .read_exact(&mut header_len)
                .map_err(|e| error("Failed to read schema file header size", Some(e)))?;
            u64::from_le_bytes(header_len)
        };
        let header_len = usize::try_from(header_len)
            .map_err(|_| error("Failed to convert the header size to usize", None))?;

        let mut header_bytes = vec![0_u8; header_len];
        reader
            .read_exact(&mut header_bytes)
            .map_err(|e| error("Failed to read the schema file header", Some(e)))?;
        let header: Header = postcard::from_bytes(&header_bytes)
            .map_err(|e| SchemaBuildError::Deserialize(e.to_string()))?;
        Header::new().check(&header).map_err(|e| error(&e, None))?;

        let mut payload = vec![];
        reader
            .read_to_end(&mut payload)
            .map_err(|e| error("Failed to read the schema payload", Some(e)))?;
        postcard::from_bytes(&payload).map_err(|e| SchemaBuildError::Deserialize(e.to_string()))
    }
}

/// Where serialized schemas live. The production system writes generated
/// artifacts to the code cache; tests use the in-memory implementation.
pub trait SchemaStorage {
    fn exists(&self, key: &str) -> bool;

    fn persist(&mut self, key: &str, storeable: &StoreableSchema) -> Result<(), SchemaBuildError>;

    fn load(&self, key: &str) -> Result<Option<StoreableSchema>, SchemaBuildError>;
}

/// Persists a schema unless the stored copy already carries the same
/// signature. Returns whether anything was written.
pub fn persist_if_changed(
    storage: &mut dyn SchemaStorage,
    key: &str,
    schema: Schema,
) -> Result<bool, SchemaBuildError> {
    let storeable = StoreableSchema::from_schema(schema)?;

    if let Some(existing) = storage.load(key)? {
        if existing.signature == storeable.signature {
            debug!(key, "schema signature unchanged, skipping regeneration");
            return Ok(false);
        }
    }

    storage.persist(key, &storeable)?;
    Ok(true)
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: indexmap::IndexMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchemaStorage for MemoryStorage {
    fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn persist(&mut self, key: &str, storeable: &StoreableSchema) -> Result<(), SchemaBuildError> {
        // fully qualified: the serde derive on StoreableSchema exposes a
        // `serialize` of the same name
        let bytes = SchemaSerializer::serialize(storeable)?;
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<StoreableSchema>, SchemaBuildError> {
        match self.entries.get(key) {
            Some(bytes) => {
                <StoreableSchema as SchemaSerializer>::deserialize(bytes.clone()).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::types::{Field, ResolverRef, Type};
    use multiplatform_test::multiplatform_test;

    fn schema() -> Schema {
        let mut schema = Schema::new("default");
        let mut page = Type::new("Page");
        page.add_field(Field::new("id", "ID!"));
        schema.add_type(page).unwrap();

        let mut query = Field::new("readPages", "[Page!]!");
        query.resolver.default_resolver =
            Some(ResolverRef::named("model_resolvers", "read_list"));
        schema.add_query(query);
        schema
    }

    #[multiplatform_test]
    fn round_trips_through_bytes() {
        let storeable = StoreableSchema::from_schema(schema()).unwrap();
        let bytes = SchemaSerializer::serialize(&storeable).unwrap();
        assert!(bytes.starts_with(PREFIX_TAG));

        let restored = <StoreableSchema as SchemaSerializer>::deserialize(bytes).unwrap();
        assert_eq!(restored.signature, storeable.signature);
        assert!(restored.schema.has_type("Page"));
        assert_eq!(restored.schema.get_signature(), storeable.signature);
    }

    #[multiplatform_test]
    fn rejects_foreign_bytes() {
        let err = <StoreableSchema as SchemaSerializer>::deserialize(b"not a schema file".to_vec())
            .unwrap_err();
        assert!(matches!(err, SchemaBuildError::Deserialize(_)));
    }

    #[multiplatform_test]
    fn inline_closure_fails_persistence() {
        let mut schema = schema();
        let mut query = Field::new("adhoc", "Page");
        query.resolver.default_resolver = Some(ResolverRef::InlineClosure {
            context: "request".to_string(),
        });
        schema.add_query(query);

        let err = StoreableSchema::from_schema(schema).unwrap_err();
        assert!(matches!(err, SchemaBuildError::UnserializableResolver(name)
            if name == "adhoc"));
    }

    #[multiplatform_test]
    fn unchanged_signature_skips_regeneration() {
        let mut storage = MemoryStorage::new();

        assert!(persist_if_changed(&mut storage, "default", schema()).unwrap());
        assert!(!persist_if_changed(&mut storage, "default", schema()).unwrap());

        let mut changed = schema();
        let mut file = Type::new("File");
        file.add_field(Field::new("id", "ID!"));
        changed.add_type(file).unwrap();
        assert!(persist_if_changed(&mut storage, "default", changed).unwrap());
    }
}

//! Field schema extraction.
//!
//! A settings struct is inspected by driving its derived `Deserialize` impl
//! with a probing deserializer. The derive reports its serde field names in
//! declaration order and requests one primitive per field, which is enough to
//! classify every field without looking at the record's current values. An
//! empty `Vec<f32>` is rejected just like a populated one.
//!
//! The probe answers each request with a zero value, so deserialization runs
//! to completion and the throwaway record is dropped.

use std::collections::HashSet;
use std::fmt;

use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};

use crate::error::FlagfigError;
use crate::types::{FieldDescriptor, SemanticType};

/// Keys owned by the loader itself.
pub const RESERVED_KEYS: [&str; 3] = ["config", "config-dirs", "help"];

/// Ordered set of bindable fields of a settings struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Extract the schema of `T` and validate its keys.
    pub fn of<T: DeserializeOwned>() -> Result<Self, FlagfigError> {
        let mut fields = Vec::new();
        T::deserialize(RecordProbe { out: &mut fields }).map_err(ProbeError::into_flagfig)?;
        let schema = Schema {
            fields: fields
                .into_iter()
                .map(|(key, kind)| FieldDescriptor {
                    key,
                    description: None,
                    kind,
                })
                .collect(),
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Attach help text to a field.
    pub fn describe(&mut self, key: &str, description: &str) -> Result<(), FlagfigError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.key == key)
            .ok_or_else(|| FlagfigError::KeyNotFound(key.to_string()))?;
        field.description = Some(description.to_string());
        Ok(())
    }

    fn validate(&self) -> Result<(), FlagfigError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            let key = field.key.as_str();
            if key.is_empty() {
                return Err(FlagfigError::EmptyKey);
            }
            if RESERVED_KEYS.contains(&key) {
                return Err(FlagfigError::ReservedKey(key.to_string()));
            }
            if key.starts_with('-') || key.contains('=') || key.chars().any(char::is_whitespace) {
                return Err(FlagfigError::InvalidKey(key.to_string()));
            }
            if !seen.insert(key) {
                return Err(FlagfigError::DuplicateKey(key.to_string()));
            }
        }
        Ok(())
    }
}

// --- Probe error ---

#[derive(Debug)]
enum ProbeError {
    NotARecord(&'static str),
    Nested(String),
    Unsupported { key: String, found: &'static str },
    UnsupportedElement { key: String, found: &'static str },
    Custom(String),
}

impl ProbeError {
    fn into_flagfig(self) -> FlagfigError {
        match self {
            ProbeError::NotARecord(found) => FlagfigError::NotARecord {
                found: found.to_string(),
            },
            ProbeError::Nested(key) => FlagfigError::NestedRecord { key },
            ProbeError::Unsupported { key, found } => FlagfigError::UnsupportedType {
                key,
                found: found.to_string(),
            },
            ProbeError::UnsupportedElement { key, found } => {
                FlagfigError::UnsupportedListElement {
                    key,
                    found: found.to_string(),
                }
            }
            // Raised by the derive itself, e.g. a custom `Deserialize` impl
            // that rejects zero values.
            ProbeError::Custom(msg) => FlagfigError::NotARecord { found: msg },
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::NotARecord(found) => write!(f, "not a record: {found}"),
            ProbeError::Nested(key) => write!(f, "nested record at '{key}'"),
            ProbeError::Unsupported { key, found } => write!(f, "'{key}' has type {found}"),
            ProbeError::UnsupportedElement { key, found } => {
                write!(f, "'{key}' is a list of {found}")
            }
            ProbeError::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ProbeError {}

impl de::Error for ProbeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ProbeError::Custom(msg.to_string())
    }
}

// --- Record level ---

struct RecordProbe<'a> {
    out: &'a mut Vec<(String, SemanticType)>,
}

impl<'de, 'a> de::Deserializer<'de> for RecordProbe<'a> {
    type Error = ProbeError;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(ProbeError::NotARecord("a non-struct type"))
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(ProbeError::NotARecord("a map or flattened struct"))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_map(FieldAccess {
            fields,
            index: 0,
            out: self.out,
        })
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct seq tuple tuple_struct enum
        identifier ignored_any
    }
}

struct FieldAccess<'a> {
    fields: &'static [&'static str],
    index: usize,
    out: &'a mut Vec<(String, SemanticType)>,
}

impl<'de, 'a> MapAccess<'de> for FieldAccess<'a> {
    type Error = ProbeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        let Some(name) = self.fields.get(self.index) else {
            return Ok(None);
        };
        let name: de::value::StrDeserializer<'_, ProbeError> = (*name).into_deserializer();
        seed.deserialize(name).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Self::Error> {
        let key = self.fields[self.index];
        self.index += 1;

        let mut kind = None;
        let value = seed.deserialize(FieldProbe {
            key,
            kind: &mut kind,
        })?;
        let kind = kind.ok_or(ProbeError::Unsupported {
            key: key.to_string(),
            found: "an unrecognized type",
        })?;
        self.out.push((key.to_string(), kind));
        Ok(value)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len() - self.index)
    }
}

// --- Field level ---

struct FieldProbe<'a> {
    key: &'static str,
    kind: &'a mut Option<SemanticType>,
}

impl<'a> FieldProbe<'a> {
    fn unsupported<T>(&self, found: &'static str) -> Result<T, ProbeError> {
        Err(ProbeError::Unsupported {
            key: self.key.to_string(),
            found,
        })
    }
}

impl<'de, 'a> de::Deserializer<'de> for FieldProbe<'a> {
    type Error = ProbeError;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("a self-describing value")
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        *self.kind = Some(SemanticType::Bool);
        visitor.visit_bool(false)
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        *self.kind = Some(SemanticType::Int);
        visitor.visit_i64(0)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        *self.kind = Some(SemanticType::Int64);
        visitor.visit_i64(0)
    }

    fn deserialize_i128<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("i128")
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_u128<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("u128")
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        *self.kind = Some(SemanticType::Float64);
        visitor.visit_f64(0.0)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_f32(visitor)
    }

    fn deserialize_char<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("char")
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        *self.kind = Some(SemanticType::String);
        visitor.visit_str("")
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("Option")
    }

    fn deserialize_unit<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("()")
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let mut element = None;
        let value = visitor.visit_seq(ElementAccess {
            key: self.key,
            element: &mut element,
            yielded: false,
        })?;
        let list = match element {
            Some(SemanticType::String) => SemanticType::StringList,
            Some(SemanticType::Int | SemanticType::Int64) => SemanticType::IntList,
            Some(SemanticType::Bool) => SemanticType::BoolList,
            _ => return self.unsupported("a sequence"),
        };
        *self.kind = Some(list);
        Ok(value)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("a tuple")
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("a map")
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(ProbeError::Nested(self.key.to_string()))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.unsupported("an enum")
    }

    serde::forward_to_deserialize_any! {
        bytes byte_buf unit_struct tuple_struct identifier ignored_any
    }
}

// --- List element level ---

struct ElementAccess<'a> {
    key: &'static str,
    element: &'a mut Option<SemanticType>,
    yielded: bool,
}

impl<'de, 'a> SeqAccess<'de> for ElementAccess<'a> {
    type Error = ProbeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        if self.yielded {
            return Ok(None);
        }
        self.yielded = true;
        seed.deserialize(ElementProbe {
            key: self.key,
            element: &mut *self.element,
        })
        .map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(usize::from(!self.yielded))
    }
}

struct ElementProbe<'a> {
    key: &'static str,
    element: &'a mut Option<SemanticType>,
}

impl<'a> ElementProbe<'a> {
    fn unsupported<T>(&self, found: &'static str) -> Result<T, ProbeError> {
        Err(ProbeError::UnsupportedElement {
            key: self.key.to_string(),
            found,
        })
    }
}

impl<'de, 'a> de::Deserializer<'de> for ElementProbe<'a> {
    type Error = ProbeError;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("an unsupported element type")
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        *self.element = Some(SemanticType::Bool);
        visitor.visit_bool(false)
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        *self.element = Some(SemanticType::Int);
        visitor.visit_i64(0)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_i8(visitor)
    }

    fn deserialize_i128<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("i128")
    }

    fn deserialize_u128<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("u128")
    }

    fn deserialize_f32<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("f32")
    }

    fn deserialize_f64<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("f64")
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        *self.element = Some(SemanticType::String);
        visitor.visit_str("")
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        self.unsupported("lists")
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.unsupported("structs")
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    serde::forward_to_deserialize_any! {
        char bytes byte_buf option unit unit_struct tuple tuple_struct map
        enum identifier ignored_any
    }
}

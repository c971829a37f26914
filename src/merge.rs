//! Precedence resolution and write-back.
//!
//! Each source answers `lookup(field)` for a single field. Sources are passed
//! highest priority first and the first one that answers wins. A field no
//! source knows about keeps its current value.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use toml::{Table, Value};
use tracing::debug;

use crate::coerce::{RawValue, coerce};
use crate::error::FlagfigError;
use crate::schema::Schema;
use crate::types::{FieldDescriptor, SemanticType};

/// A provider of raw values, queried per field.
pub trait Source {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn lookup(&self, field: &FieldDescriptor) -> Option<RawValue>;
}

/// Resolve every schema field against `sources` on top of `base`.
///
/// Fields are processed in schema order and the first coercion error aborts
/// the whole resolution.
pub fn resolve(schema: &Schema, sources: &[&dyn Source], mut base: Table) -> Result<Table, FlagfigError> {
    for field in schema.fields() {
        let Some((source, raw)) = sources
            .iter()
            .find_map(|s| s.lookup(field).map(|raw| (s.name(), raw)))
        else {
            continue;
        };
        let value = coerce(field, &raw)?;
        debug!(key = %field.key, source, "resolved");
        base.insert(field.key.clone(), value);
    }
    Ok(base)
}

/// Serialize `record` into a table keyed by its serde field names.
pub fn to_table<T: Serialize>(record: &T) -> Result<Table, FlagfigError> {
    match Value::try_from(record) {
        Ok(Value::Table(table)) => Ok(table),
        Ok(other) => Err(FlagfigError::NotARecord {
            found: other.type_str().to_string(),
        }),
        Err(e) => Err(unsigned_overflow(record)
            .unwrap_or_else(|| FlagfigError::InvalidValue(e.to_string()))),
    }
}

/// TOML integers are signed 64-bit. Name the unsigned field whose current
/// value does not fit, if that is why serialization failed.
fn unsigned_overflow<T: Serialize>(record: &T) -> Option<FlagfigError> {
    let serde_json::Value::Object(fields) = serde_json::to_value(record).ok()? else {
        return None;
    };
    fields.into_iter().find_map(|(key, value)| match value {
        serde_json::Value::Number(n) if n.is_u64() && !n.is_i64() => Some(FlagfigError::Coercion {
            key,
            value: n.to_string(),
            expected: SemanticType::Int64,
        }),
        _ => None,
    })
}

/// Merge all sources into `record`. The record is updated only if every
/// field resolves and the merged table deserializes; otherwise it is left
/// as it was. Fields serde skips keep their current values.
pub fn apply<T>(schema: &Schema, sources: &[&dyn Source], record: &mut T) -> Result<(), FlagfigError>
where
    T: Serialize + DeserializeOwned,
{
    let invalid = |e: toml::de::Error| FlagfigError::InvalidValue(e.to_string());

    let merged = Value::Table(resolve(schema, sources, to_table(record)?)?);
    // Dry run into a scratch value: the in-place pass below may have written
    // some fields by the time it fails.
    let _: T = merged.clone().try_into().map_err(invalid)?;
    T::deserialize_in_place(merged, record).map_err(invalid)
}

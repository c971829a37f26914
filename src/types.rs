use std::fmt;

/// The binding kind of a settings field. Decides how every source's raw value
/// is parsed before it is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    String,
    /// Integers up to 32 bits wide.
    Int,
    /// 64-bit and wider integers.
    Int64,
    Float64,
    Bool,
    StringList,
    IntList,
    BoolList,
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticType::String => "string",
            SemanticType::Int => "integer",
            SemanticType::Int64 => "64-bit integer",
            SemanticType::Float64 => "float",
            SemanticType::Bool => "boolean",
            SemanticType::StringList => "list of strings",
            SemanticType::IntList => "list of integers",
            SemanticType::BoolList => "list of booleans",
        };
        f.write_str(name)
    }
}

/// One bindable field of a settings struct.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// The serde name of the field. Doubles as flag name, env var stem and
    /// dotted file key.
    pub key: String,
    /// Help text shown by `--help`.
    pub description: Option<String>,
    pub kind: SemanticType,
}

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Name of the primary key field when the entity binding does not override it.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Format version of [`EntityDescriptor`]. Bump whenever the descriptor layout
/// or the way declarations are built changes, so cached copies are rebuilt.
pub const DESCRIPTOR_VERSION: u32 = 5;

/// Every field type an entity declaration may use.
///
/// The set is closed: declarations naming anything else are rejected while
/// they are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Number,
    String,
    Date,
    Datetime,
    Time,
    Integer,
    Boolean,
    Float,
    Double,
    Natural,
    Ref,
    Email,
    Password,
    Phone,
    Url,
    Ip,
    Enum,
    State,
    Object,
    City,
    PostalCode,
    Slug,
}

/// Storage family of a field type, which decides its column affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    String,
    Numeric,
    Date,
    Datetime,
}

impl FieldType {
    pub const ALL: [FieldType; 22] = [
        FieldType::Number,
        FieldType::String,
        FieldType::Date,
        FieldType::Datetime,
        FieldType::Time,
        FieldType::Integer,
        FieldType::Boolean,
        FieldType::Float,
        FieldType::Double,
        FieldType::Natural,
        FieldType::Ref,
        FieldType::Email,
        FieldType::Password,
        FieldType::Phone,
        FieldType::Url,
        FieldType::Ip,
        FieldType::Enum,
        FieldType::State,
        FieldType::Object,
        FieldType::City,
        FieldType::PostalCode,
        FieldType::Slug,
    ];

    /// Resolve the name used in declarations (`string`, `postalcode`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldType::Number => "number",
            FieldType::String => "string",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Time => "time",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Natural => "natural",
            FieldType::Ref => "ref",
            FieldType::Email => "email",
            FieldType::Password => "password",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::Ip => "ip",
            FieldType::Enum => "enum",
            FieldType::State => "state",
            FieldType::Object => "object",
            FieldType::City => "city",
            FieldType::PostalCode => "postalcode",
            FieldType::Slug => "slug",
        }
    }

    pub fn family(self) -> TypeFamily {
        match self {
            FieldType::Number
            | FieldType::Integer
            | FieldType::Boolean
            | FieldType::Float
            | FieldType::Double
            | FieldType::Natural
            | FieldType::Ref
            | FieldType::PostalCode => TypeFamily::Numeric,
            FieldType::Date => TypeFamily::Date,
            FieldType::Datetime => TypeFamily::Datetime,
            FieldType::String
            | FieldType::Time
            | FieldType::Email
            | FieldType::Password
            | FieldType::Phone
            | FieldType::Url
            | FieldType::Ip
            | FieldType::Enum
            | FieldType::State
            | FieldType::Object
            | FieldType::City
            | FieldType::Slug => TypeFamily::String,
        }
    }

    /// Password columns store hashes, their width is bounded regardless of the declared max.
    pub fn is_password(self) -> bool {
        matches!(self, FieldType::Password)
    }

    pub fn is_writable_by_default(self) -> bool {
        true
    }

    pub fn is_nullable_by_default(self) -> bool {
        false
    }

    /// Build the arguments of a field of this type from its raw declaration
    /// arguments, applying the type defaults first.
    ///
    /// Empty raw arguments keep the default value.
    pub fn parse_args(self, field: &str, raw: &[String]) -> Result<FieldArgs, ConfigError> {
        let raw: Vec<Option<&str>> = raw
            .iter()
            .map(|arg| {
                let arg = arg.trim();
                (!arg.is_empty()).then_some(arg)
            })
            .collect();
        let at = |index: usize| raw.get(index).copied().flatten();
        let given = |index: usize| index < raw.len();
        let number = |index: usize, argument: &'static str| -> Result<Option<i64>, ConfigError> {
            at(index).map(|value| parse_number(field, argument, value)).transpose()
        };
        let decimals = |index: usize| -> Result<Option<u32>, ConfigError> {
            at(index)
                .map(|value| {
                    value.parse::<u32>().map_err(|_| ConfigError::InvalidArgument {
                        field: field.to_string(),
                        argument: "decimals",
                        value: value.to_string(),
                    })
                })
                .transpose()
        };

        let mut args = FieldArgs::default();
        match self {
            FieldType::Number => {
                args.set_range(-2_147_483_648, 2_147_483_647);
                if given(2) {
                    args.decimals = decimals(0)?.unwrap_or(args.decimals);
                    args.min = number(1, "min")?.or(args.min);
                    args.max = number(2, "max")?.or(args.max);
                } else if given(1) {
                    args.min = number(0, "min")?.or(args.min);
                    args.max = number(1, "max")?.or(args.max);
                } else {
                    args.max = number(0, "max")?.or(args.max);
                }
            }
            FieldType::Integer => {
                args.set_range(-2_147_483_648, 2_147_483_647);
                if given(1) {
                    args.min = number(0, "min")?.or(args.min);
                    args.max = number(1, "max")?.or(args.max);
                } else {
                    args.max = number(0, "max")?.or(args.max);
                }
            }
            FieldType::Natural => {
                args.set_range(0, 4_294_967_295);
                args.max = number(0, "max")?.or(args.max);
            }
            FieldType::Ref => {
                args.set_range(0, 4_294_967_295);
                args.entity = at(0).map(str::to_string);
            }
            FieldType::Boolean => args.set_range(0, 1),
            FieldType::PostalCode => args.set_range(10_000, 99_999),
            FieldType::Float | FieldType::Double => {
                args.set_range(-2_147_483_648, 2_147_483_647);
                args.decimals = if self == FieldType::Double { 8 } else { 2 };
                if given(2) {
                    args.decimals = decimals(0)?.unwrap_or(args.decimals);
                    args.min = number(1, "min")?.or(args.min);
                    args.max = number(2, "max")?.or(args.max);
                } else if given(1) {
                    args.min = number(0, "min")?.or(args.min);
                    args.max = number(1, "max")?.or(args.max);
                } else {
                    args.decimals = decimals(0)?.unwrap_or(args.decimals);
                }
            }
            FieldType::String | FieldType::Password => {
                if self == FieldType::Password {
                    args.set_range(5, 128);
                } else {
                    args.set_range(0, 65_535);
                }
                if given(1) {
                    args.min = number(0, "min")?.or(args.min);
                    args.max = number(1, "max")?.or(args.max);
                } else {
                    args.max = number(0, "max")?.or(args.max);
                }
            }
            FieldType::Email => args.set_range(5, 100),
            FieldType::Time => args.set_range(5, 5),
            FieldType::Phone => args.set_range(10, 20),
            FieldType::City => args.set_range(3, 30),
            FieldType::Url => args.set_range(0, 255),
            FieldType::Ip => {
                args.set_range(7, 40);
                args.version = at(0).map(str::to_string);
            }
            FieldType::Enum | FieldType::State => {
                args.set_range(1, 50);
                args.source = at(0).map(str::to_string);
            }
            FieldType::Object => {
                args.set_range(1, 65_535);
                args.class = at(0).filter(|class| *class != "stdClass").map(str::to_string);
            }
            FieldType::Slug => {
                args.set_range(0, 100);
                args.field = Some("name".to_string());
                if let Some(other) = at(0) {
                    args.field = Some(other.to_string());
                }
                if given(2) {
                    args.min = number(1, "min")?.or(args.min);
                    args.max = number(2, "max")?.or(args.max);
                } else if given(1) {
                    args.max = number(1, "max")?.or(args.max);
                }
            }
            FieldType::Date | FieldType::Datetime => {}
        }
        Ok(args)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts integers and decimal notation; decimals are truncated toward zero.
fn parse_number(field: &str, argument: &'static str, value: &str) -> Result<i64, ConfigError> {
    if let Ok(parsed) = value.parse::<i64>() {
        return Ok(parsed);
    }
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed.trunc() as i64),
        _ => Err(ConfigError::InvalidArgument {
            field: field.to_string(),
            argument,
            value: value.to_string(),
        }),
    }
}

/// Type-specific arguments of a field.
///
/// Which members are meaningful depends on the field type: strings use
/// `min`/`max` as lengths, numbers as value bounds with `decimals`, references
/// name their target `entity`, enums their value `source`, and so on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldArgs {
    pub min: Option<i64>,
    pub max: Option<i64>,
    #[serde(default)]
    pub decimals: u32,
    pub source: Option<String>,
    pub class: Option<String>,
    pub entity: Option<String>,
    pub field: Option<String>,
    pub version: Option<String>,
}

impl FieldArgs {
    fn set_range(&mut self, min: i64, max: i64) {
        self.min = Some(min);
        self.max = Some(max);
    }
}

/// Value assigned to a field left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    Bool(bool),
    Literal(String),
    /// Reference to a named application constant, resolved when the default is used.
    Constant(String),
    /// Deferred call such as `now()`, evaluated when the default is used.
    Call { function: String, args: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub args: FieldArgs,
    pub default: Option<DefaultValue>,
    pub writable: bool,
    pub nullable: bool,
}

impl FieldDescriptor {
    /// Create a field with the type's default arguments and flags.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Result<Self, ConfigError> {
        let name = name.into();
        let args = field_type.parse_args(&name, &[])?;
        Ok(Self {
            name,
            field_type,
            args,
            default: None,
            writable: field_type.is_writable_by_default(),
            nullable: field_type.is_nullable_by_default(),
        })
    }

    /// Primary key field: a natural-number reference, auto-assigned, never
    /// writable and never nullable.
    pub fn id(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Ref,
            args: FieldArgs {
                min: Some(0),
                max: Some(4_294_967_295),
                ..FieldArgs::default()
            },
            default: None,
            writable: false,
            nullable: false,
        }
    }

    pub fn with_args(mut self, args: FieldArgs) -> Self {
        self.args = args;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Kind of a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexKind {
    Index,
    Unique,
    Fulltext,
}

impl IndexKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INDEX" => Some(IndexKind::Index),
            "UNIQUE" => Some(IndexKind::Unique),
            "FULLTEXT" => Some(IndexKind::Fulltext),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            IndexKind::Index => "INDEX",
            IndexKind::Unique => "UNIQUE",
            IndexKind::Fulltext => "FULLTEXT",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Index declared on an entity. Field order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: Option<String>,
    pub kind: IndexKind,
    pub fields: Vec<String>,
}

impl IndexDescriptor {
    pub fn new(kind: IndexKind, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: None,
            kind,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Fully resolved description of an entity: parents merged, id field injected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub class: Option<String>,
    pub version: u32,
    pub table: Option<String>,
    pub id_field: String,
    /// Declaration order is the column order of `CREATE TABLE`.
    pub fields: IndexMap<String, FieldDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
    pub is_abstract: bool,
}

impl EntityDescriptor {
    /// Create a descriptor holding only its id field.
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = IndexMap::new();
        fields.insert(DEFAULT_ID_FIELD.to_string(), FieldDescriptor::id(DEFAULT_ID_FIELD));
        Self {
            name: name.into(),
            class: None,
            version: DESCRIPTOR_VERSION,
            table: None,
            id_field: DEFAULT_ID_FIELD.to_string(),
            fields,
            indexes: Vec::new(),
            is_abstract: false,
        }
    }

    /// Table backing this entity; the entity name unless overridden.
    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Add or replace a field. A replaced field keeps its position.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn with_index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_every_type_name_resolves() {
        for ty in FieldType::ALL {
            assert_eq!(FieldType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(FieldType::from_name("blob"), None);
    }

    #[test]
    fn test_families() {
        assert_eq!(FieldType::Password.family(), TypeFamily::String);
        assert_eq!(FieldType::Time.family(), TypeFamily::String);
        assert_eq!(FieldType::Ref.family(), TypeFamily::Numeric);
        assert_eq!(FieldType::PostalCode.family(), TypeFamily::Numeric);
        assert_eq!(FieldType::Date.family(), TypeFamily::Date);
        assert_eq!(FieldType::Datetime.family(), TypeFamily::Datetime);
    }

    #[test]
    fn test_number_args_positions() {
        let one = FieldType::Number.parse_args("n", &raw(&["500"])).unwrap();
        assert_eq!((one.min, one.max, one.decimals), (Some(-2_147_483_648), Some(500), 0));

        let two = FieldType::Number.parse_args("n", &raw(&["-5", "5"])).unwrap();
        assert_eq!((two.min, two.max), (Some(-5), Some(5)));

        let three = FieldType::Number.parse_args("n", &raw(&["2", "0", "100"])).unwrap();
        assert_eq!((three.decimals, three.min, three.max), (2, Some(0), Some(100)));
    }

    #[test]
    fn test_float_single_argument_is_decimals() {
        let args = FieldType::Float.parse_args("price", &raw(&["4"])).unwrap();
        assert_eq!(args.decimals, 4);
        assert_eq!(args.max, Some(2_147_483_647));

        let double = FieldType::Double.parse_args("ratio", &[]).unwrap();
        assert_eq!(double.decimals, 8);
    }

    #[test]
    fn test_string_and_password_defaults() {
        let string = FieldType::String.parse_args("s", &[]).unwrap();
        assert_eq!((string.min, string.max), (Some(0), Some(65_535)));

        let password = FieldType::Password.parse_args("p", &[]).unwrap();
        assert_eq!((password.min, password.max), (Some(5), Some(128)));

        let bounded = FieldType::String.parse_args("s", &raw(&["3", "40"])).unwrap();
        assert_eq!((bounded.min, bounded.max), (Some(3), Some(40)));
    }

    #[test]
    fn test_fixed_argument_types_ignore_raw() {
        let email = FieldType::Email.parse_args("e", &raw(&["999"])).unwrap();
        assert_eq!((email.min, email.max), (Some(5), Some(100)));
        let boolean = FieldType::Boolean.parse_args("b", &raw(&["7"])).unwrap();
        assert_eq!((boolean.min, boolean.max), (Some(0), Some(1)));
    }

    #[test]
    fn test_named_arguments() {
        let reference = FieldType::Ref.parse_args("owner_id", &raw(&["user"])).unwrap();
        assert_eq!(reference.entity.as_deref(), Some("user"));
        assert_eq!(reference.max, Some(4_294_967_295));

        let object = FieldType::Object.parse_args("data", &raw(&["stdClass"])).unwrap();
        assert_eq!(object.class, None);

        let slug = FieldType::Slug.parse_args("slug", &raw(&["title", "60"])).unwrap();
        assert_eq!(slug.field.as_deref(), Some("title"));
        assert_eq!(slug.max, Some(60));
    }

    #[test]
    fn test_empty_argument_keeps_default() {
        let args = FieldType::Integer.parse_args("n", &raw(&["", "10"])).unwrap();
        assert_eq!((args.min, args.max), (Some(-2_147_483_648), Some(10)));
    }

    #[test]
    fn test_invalid_numeric_argument() {
        let err = FieldType::Integer.parse_args("age", &raw(&["lots"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidArgument { argument: "max", .. }));
    }

    #[test]
    fn test_replacing_field_keeps_position() {
        let descriptor = EntityDescriptor::new("user")
            .with_field(FieldDescriptor::new("name", FieldType::String).unwrap())
            .with_field(FieldDescriptor::new("age", FieldType::Integer).unwrap())
            .with_field(FieldDescriptor::new("name", FieldType::Email).unwrap());
        let names: Vec<&str> = descriptor.field_names().collect();
        assert_eq!(names, vec!["id", "name", "age"]);
        assert_eq!(descriptor.field("name").unwrap().field_type, FieldType::Email);
    }
}

//! Declaration syntax of entity descriptors.
//!
//! A field is declared either as a short string such as
//! `string(3, 50)[nullable]=anonymous` or as a table carrying the same string
//! under `type` plus explicit `nullable` / `writable` overrides. Indexes reuse
//! the grammar: `UNIQUE(email)` or `INDEX(last_name, first_name)=idx_names`.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::types::{DefaultValue, FieldDescriptor, FieldType, IndexDescriptor, IndexKind};

static TYPE_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^(\[=]+)(?:\(([^)]*)\))?(?:\[([^\]]*)\])?(?:=([^\[]*))?")
        .expect("type declaration pattern is valid")
});

static ARGUMENT_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,\s*").expect("argument separator pattern is valid"));

static CONSTANT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("constant pattern is valid"));

/// Components of a `type(args)[flags]=default` string, not yet resolved
/// against the type set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedType {
    pub type_name: String,
    pub args: Vec<String>,
    pub flags: Vec<String>,
    pub default: Option<DefaultValue>,
}

impl ParsedType {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

pub fn parse_type(declaration: &str) -> Result<ParsedType, ConfigError> {
    let invalid = || ConfigError::InvalidTypeSyntax {
        declaration: declaration.to_string(),
    };
    let captures = TYPE_DECLARATION.captures(declaration).ok_or_else(invalid)?;
    let type_name = captures.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
    if type_name.is_empty() {
        return Err(invalid());
    }

    let args = captures
        .get(2)
        .map(|m| m.as_str())
        .filter(|raw| !raw.is_empty())
        .map(|raw| ARGUMENT_SEPARATOR.split(raw).map(|piece| piece.trim().to_string()).collect())
        .unwrap_or_default();
    let flags = captures
        .get(3)
        .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let default = captures.get(4).map(|m| parse_default(m.as_str())).transpose()?;

    Ok(ParsedType {
        type_name: type_name.to_string(),
        args,
        flags,
        default,
    })
}

fn parse_default(raw: &str) -> Result<DefaultValue, ConfigError> {
    match raw {
        "true" => Ok(DefaultValue::Bool(true)),
        "false" => Ok(DefaultValue::Bool(false)),
        _ if raw.ends_with(')') => {
            let call = parse_type(raw)?;
            Ok(DefaultValue::Call {
                function: call.type_name,
                args: call.args,
            })
        }
        _ if CONSTANT_NAME.is_match(raw) => Ok(DefaultValue::Constant(raw.to_string())),
        _ => Ok(DefaultValue::Literal(raw.to_string())),
    }
}

/// One field as written in a declaration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDeclaration {
    Short(String),
    Full {
        #[serde(rename = "type")]
        type_declaration: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nullable: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        writable: Option<bool>,
    },
}

impl FieldDeclaration {
    /// Resolve this declaration into a field.
    ///
    /// Flags are applied relative to the type defaults: a writable type only
    /// listens to `readonly`, a read-only type only to `writable`. The same
    /// goes for `notnull` / `nullable`. Explicit overrides win over flags.
    pub fn to_field(&self, name: &str) -> Result<FieldDescriptor, ConfigError> {
        let (declaration, nullable, writable) = match self {
            FieldDeclaration::Short(declaration) => (declaration.as_str(), None, None),
            FieldDeclaration::Full {
                type_declaration,
                nullable,
                writable,
            } => (type_declaration.as_str(), *nullable, *writable),
        };
        let parsed = parse_type(declaration)?;
        let field_type = FieldType::from_name(&parsed.type_name).ok_or_else(|| ConfigError::UnknownType {
            field: name.to_string(),
            type_name: parsed.type_name.clone(),
        })?;
        let args = field_type.parse_args(name, &parsed.args)?;

        let writable = writable.unwrap_or_else(|| {
            if field_type.is_writable_by_default() {
                !parsed.has_flag("readonly")
            } else {
                parsed.has_flag("writable")
            }
        });
        let nullable = nullable.unwrap_or_else(|| {
            if field_type.is_nullable_by_default() {
                !parsed.has_flag("notnull")
            } else {
                parsed.has_flag("nullable")
            }
        });

        Ok(FieldDescriptor {
            name: name.to_string(),
            field_type,
            args,
            default: parsed.default,
            writable,
            nullable,
        })
    }
}

impl From<&str> for FieldDeclaration {
    fn from(value: &str) -> Self {
        FieldDeclaration::Short(value.to_string())
    }
}

/// Parse an index declaration such as `UNIQUE(email)=uniq_email`.
pub fn parse_index(entity: &str, declaration: &str) -> Result<IndexDescriptor, ConfigError> {
    let parsed = parse_type(declaration)?;
    let kind = IndexKind::parse(&parsed.type_name).ok_or_else(|| ConfigError::UnknownIndexType {
        entity: entity.to_string(),
        kind: parsed.type_name.clone(),
    })?;
    let fields: Vec<String> = parsed.args.into_iter().filter(|field| !field.is_empty()).collect();
    if fields.is_empty() {
        return Err(ConfigError::EmptyIndex {
            entity: entity.to_string(),
        });
    }
    let name = match parsed.default {
        Some(DefaultValue::Literal(name)) | Some(DefaultValue::Constant(name)) => Some(name),
        _ => None,
    }
    .filter(|name| !name.trim().is_empty());

    Ok(IndexDescriptor {
        name,
        kind,
        fields,
    })
}

/// Parents of a declaration, written as a single name or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParentDeclaration {
    One(String),
    Many(Vec<String>),
}

impl ParentDeclaration {
    pub fn names(&self) -> Vec<&str> {
        match self {
            ParentDeclaration::One(name) => vec![name.as_str()],
            ParentDeclaration::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Contents of one entity declaration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentDeclaration>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldDeclaration>,
    #[serde(default)]
    pub indexes: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
}

impl EntityDeclaration {
    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn parents(&self) -> Vec<&str> {
        self.parent.as_ref().map(ParentDeclaration::names).unwrap_or_default()
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.iter().any(|flag| flag == "abstract")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_declaration() {
        let parsed = parse_type("string(3, 50)[nullable readonly]=anonymous").unwrap();
        assert_eq!(parsed.type_name, "string");
        assert_eq!(parsed.args, vec!["3", "50"]);
        assert_eq!(parsed.flags, vec!["nullable", "readonly"]);
        assert_eq!(parsed.default, Some(DefaultValue::Literal("anonymous".to_string())));
    }

    #[test]
    fn test_parse_bare_type() {
        let parsed = parse_type("datetime").unwrap();
        assert_eq!(parsed.type_name, "datetime");
        assert!(parsed.args.is_empty());
        assert!(parsed.flags.is_empty());
        assert_eq!(parsed.default, None);
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(parse_type("boolean=true").unwrap().default, Some(DefaultValue::Bool(true)));
        assert_eq!(parse_type("boolean=false").unwrap().default, Some(DefaultValue::Bool(false)));
        assert_eq!(
            parse_type("enum(statuses)=STATUS_DRAFT").unwrap().default,
            Some(DefaultValue::Constant("STATUS_DRAFT".to_string()))
        );
        assert_eq!(
            parse_type("datetime=now()").unwrap().default,
            Some(DefaultValue::Call {
                function: "now".to_string(),
                args: vec![],
            })
        );
        assert_eq!(
            parse_type("date=date_add(today, 7)").unwrap().default,
            Some(DefaultValue::Call {
                function: "date_add".to_string(),
                args: vec!["today".to_string(), "7".to_string()],
            })
        );
    }

    #[test]
    fn test_parse_rejects_empty_type() {
        assert!(matches!(parse_type(""), Err(ConfigError::InvalidTypeSyntax { .. })));
        assert!(matches!(parse_type("(12)"), Err(ConfigError::InvalidTypeSyntax { .. })));
    }

    #[test]
    fn test_flags_relative_to_type_defaults() {
        let field = FieldDeclaration::from("string(50)[nullable readonly]").to_field("nickname").unwrap();
        assert!(field.nullable);
        assert!(!field.writable);

        let plain = FieldDeclaration::from("string(50)").to_field("name").unwrap();
        assert!(!plain.nullable);
        assert!(plain.writable);
        assert_eq!(plain.args.max, Some(50));
    }

    #[test]
    fn test_full_form_overrides_flags() {
        let declaration = FieldDeclaration::Full {
            type_declaration: "string[nullable]".to_string(),
            nullable: Some(false),
            writable: Some(false),
        };
        let field = declaration.to_field("code").unwrap();
        assert!(!field.nullable);
        assert!(!field.writable);
    }

    #[test]
    fn test_unknown_type() {
        let err = FieldDeclaration::from("blob").to_field("data").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownType { ref type_name, .. } if type_name == "blob"));
    }

    #[test]
    fn test_parse_index() {
        let index = parse_index("user", "UNIQUE(email)").unwrap();
        assert_eq!(index.kind, IndexKind::Unique);
        assert_eq!(index.fields, vec!["email"]);
        assert_eq!(index.name, None);

        let named = parse_index("user", "index(last_name, first_name)=idx_names").unwrap();
        assert_eq!(named.kind, IndexKind::Index);
        assert_eq!(named.fields, vec!["last_name", "first_name"]);
        assert_eq!(named.name.as_deref(), Some("idx_names"));
    }

    #[test]
    fn test_index_fields_are_trimmed() {
        let index = parse_index("user", "INDEX( a , b )").unwrap();
        assert_eq!(index.fields, vec!["a", "b"]);

        let parsed = parse_type("number( 2 , 0 , 10 )").unwrap();
        assert_eq!(parsed.args, vec!["2", "0", "10"]);
    }

    #[test]
    fn test_parse_index_errors() {
        assert!(matches!(parse_index("user", "SPATIAL(geo)"), Err(ConfigError::UnknownIndexType { .. })));
        assert!(matches!(parse_index("user", "UNIQUE"), Err(ConfigError::EmptyIndex { .. })));
        assert!(matches!(parse_index("user", "UNIQUE( )"), Err(ConfigError::EmptyIndex { .. })));
    }

    #[test]
    fn test_declaration_from_toml_keeps_field_order() {
        let source = r#"
parent = "person"
flags = ["abstract"]
indexes = ["UNIQUE(email)"]

[fields]
name = "string(50)"
email = "email"
age = { type = "integer(0, 150)", nullable = true }
"#;
        let declaration = EntityDeclaration::from_toml(source).unwrap();
        let names: Vec<&str> = declaration.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["name", "email", "age"]);
        assert_eq!(declaration.parents(), vec!["person"]);
        assert!(declaration.is_abstract());
        assert!(matches!(declaration.fields["age"], FieldDeclaration::Full { nullable: Some(true), .. }));
    }

    #[test]
    fn test_parent_list() {
        let declaration = EntityDeclaration::from_toml("parent = [\"a\", \"b\"]\n[fields]\nx = \"string\"\n").unwrap();
        assert_eq!(declaration.parents(), vec!["a", "b"]);
        assert!(!declaration.is_abstract());
    }
}

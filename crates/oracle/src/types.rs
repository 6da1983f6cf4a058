//! Schema model accumulated during discovery, and its introspection form.
//!
//! The model types ([`TypeRef`], [`Field`], [`TypeDefinition`], [`Schema`])
//! hold what the probes have proven. The `Introspection*` types mirror the
//! JSON shape of a GraphQL introspection result so the output can be fed to
//! standard schema tooling, and so a previous run can seed the next one.

use crate::{OracleError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in GraphQL scalar types.
pub const BUILTIN_SCALARS: &[&str] = &["String", "ID", "Int", "Float", "Boolean"];

/// Names ending with this suffix are assumed to be input objects.
const INPUT_OBJECT_SUFFIX: &str = "Input";

/// Kind of a named type, as far as error messages let us infer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Scalar,
    Object,
    InputObject,
}

impl TypeKind {
    /// Infers the kind of a bare type name.
    ///
    /// This is a guess: only the built-in scalars are known to be scalars,
    /// and input objects are recognized by naming convention alone.
    #[must_use]
    pub fn infer(name: &str) -> Self {
        if name.ends_with(INPUT_OBJECT_SUFFIX) {
            Self::InputObject
        } else if BUILTIN_SCALARS.contains(&name) {
            Self::Scalar
        } else {
            Self::Object
        }
    }
}

impl From<TypeKind> for IntrospectionKind {
    fn from(kind: TypeKind) -> Self {
        match kind {
            TypeKind::Scalar => Self::Scalar,
            TypeKind::Object => Self::Object,
            TypeKind::InputObject => Self::InputObject,
        }
    }
}

/// A decoded type signature such as `[Foo!]!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// Type name with all list and non-null markers removed.
    pub name: String,
    pub kind: TypeKind,
    pub is_list: bool,
    pub is_list_item_nullable: bool,
    pub is_nullable: bool,
}

impl TypeRef {
    /// Decodes a type signature token as printed by a GraphQL validator.
    ///
    /// ```
    /// # use graphql_oracle::{TypeKind, TypeRef};
    /// let type_ref = TypeRef::from_signature("[UserInput!]");
    /// assert_eq!(type_ref.name, "UserInput");
    /// assert_eq!(type_ref.kind, TypeKind::InputObject);
    /// assert!(type_ref.is_list);
    /// assert!(!type_ref.is_list_item_nullable);
    /// assert!(type_ref.is_nullable);
    /// ```
    #[must_use]
    pub fn from_signature(signature: &str) -> Self {
        let name: String = signature
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | '!'))
            .collect();
        let kind = TypeKind::infer(&name);
        let is_list = signature.contains('[') && signature.contains(']');
        let is_list_item_nullable = is_list && !signature.contains("!]");
        let is_nullable = !signature.ends_with('!');

        Self {
            name,
            kind,
            is_list,
            is_list_item_nullable,
            is_nullable,
        }
    }

    /// Renders the type back into signature form.
    #[must_use]
    pub fn signature(&self) -> String {
        let mut signature = self.name.clone();
        if self.is_list {
            if !self.is_list_item_nullable {
                signature.push('!');
            }
            signature = format!("[{signature}]");
        }
        if !self.is_nullable {
            signature.push('!');
        }
        signature
    }

    #[must_use]
    pub fn is_builtin_scalar(&self) -> bool {
        BUILTIN_SCALARS.contains(&self.name.as_str())
    }

    fn to_introspection(&self) -> IntrospectionTypeRef {
        let mut type_ref = IntrospectionTypeRef::named(self.kind.into(), &self.name);
        if self.is_list {
            if !self.is_list_item_nullable {
                type_ref = IntrospectionTypeRef::wrap(IntrospectionKind::NonNull, type_ref);
            }
            type_ref = IntrospectionTypeRef::wrap(IntrospectionKind::List, type_ref);
        }
        if !self.is_nullable {
            type_ref = IntrospectionTypeRef::wrap(IntrospectionKind::NonNull, type_ref);
        }
        type_ref
    }

    fn from_introspection(type_ref: &IntrospectionTypeRef) -> Result<Self> {
        let (is_nullable, inner) = match type_ref.kind {
            IntrospectionKind::NonNull => (false, type_ref.inner()?),
            _ => (true, type_ref),
        };
        let (is_list, is_list_item_nullable, leaf) = match inner.kind {
            IntrospectionKind::List => {
                let item = inner.inner()?;
                match item.kind {
                    IntrospectionKind::NonNull => (true, false, item.inner()?),
                    _ => (true, true, item),
                }
            }
            _ => (false, false, inner),
        };

        let kind = leaf.kind.named_kind().ok_or_else(|| {
            OracleError::InvalidSeed(
                "type references nested deeper than [T!]! are not supported".to_string(),
            )
        })?;
        let name = leaf
            .name
            .clone()
            .ok_or_else(|| OracleError::InvalidSeed("named type without a name".to_string()))?;

        Ok(Self {
            name,
            kind,
            is_list,
            is_list_item_nullable,
            is_nullable,
        })
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// An argument or an input object field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputValue {
    pub name: String,
    pub type_ref: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub type_ref: TypeRef,
    pub args: Vec<InputValue>,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            args: Vec::new(),
        }
    }
}

/// Everything discovered about one named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: TypeKind,
    pub fields: Vec<Field>,
}

impl TypeDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Names of the root operation types a server answers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootTypenames {
    pub query_type: Option<String>,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
}

/// The schema being reconstructed.
///
/// Type definitions are keyed by name and kept in registration order so the
/// emitted document is stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub query_type: Option<String>,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    types: IndexMap<String, TypeDefinition>,
}

impl Schema {
    /// Creates a schema holding the built-in scalars and one empty object
    /// type per reachable root operation.
    #[must_use]
    pub fn new(roots: RootTypenames) -> Self {
        let mut schema = Self {
            query_type: roots.query_type,
            mutation_type: roots.mutation_type,
            subscription_type: roots.subscription_type,
            types: IndexMap::new(),
        };

        for scalar in BUILTIN_SCALARS {
            schema.register_type(*scalar, TypeKind::Scalar);
        }
        let root_names: Vec<String> = [
            &schema.query_type,
            &schema.mutation_type,
            &schema.subscription_type,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect();
        for name in root_names {
            schema.register_type(name, TypeKind::Object);
        }

        schema
    }

    /// Registers a type unless one with the same name already exists.
    ///
    /// The first registration wins: a kind recorded earlier is never
    /// replaced by a later inference. Returns whether a type was inserted.
    pub fn register_type(&mut self, name: impl Into<String>, kind: TypeKind) -> bool {
        let name = name.into();
        if self.types.contains_key(&name) {
            return false;
        }
        tracing::trace!(name = %name, ?kind, "Registering type");
        self.types
            .insert(name.clone(), TypeDefinition::new(name, kind));
        true
    }

    /// Attaches a field to the named type, registering the type as an
    /// object first if it is unknown. A field with the same name is
    /// replaced in place.
    pub fn add_field(&mut self, typename: &str, field: Field) {
        self.register_type(typename, TypeKind::Object);
        let Some(definition) = self.types.get_mut(typename) else {
            return;
        };
        match definition
            .fields
            .iter_mut()
            .find(|existing| existing.name == field.name)
        {
            Some(existing) => *existing = field,
            None => definition.fields.push(field),
        }
    }

    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.values()
    }

    #[must_use]
    pub fn to_introspection(&self) -> IntrospectionResponse {
        let types = self
            .types
            .values()
            .map(|definition| {
                let mut ty = IntrospectionType {
                    kind: definition.kind.into(),
                    name: definition.name.clone(),
                    description: None,
                    fields: None,
                    input_fields: None,
                    interfaces: None,
                    enum_values: None,
                    possible_types: None,
                };
                match definition.kind {
                    TypeKind::Scalar => {}
                    TypeKind::Object => {
                        ty.fields = Some(
                            definition
                                .fields
                                .iter()
                                .map(IntrospectionField::from)
                                .collect(),
                        );
                        ty.interfaces = Some(Vec::new());
                    }
                    TypeKind::InputObject => {
                        ty.input_fields = Some(
                            definition
                                .fields
                                .iter()
                                .map(|field| IntrospectionInputValue::new(&field.name, &field.type_ref))
                                .collect(),
                        );
                    }
                }
                ty
            })
            .collect();

        IntrospectionResponse {
            data: IntrospectionData {
                schema: IntrospectionSchema {
                    query_type: self.query_type.as_deref().map(NamedTypeRef::new),
                    mutation_type: self.mutation_type.as_deref().map(NamedTypeRef::new),
                    subscription_type: self.subscription_type.as_deref().map(NamedTypeRef::new),
                    types,
                    directives: Vec::new(),
                },
            },
        }
    }

    /// Serializes the schema as an introspection result.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.to_introspection()).unwrap_or(serde_json::Value::Null)
    }

    /// Reads a previously emitted schema back, either wrapped in
    /// `{"data": {"__schema": ..}}` or as a bare `__schema` object.
    ///
    /// Introspection results from other servers load too. Enums are kept
    /// as scalars and interfaces and unions as objects; enum values and
    /// possible types are dropped.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let schema_value = value
            .get("data")
            .and_then(|data| data.get("__schema"))
            .or_else(|| value.get("__schema"))
            .unwrap_or(value);
        let introspection: IntrospectionSchema = serde_json::from_value(schema_value.clone())
            .map_err(|e| OracleError::InvalidSeed(e.to_string()))?;

        let mut schema = Self {
            query_type: introspection.query_type.map(|t| t.name),
            mutation_type: introspection.mutation_type.map(|t| t.name),
            subscription_type: introspection.subscription_type.map(|t| t.name),
            types: IndexMap::new(),
        };

        for ty in introspection.types {
            let kind = ty.kind.named_kind().ok_or_else(|| {
                OracleError::InvalidSeed(format!("type '{}' has a wrapper kind", ty.name))
            })?;
            let mut definition = TypeDefinition::new(ty.name, kind);

            for field in ty.fields.unwrap_or_default() {
                let args = field
                    .args
                    .iter()
                    .map(|arg| {
                        Ok(InputValue {
                            name: arg.name.clone(),
                            type_ref: TypeRef::from_introspection(&arg.type_ref)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                definition.fields.push(Field {
                    name: field.name,
                    type_ref: TypeRef::from_introspection(&field.type_ref)?,
                    args,
                });
            }
            for input_field in ty.input_fields.unwrap_or_default() {
                definition.fields.push(Field::new(
                    input_field.name,
                    TypeRef::from_introspection(&input_field.type_ref)?,
                ));
            }

            schema.types.insert(definition.name.clone(), definition);
        }

        Ok(schema)
    }
}

/// Top-level introspection response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    pub data: IntrospectionData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionData {
    #[serde(rename = "__schema")]
    pub schema: IntrospectionSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionSchema {
    pub query_type: Option<NamedTypeRef>,
    pub mutation_type: Option<NamedTypeRef>,
    pub subscription_type: Option<NamedTypeRef>,
    pub types: Vec<IntrospectionType>,
    #[serde(default)]
    pub directives: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedTypeRef {
    pub name: String,
}

impl NamedTypeRef {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionType {
    pub kind: IntrospectionKind,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<IntrospectionField>>,
    #[serde(default)]
    pub input_fields: Option<Vec<IntrospectionInputValue>>,
    #[serde(default)]
    pub interfaces: Option<Vec<NamedTypeRef>>,
    #[serde(default)]
    pub enum_values: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub possible_types: Option<Vec<NamedTypeRef>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionField {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub args: Vec<IntrospectionInputValue>,
    #[serde(rename = "type")]
    pub type_ref: IntrospectionTypeRef,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

impl From<&Field> for IntrospectionField {
    fn from(field: &Field) -> Self {
        Self {
            name: field.name.clone(),
            description: None,
            args: field
                .args
                .iter()
                .map(|arg| IntrospectionInputValue::new(&arg.name, &arg.type_ref))
                .collect(),
            type_ref: field.type_ref.to_introspection(),
            is_deprecated: false,
            deprecation_reason: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionInputValue {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_ref: IntrospectionTypeRef,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl IntrospectionInputValue {
    fn new(name: &str, type_ref: &TypeRef) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            type_ref: type_ref.to_introspection(),
            default_value: None,
        }
    }
}

/// A possibly wrapped type reference (`ofType` chain).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionTypeRef {
    pub kind: IntrospectionKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub of_type: Option<Box<IntrospectionTypeRef>>,
}

impl IntrospectionTypeRef {
    fn named(kind: IntrospectionKind, name: &str) -> Self {
        Self {
            kind,
            name: Some(name.to_string()),
            of_type: None,
        }
    }

    fn wrap(kind: IntrospectionKind, inner: Self) -> Self {
        Self {
            kind,
            name: None,
            of_type: Some(Box::new(inner)),
        }
    }

    fn inner(&self) -> Result<&Self> {
        self.of_type.as_deref().ok_or_else(|| {
            OracleError::InvalidSeed(format!("{:?} type reference without ofType", self.kind))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntrospectionKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

impl IntrospectionKind {
    /// The recorded kind of a named type, `None` for wrappers.
    #[must_use]
    pub fn named_kind(self) -> Option<TypeKind> {
        match self {
            Self::Scalar | Self::Enum => Some(TypeKind::Scalar),
            Self::Object | Self::Interface | Self::Union => Some(TypeKind::Object),
            Self::InputObject => Some(TypeKind::InputObject),
            Self::List | Self::NonNull => None,
        }
    }
}

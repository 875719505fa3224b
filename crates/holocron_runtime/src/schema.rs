//! Schema registry: SDL text to a validated type graph.

use crate::error::{SchemaError, SchemaSyntaxError};
use holocron_core::diagnostics::codes;
use holocron_syntax::ast;
use indexmap::IndexMap;
use std::fmt;

/// Names of the built-in scalars.
pub const BUILT_IN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

const DEFAULT_DEPRECATION_REASON: &str = "No longer supported";

/// The kind of a named type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

impl TypeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Object => "object",
            Self::Interface => "interface",
            Self::Union => "union",
            Self::Enum => "enum",
            Self::InputObject => "input object",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type definition.
#[derive(Debug, Clone)]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
    Interface(InterfaceDef),
    Union(UnionDef),
    Enum(EnumDef),
    InputObject(InputObjectDef),
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(def) => &def.name,
            Self::Object(def) => &def.name,
            Self::Interface(def) => &def.name,
            Self::Union(def) => &def.name,
            Self::Enum(def) => &def.name,
            Self::InputObject(def) => &def.name,
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Scalar(_) => TypeKind::Scalar,
            Self::Object(_) => TypeKind::Object,
            Self::Interface(_) => TypeKind::Interface,
            Self::Union(_) => TypeKind::Union,
            Self::Enum(_) => TypeKind::Enum,
            Self::InputObject(_) => TypeKind::InputObject,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Scalar(def) => def.description.as_deref(),
            Self::Object(def) => def.description.as_deref(),
            Self::Interface(def) => def.description.as_deref(),
            Self::Union(def) => def.description.as_deref(),
            Self::Enum(def) => def.description.as_deref(),
            Self::InputObject(def) => def.description.as_deref(),
        }
    }

    /// Output fields of object and interface types.
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match self {
            Self::Object(def) => Some(&def.fields),
            Self::Interface(def) => Some(&def.fields),
            _ => None,
        }
    }

    /// Interfaces and unions.
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Interface(_) | Self::Union(_))
    }

    /// Scalars and enums.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_))
    }

    /// Objects, interfaces and unions.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Interface(_) | Self::Union(_))
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_) | Self::InputObject(_))
    }

    pub fn is_output(&self) -> bool {
        !matches!(self, Self::InputObject(_))
    }
}

/// Scalar type definition.
#[derive(Debug, Clone)]
pub struct ScalarDef {
    pub name: String,
    pub description: Option<String>,
}

impl ScalarDef {
    pub fn is_built_in(&self) -> bool {
        BUILT_IN_SCALARS.contains(&self.name.as_str())
    }
}

/// Object type definition.
#[derive(Debug, Clone)]
pub struct ObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

/// Interface type definition.
#[derive(Debug, Clone)]
pub struct InterfaceDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

/// Union type definition.
#[derive(Debug, Clone)]
pub struct UnionDef {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<String>,
}

/// Enum type definition.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub description: Option<String>,
    pub values: IndexMap<String, EnumValueDef>,
}

/// Enum value definition.
#[derive(Debug, Clone)]
pub struct EnumValueDef {
    pub name: String,
    pub description: Option<String>,
    pub deprecation_reason: Option<String>,
}

/// Input object type definition.
#[derive(Debug, Clone)]
pub struct InputObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, InputValueDef>,
}

/// Output field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, InputValueDef>,
    pub deprecation_reason: Option<String>,
}

impl FieldDef {
    pub fn is_deprecated(&self) -> bool {
        self.deprecation_reason.is_some()
    }
}

/// Argument or input object field definition.
#[derive(Debug, Clone)]
pub struct InputValueDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    /// Constant default, coerced when the value is omitted.
    pub default_value: Option<ast::Value>,
}

/// Type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeRef) -> Self {
        Self::NonNull(Box::new(inner))
    }

    /// The innermost named type.
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.name(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Returns true if a value of `self` is always a valid value of `other`.
    ///
    /// `is_possible` decides whether a named type is a member of an
    /// abstract named type.
    pub fn is_subtype_of(&self, other: &TypeRef, is_possible: &impl Fn(&str, &str) -> bool) -> bool {
        match (self, other) {
            (Self::NonNull(a), Self::NonNull(b)) => a.is_subtype_of(b, is_possible),
            (Self::NonNull(a), b) => a.is_subtype_of(b, is_possible),
            (_, Self::NonNull(_)) => false,
            (Self::List(a), Self::List(b)) => a.is_subtype_of(b, is_possible),
            (Self::Named(a), Self::Named(b)) => a == b || is_possible(b, a),
            _ => false,
        }
    }
}

impl From<&ast::Type> for TypeRef {
    fn from(ty: &ast::Type) -> Self {
        match ty {
            ast::Type::Named(name) => Self::Named(name.value.clone()),
            ast::Type::List(inner, _) => Self::List(Box::new(inner.as_ref().into())),
            ast::Type::NonNull(inner, _) => Self::NonNull(Box::new(inner.as_ref().into())),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// A validated, immutable type graph parsed from SDL.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: IndexMap<String, TypeDef>,
    query_type: String,
    mutation_type: Option<String>,
}

impl TypeRegistry {
    /// Parses and validates schema text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Syntax`] for malformed text and the matching
    /// variant for the first structural problem found otherwise.
    pub fn parse(source: &str) -> Result<Self, SchemaError> {
        Self::parse_named("schema", source)
    }

    /// Like [`TypeRegistry::parse`], naming the source in syntax reports.
    ///
    /// # Errors
    ///
    /// See [`TypeRegistry::parse`].
    pub fn parse_named(name: &str, source: &str) -> Result<Self, SchemaError> {
        let result = holocron_syntax::parse(source);
        let mut diagnostics = result.diagnostics;

        for def in &result.document.definitions {
            if def.is_executable() {
                diagnostics.error(
                    codes::UNEXPECTED_DEFINITION,
                    "unexpected definition",
                    def.span(),
                    "operations and fragments are not allowed in schema text",
                );
            }
        }
        let schema_defs: Vec<_> = result
            .document
            .definitions
            .iter()
            .filter_map(|def| match def {
                ast::Definition::Schema(schema) => Some(schema),
                _ => None,
            })
            .collect();
        for extra in schema_defs.iter().skip(1) {
            diagnostics.error(
                codes::UNEXPECTED_DEFINITION,
                "unexpected definition",
                extra.span,
                "a schema may only have one schema definition",
            );
        }
        if diagnostics.has_errors() {
            return Err(SchemaSyntaxError::new(name, source, diagnostics).into());
        }

        let mut registry = Self::collect(&result.document)?;
        registry.resolve_roots(schema_defs.first().copied())?;
        registry.validate()?;
        Ok(registry)
    }

    /// First pass: lower every type definition and reject duplicates.
    fn collect(document: &ast::Document) -> Result<Self, SchemaError> {
        let mut types = IndexMap::new();
        for name in BUILT_IN_SCALARS {
            types.insert(
                name.to_string(),
                TypeDef::Scalar(ScalarDef {
                    name: name.to_string(),
                    description: Some(format!("Built-in {name} scalar")),
                }),
            );
        }

        for def in &document.definitions {
            let ast::Definition::Type(type_def) = def else {
                continue;
            };
            let lowered = lower_type(type_def)?;
            let name = lowered.name().to_string();
            if types.contains_key(&name) {
                return Err(SchemaError::DuplicateType(name));
            }
            types.insert(name, lowered);
        }

        Ok(Self {
            types,
            query_type: "Query".to_string(),
            mutation_type: None,
        })
    }

    fn resolve_roots(&mut self, schema: Option<&ast::SchemaDefinition>) -> Result<(), SchemaError> {
        let Some(schema) = schema else {
            self.mutation_type = self
                .types
                .contains_key("Mutation")
                .then(|| "Mutation".to_string());
            return Ok(());
        };

        for op in &schema.operations {
            let name = op.type_name.value.clone();
            match self.types.get(&name) {
                Some(TypeDef::Object(_)) => {}
                Some(other) => {
                    return Err(SchemaError::InvalidOutputType {
                        location: format!("schema.{}", op.operation),
                        type_name: format!("{name} ({})", other.kind()),
                    })
                }
                None => {
                    return Err(SchemaError::UnknownTypeReference {
                        location: format!("schema.{}", op.operation),
                        referenced: name,
                    })
                }
            }
            match op.operation {
                ast::OperationType::Query => self.query_type = name,
                ast::OperationType::Mutation => self.mutation_type = Some(name),
                ast::OperationType::Subscription => {}
            }
        }
        Ok(())
    }

    /// Second pass: every reference resolves and has the right kind.
    fn validate(&self) -> Result<(), SchemaError> {
        for def in self.types.values() {
            match def {
                TypeDef::Object(ObjectDef {
                    name,
                    fields,
                    implements,
                    ..
                })
                | TypeDef::Interface(InterfaceDef {
                    name,
                    fields,
                    implements,
                    ..
                }) => {
                    for field in fields.values() {
                        let location = format!("{name}.{}", field.name);
                        let target = self.require(&location, field.ty.name())?;
                        if !target.is_output() {
                            return Err(SchemaError::InvalidOutputType {
                                location,
                                type_name: field.ty.to_string(),
                            });
                        }
                        for arg in field.arguments.values() {
                            self.validate_input_value(&format!("{location}({})", arg.name), arg)?;
                        }
                    }
                    for interface in implements {
                        self.validate_implementation(name, fields, interface)?;
                    }
                }
                TypeDef::Union(union) => {
                    for member in &union.members {
                        let location = format!("{}.{member}", union.name);
                        if !matches!(self.require(&location, member)?, TypeDef::Object(_)) {
                            return Err(SchemaError::InvalidUnionMember {
                                union_name: union.name.clone(),
                                member: member.clone(),
                            });
                        }
                    }
                }
                TypeDef::InputObject(input) => {
                    for field in input.fields.values() {
                        self.validate_input_value(&format!("{}.{}", input.name, field.name), field)?;
                    }
                }
                TypeDef::Scalar(_) | TypeDef::Enum(_) => {}
            }
        }
        Ok(())
    }

    fn require(&self, location: &str, name: &str) -> Result<&TypeDef, SchemaError> {
        self.types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownTypeReference {
                location: location.to_string(),
                referenced: name.to_string(),
            })
    }

    fn validate_input_value(&self, location: &str, value: &InputValueDef) -> Result<(), SchemaError> {
        if self.require(location, value.ty.name())?.is_input() {
            Ok(())
        } else {
            Err(SchemaError::InvalidInputType {
                location: location.to_string(),
                type_name: value.ty.to_string(),
            })
        }
    }

    fn validate_implementation(
        &self,
        type_name: &str,
        fields: &IndexMap<String, FieldDef>,
        interface: &str,
    ) -> Result<(), SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidImplementation {
            type_name: type_name.to_string(),
            interface: interface.to_string(),
            reason,
        };

        let TypeDef::Interface(iface) = self.require(&format!("{type_name} implements"), interface)? else {
            return Err(invalid(format!("`{interface}` is not an interface")));
        };

        for (name, expected) in &iface.fields {
            let Some(actual) = fields.get(name) else {
                return Err(invalid(format!("field `{name}` is missing")));
            };
            if !actual
                .ty
                .is_subtype_of(&expected.ty, &|abstract_type, object| {
                    self.is_possible_type(abstract_type, object)
                })
            {
                return Err(invalid(format!(
                    "field `{name}` has type `{}`, expected `{}`",
                    actual.ty, expected.ty
                )));
            }
            for arg in expected.arguments.values() {
                match actual.arguments.get(&arg.name) {
                    Some(found) if found.ty == arg.ty => {}
                    Some(found) => {
                        return Err(invalid(format!(
                            "argument `{name}({})` has type `{}`, expected `{}`",
                            arg.name, found.ty, arg.ty
                        )))
                    }
                    None => {
                        return Err(invalid(format!(
                            "argument `{name}({})` is missing",
                            arg.name
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    /// Looks up a type by name.
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Looks up an output field of an object or interface type.
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.get(type_name)?.fields()?.get(field_name)
    }

    /// All types in definition order, built-in scalars first.
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    /// Number of types, built-in scalars included.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Name of the query root type. Not guaranteed to exist.
    pub fn query_type(&self) -> &str {
        &self.query_type
    }

    pub fn mutation_type(&self) -> Option<&str> {
        self.mutation_type.as_deref()
    }

    /// Root type for an operation kind.
    pub fn root_type(&self, operation: ast::OperationType) -> Option<&str> {
        match operation {
            ast::OperationType::Query => Some(self.query_type()),
            ast::OperationType::Mutation => self.mutation_type(),
            ast::OperationType::Subscription => None,
        }
    }

    /// Returns true if `object` is a concrete type of the abstract type.
    pub fn is_possible_type(&self, abstract_type: &str, object: &str) -> bool {
        match self.get(abstract_type) {
            Some(TypeDef::Union(union)) => union.members.iter().any(|m| m == object),
            Some(TypeDef::Interface(_)) => matches!(
                self.get(object),
                Some(TypeDef::Object(obj)) if obj.implements.iter().any(|i| i == abstract_type)
            ),
            _ => false,
        }
    }

    /// Concrete object types of an abstract type, in definition order.
    pub fn possible_types<'a>(&'a self, abstract_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.types
            .values()
            .filter(move |def| self.is_possible_type(abstract_type, def.name()))
            .map(TypeDef::name)
    }
}

fn description(desc: Option<&ast::Description>) -> Option<String> {
    desc.map(|d| d.value.clone())
}

fn deprecation(directives: &[ast::Directive]) -> Option<String> {
    let directive = directives.iter().find(|d| d.name.value == "deprecated")?;
    match directive.argument("reason").map(|arg| &arg.value) {
        Some(ast::Value::String(reason)) => Some(reason.clone()),
        _ => Some(DEFAULT_DEPRECATION_REASON.to_string()),
    }
}

fn lower_type(def: &ast::TypeDefinition) -> Result<TypeDef, SchemaError> {
    Ok(match def {
        ast::TypeDefinition::Object(obj) => TypeDef::Object(ObjectDef {
            name: obj.name.value.clone(),
            description: description(obj.description.as_ref()),
            fields: lower_fields(&obj.name.value, &obj.fields)?,
            implements: lower_names(&obj.name.value, &obj.implements)?,
        }),
        ast::TypeDefinition::Interface(iface) => TypeDef::Interface(InterfaceDef {
            name: iface.name.value.clone(),
            description: description(iface.description.as_ref()),
            fields: lower_fields(&iface.name.value, &iface.fields)?,
            implements: lower_names(&iface.name.value, &iface.implements)?,
        }),
        ast::TypeDefinition::Union(union) => TypeDef::Union(UnionDef {
            name: union.name.value.clone(),
            description: description(union.description.as_ref()),
            members: lower_names(&union.name.value, &union.members)?,
        }),
        ast::TypeDefinition::Enum(e) => {
            let mut values = IndexMap::new();
            for value in &e.values {
                let name = value.name.value.clone();
                if values.contains_key(&name) {
                    return Err(SchemaError::DuplicateField {
                        owner: e.name.value.clone(),
                        name,
                    });
                }
                values.insert(
                    name.clone(),
                    EnumValueDef {
                        name,
                        description: description(value.description.as_ref()),
                        deprecation_reason: deprecation(&value.directives),
                    },
                );
            }
            TypeDef::Enum(EnumDef {
                name: e.name.value.clone(),
                description: description(e.description.as_ref()),
                values,
            })
        }
        ast::TypeDefinition::Input(input) => TypeDef::InputObject(InputObjectDef {
            name: input.name.value.clone(),
            description: description(input.description.as_ref()),
            fields: lower_input_values(&input.name.value, &input.fields)?,
        }),
        ast::TypeDefinition::Scalar(scalar) => TypeDef::Scalar(ScalarDef {
            name: scalar.name.value.clone(),
            description: description(scalar.description.as_ref()),
        }),
    })
}

fn lower_names(owner: &str, names: &[ast::Name]) -> Result<Vec<String>, SchemaError> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if out.contains(&name.value) {
            return Err(SchemaError::DuplicateField {
                owner: owner.to_string(),
                name: name.value.clone(),
            });
        }
        out.push(name.value.clone());
    }
    Ok(out)
}

fn lower_fields(
    owner: &str,
    fields: &[ast::FieldDefinition],
) -> Result<IndexMap<String, FieldDef>, SchemaError> {
    let mut out = IndexMap::with_capacity(fields.len());
    for field in fields {
        let name = field.name.value.clone();
        if out.contains_key(&name) {
            return Err(SchemaError::DuplicateField {
                owner: owner.to_string(),
                name,
            });
        }
        let arguments = lower_input_values(&format!("{owner}.{name}"), &field.arguments)?;
        out.insert(
            name.clone(),
            FieldDef {
                name,
                description: description(field.description.as_ref()),
                ty: (&field.ty).into(),
                arguments,
                deprecation_reason: deprecation(&field.directives),
            },
        );
    }
    Ok(out)
}

fn lower_input_values(
    owner: &str,
    values: &[ast::InputValueDefinition],
) -> Result<IndexMap<String, InputValueDef>, SchemaError> {
    let mut out = IndexMap::with_capacity(values.len());
    for value in values {
        let name = value.name.value.clone();
        if out.contains_key(&name) {
            return Err(SchemaError::DuplicateField {
                owner: owner.to_string(),
                name,
            });
        }
        out.insert(
            name.clone(),
            InputValueDef {
                name,
                description: description(value.description.as_ref()),
                ty: (&value.ty).into(),
                default_value: value.default_value.clone(),
            },
        );
    }
    Ok(out)
}

//! Value coercion between query literals, JSON variables and leaf results.

use crate::resolver::ResolverArgs;
use crate::schema::{InputValueDef, TypeDef, TypeRef, TypeRegistry};
use holocron_syntax::ast;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// Coerces field arguments against their definitions.
///
/// Arguments absent from the query (or bound to an unset variable) take the
/// declared default; absent nullable arguments without a default are left
/// out of the result.
pub(crate) fn coerce_arguments(
    registry: &TypeRegistry,
    definitions: &IndexMap<String, InputValueDef>,
    arguments: &[ast::Argument],
    variables: &Map<String, Value>,
) -> Result<ResolverArgs, String> {
    let mut args = ResolverArgs::new();
    for def in definitions.values() {
        let provided = arguments
            .iter()
            .find(|arg| arg.name.value == def.name)
            .map(|arg| &arg.value)
            .filter(|value| match value {
                ast::Value::Variable(name) => variables.contains_key(name),
                _ => true,
            });

        match (provided, &def.default_value) {
            (Some(value), _) => {
                let coerced = coerce_literal(registry, value, &def.ty, variables).map_err(|reason| {
                    format!(
                        "Argument \"{}\" has invalid value {value}: {reason}",
                        def.name
                    )
                })?;
                args.set(def.name.clone(), coerced);
            }
            (None, Some(default)) => {
                let coerced = coerce_literal(registry, default, &def.ty, variables)
                    .map_err(|reason| format!("Argument \"{}\" has invalid default: {reason}", def.name))?;
                args.set(def.name.clone(), coerced);
            }
            (None, None) if def.ty.is_non_null() => {
                return Err(format!(
                    "Argument \"{}\" of required type \"{}\" was not provided.",
                    def.name, def.ty
                ));
            }
            (None, None) => {}
        }
    }
    Ok(args)
}

/// Coerces a query literal to a JSON value of the given input type.
pub(crate) fn coerce_literal(
    registry: &TypeRegistry,
    value: &ast::Value,
    ty: &TypeRef,
    variables: &Map<String, Value>,
) -> Result<Value, String> {
    if let ast::Value::Variable(name) = value {
        let resolved = variables.get(name).cloned().unwrap_or(Value::Null);
        if resolved.is_null() && ty.is_non_null() {
            return Err(format!("variable \"${name}\" of non-null type \"{ty}\" is null"));
        }
        return Ok(resolved);
    }

    match ty {
        TypeRef::NonNull(inner) => {
            if matches!(value, ast::Value::Null) {
                return Err(format!("expected value of non-null type \"{ty}\", found null"));
            }
            coerce_literal(registry, value, inner, variables)
        }
        _ if matches!(value, ast::Value::Null) => Ok(Value::Null),
        TypeRef::List(item) => match value {
            ast::Value::List(items) => items
                .iter()
                .map(|v| coerce_literal(registry, v, item, variables))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_literal(registry, single, item, variables)?])),
        },
        TypeRef::Named(name) => match registry.get(name) {
            Some(TypeDef::Scalar(_)) => coerce_scalar_literal(name, value),
            Some(TypeDef::Enum(def)) => match value {
                ast::Value::Enum(v) if def.values.contains_key(v) => Ok(Value::String(v.clone())),
                other => Err(format!("Enum \"{name}\" cannot represent value: {other}")),
            },
            Some(TypeDef::InputObject(def)) => {
                let ast::Value::Object(fields) = value else {
                    return Err(format!("expected input object \"{name}\", found {value}"));
                };
                for (field, _) in fields {
                    if !def.fields.contains_key(field) {
                        return Err(format!("field \"{field}\" is not defined by type \"{name}\""));
                    }
                }
                let arguments: Vec<_> = fields
                    .iter()
                    .map(|(field, v)| ast::Argument {
                        name: ast::Name::new(field.clone(), holocron_core::Span::default()),
                        value: v.clone(),
                        span: holocron_core::Span::default(),
                    })
                    .collect();
                let coerced = coerce_arguments(registry, &def.fields, &arguments, variables)?;
                Ok(Value::Object(
                    coerced.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                ))
            }
            _ => Err(format!("\"{name}\" is not an input type")),
        },
    }
}

fn coerce_scalar_literal(name: &str, value: &ast::Value) -> Result<Value, String> {
    match (name, value) {
        ("Int", ast::Value::Int(i)) => i32::try_from(*i)
            .map(Value::from)
            .map_err(|_| format!("Int cannot represent non 32-bit signed integer value: {i}")),
        ("Float", ast::Value::Int(i)) => Ok(Value::from(*i as f64)),
        ("Float", ast::Value::Float(f)) => float(*f),
        ("String", ast::Value::String(s)) => Ok(Value::String(s.clone())),
        ("Boolean", ast::Value::Boolean(b)) => Ok(Value::Bool(*b)),
        ("ID", ast::Value::String(s)) => Ok(Value::String(s.clone())),
        ("ID", ast::Value::Int(i)) => Ok(Value::String(i.to_string())),
        ("Int" | "Float" | "String" | "Boolean" | "ID", other) => {
            Err(format!("{name} cannot represent value: {other}"))
        }
        (_, other) => Ok(literal_to_json(other)),
    }
}

/// Converts a constant literal to JSON without type information.
pub(crate) fn literal_to_json(value: &ast::Value) -> Value {
    match value {
        ast::Value::Variable(_) | ast::Value::Null => Value::Null,
        ast::Value::Int(i) => Value::from(*i),
        ast::Value::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        ast::Value::String(s) | ast::Value::Enum(s) => Value::String(s.clone()),
        ast::Value::Boolean(b) => Value::Bool(*b),
        ast::Value::List(items) => Value::Array(items.iter().map(literal_to_json).collect()),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), literal_to_json(v)))
                .collect(),
        ),
    }
}

/// Coerces a JSON variable value to the given input type.
pub(crate) fn coerce_json(registry: &TypeRegistry, value: &Value, ty: &TypeRef) -> Result<Value, String> {
    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_null() {
                return Err(format!("Expected non-nullable type \"{ty}\" not to be null."));
            }
            coerce_json(registry, value, inner)
        }
        _ if value.is_null() => Ok(Value::Null),
        TypeRef::List(item) => match value {
            Value::Array(items) => items
                .iter()
                .map(|v| coerce_json(registry, v, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_json(registry, single, item)?])),
        },
        TypeRef::Named(name) => match registry.get(name) {
            Some(TypeDef::Scalar(_)) => coerce_scalar_json(name, value),
            Some(TypeDef::Enum(def)) => match value.as_str() {
                Some(v) if def.values.contains_key(v) => Ok(value.clone()),
                _ => Err(format!("Enum \"{name}\" cannot represent value: {value}")),
            },
            Some(TypeDef::InputObject(def)) => {
                let Value::Object(fields) = value else {
                    return Err(format!("Expected type \"{name}\" to be an object."));
                };
                if let Some(unknown) = fields.keys().find(|k| !def.fields.contains_key(*k)) {
                    return Err(format!("Field \"{unknown}\" is not defined by type \"{name}\"."));
                }
                let mut out = Map::new();
                for field in def.fields.values() {
                    match (fields.get(&field.name), &field.default_value) {
                        (Some(v), _) => {
                            out.insert(field.name.clone(), coerce_json(registry, v, &field.ty)?);
                        }
                        (None, Some(default)) => {
                            let v = coerce_literal(registry, default, &field.ty, &Map::new())?;
                            out.insert(field.name.clone(), v);
                        }
                        (None, None) if field.ty.is_non_null() => {
                            return Err(format!(
                                "Field \"{}\" of required type \"{}\" was not provided.",
                                field.name, field.ty
                            ));
                        }
                        (None, None) => {}
                    }
                }
                Ok(Value::Object(out))
            }
            _ => Err(format!("\"{name}\" is not an input type")),
        },
    }
}

fn coerce_scalar_json(name: &str, value: &Value) -> Result<Value, String> {
    let invalid = || format!("{name} cannot represent value: {value}");
    match name {
        "Int" => value
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::from)
            .ok_or_else(invalid),
        "Float" => value.as_f64().map(Value::from).ok_or_else(invalid),
        "String" | "Boolean" => {
            let ok = if name == "String" { value.is_string() } else { value.is_boolean() };
            if ok {
                Ok(value.clone())
            } else {
                Err(invalid())
            }
        }
        "ID" => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            _ => Err(invalid()),
        },
        _ => Ok(value.clone()),
    }
}

/// Serializes a resolved leaf value for its scalar or enum type.
pub(crate) fn serialize_leaf(def: &TypeDef, value: Value) -> Result<Value, String> {
    match def {
        TypeDef::Enum(e) => match value.as_str() {
            Some(v) if e.values.contains_key(v) => Ok(value),
            _ => Err(format!("Enum \"{}\" cannot represent value: {value}", e.name)),
        },
        TypeDef::Scalar(s) => match s.name.as_str() {
            "Int" => serialize_int(value),
            "Float" => match &value {
                Value::Number(n) => n
                    .as_f64()
                    .map(Value::from)
                    .ok_or_else(|| format!("Float cannot represent non numeric value: {value}")),
                _ => Err(format!("Float cannot represent non numeric value: {value}")),
            },
            "String" => match value {
                Value::String(_) => Ok(value),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                other => Err(format!("String cannot represent value: {other}")),
            },
            "Boolean" => match value {
                Value::Bool(_) => Ok(value),
                other => Err(format!("Boolean cannot represent a non boolean value: {other}")),
            },
            "ID" => match value {
                Value::String(_) => Ok(value),
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
                other => Err(format!("ID cannot represent value: {other}")),
            },
            _ => Ok(value),
        },
        other => Err(format!("\"{}\" is not a leaf type", other.name())),
    }
}

fn serialize_int(value: Value) -> Result<Value, String> {
    let Value::Number(n) = &value else {
        return Err(format!("Int cannot represent non-integer value: {value}"));
    };
    let integral = n
        .as_i64()
        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.is_finite()).map(|f| f as i64));
    match integral {
        Some(i) => i32::try_from(i)
            .map(Value::from)
            .map_err(|_| format!("Int cannot represent non 32-bit signed integer value: {value}")),
        None => Err(format!("Int cannot represent non-integer value: {value}")),
    }
}

fn float(f: f64) -> Result<Value, String> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("Float cannot represent non numeric value: {f}"))
}

//! Build-time errors.

use holocron_core::{Diagnostic, DiagnosticBag};
use miette::{LabeledSpan, NamedSource};
use thiserror::Error;

/// Malformed schema text.
///
/// Carries every parse diagnostic and renders as a single report with one
/// label per problem.
#[derive(Debug, Error, miette::Diagnostic)]
#[error("{summary}")]
#[diagnostic(code(holocron::schema::syntax))]
pub struct SchemaSyntaxError {
    summary: String,
    diagnostics: Vec<Diagnostic>,
    #[source_code]
    src: NamedSource<String>,
    #[label(collection)]
    labels: Vec<LabeledSpan>,
}

impl SchemaSyntaxError {
    /// Builds the error from the diagnostics of a failed parse.
    pub fn new(name: impl AsRef<str>, source: &str, diagnostics: DiagnosticBag) -> Self {
        let diagnostics = diagnostics.into_vec();
        let summary = match diagnostics.as_slice() {
            [only] => format!("invalid schema: {only}"),
            [first, ..] => format!("invalid schema: {first} (and {} more)", diagnostics.len() - 1),
            [] => "invalid schema".to_string(),
        };
        let labels = diagnostics
            .iter()
            .filter_map(|diag| {
                diag.primary_span()
                    .map(|span| LabeledSpan::new_with_span(Some(diag.to_string()), span))
            })
            .collect();

        Self {
            summary,
            diagnostics,
            src: NamedSource::new(name, source.to_string()),
            labels,
        }
    }

    /// The individual diagnostics, in source order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Errors raised while parsing, binding and building a schema.
///
/// All of these are configuration errors: they abort startup and are never
/// produced while executing a request.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum SchemaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SchemaSyntaxError),

    #[error("type `{0}` is defined more than once")]
    #[diagnostic(code(holocron::schema::duplicate_type))]
    DuplicateType(String),

    #[error("`{owner}` declares `{name}` more than once")]
    #[diagnostic(code(holocron::schema::duplicate_field))]
    DuplicateField { owner: String, name: String },

    #[error("`{location}` refers to unknown type `{referenced}`")]
    #[diagnostic(
        code(holocron::schema::unknown_type),
        help("declare the type or use one of String, Int, Float, Boolean, ID")
    )]
    UnknownTypeReference { location: String, referenced: String },

    #[error("`{0}` is bound more than once")]
    #[diagnostic(code(holocron::schema::duplicate_binding))]
    DuplicateBinding(String),

    #[error("binding `{binding}` does not match the schema: {reason}")]
    #[diagnostic(code(holocron::schema::dangling_binding))]
    DanglingBinding { binding: String, reason: String },

    #[error("abstract type `{0}` has no type resolver")]
    #[diagnostic(
        code(holocron::schema::missing_type_resolver),
        help("bind one with `bind_type_resolver` or `bind_type_fn`")
    )]
    MissingTypeResolver(String),

    #[error("schema is frozen; it cannot be modified after it was built")]
    #[diagnostic(code(holocron::schema::frozen))]
    Frozen,

    #[error("`{type_name}` cannot implement `{interface}`: {reason}")]
    #[diagnostic(code(holocron::schema::invalid_implementation))]
    InvalidImplementation {
        type_name: String,
        interface: String,
        reason: String,
    },

    #[error("union `{union_name}` can only contain object types, found `{member}`")]
    #[diagnostic(code(holocron::schema::invalid_union_member))]
    InvalidUnionMember { union_name: String, member: String },

    #[error("`{location}` must be an input type, found `{type_name}`")]
    #[diagnostic(code(holocron::schema::invalid_input_type))]
    InvalidInputType { location: String, type_name: String },

    #[error("`{location}` must be an output type, found `{type_name}`")]
    #[diagnostic(code(holocron::schema::invalid_output_type))]
    InvalidOutputType { location: String, type_name: String },

    #[error("query root type `{0}` is not defined as an object type")]
    #[diagnostic(code(holocron::schema::missing_query_type))]
    MissingQueryType(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use holocron_core::{diagnostics::codes, Span};

    #[test]
    fn test_syntax_error_summary() {
        let mut bag = DiagnosticBag::new();
        bag.error(
            codes::UNEXPECTED_TOKEN,
            "unexpected token",
            Span::new(18, 24),
            "expected :, found `String`",
        );
        bag.error(
            codes::UNEXPECTED_EOF,
            "unexpected token",
            Span::new(24, 24),
            "expected }, found <eof>",
        );

        let error = SchemaSyntaxError::new("schema.graphqls", "type Query { name String", bag);
        assert_eq!(
            error.to_string(),
            "invalid schema: unexpected token: expected :, found `String` (and 1 more)"
        );
        assert_eq!(error.diagnostics().len(), 2);
        assert_eq!(error.labels.len(), 2);
    }

    #[test]
    fn test_schema_error_messages() {
        let error = SchemaError::UnknownTypeReference {
            location: "Query.hero".into(),
            referenced: "Charactr".into(),
        };
        assert_eq!(error.to_string(), "`Query.hero` refers to unknown type `Charactr`");
        assert_eq!(
            SchemaError::DuplicateBinding("Query.hero".into()).to_string(),
            "`Query.hero` is bound more than once"
        );
    }
}

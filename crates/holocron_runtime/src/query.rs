//! Query documents: parsing, operation selection, validation and variable
//! coercion.

use crate::coerce;
use crate::executor::{FieldError, Location};
use crate::schema::{TypeDef, TypeRef, TypeRegistry};
use holocron_core::{LineIndex, Span};
use holocron_syntax::ast;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use std::sync::Arc;

const PARSE_FAILED: &str = "GRAPHQL_PARSE_FAILED";
const VALIDATION_FAILED: &str = "GRAPHQL_VALIDATION_FAILED";
const BAD_USER_INPUT: &str = "BAD_USER_INPUT";

/// A parsed query document.
#[derive(Debug, Clone)]
pub struct QueryDocument {
    source: Arc<str>,
    document: ast::Document,
    fragments: FxHashMap<String, usize>,
}

/// An operation selected from a document, with coerced variables.
#[derive(Debug)]
pub struct PreparedOperation<'a> {
    pub operation: &'a ast::OperationDefinition,
    pub root_type: String,
    pub variables: Map<String, Value>,
}

impl QueryDocument {
    /// Parses query text.
    ///
    /// # Errors
    ///
    /// Returns one error per syntax problem, type-system definition or
    /// duplicate fragment, each with its location.
    pub fn parse(source: impl Into<Arc<str>>) -> Result<Self, Vec<FieldError>> {
        let source: Arc<str> = source.into();
        let result = holocron_syntax::parse(&source);
        let line_index = LineIndex::new(&source);
        let locate = |error: FieldError, span: Span| {
            let position = line_index.span_start(span);
            error.with_location(Location {
                line: position.line,
                column: position.column,
            })
        };

        let mut errors: Vec<FieldError> = result
            .diagnostics
            .errors()
            .map(|diag| {
                let detail = diag.labels.first().map_or(diag.title.as_str(), |l| l.message.as_str());
                let error = FieldError::new(format!("Syntax Error: {detail}")).with_code(PARSE_FAILED);
                match diag.primary_span() {
                    Some(span) => locate(error, span),
                    None => error,
                }
            })
            .collect();
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut fragments = FxHashMap::default();
        let mut operation_names = FxHashSet::default();
        let mut anonymous = 0;
        for (index, def) in result.document.definitions.iter().enumerate() {
            match def {
                ast::Definition::Fragment(fragment) => {
                    if fragments.insert(fragment.name.value.clone(), index).is_some() {
                        errors.push(locate(
                            FieldError::new(format!(
                                "There can be only one fragment named \"{}\".",
                                fragment.name.value
                            ))
                            .with_code(VALIDATION_FAILED),
                            fragment.name.span,
                        ));
                    }
                }
                ast::Definition::Operation(op) => match &op.name {
                    Some(name) if !operation_names.insert(name.as_str()) => errors.push(locate(
                        FieldError::new(format!("There can be only one operation named \"{}\".", name.value))
                            .with_code(VALIDATION_FAILED),
                        name.span,
                    )),
                    Some(_) => {}
                    None => anonymous += 1,
                },
                ast::Definition::Type(ty) => errors.push(locate(
                    FieldError::new(format!("The \"{}\" definition is not executable.", ty.name().value))
                        .with_code(VALIDATION_FAILED),
                    ty.span(),
                )),
                ast::Definition::Schema(schema) => errors.push(locate(
                    FieldError::new("The schema definition is not executable.").with_code(VALIDATION_FAILED),
                    schema.span,
                )),
            }
        }
        let operation_count = result.document.operations().count();
        if anonymous > 0 && operation_count > 1 {
            for op in result.document.operations().filter(|op| op.name.is_none()) {
                errors.push(locate(
                    FieldError::new("This anonymous operation must be the only defined operation.")
                        .with_code(VALIDATION_FAILED),
                    op.span,
                ));
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            document: result.document,
            source,
            fragments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn document(&self) -> &ast::Document {
        &self.document
    }

    /// Looks up a fragment definition by name.
    pub fn fragment(&self, name: &str) -> Option<&ast::FragmentDefinition> {
        match self.document.definitions.get(*self.fragments.get(name)?) {
            Some(ast::Definition::Fragment(fragment)) => Some(fragment),
            _ => None,
        }
    }

    /// Selects the operation to run.
    ///
    /// # Errors
    ///
    /// Fails for an unknown name, or without a name when the document does
    /// not contain exactly one operation.
    pub fn operation(&self, name: Option<&str>) -> Result<&ast::OperationDefinition, FieldError> {
        if let Some(name) = name {
            return self
                .document
                .operations()
                .find(|op| op.name.as_ref().is_some_and(|n| n.value == name))
                .ok_or_else(|| FieldError::new(format!("Unknown operation named \"{name}\".")));
        }
        let mut operations = self.document.operations();
        match (operations.next(), operations.next()) {
            (Some(op), None) => Ok(op),
            (None, _) => Err(FieldError::new("Must provide an operation.")),
            (Some(_), Some(_)) => Err(FieldError::new(
                "Must provide operation name if query contains multiple operations.",
            )),
        }
    }

    /// Selects an operation, validates it against the schema and coerces
    /// the supplied variables.
    ///
    /// # Errors
    ///
    /// Returns every validation error, or every variable error when the
    /// document is valid.
    pub fn prepare(
        &self,
        registry: &TypeRegistry,
        operation_name: Option<&str>,
        variables: &Map<String, Value>,
        max_depth: Option<usize>,
    ) -> Result<PreparedOperation<'_>, Vec<FieldError>> {
        let operation = self.operation(operation_name).map_err(|e| vec![e])?;
        let line_index = LineIndex::new(&self.source);

        let root_type = match operation.operation {
            ast::OperationType::Query => Some(registry.query_type()),
            ast::OperationType::Mutation => registry.mutation_type(),
            ast::OperationType::Subscription => {
                return Err(vec![located(
                    &line_index,
                    FieldError::new("Subscriptions are not supported."),
                    operation.span,
                )]);
            }
        };
        let Some(root_type) = root_type else {
            return Err(vec![located(
                &line_index,
                FieldError::new("Schema is not configured for mutations.").with_code(VALIDATION_FAILED),
                operation.span,
            )]);
        };

        let mut validator = Validator {
            registry,
            document: self,
            line_index,
            operation,
            validated: FxHashSet::default(),
            stack: Vec::new(),
            errors: Vec::new(),
        };
        validator.validate_selection_set(root_type, &operation.selection_set);
        if let Some(max) = max_depth {
            let depth = validator.depth(&operation.selection_set, &mut Vec::new());
            if depth > max {
                let error = FieldError::new(format!(
                    "Query has depth of {depth}, which exceeds the maximum depth of {max}."
                ))
                .with_code(VALIDATION_FAILED);
                validator.errors.push(located(&validator.line_index, error, operation.span));
            }
        }
        if !validator.errors.is_empty() {
            return Err(validator.errors);
        }

        let variables = coerce_variables(registry, operation, variables, &validator.line_index)?;
        Ok(PreparedOperation {
            operation,
            root_type: root_type.to_string(),
            variables,
        })
    }
}

fn located(line_index: &LineIndex<'_>, error: FieldError, span: Span) -> FieldError {
    let position = line_index.span_start(span);
    error.with_location(Location {
        line: position.line,
        column: position.column,
    })
}

fn coerce_variables(
    registry: &TypeRegistry,
    operation: &ast::OperationDefinition,
    provided: &Map<String, Value>,
    line_index: &LineIndex<'_>,
) -> Result<Map<String, Value>, Vec<FieldError>> {
    let mut coerced = Map::new();
    let mut errors = Vec::new();
    for def in &operation.variables {
        let name = def.name.as_str();
        let ty = TypeRef::from(&def.ty);
        let mut fail = |message: String| {
            errors.push(located(
                line_index,
                FieldError::new(message).with_code(BAD_USER_INPUT),
                def.span,
            ));
        };

        if !registry.get(ty.name()).is_some_and(TypeDef::is_input) {
            fail(format!("Variable \"${name}\" cannot be non-input type \"{ty}\"."));
            continue;
        }
        match (provided.get(name), &def.default_value) {
            (Some(value), _) => match coerce::coerce_json(registry, value, &ty) {
                Ok(value) => {
                    coerced.insert(name.to_string(), value);
                }
                Err(reason) => fail(format!("Variable \"${name}\" got invalid value {value}; {reason}")),
            },
            (None, Some(default)) => match coerce::coerce_literal(registry, default, &ty, &Map::new()) {
                Ok(value) => {
                    coerced.insert(name.to_string(), value);
                }
                Err(reason) => fail(format!("Variable \"${name}\" has invalid default value: {reason}")),
            },
            (None, None) if ty.is_non_null() => {
                fail(format!("Variable \"${name}\" of required type \"{ty}\" was not provided."));
            }
            (None, None) => {}
        }
    }
    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}

struct Validator<'a> {
    registry: &'a TypeRegistry,
    document: &'a QueryDocument,
    line_index: LineIndex<'a>,
    operation: &'a ast::OperationDefinition,
    validated: FxHashSet<&'a str>,
    stack: Vec<&'a str>,
    errors: Vec<FieldError>,
}

impl<'a> Validator<'a> {
    fn error(&mut self, message: String, span: Span) {
        let error = FieldError::new(message).with_code(VALIDATION_FAILED);
        self.errors.push(located(&self.line_index, error, span));
    }

    fn validate_selection_set(&mut self, parent: &'a str, set: &'a ast::SelectionSet) {
        for selection in &set.selections {
            self.validate_directives(selection.directives());
            match selection {
                ast::Selection::Field(field) => self.validate_field(parent, field),
                ast::Selection::InlineFragment(inline) => {
                    let target = match &inline.type_condition {
                        Some(condition) => match self.type_condition(condition) {
                            Some(name) => name,
                            None => continue,
                        },
                        None => parent,
                    };
                    self.validate_selection_set(target, &inline.selection_set);
                }
                ast::Selection::FragmentSpread(spread) => self.validate_spread(spread),
            }
        }
    }

    fn validate_spread(&mut self, spread: &'a ast::FragmentSpread) {
        let name = spread.name.as_str();
        let Some(fragment) = self.document.fragment(name) else {
            self.error(format!("Unknown fragment \"{name}\"."), spread.name.span);
            return;
        };
        if self.stack.contains(&name) {
            self.error(format!("Cannot spread fragment \"{name}\" within itself."), spread.span);
            return;
        }
        if !self.validated.insert(name) {
            return;
        }
        let Some(target) = self.type_condition(&fragment.type_condition) else {
            return;
        };
        self.stack.push(name);
        self.validate_selection_set(target, &fragment.selection_set);
        self.stack.pop();
    }

    /// Checks that a type condition names a composite type.
    fn type_condition(&mut self, condition: &'a ast::Name) -> Option<&'a str> {
        match self.registry.get(condition.as_str()) {
            None => {
                self.error(format!("Unknown type \"{}\".", condition.value), condition.span);
                None
            }
            Some(def) if !def.is_composite() => {
                self.error(
                    format!("Fragment cannot condition on non composite type \"{}\".", condition.value),
                    condition.span,
                );
                None
            }
            Some(def) => Some(def.name()),
        }
    }

    fn validate_field(&mut self, parent: &'a str, field: &'a ast::Field) {
        let name = field.name.as_str();
        self.validate_arguments_variables(&field.arguments);

        if name == "__typename" {
            if let Some(set) = &field.selection_set {
                self.error(
                    format!("Field \"{name}\" must not have a selection since type \"String!\" has no subfields."),
                    set.span,
                );
            }
            return;
        }

        let Some(parent_def) = self.registry.get(parent) else {
            return;
        };
        let Some(definition) = parent_def.fields().and_then(|fields| fields.get(name)) else {
            let message = if matches!(parent_def, TypeDef::Union(_)) {
                format!(
                    "Cannot query field \"{name}\" on type \"{parent}\". Did you mean to use an inline fragment on \"{parent}\"?"
                )
            } else {
                format!("Cannot query field \"{name}\" on type \"{parent}\".")
            };
            self.error(message, field.name.span);
            return;
        };

        for argument in &field.arguments {
            if !definition.arguments.contains_key(argument.name.as_str()) {
                self.error(
                    format!(
                        "Unknown argument \"{}\" on field \"{parent}.{name}\".",
                        argument.name.value
                    ),
                    argument.span,
                );
            }
        }

        let Some(return_def) = self.registry.get(definition.ty.name()) else {
            return;
        };
        match (&field.selection_set, return_def.is_leaf()) {
            (Some(set), true) => self.error(
                format!(
                    "Field \"{name}\" must not have a selection since type \"{}\" has no subfields.",
                    definition.ty
                ),
                set.span,
            ),
            (None, false) => self.error(
                format!(
                    "Field \"{name}\" of type \"{}\" must have a selection of subfields. Did you mean \"{name} {{ ... }}\"?",
                    definition.ty
                ),
                field.span,
            ),
            (Some(set), false) => self.validate_selection_set(return_def.name(), set),
            (None, true) => {}
        }
    }

    fn validate_directives(&mut self, directives: &'a [ast::Directive]) {
        for directive in directives {
            let name = directive.name.as_str();
            if !matches!(name, "skip" | "include") {
                self.error(format!("Unknown directive \"@{name}\"."), directive.span);
                continue;
            }
            if directive.argument("if").is_none() {
                self.error(
                    format!(
                        "Directive \"@{name}\" argument \"if\" of type \"Boolean!\" is required, but it was not provided."
                    ),
                    directive.span,
                );
            }
            self.validate_arguments_variables(&directive.arguments);
        }
    }

    fn validate_arguments_variables(&mut self, arguments: &'a [ast::Argument]) {
        for argument in arguments {
            let mut used = Vec::new();
            variables_in(&argument.value, &mut used);
            for variable in used {
                let defined = self
                    .operation
                    .variables
                    .iter()
                    .any(|def| def.name.as_str() == variable);
                if defined {
                    continue;
                }
                let message = match &self.operation.name {
                    Some(op) => format!("Variable \"${variable}\" is not defined by operation \"{}\".", op.value),
                    None => format!("Variable \"${variable}\" is not defined."),
                };
                self.error(message, argument.span);
            }
        }
    }

    /// Deepest field nesting below `set`, following fragment spreads.
    fn depth(&self, set: &'a ast::SelectionSet, stack: &mut Vec<&'a str>) -> usize {
        set.selections
            .iter()
            .map(|selection| match selection {
                ast::Selection::Field(field) => {
                    1 + field
                        .selection_set
                        .as_ref()
                        .map_or(0, |set| self.depth(set, stack))
                }
                ast::Selection::InlineFragment(inline) => self.depth(&inline.selection_set, stack),
                ast::Selection::FragmentSpread(spread) => {
                    let name = spread.name.as_str();
                    match self.document.fragment(name) {
                        Some(fragment) if !stack.contains(&name) => {
                            stack.push(name);
                            let depth = self.depth(&fragment.selection_set, stack);
                            stack.pop();
                            depth
                        }
                        _ => 0,
                    }
                }
            })
            .max()
            .unwrap_or(0)
    }
}

fn variables_in<'a>(value: &'a ast::Value, out: &mut Vec<&'a str>) {
    match value {
        ast::Value::Variable(name) => out.push(name),
        ast::Value::List(items) => items.iter().for_each(|item| variables_in(item, out)),
        ast::Value::Object(fields) => fields.iter().for_each(|(_, v)| variables_in(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &str = r"
        type Query {
          hero(episode: Episode): Character
          search(text: String!): [SearchResult]
          human(id: ID!): Human
        }
        type Mutation { rename(id: ID!, name: String!): Human }
        enum Episode { NEWHOPE EMPIRE JEDI }
        interface Character { id: ID! name: String friends: [Character] }
        type Human implements Character { id: ID! name: String friends: [Character] homePlanet: String }
        type Droid implements Character { id: ID! name: String friends: [Character] primaryFunction: String }
        union SearchResult = Human | Droid
    ";

    fn registry() -> TypeRegistry {
        TypeRegistry::parse(SCHEMA).unwrap()
    }

    fn messages(query: &str) -> Vec<String> {
        let doc = QueryDocument::parse(query).unwrap();
        match doc.prepare(&registry(), None, &Map::new(), None) {
            Ok(_) => Vec::new(),
            Err(errors) => errors.into_iter().map(|e| e.message).collect(),
        }
    }

    #[test]
    fn test_parse_error_has_location() {
        let errors = QueryDocument::parse("{\n  hero {").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("Syntax Error: "));
        assert_eq!(errors[0].code(), Some(PARSE_FAILED));
        assert_eq!(errors[0].locations[0].line, 2);
    }

    #[test]
    fn test_type_definitions_are_not_executable() {
        let errors = QueryDocument::parse("type Foo { a: Int } { hero { id } }").unwrap_err();
        assert_eq!(errors[0].message, "The \"Foo\" definition is not executable.");
    }

    #[test]
    fn test_operation_selection() {
        let doc = QueryDocument::parse("query A { hero { id } } query B { hero { name } }").unwrap();
        assert_eq!(
            doc.operation(None).unwrap_err().message,
            "Must provide operation name if query contains multiple operations."
        );
        assert_eq!(doc.operation(Some("C")).unwrap_err().message, "Unknown operation named \"C\".");
        let op = doc.operation(Some("B")).unwrap();
        assert_eq!(op.name.as_ref().unwrap().as_str(), "B");

        let doc = QueryDocument::parse("fragment F on Human { id }").unwrap();
        assert_eq!(doc.operation(None).unwrap_err().message, "Must provide an operation.");
    }

    #[test]
    fn test_valid_query() {
        let query = r#"
            query Hero($ep: Episode = JEDI, $skip: Boolean!) {
              hero(episode: $ep) {
                __typename
                ...Names
                ... on Droid { primaryFunction @skip(if: $skip) }
              }
              search(text: "r2") { ... on Human { homePlanet } }
            }
            fragment Names on Character { id name friends { name } }
        "#;
        let doc = QueryDocument::parse(query).unwrap();
        let vars: Map<String, Value> = [("skip".to_string(), json!(false))].into_iter().collect();
        let prepared = doc.prepare(&registry(), None, &vars, Some(5)).unwrap();
        assert_eq!(prepared.root_type, "Query");
        assert_eq!(prepared.variables, vars_with(&[("ep", json!("JEDI")), ("skip", json!(false))]));
    }

    fn vars_with(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn test_unknown_field_and_argument() {
        assert_eq!(
            messages("{ hero { id mass } human(id: 1, extra: 2) { id } }"),
            vec![
                "Cannot query field \"mass\" on type \"Character\".".to_string(),
                "Unknown argument \"extra\" on field \"Query.human\".".to_string(),
            ]
        );
        assert_eq!(
            messages("{ search(text: \"x\") { id } }"),
            vec![
                "Cannot query field \"id\" on type \"SearchResult\". Did you mean to use an inline fragment on \"SearchResult\"?"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_selection_shape() {
        assert_eq!(
            messages("{ hero }"),
            vec!["Field \"hero\" of type \"Character\" must have a selection of subfields. Did you mean \"hero { ... }\"?".to_string()]
        );
        assert_eq!(
            messages("{ hero { name { first } } }"),
            vec!["Field \"name\" must not have a selection since type \"String\" has no subfields.".to_string()]
        );
    }

    #[test]
    fn test_fragment_errors() {
        assert_eq!(messages("{ hero { ...Missing } }"), vec!["Unknown fragment \"Missing\".".to_string()]);
        assert_eq!(
            messages("{ hero { ...A } } fragment A on Character { ...B } fragment B on Character { ...A }"),
            vec!["Cannot spread fragment \"A\" within itself.".to_string()]
        );
        assert_eq!(
            messages("{ hero { ... on Episode { id } ... on Wookiee { id } } }"),
            vec![
                "Fragment cannot condition on non composite type \"Episode\".".to_string(),
                "Unknown type \"Wookiee\".".to_string(),
            ]
        );
    }

    #[test]
    fn test_directive_and_variable_errors() {
        assert_eq!(
            messages("{ hero @defer { id } human(id: $id) { id @skip } }"),
            vec![
                "Unknown directive \"@defer\".".to_string(),
                "Variable \"$id\" is not defined.".to_string(),
                "Directive \"@skip\" argument \"if\" of type \"Boolean!\" is required, but it was not provided."
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_depth_limit() {
        let doc = QueryDocument::parse("{ hero { friends { friends { name } } } }").unwrap();
        assert!(doc.prepare(&registry(), None, &Map::new(), Some(4)).is_ok());
        let errors = doc.prepare(&registry(), None, &Map::new(), Some(3)).unwrap_err();
        assert_eq!(
            errors[0].message,
            "Query has depth of 4, which exceeds the maximum depth of 3."
        );
    }

    #[test]
    fn test_variable_coercion_errors() {
        let doc = QueryDocument::parse("query($id: ID!, $ep: Episode) { human(id: $id) { id } hero(episode: $ep) { id } }")
            .unwrap();
        let errors = doc.prepare(&registry(), None, &Map::new(), None).unwrap_err();
        assert_eq!(errors[0].message, "Variable \"$id\" of required type \"ID!\" was not provided.");
        assert_eq!(errors[0].code(), Some(BAD_USER_INPUT));

        let vars = vars_with(&[("id", json!(1)), ("ep", json!("CLONES"))]);
        let errors = doc.prepare(&registry(), None, &vars, None).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("Variable \"$ep\" got invalid value \"CLONES\""));

        let vars = vars_with(&[("id", json!(1))]);
        let prepared = doc.prepare(&registry(), None, &vars, None).unwrap();
        assert_eq!(prepared.variables, vars_with(&[("id", json!("1"))]));
    }

    #[test]
    fn test_mutation_and_subscription_roots() {
        let doc = QueryDocument::parse("mutation { rename(id: 1, name: \"Luke\") { name } }").unwrap();
        let prepared = doc.prepare(&registry(), None, &Map::new(), None).unwrap();
        assert_eq!(prepared.root_type, "Mutation");

        let doc = QueryDocument::parse("subscription { hero { id } }").unwrap();
        let errors = doc.prepare(&registry(), None, &Map::new(), None).unwrap_err();
        assert_eq!(errors[0].message, "Subscriptions are not supported.");

        let registry = TypeRegistry::parse("type Query { a: Int }").unwrap();
        let doc = QueryDocument::parse("mutation { a }").unwrap();
        let errors = doc.prepare(&registry, None, &Map::new(), None).unwrap_err();
        assert_eq!(errors[0].message, "Schema is not configured for mutations.");
    }
}

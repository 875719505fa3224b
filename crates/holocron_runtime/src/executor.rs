//! Query execution.

use crate::coerce;
use crate::executable::ExecutableSchema;
use crate::query::QueryDocument;
use crate::resolver::{ResolverBindings, ResolverInfo};
use crate::schema::{TypeDef, TypeRef, TypeRegistry};
use futures::future::{join_all, BoxFuture, FutureExt};
use holocron_core::{LineIndex, Span};
use holocron_syntax::ast;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Resolve sibling fields and list items concurrently.
    ///
    /// Mutation root fields always run serially.
    pub parallel: bool,
    /// Maximum selection nesting depth.
    pub max_depth: Option<usize>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_depth: None,
        }
    }
}

impl ExecutorConfig {
    /// Enables or disables concurrent sibling resolution.
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the maximum selection depth.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// The query executor.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    /// Creates a new executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor with configuration.
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes a request against a schema.
    ///
    /// Request-level failures (syntax, validation, variables) produce
    /// `data: null`; resolver failures are isolated per field.
    pub async fn execute(&self, schema: &ExecutableSchema, request: Request) -> Response {
        let document = match QueryDocument::parse(request.query.as_str()) {
            Ok(document) => document,
            Err(errors) => return Response::errors(errors),
        };
        let prepared = match document.prepare(
            schema.registry(),
            request.operation_name.as_deref(),
            &request.variables,
            self.config.max_depth,
        ) {
            Ok(prepared) => prepared,
            Err(errors) => return Response::errors(errors),
        };

        let operation = prepared.operation;
        debug!(
            "executing {} {}",
            operation.operation,
            operation.name.as_ref().map_or("<anonymous>", ast::Name::as_str)
        );

        let mut context = request.context;
        context.variables = prepared
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let context = Arc::new(context);

        let ctx = ExecutionContext {
            registry: schema.registry(),
            bindings: schema.bindings(),
            document: &document,
            line_index: LineIndex::new(document.source()),
            variables: &prepared.variables,
            context: &context,
            parallel: self.config.parallel,
        };

        let serial = !self.config.parallel || operation.operation == ast::OperationType::Mutation;
        let mut errors = Vec::new();
        let data = execute_selection_set(
            &ctx,
            &prepared.root_type,
            &request.root_value,
            vec![&operation.selection_set],
            &[],
            serial,
            &mut errors,
        )
        .await;

        Response {
            data: data.unwrap_or(Value::Null),
            errors,
        }
    }
}

/// A request to execute.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub query: String,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    /// Parent value of the root fields.
    #[serde(skip, default = "empty_object")]
    pub root_value: Value,
    #[serde(skip)]
    pub context: Context,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: Map::new(),
            root_value: empty_object(),
            context: Context::new(),
        }
    }

    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    #[must_use]
    pub fn with_root_value(mut self, root_value: Value) -> Self {
        self.root_value = root_value;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

impl From<&str> for Request {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

impl From<String> for Request {
    fn from(query: String) -> Self {
        Self::new(query)
    }
}

/// Request-scoped values handed to every resolver.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Request-scoped data.
    pub data: HashMap<String, Value>,
    /// Coerced variables of the executing operation.
    pub variables: HashMap<String, Value>,
}

impl Context {
    /// Creates a new context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with variables.
    pub fn with_variables(variables: HashMap<String, Value>) -> Self {
        Self {
            data: HashMap::new(),
            variables,
        }
    }

    /// Sets a value in the context.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.data.insert(key.into(), v);
        }
    }

    /// Gets a value from the context.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Gets a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Gets a variable as a specific type.
    pub fn variable_as<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Option<T> {
        self.variables
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// The result of executing a request.
///
/// `data` is always serialized, `null` included; `errors` only when
/// non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl Response {
    /// Creates a successful response with data.
    pub fn data(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    /// Creates a response with `data: null` and one error.
    pub fn error(error: FieldError) -> Self {
        Self::errors(vec![error])
    }

    /// Creates a response with `data: null` and the given errors.
    pub fn errors(errors: Vec<FieldError>) -> Self {
        Self {
            data: Value::Null,
            errors,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_null()
    }
}

/// An error record of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<IndexMap<String, Value>>,
}

/// 1-based position in the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// A path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Field(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl FieldError {
    /// Creates a new field error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: None,
        }
    }

    /// Adds a path to the error.
    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    /// Adds a source location.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    /// Adds an extension.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value);
        self
    }

    /// Sets the error code extension.
    #[must_use]
    pub fn with_code(self, code: impl Into<String>) -> Self {
        self.with_extension("code", Value::String(code.into()))
    }

    /// The `extensions.code` value, if set.
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("code")?.as_str()
    }
}

/// The position could not be completed and its error is already recorded.
///
/// The nearest nullable ancestor absorbs it as `null`.
#[derive(Debug, Clone, Copy)]
struct Propagate;

type Completion = Result<Value, Propagate>;

struct ExecutionContext<'a> {
    registry: &'a TypeRegistry,
    bindings: &'a ResolverBindings,
    document: &'a QueryDocument,
    line_index: LineIndex<'a>,
    variables: &'a Map<String, Value>,
    context: &'a Arc<Context>,
    parallel: bool,
}

impl ExecutionContext<'_> {
    fn location(&self, span: Span) -> Location {
        let position = self.line_index.span_start(span);
        Location {
            line: position.line,
            column: position.column,
        }
    }

    fn directive_flag(&self, directive: &ast::Directive) -> Option<bool> {
        match &directive.argument("if")?.value {
            ast::Value::Boolean(flag) => Some(*flag),
            ast::Value::Variable(name) => self.variables.get(name).and_then(Value::as_bool),
            _ => None,
        }
    }

    fn should_include(&self, directives: &[ast::Directive]) -> bool {
        directives.iter().all(|directive| match directive.name.as_str() {
            "skip" => self.directive_flag(directive) != Some(true),
            "include" => self.directive_flag(directive) != Some(false),
            _ => true,
        })
    }

    fn applies(&self, condition: Option<&ast::Name>, object_type: &str) -> bool {
        condition.map_or(true, |name| {
            name.value == object_type || self.registry.is_possible_type(&name.value, object_type)
        })
    }
}

/// Groups the fields selected on `object_type` by response key, in
/// selection order.
fn collect_fields<'a>(
    ctx: &ExecutionContext<'a>,
    object_type: &str,
    selection_sets: &[&'a ast::SelectionSet],
) -> IndexMap<&'a str, Vec<&'a ast::Field>> {
    let mut fields = IndexMap::new();
    let mut visited = FxHashSet::default();
    for set in selection_sets {
        collect_into(ctx, object_type, set, &mut fields, &mut visited);
    }
    fields
}

fn collect_into<'a>(
    ctx: &ExecutionContext<'a>,
    object_type: &str,
    set: &'a ast::SelectionSet,
    fields: &mut IndexMap<&'a str, Vec<&'a ast::Field>>,
    visited: &mut FxHashSet<&'a str>,
) {
    for selection in &set.selections {
        if !ctx.should_include(selection.directives()) {
            continue;
        }
        match selection {
            ast::Selection::Field(field) => {
                fields.entry(field.response_key()).or_default().push(field);
            }
            ast::Selection::InlineFragment(inline) => {
                if ctx.applies(inline.type_condition.as_ref(), object_type) {
                    collect_into(ctx, object_type, &inline.selection_set, fields, visited);
                }
            }
            ast::Selection::FragmentSpread(spread) => {
                if !visited.insert(spread.name.as_str()) {
                    continue;
                }
                let Some(fragment) = ctx.document.fragment(spread.name.as_str()) else {
                    continue;
                };
                if ctx.applies(Some(&fragment.type_condition), object_type) {
                    collect_into(ctx, object_type, &fragment.selection_set, fields, visited);
                }
            }
        }
    }
}

async fn run_all<F: Future>(parallel: bool, futures: Vec<F>) -> Vec<F::Output> {
    if parallel {
        return join_all(futures).await;
    }
    let mut outputs = Vec::with_capacity(futures.len());
    for future in futures {
        outputs.push(future.await);
    }
    outputs
}

async fn execute_selection_set<'a>(
    ctx: &'a ExecutionContext<'a>,
    object_type: &'a str,
    parent: &'a Value,
    selection_sets: Vec<&'a ast::SelectionSet>,
    path: &'a [PathSegment],
    serial: bool,
    errors: &mut Vec<FieldError>,
) -> Completion {
    let fields = collect_fields(ctx, object_type, &selection_sets);

    let futures: Vec<_> = fields
        .into_iter()
        .map(|(key, group)| {
            let mut field_path = path.to_vec();
            field_path.push(PathSegment::Field(key.to_string()));
            async move {
                let mut field_errors = Vec::new();
                let result =
                    execute_field(ctx, object_type, parent, group, field_path, &mut field_errors).await;
                (key, result, field_errors)
            }
        })
        .collect();

    let mut data = Map::new();
    let mut failed = false;
    for (key, result, field_errors) in run_all(!serial, futures).await {
        errors.extend(field_errors);
        match result {
            Ok(value) => {
                data.insert(key.to_string(), value);
            }
            Err(Propagate) => failed = true,
        }
    }

    if failed {
        Err(Propagate)
    } else {
        Ok(Value::Object(data))
    }
}

/// The field being completed, for error messages and locations.
struct FieldSite<'a> {
    parent_type: &'a str,
    fields: Vec<&'a ast::Field>,
}

impl FieldSite<'_> {
    fn label(&self) -> String {
        let name = self.fields.first().map_or("", |field| field.name.as_str());
        format!("{}.{name}", self.parent_type)
    }

    fn error(&self, ctx: &ExecutionContext<'_>, message: impl Into<String>, path: Vec<PathSegment>) -> FieldError {
        let error = FieldError::new(message).with_path(path);
        match self.fields.first() {
            Some(field) => error.with_location(ctx.location(field.span)),
            None => error,
        }
    }
}

async fn execute_field<'a>(
    ctx: &'a ExecutionContext<'a>,
    object_type: &'a str,
    parent: &'a Value,
    fields: Vec<&'a ast::Field>,
    path: Vec<PathSegment>,
    errors: &mut Vec<FieldError>,
) -> Completion {
    let Some(&field) = fields.first() else {
        return Ok(Value::Null);
    };
    let name = field.name.as_str();
    if name == "__typename" {
        return Ok(Value::String(object_type.to_string()));
    }

    let site = FieldSite {
        parent_type: object_type,
        fields,
    };
    let Some(definition) = ctx.registry.field(object_type, name) else {
        errors.push(site.error(
            ctx,
            format!("Cannot query field \"{name}\" on type \"{object_type}\"."),
            path,
        ));
        return Ok(Value::Null);
    };
    let failure = || {
        if definition.ty.is_non_null() {
            Err(Propagate)
        } else {
            Ok(Value::Null)
        }
    };

    let args = match coerce::coerce_arguments(ctx.registry, &definition.arguments, &field.arguments, ctx.variables) {
        Ok(args) => args,
        Err(message) => {
            errors.push(site.error(ctx, message, path).with_code("BAD_USER_INPUT"));
            return failure();
        }
    };

    let info = ResolverInfo::new(name, object_type)
        .with_response_key(field.response_key())
        .with_return_type(definition.ty.to_string())
        .with_path(path.clone());
    let resolved = ctx
        .bindings
        .resolver(object_type, name)
        .resolve(parent, &args, ctx.context, &info)
        .await;

    match resolved {
        Ok(value) => complete_value(ctx, &definition.ty, &site, value, path, errors).await,
        Err(error) => {
            warn!("resolver for {} failed: {error}", site.label());
            let mut field_error = FieldError::from(error).with_path(path);
            if let Some(field) = site.fields.first() {
                field_error = field_error.with_location(ctx.location(field.span));
            }
            errors.push(field_error);
            failure()
        }
    }
}

fn complete_value<'a>(
    ctx: &'a ExecutionContext<'a>,
    ty: &'a TypeRef,
    site: &'a FieldSite<'a>,
    value: Value,
    path: Vec<PathSegment>,
    errors: &'a mut Vec<FieldError>,
) -> BoxFuture<'a, Completion> {
    async move {
        match ty {
            TypeRef::NonNull(inner) => {
                let completed = complete_nullable(ctx, inner, site, value, path.clone(), errors).await?;
                if completed.is_null() {
                    errors.push(site.error(
                        ctx,
                        format!("Cannot return null for non-nullable field {}.", site.label()),
                        path,
                    ));
                    return Err(Propagate);
                }
                Ok(completed)
            }
            nullable => Ok(complete_nullable(ctx, nullable, site, value, path, errors)
                .await
                .unwrap_or(Value::Null)),
        }
    }
    .boxed()
}

async fn complete_nullable<'a>(
    ctx: &'a ExecutionContext<'a>,
    ty: &'a TypeRef,
    site: &'a FieldSite<'a>,
    value: Value,
    path: Vec<PathSegment>,
    errors: &mut Vec<FieldError>,
) -> Completion {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match ty {
        TypeRef::NonNull(_) => complete_value(ctx, ty, site, value, path, errors).await,
        TypeRef::List(item_type) => {
            let Value::Array(items) = value else {
                errors.push(site.error(
                    ctx,
                    format!(
                        "Expected Iterable, but did not find one for field {}.",
                        site.label()
                    ),
                    path,
                ));
                return Err(Propagate);
            };
            complete_list(ctx, item_type, site, items, path, errors).await
        }
        TypeRef::Named(name) => match ctx.registry.get(name) {
            Some(def @ (TypeDef::Scalar(_) | TypeDef::Enum(_))) => {
                coerce::serialize_leaf(def, value).map_err(|message| {
                    errors.push(site.error(ctx, message, path));
                    Propagate
                })
            }
            Some(TypeDef::Object(object)) => {
                complete_object(ctx, &object.name, site, &value, &path, errors).await
            }
            Some(def @ (TypeDef::Interface(_) | TypeDef::Union(_))) => {
                let concrete = ctx
                    .bindings
                    .type_resolver(def.name())
                    .and_then(|resolver| resolver.resolve_type(&value, ctx.context.as_ref()));
                match concrete {
                    Some(object_type) if ctx.registry.is_possible_type(def.name(), &object_type) => {
                        complete_object(ctx, &object_type, site, &value, &path, errors).await
                    }
                    Some(object_type) => {
                        errors.push(site.error(
                            ctx,
                            format!(
                                "Runtime Object type \"{object_type}\" is not a possible type for \"{}\".",
                                def.name()
                            ),
                            path,
                        ));
                        Err(Propagate)
                    }
                    None => {
                        errors.push(site.error(
                            ctx,
                            format!(
                                "Abstract type \"{}\" must resolve to an object type at runtime for field {}.",
                                def.name(),
                                site.label()
                            ),
                            path,
                        ));
                        Err(Propagate)
                    }
                }
            }
            _ => {
                errors.push(site.error(ctx, format!("\"{name}\" is not an output type."), path));
                Err(Propagate)
            }
        },
    }
}

async fn complete_list<'a>(
    ctx: &'a ExecutionContext<'a>,
    item_type: &'a TypeRef,
    site: &'a FieldSite<'a>,
    items: Vec<Value>,
    path: Vec<PathSegment>,
    errors: &mut Vec<FieldError>,
) -> Completion {
    let futures: Vec<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let mut item_path = path.clone();
            item_path.push(PathSegment::Index(index));
            async move {
                let mut item_errors = Vec::new();
                let result = complete_value(ctx, item_type, site, item, item_path, &mut item_errors).await;
                (result, item_errors)
            }
        })
        .collect();

    let mut completed = Vec::with_capacity(futures.len());
    let mut failed = false;
    for (result, item_errors) in run_all(ctx.parallel, futures).await {
        errors.extend(item_errors);
        match result {
            Ok(value) => completed.push(value),
            Err(Propagate) => failed = true,
        }
    }

    if failed {
        Err(Propagate)
    } else {
        Ok(Value::Array(completed))
    }
}

async fn complete_object<'a>(
    ctx: &'a ExecutionContext<'a>,
    object_type: &'a str,
    site: &'a FieldSite<'a>,
    value: &'a Value,
    path: &'a [PathSegment],
    errors: &mut Vec<FieldError>,
) -> Completion {
    let selection_sets = site
        .fields
        .iter()
        .filter_map(|field| field.selection_set.as_ref())
        .collect();
    execute_selection_set(ctx, object_type, value, selection_sets, path, !ctx.parallel, errors).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executable::SchemaBuilder;
    use crate::resolver::ResolverError;
    use serde_json::json;

    fn schema() -> ExecutableSchema {
        let mut builder = SchemaBuilder::from_sdl(
            r"
            type Query {
              user(id: ID!): User
              users: [User!]
              count: Int
            }
            type User {
              id: ID!
              name: String
              displayName: String
            }
            ",
        )
        .unwrap();
        builder
            .bind_fn("Query", "user", |_parent, args, _ctx, _info| {
                let id: String = args.require("id")?;
                Ok(json!({"id": id, "name": "Alice", "display_name": "alice"}))
            })
            .unwrap()
            .bind_fn("Query", "users", |_, _, _, _| {
                Ok(json!([{"id": "1", "name": "Alice"}, {"id": "2", "name": "Bob"}]))
            })
            .unwrap()
            .bind_fn("Query", "count", |_, _, _, _| Err(ResolverError::custom("boom")))
            .unwrap();
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn test_execute_simple_query() {
        let response = schema().execute(r#"{ user(id: 1) { id name displayName } }"#).await;

        assert!(!response.has_errors());
        assert_eq!(
            response.data,
            json!({"user": {"id": "1", "name": "Alice", "displayName": "alice"}})
        );
    }

    #[tokio::test]
    async fn test_execute_typename_and_aliases() {
        let response = schema()
            .execute("{ __typename first: user(id: \"7\") { __typename key: id } }")
            .await;

        assert_eq!(
            response.data,
            json!({"__typename": "Query", "first": {"__typename": "User", "key": "7"}})
        );
    }

    #[tokio::test]
    async fn test_execute_list_in_order() {
        let response = schema().execute("{ users { name } }").await;
        assert_eq!(response.data, json!({"users": [{"name": "Alice"}, {"name": "Bob"}]}));
    }

    #[tokio::test]
    async fn test_resolver_error_has_path_and_location() {
        let response = schema().execute("{\n  count\n}").await;

        assert_eq!(response.data, json!({"count": null}));
        assert_eq!(response.errors.len(), 1);
        let error = &response.errors[0];
        assert_eq!(error.message, "boom");
        assert_eq!(error.path, Some(vec![PathSegment::from("count")]));
        assert_eq!(error.locations, vec![Location { line: 2, column: 3 }]);
        assert_eq!(error.code(), None);
    }

    #[tokio::test]
    async fn test_missing_argument_is_field_error() {
        let response = schema().execute("{ user { id } count }").await;

        assert_eq!(response.data, json!({"user": null, "count": null}));
        assert_eq!(
            response.errors[0].message,
            "Argument \"id\" of required type \"ID!\" was not provided."
        );
        assert_eq!(response.errors[0].code(), Some("BAD_USER_INPUT"));
    }

    #[tokio::test]
    async fn test_request_error_has_null_data() {
        let response = schema().execute("{ user(id: 1) { id ").await;
        assert!(!response.has_data());
        assert!(response.has_errors());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"], Value::Null);
    }

    #[test]
    fn test_response_serialization_skips_empty_errors() {
        let response = Response::data(json!({"hero": {"name": "R2-D2"}}));
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"data":{"hero":{"name":"R2-D2"}}}"#
        );

        let error = FieldError::new("boom")
            .with_path(vec!["heroes".into(), 1.into(), "name".into()])
            .with_code("INTERNAL_SERVER_ERROR");
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({
                "message": "boom",
                "path": ["heroes", 1, "name"],
                "extensions": {"code": "INTERNAL_SERVER_ERROR"}
            })
        );
    }

    #[test]
    fn test_request_deserialize() {
        let request: Request = serde_json::from_value(json!({
            "query": "query Q($id: ID!) { user(id: $id) { id } }",
            "operationName": "Q",
            "variables": {"id": "3"}
        }))
        .unwrap();
        assert_eq!(request.operation_name.as_deref(), Some("Q"));
        assert_eq!(request.variables["id"], json!("3"));
        assert_eq!(request.root_value, json!({}));
    }

    #[test]
    fn test_context_values() {
        let mut ctx = Context::new();
        ctx.set("user_id", 42);
        assert_eq!(ctx.get::<i32>("user_id"), Some(42));
        assert_eq!(ctx.get::<String>("missing"), None);

        let ctx = Context::with_variables(HashMap::from([("id".to_string(), json!("1"))]));
        assert_eq!(ctx.variable_as::<String>("id"), Some("1".to_string()));
    }
}

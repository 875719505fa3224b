//! Resolver binding table.
//!
//! Field resolvers are keyed by (type, field); type resolvers map a runtime
//! value of an interface or union to its concrete object type.

use crate::error::SchemaError;
use crate::executor::{Context, FieldError, PathSegment};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Coerced arguments passed to a resolver, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverArgs {
    args: IndexMap<String, Value>,
}

impl ResolverArgs {
    /// Creates new resolver args.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates resolver args from a list of (name, value) pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            args: pairs.into_iter().collect(),
        }
    }

    /// Gets an argument by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Gets an argument as a specific type.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.args
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Gets a required argument.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or does not deserialize into `T`.
    pub fn require<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, ResolverError> {
        self.args
            .get(name)
            .ok_or_else(|| ResolverError::MissingArgument(name.to_string()))
            .and_then(|v| {
                serde_json::from_value(v.clone())
                    .map_err(|e| ResolverError::ArgumentParseError(name.to_string(), e.to_string()))
            })
    }

    /// Returns true if the argument was supplied (possibly as `null`).
    pub fn contains(&self, name: &str) -> bool {
        self.args.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.args.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Sets an argument.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.args.insert(name.into(), value);
    }
}

/// Info about the field being resolved.
#[derive(Debug, Clone)]
pub struct ResolverInfo {
    /// The field name being resolved.
    pub field_name: String,
    /// Alias if present, field name otherwise.
    pub response_key: String,
    /// The concrete object type owning the field.
    pub parent_type: String,
    /// The declared return type in SDL notation.
    pub return_type: String,
    /// Path to this field.
    pub path: Vec<PathSegment>,
}

impl ResolverInfo {
    /// Creates new resolver info.
    pub fn new(field_name: impl Into<String>, parent_type: impl Into<String>) -> Self {
        let field_name = field_name.into();
        Self {
            response_key: field_name.clone(),
            field_name,
            parent_type: parent_type.into(),
            return_type: String::new(),
            path: Vec::new(),
        }
    }

    /// Sets the return type.
    #[must_use]
    pub fn with_return_type(mut self, ty: impl Into<String>) -> Self {
        self.return_type = ty.into();
        self
    }

    /// Sets the response key.
    #[must_use]
    pub fn with_response_key(mut self, key: impl Into<String>) -> Self {
        self.response_key = key.into();
        self
    }

    /// Sets the path.
    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }
}

/// Result type for resolvers.
pub type ResolverResult = Result<Value, ResolverError>;

/// Future type for async resolvers.
pub type ResolverFuture<'a> = Pin<Box<dyn Future<Output = ResolverResult> + Send + 'a>>;

/// Error from a resolver.
///
/// Recovered locally by the executor: the field becomes `null` and the
/// error is reported with the field's path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverError {
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Failed to parse argument '{0}': {1}")]
    ArgumentParseError(String, String),

    #[error("{0}")]
    Custom(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResolverError {
    /// Creates a custom error with a message.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Value of `extensions.code` for this error, if any.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::FieldNotFound(_) => Some("FIELD_NOT_FOUND"),
            Self::MissingArgument(_) | Self::ArgumentParseError(..) => Some("BAD_USER_INPUT"),
            Self::Internal(_) => Some("INTERNAL_SERVER_ERROR"),
            Self::Custom(_) => None,
        }
    }
}

impl From<ResolverError> for FieldError {
    fn from(error: ResolverError) -> Self {
        let code = error.code();
        let field_error = FieldError::new(error.to_string());
        match code {
            Some(code) => field_error.with_code(code),
            None => field_error,
        }
    }
}

/// Trait for field resolvers.
pub trait Resolver: Send + Sync {
    /// Resolves a field value.
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Arc<Context>,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a>;
}

/// A shared resolver.
pub type SharedResolver = Arc<dyn Resolver>;

/// A sync resolver function.
pub type SyncResolverFn =
    Arc<dyn Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> ResolverResult + Send + Sync>;

/// A wrapper for sync resolver functions.
pub struct FnResolver {
    func: SyncResolverFn,
}

impl FnResolver {
    /// Creates a new function resolver.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> ResolverResult
            + Send
            + Sync
            + 'static,
    {
        Self { func: Arc::new(f) }
    }
}

impl Resolver for FnResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Arc<Context>,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        let result = (self.func)(parent, args, ctx.as_ref(), info);
        Box::pin(async move { result })
    }
}

/// An async resolver function type.
pub type AsyncResolverFn = Arc<
    dyn Fn(Value, ResolverArgs, Arc<Context>, ResolverInfo) -> ResolverFuture<'static> + Send + Sync,
>;

/// A wrapper for async resolver functions.
///
/// The closure receives owned copies of the parent, arguments and info,
/// and a shared handle to the request context, so the returned future can
/// be `'static`.
pub struct AsyncFnResolver {
    func: AsyncResolverFn,
}

impl AsyncFnResolver {
    /// Creates a new async function resolver.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, ResolverArgs, Arc<Context>, ResolverInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        Self {
            func: Arc::new(move |parent, args, ctx, info| Box::pin(f(parent, args, ctx, info))),
        }
    }
}

impl Resolver for AsyncFnResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Arc<Context>,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        (self.func)(parent.clone(), args.clone(), Arc::clone(ctx), info.clone())
    }
}

/// Resolves a field by reading the same-named property of the parent.
///
/// Falls back to the `snake_case` spelling of a camelCase field name, and
/// resolves to `null` when neither is present.
pub struct DefaultResolver;

impl Resolver for DefaultResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        _args: &'a ResolverArgs,
        _ctx: &'a Arc<Context>,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        let result = property(parent, &info.field_name);
        Box::pin(async move { result })
    }
}

fn property(parent: &Value, field_name: &str) -> ResolverResult {
    match parent {
        Value::Object(map) => Ok(map
            .get(field_name)
            .or_else(|| map.get(&to_snake_case(field_name)))
            .cloned()
            .unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        _ => Err(ResolverError::FieldNotFound(field_name.to_string())),
    }
}

/// Converts camelCase to snake_case.
fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Maps a runtime value of an abstract type to a concrete object type name.
///
/// Returning `None` means the value could not be classified; the executor
/// reports a field error at that position.
pub trait TypeResolver: Send + Sync {
    fn resolve_type(&self, value: &Value, ctx: &Context) -> Option<String>;
}

/// A shared type resolver.
pub type SharedTypeResolver = Arc<dyn TypeResolver>;

/// A wrapper for type resolver closures.
pub struct FnTypeResolver<F>(pub F);

impl<F> TypeResolver for FnTypeResolver<F>
where
    F: Fn(&Value, &Context) -> Option<String> + Send + Sync,
{
    fn resolve_type(&self, value: &Value, ctx: &Context) -> Option<String> {
        (self.0)(value, ctx)
    }
}

/// Declarative type resolver reading a discriminator property.
///
/// A `__typename` property on the value always wins. Otherwise the value of
/// `property` (a string, or a number compared by its decimal text) is looked
/// up in the mapping.
///
/// ```
/// use holocron_runtime::resolver::{DiscriminatorResolver, TypeResolver};
/// use holocron_runtime::Context;
///
/// let resolver = DiscriminatorResolver::new("type")
///     .variant("program", "ProgramRecord")
///     .variant("episode", "EpisodeRecord");
/// let value = serde_json::json!({"type": "episode", "title": "Pilot"});
/// assert_eq!(resolver.resolve_type(&value, &Context::new()).as_deref(), Some("EpisodeRecord"));
/// ```
#[derive(Debug, Clone)]
pub struct DiscriminatorResolver {
    property: String,
    mapping: FxHashMap<String, String>,
}

impl DiscriminatorResolver {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            mapping: FxHashMap::default(),
        }
    }

    /// Maps a discriminator value to a concrete type name.
    #[must_use]
    pub fn variant(mut self, value: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.mapping.insert(value.into(), type_name.into());
        self
    }
}

impl TypeResolver for DiscriminatorResolver {
    fn resolve_type(&self, value: &Value, _ctx: &Context) -> Option<String> {
        if let Some(typename) = value.get("__typename").and_then(Value::as_str) {
            return Some(typename.to_string());
        }
        let key = match value.get(&self.property)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        self.mapping.get(&key).cloned()
    }
}

/// Mutable binding table, frozen into [`ResolverBindings`] by
/// [`ResolverMap::build`].
#[derive(Default, Clone)]
pub struct ResolverMap {
    resolvers: IndexMap<String, IndexMap<String, SharedResolver>>,
    type_resolvers: IndexMap<String, SharedTypeResolver>,
}

impl ResolverMap {
    /// Creates a new resolver map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a resolver to a type and field.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateBinding`] if the pair is already bound.
    pub fn bind<R: Resolver + 'static>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: R,
    ) -> Result<&mut Self, SchemaError> {
        let (type_name, field_name) = (type_name.into(), field_name.into());
        if self
            .resolvers
            .get(&type_name)
            .is_some_and(|fields| fields.contains_key(&field_name))
        {
            return Err(SchemaError::DuplicateBinding(format!("{type_name}.{field_name}")));
        }
        self.resolvers
            .entry(type_name)
            .or_default()
            .insert(field_name, Arc::new(resolver));
        Ok(self)
    }

    /// Binds a sync function as a resolver.
    ///
    /// # Errors
    ///
    /// See [`ResolverMap::bind`].
    pub fn bind_fn<F>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        f: F,
    ) -> Result<&mut Self, SchemaError>
    where
        F: Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> ResolverResult
            + Send
            + Sync
            + 'static,
    {
        self.bind(type_name, field_name, FnResolver::new(f))
    }

    /// Binds an async function as a resolver.
    ///
    /// # Errors
    ///
    /// See [`ResolverMap::bind`].
    pub fn bind_async<F, Fut>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        f: F,
    ) -> Result<&mut Self, SchemaError>
    where
        F: Fn(Value, ResolverArgs, Arc<Context>, ResolverInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        self.bind(type_name, field_name, AsyncFnResolver::new(f))
    }

    /// Binds a type resolver to an interface or union.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateBinding`] if the type is already bound.
    pub fn bind_type_resolver<T: TypeResolver + 'static>(
        &mut self,
        type_name: impl Into<String>,
        resolver: T,
    ) -> Result<&mut Self, SchemaError> {
        let type_name = type_name.into();
        if self.type_resolvers.contains_key(&type_name) {
            return Err(SchemaError::DuplicateBinding(type_name));
        }
        self.type_resolvers.insert(type_name, Arc::new(resolver));
        Ok(self)
    }

    /// Binds a closure as a type resolver.
    ///
    /// # Errors
    ///
    /// See [`ResolverMap::bind_type_resolver`].
    pub fn bind_type_fn<F>(
        &mut self,
        type_name: impl Into<String>,
        f: F,
    ) -> Result<&mut Self, SchemaError>
    where
        F: Fn(&Value, &Context) -> Option<String> + Send + Sync + 'static,
    {
        self.bind_type_resolver(type_name, FnTypeResolver(f))
    }

    /// Freezes the table.
    pub fn build(self) -> ResolverBindings {
        ResolverBindings {
            resolvers: self
                .resolvers
                .into_iter()
                .map(|(ty, fields)| (ty, fields.into_iter().collect()))
                .collect(),
            type_resolvers: self.type_resolvers.into_iter().collect(),
            default_resolver: Arc::new(DefaultResolver),
        }
    }
}

impl Debug for ResolverMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverMap")
            .field("resolver_count", &self.resolvers.values().map(IndexMap::len).sum::<usize>())
            .field("type_resolver_count", &self.type_resolvers.len())
            .finish()
    }
}

/// Frozen binding table. Never mutated after [`ResolverMap::build`].
#[derive(Clone)]
pub struct ResolverBindings {
    resolvers: FxHashMap<String, FxHashMap<String, SharedResolver>>,
    type_resolvers: FxHashMap<String, SharedTypeResolver>,
    default_resolver: SharedResolver,
}

impl ResolverBindings {
    /// The explicitly bound resolver for a field, if any.
    pub fn bound(&self, type_name: &str, field_name: &str) -> Option<&dyn Resolver> {
        self.resolvers
            .get(type_name)?
            .get(field_name)
            .map(AsRef::as_ref)
    }

    /// The resolver to run for a field: the bound one, or property access.
    pub fn resolver(&self, type_name: &str, field_name: &str) -> &dyn Resolver {
        self.bound(type_name, field_name)
            .unwrap_or(self.default_resolver.as_ref())
    }

    pub fn type_resolver(&self, type_name: &str) -> Option<&dyn TypeResolver> {
        self.type_resolvers.get(type_name).map(AsRef::as_ref)
    }

    /// All bound (type, field) pairs, sorted.
    pub fn field_bindings(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<_> = self
            .resolvers
            .iter()
            .flat_map(|(ty, fields)| fields.keys().map(move |f| (ty.as_str(), f.as_str())))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// All types with a bound type resolver, sorted.
    pub fn type_resolver_bindings(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.type_resolvers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Debug for ResolverBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverBindings")
            .field("fields", &self.field_bindings())
            .field("type_resolvers", &self.type_resolver_bindings())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolver_args() {
        let mut args = ResolverArgs::new();
        args.set("id", json!(123));
        args.set("name", json!("test"));

        assert_eq!(args.get_as::<i64>("id"), Some(123));
        assert_eq!(args.get_as::<String>("name"), Some("test".to_string()));
        assert_eq!(args.get_as::<i64>("missing"), None);
        assert_eq!(
            args.require::<i64>("name"),
            Err(ResolverError::ArgumentParseError(
                "name".into(),
                "invalid type: string \"test\", expected i64".into()
            ))
        );
        assert_eq!(
            args.require::<i64>("missing"),
            Err(ResolverError::MissingArgument("missing".into()))
        );
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("firstName"), "first_name");
        assert_eq!(to_snake_case("homePlanet"), "home_planet");
        assert_eq!(to_snake_case("id"), "id");
        assert_eq!(to_snake_case("ID"), "i_d");
    }

    #[tokio::test]
    async fn test_default_resolver() {
        let resolver = DefaultResolver;
        let parent = json!({"name": "Alice", "home_planet": "Tatooine"});
        let args = ResolverArgs::new();
        let ctx = Arc::new(Context::new());

        let info = ResolverInfo::new("name", "Human");
        let result = resolver.resolve(&parent, &args, &ctx, &info).await;
        assert_eq!(result.unwrap(), json!("Alice"));

        let info = ResolverInfo::new("homePlanet", "Human");
        let result = resolver.resolve(&parent, &args, &ctx, &info).await;
        assert_eq!(result.unwrap(), json!("Tatooine"));

        let info = ResolverInfo::new("missing", "Human");
        let result = resolver.resolve(&parent, &args, &ctx, &info).await;
        assert_eq!(result.unwrap(), Value::Null);

        let result = resolver.resolve(&json!(42), &args, &ctx, &info).await;
        assert_eq!(result, Err(ResolverError::FieldNotFound("missing".into())));
    }

    #[tokio::test]
    async fn test_fn_resolver() {
        let resolver = FnResolver::new(|_parent, args, _ctx, _info| {
            let id: String = args.require("id")?;
            Ok(json!({"id": id, "name": "Luke Skywalker"}))
        });

        let mut args = ResolverArgs::new();
        args.set("id", json!("1000"));
        let info = ResolverInfo::new("human", "Query");

        let result = resolver.resolve(&json!({}), &args, &Arc::new(Context::new()), &info).await;
        assert_eq!(result.unwrap(), json!({"id": "1000", "name": "Luke Skywalker"}));
    }

    #[tokio::test]
    async fn test_async_fn_resolver() {
        let resolver = AsyncFnResolver::new(|parent, _args, _ctx, info| async move {
            tokio::task::yield_now().await;
            Ok(json!(format!("{}:{}", info.parent_type, parent["id"])))
        });

        let info = ResolverInfo::new("label", "Book");
        let result = resolver
            .resolve(&json!({"id": 1}), &ResolverArgs::new(), &Arc::new(Context::new()), &info)
            .await;
        assert_eq!(result.unwrap(), json!("Book:1"));
    }

    #[tokio::test]
    async fn test_async_fn_resolver_shares_context() {
        let mut context = Context::new();
        context.set("viewer", "leia");
        let ctx = Arc::new(context);

        let expected = Arc::clone(&ctx);
        let resolver = AsyncFnResolver::new(move |_parent, _args, ctx: Arc<Context>, _info| {
            let shared = Arc::ptr_eq(&ctx, &expected);
            async move { Ok(json!({"shared": shared, "viewer": ctx.get::<String>("viewer")})) }
        });

        let info = ResolverInfo::new("viewer", "Query");
        let result = resolver.resolve(&json!({}), &ResolverArgs::new(), &ctx, &info).await;
        assert_eq!(result.unwrap(), json!({"shared": true, "viewer": "leia"}));
    }

    #[test]
    fn test_duplicate_binding() {
        let mut map = ResolverMap::new();
        map.bind_fn("Query", "hero", |_, _, _, _| Ok(Value::Null)).unwrap();
        let error = map
            .bind_fn("Query", "hero", |_, _, _, _| Ok(Value::Null))
            .unwrap_err();
        assert!(matches!(error, SchemaError::DuplicateBinding(key) if key == "Query.hero"));

        map.bind_type_fn("Character", |_, _| None).unwrap();
        let error = map.bind_type_fn("Character", |_, _| None).unwrap_err();
        assert!(matches!(error, SchemaError::DuplicateBinding(key) if key == "Character"));
    }

    #[tokio::test]
    async fn test_bindings_fallback_to_default() {
        let mut map = ResolverMap::new();
        map.bind_fn("Query", "hello", |_, _, _, _| Ok(json!("Hello, World!")))
            .unwrap();
        let bindings = map.build();

        assert!(bindings.bound("Query", "hello").is_some());
        assert!(bindings.bound("User", "name").is_none());
        assert_eq!(bindings.field_bindings(), vec![("Query", "hello")]);

        let ctx = Arc::new(Context::new());
        let args = ResolverArgs::new();
        let info = ResolverInfo::new("name", "User");
        let parent = json!({"name": "Bob"});
        let result = bindings
            .resolver("User", "name")
            .resolve(&parent, &args, &ctx, &info)
            .await;
        assert_eq!(result.unwrap(), json!("Bob"));
    }

    #[test]
    fn test_discriminator_resolver() {
        let resolver = DiscriminatorResolver::new("type")
            .variant("program", "ProgramRecord")
            .variant("1", "EpisodeRecord");
        let ctx = Context::new();

        assert_eq!(
            resolver.resolve_type(&json!({"type": "program"}), &ctx).as_deref(),
            Some("ProgramRecord")
        );
        assert_eq!(
            resolver.resolve_type(&json!({"type": 1}), &ctx).as_deref(),
            Some("EpisodeRecord")
        );
        assert_eq!(
            resolver
                .resolve_type(&json!({"__typename": "Droid", "type": "program"}), &ctx)
                .as_deref(),
            Some("Droid")
        );
        assert_eq!(resolver.resolve_type(&json!({"type": "other"}), &ctx), None);
        assert_eq!(resolver.resolve_type(&json!("program"), &ctx), None);
    }

    #[test]
    fn test_resolver_error_codes() {
        let error: FieldError = ResolverError::MissingArgument("id".into()).into();
        assert_eq!(error.message, "Missing required argument: id");
        assert_eq!(error.code(), Some("BAD_USER_INPUT"));

        let error: FieldError = ResolverError::custom("boom").into();
        assert_eq!(error.message, "boom");
        assert_eq!(error.code(), None);
    }
}

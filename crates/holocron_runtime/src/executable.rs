//! Executable schemas: a type registry bound to resolvers, validated and
//! frozen.

use crate::error::SchemaError;
use crate::executor::{Context, Executor, Request, Response};
use crate::resolver::{
    ResolverArgs, ResolverBindings, ResolverInfo, ResolverMap, ResolverResult, Resolver, TypeResolver,
};
use crate::schema::{TypeDef, TypeRegistry};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// An immutable schema ready for execution.
///
/// Cloning is cheap and clones share the same registry and bindings, so one
/// schema can serve any number of concurrent requests.
#[derive(Debug, Clone)]
pub struct ExecutableSchema {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    registry: TypeRegistry,
    bindings: ResolverBindings,
}

impl ExecutableSchema {
    /// Cross-checks bindings against the registry and freezes both.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::MissingQueryType`] if the query root is not an object type.
    /// - [`SchemaError::DanglingBinding`] for a binding naming an unknown
    ///   type or field, a field of a non-object type, or a type resolver on a
    ///   non-abstract type.
    /// - [`SchemaError::MissingTypeResolver`] for an interface or union
    ///   without a type resolver.
    pub fn build(registry: TypeRegistry, bindings: ResolverBindings) -> Result<Self, SchemaError> {
        if !matches!(registry.get(registry.query_type()), Some(TypeDef::Object(_))) {
            return Err(SchemaError::MissingQueryType(registry.query_type().to_string()));
        }

        for (type_name, field_name) in bindings.field_bindings() {
            let dangling = |reason: String| SchemaError::DanglingBinding {
                binding: format!("{type_name}.{field_name}"),
                reason,
            };
            match registry.get(type_name) {
                None => return Err(dangling(format!("unknown type `{type_name}`"))),
                Some(TypeDef::Object(object)) if !object.fields.contains_key(field_name) => {
                    return Err(dangling(format!("`{type_name}` has no field `{field_name}`")));
                }
                Some(TypeDef::Object(_)) => {}
                Some(_) => {
                    return Err(dangling(format!(
                        "`{type_name}` is not an object type; only object fields can be bound"
                    )));
                }
            }
        }

        for type_name in bindings.type_resolver_bindings() {
            let reason = match registry.get(type_name) {
                None => format!("unknown type `{type_name}`"),
                Some(def) if def.is_abstract() => continue,
                Some(_) => format!("`{type_name}` is not an interface or union"),
            };
            return Err(SchemaError::DanglingBinding {
                binding: type_name.to_string(),
                reason,
            });
        }

        if let Some(missing) = registry
            .types()
            .filter(|def| def.is_abstract())
            .find(|def| bindings.type_resolver(def.name()).is_none())
        {
            return Err(SchemaError::MissingTypeResolver(missing.name().to_string()));
        }

        info!(
            "built executable schema with {} types, {} field resolvers and {} type resolvers",
            registry.len(),
            bindings.field_bindings().len(),
            bindings.type_resolver_bindings().len()
        );
        Ok(Self {
            inner: Arc::new(Inner { registry, bindings }),
        })
    }

    /// Starts a [`SchemaBuilder`] over a registry.
    pub fn builder(registry: TypeRegistry) -> SchemaBuilder {
        SchemaBuilder::new(registry)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    pub fn bindings(&self) -> &ResolverBindings {
        &self.inner.bindings
    }

    /// Executes a request with the default [`Executor`].
    pub async fn execute(&self, request: impl Into<Request>) -> Response {
        Executor::new().execute(self, request.into()).await
    }
}

/// Stateful builder combining a registry with a binding table.
///
/// Once [`SchemaBuilder::build`] succeeds the builder is frozen and every
/// further call fails with [`SchemaError::Frozen`].
#[derive(Debug)]
pub struct SchemaBuilder {
    registry: TypeRegistry,
    resolvers: ResolverMap,
    frozen: bool,
}

impl SchemaBuilder {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            resolvers: ResolverMap::new(),
            frozen: false,
        }
    }

    /// Parses schema text and starts a builder over it.
    ///
    /// # Errors
    ///
    /// See [`TypeRegistry::parse`].
    pub fn from_sdl(source: &str) -> Result<Self, SchemaError> {
        TypeRegistry::parse(source).map(Self::new)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn resolvers(&mut self) -> Result<&mut ResolverMap, SchemaError> {
        if self.frozen {
            return Err(SchemaError::Frozen);
        }
        Ok(&mut self.resolvers)
    }

    /// Binds a resolver to a type and field.
    ///
    /// # Errors
    ///
    /// [`SchemaError::Frozen`] after a successful build, or
    /// [`SchemaError::DuplicateBinding`].
    pub fn bind<R: Resolver + 'static>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: R,
    ) -> Result<&mut Self, SchemaError> {
        self.resolvers()?.bind(type_name, field_name, resolver)?;
        Ok(self)
    }

    /// Binds a sync function as a resolver.
    ///
    /// # Errors
    ///
    /// See [`SchemaBuilder::bind`].
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
        self.resolvers()?.bind_fn(type_name, field_name, f)?;
        Ok(self)
    }

    /// Binds an async function as a resolver.
    ///
    /// # Errors
    ///
    /// See [`SchemaBuilder::bind`].
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
        self.resolvers()?.bind_async(type_name, field_name, f)?;
        Ok(self)
    }

    /// Binds a type resolver to an interface or union.
    ///
    /// # Errors
    ///
    /// See [`SchemaBuilder::bind`].
    pub fn bind_type_resolver<T: TypeResolver + 'static>(
        &mut self,
        type_name: impl Into<String>,
        resolver: T,
    ) -> Result<&mut Self, SchemaError> {
        self.resolvers()?.bind_type_resolver(type_name, resolver)?;
        Ok(self)
    }

    /// Binds a closure as a type resolver.
    ///
    /// # Errors
    ///
    /// See [`SchemaBuilder::bind`].
    pub fn bind_type_fn<F>(&mut self, type_name: impl Into<String>, f: F) -> Result<&mut Self, SchemaError>
    where
        F: Fn(&Value, &Context) -> Option<String> + Send + Sync + 'static,
    {
        self.resolvers()?.bind_type_fn(type_name, f)?;
        Ok(self)
    }

    /// Validates and freezes the schema.
    ///
    /// A failed build leaves the builder open for corrections.
    ///
    /// # Errors
    ///
    /// [`SchemaError::Frozen`] when called again after success, otherwise
    /// see [`ExecutableSchema::build`].
    pub fn build(&mut self) -> Result<ExecutableSchema, SchemaError> {
        let resolvers = self.resolvers()?.clone();
        let schema = ExecutableSchema::build(self.registry.clone(), resolvers.build())?;
        self.frozen = true;
        Ok(schema)
    }
}

//! Runtime for holocron.
//!
//! This crate turns schema text and resolver functions into an executable
//! schema and runs queries against it:
//! - `schema`: Schema registry (SDL to validated type graph)
//! - `resolver`: Resolver and type resolver binding table
//! - `executable`: Validated, frozen executable schemas
//! - `query`: Query documents, validation and variable coercion
//! - `executor`: Query execution
//! - `error`: Build-time errors

mod coerce;
pub mod error;
pub mod executable;
pub mod executor;
pub mod query;
pub mod resolver;
pub mod schema;

pub use error::{SchemaError, SchemaSyntaxError};
pub use executable::{ExecutableSchema, SchemaBuilder};
pub use executor::{Context, Executor, ExecutorConfig, FieldError, Location, PathSegment, Request, Response};
pub use query::{PreparedOperation, QueryDocument};
pub use resolver::{
    DiscriminatorResolver, Resolver, ResolverArgs, ResolverError, ResolverInfo, ResolverMap, ResolverResult,
    TypeResolver,
};
pub use schema::{TypeDef, TypeKind, TypeRef, TypeRegistry};

//! Command-line interface for holocron.
//!
//! # Usage
//!
//! ```bash
//! # Run one query against a bundled demo
//! holocron query --demo star-wars '{ hero { name } }'
//!
//! # Query a schema file, serving data from a JSON root value
//! holocron query --schema api.graphqls --root '{"greeting": "hi"}' '{ greeting }'
//!
//! # Read queries from stdin, one per blank-line separated block
//! holocron repl --demo books
//!
//! # Validate schema files
//! holocron check schema.graphqls
//!
//! # Format files
//! holocron fmt schema.graphqls
//! ```

pub mod demo;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use demo::Demo;
use holocron_runtime::{
    DiscriminatorResolver, ExecutableSchema, Executor, ExecutorConfig, Request, Response, SchemaBuilder,
    TypeRegistry,
};
use holocron_syntax::{parse, FormatOptions};
use miette::{miette, IntoDiagnostic, WrapErr};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "holocron")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the schema comes from.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SchemaSource {
    /// Schema definition file
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Bundled demo schema with in-memory data
    #[arg(long, value_enum)]
    pub demo: Option<Demo>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute one query and print the JSON response
    Query {
        #[command(flatten)]
        source: SchemaSource,

        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,

        /// Operation to run when the document has several
        #[arg(short, long)]
        operation: Option<String>,

        /// Root value as a JSON object
        #[arg(long)]
        root: Option<String>,

        /// Print the response on one line
        #[arg(long)]
        compact: bool,

        /// Reject operations nested deeper than this
        #[arg(long)]
        max_depth: Option<usize>,

        /// Query document
        query: String,
    },

    /// Read queries from stdin and execute each one
    Repl {
        #[command(flatten)]
        source: SchemaSource,

        /// Root value as a JSON object
        #[arg(long)]
        root: Option<String>,

        /// Print responses on one line
        #[arg(long)]
        compact: bool,

        /// Reject operations nested deeper than this
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Check schema files for errors
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Format GraphQL files
    #[command(alias = "format")]
    Fmt {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Check if files are formatted (don't modify)
        #[arg(long)]
        check: bool,

        /// Indentation size
        #[arg(long, default_value = "2")]
        indent: usize,

        /// Use tabs instead of spaces
        #[arg(long)]
        tabs: bool,
    },

    /// Print version information
    Version,
}

/// Runs a command and returns the process exit code.
///
/// # Errors
///
/// Unreadable files, schema errors and malformed JSON arguments.
pub async fn run(cli: Cli) -> miette::Result<i32> {
    match cli.command {
        Commands::Query {
            source,
            variables,
            operation,
            root,
            compact,
            max_depth,
            query,
        } => {
            let session = Session::new(load_schema(&source)?, executor_config(max_depth))
                .with_root_value(parse_json_object("--root", root.as_deref())?)
                .compact(compact);

            let mut request = Request::new(query);
            if let Some(variables) = parse_json_object("--variables", variables.as_deref())?.as_object() {
                request = request.with_variables(variables.clone());
            }
            if let Some(operation) = operation {
                request = request.with_operation_name(operation);
            }

            let response = session.execute(request).await;
            println!("{}", session.render(&response)?);
            Ok(if response.has_data() { 0 } else { 1 })
        }
        Commands::Repl {
            source,
            root,
            compact,
            max_depth,
        } => {
            let session = Session::new(load_schema(&source)?, executor_config(max_depth))
                .with_root_value(parse_json_object("--root", root.as_deref())?)
                .compact(compact);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let served = session.repl(stdin, std::io::stdout().lock()).await?;
            debug!("repl finished after {served} queries");
            Ok(0)
        }
        Commands::Check { files } => check_files(&files, cli.verbose),
        Commands::Fmt {
            files,
            check,
            indent,
            tabs,
        } => format_files(&files, check, indent, tabs, cli.verbose),
        Commands::Version => {
            println!("holocron {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}

fn executor_config(max_depth: Option<usize>) -> ExecutorConfig {
    match max_depth {
        Some(depth) => ExecutorConfig::default().max_depth(depth),
        None => ExecutorConfig::default(),
    }
}

/// Loads and builds the schema named on the command line.
///
/// A schema file carries no resolvers: every field reads the property of
/// its parent value, starting from the root value, and interfaces and
/// unions dispatch on the `__typename` property of the data.
///
/// # Errors
///
/// Unreadable files and any [`holocron_runtime::SchemaError`].
pub fn load_schema(source: &SchemaSource) -> miette::Result<ExecutableSchema> {
    let path = match (&source.schema, source.demo) {
        (_, Some(demo)) => return Ok(demo.schema()?),
        (Some(path), None) => path,
        (None, None) => return Err(miette!("either --schema or --demo is required")),
    };

    let text = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let mut builder = SchemaBuilder::new(TypeRegistry::parse_named(&path.display().to_string(), &text)?);
    let abstract_types: Vec<String> = builder
        .registry()
        .types()
        .filter(|def| def.is_abstract())
        .map(|def| def.name().to_string())
        .collect();
    for name in abstract_types {
        builder.bind_type_resolver(name, DiscriminatorResolver::new("__typename"))?;
    }
    Ok(builder.build()?)
}

/// Parses an optional JSON object argument; absent means `{}`.
///
/// # Errors
///
/// Invalid JSON or a value other than an object.
pub fn parse_json_object(flag: &str, raw: Option<&str>) -> miette::Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(Map::new()));
    };
    let value: Value = serde_json::from_str(raw)
        .into_diagnostic()
        .wrap_err_with(|| format!("{flag} is not valid JSON"))?;
    if !value.is_object() {
        return Err(miette!("{flag} must be a JSON object, found {value}"));
    }
    Ok(value)
}

/// One frozen schema serving any number of queries.
#[derive(Debug, Clone)]
pub struct Session {
    schema: ExecutableSchema,
    executor: Executor,
    root_value: Value,
    compact: bool,
}

impl Session {
    pub fn new(schema: ExecutableSchema, config: ExecutorConfig) -> Self {
        Self {
            schema,
            executor: Executor::with_config(config),
            root_value: Value::Object(Map::new()),
            compact: false,
        }
    }

    #[must_use]
    pub fn with_root_value(mut self, root_value: Value) -> Self {
        self.root_value = root_value;
        self
    }

    #[must_use]
    pub fn compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    pub fn schema(&self) -> &ExecutableSchema {
        &self.schema
    }

    /// Executes a request, supplying the session root value.
    pub async fn execute(&self, request: Request) -> Response {
        let request = request.with_root_value(self.root_value.clone());
        self.executor.execute(&self.schema, request).await
    }

    /// Serializes a response, pretty unless the session is compact.
    ///
    /// # Errors
    ///
    /// Only if the response cannot be serialized.
    pub fn render(&self, response: &Response) -> miette::Result<String> {
        let rendered = if self.compact {
            serde_json::to_string(response)
        } else {
            serde_json::to_string_pretty(response)
        };
        rendered.into_diagnostic()
    }

    /// Reads blank-line separated query blocks from `input` and writes one
    /// response per block to `output`. Returns the number of queries served.
    ///
    /// # Errors
    ///
    /// Read or write failures.
    pub async fn repl<R, W>(&self, input: R, mut output: W) -> miette::Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        let mut block = String::new();
        let mut served = 0;

        loop {
            let line = lines.next_line().await.into_diagnostic()?;
            let end_of_block = line.as_deref().map_or(true, |line| line.trim().is_empty());
            if let Some(line) = &line {
                block.push_str(line);
                block.push('\n');
            }

            if end_of_block && !block.trim().is_empty() {
                let response = self.execute(Request::new(std::mem::take(&mut block))).await;
                writeln!(output, "{}", self.render(&response)?).into_diagnostic()?;
                output.flush().into_diagnostic()?;
                served += 1;
            }
            if end_of_block {
                block.clear();
            }
            if line.is_none() {
                return Ok(served);
            }
        }
    }
}

fn check_files(files: &[PathBuf], verbose: bool) -> miette::Result<i32> {
    let mut has_errors = false;

    for file in files {
        if verbose {
            println!("{} {}", "Checking".blue(), file.display());
        }

        let source = read_file(file)?;
        match TypeRegistry::parse_named(&file.display().to_string(), &source) {
            Ok(registry) => {
                if verbose {
                    println!("{} {} ({} types)", "OK".green(), file.display(), registry.len());
                }
            }
            Err(error) => {
                has_errors = true;
                eprintln!("{} {}", "Error".red().bold(), file.display());
                eprintln!("{:?}", miette::Report::new(error));
            }
        }
    }

    if has_errors {
        Ok(1)
    } else {
        println!("{} {} file(s) checked", "Success:".green().bold(), files.len());
        Ok(0)
    }
}

fn format_files(
    files: &[PathBuf],
    check_only: bool,
    indent: usize,
    use_tabs: bool,
    verbose: bool,
) -> miette::Result<i32> {
    let mut needs_formatting = false;

    let options = FormatOptions {
        indent_size: indent,
        use_tabs,
    };

    for file in files {
        let source = read_file(file)?;
        let result = parse(&source);

        if result.diagnostics.has_errors() {
            eprintln!("{} {} - parse error", "Error".red().bold(), file.display());
            for error in result.diagnostics.errors() {
                eprintln!("  {} {}", "-->".blue(), error);
            }
            continue;
        }

        let formatted = holocron_syntax::format_with_options(&result.document, options.clone());

        if check_only {
            if source != formatted {
                needs_formatting = true;
                println!("{} {}", "Would format".yellow(), file.display());
            } else if verbose {
                println!("{} {}", "OK".green(), file.display());
            }
        } else if source != formatted {
            std::fs::write(file, &formatted)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to write {}", file.display()))?;
            println!("{} {}", "Formatted".green(), file.display());
        } else if verbose {
            println!("{} {}", "Unchanged".dimmed(), file.display());
        }
    }

    Ok(i32::from(check_only && needs_formatting))
}

fn read_file(path: &Path) -> miette::Result<String> {
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}

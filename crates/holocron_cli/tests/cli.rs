use clap::Parser;
use holocron_cli::demo::Demo;
use holocron_cli::{load_schema, Cli, Commands, SchemaSource, Session};
use holocron_runtime::{ExecutorConfig, Request};
use serde_json::json;
use std::path::PathBuf;

fn schema_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schemas").join(name)
}

fn demo(demo: Demo) -> SchemaSource {
    SchemaSource {
        schema: None,
        demo: Some(demo),
    }
}

#[test]
fn test_parse_query_command() {
    let cli = Cli::try_parse_from([
        "holocron",
        "query",
        "--demo",
        "star-wars",
        "--variables",
        r#"{"episode": "EMPIRE"}"#,
        "--compact",
        "query Hero($episode: Episode) { hero(episode: $episode) { name } }",
    ])
    .unwrap();

    match cli.command {
        Commands::Query {
            source,
            variables,
            compact,
            max_depth,
            ..
        } => {
            assert_eq!(source.demo, Some(Demo::StarWars));
            assert!(source.schema.is_none());
            assert_eq!(variables.as_deref(), Some(r#"{"episode": "EMPIRE"}"#));
            assert!(compact);
            assert_eq!(max_depth, None);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_schema_source_is_required_and_exclusive() {
    assert!(Cli::try_parse_from(["holocron", "query", "{ hero { name } }"]).is_err());
    assert!(Cli::try_parse_from([
        "holocron",
        "query",
        "--schema",
        "api.graphqls",
        "--demo",
        "books",
        "{ bookById { name } }",
    ])
    .is_err());
    assert!(Cli::try_parse_from(["holocron", "repl", "--schema", "api.graphqls"]).is_ok());
}

#[test]
fn test_format_alias_and_global_flags() {
    let cli = Cli::try_parse_from(["holocron", "format", "a.graphql", "--check", "-v"]).unwrap();
    assert!(cli.verbose);
    assert!(matches!(cli.command, Commands::Fmt { check: true, indent: 2, .. }));
}

#[tokio::test]
async fn test_demo_query_with_variables() {
    let session = Session::new(load_schema(&demo(Demo::StarWars)).unwrap(), ExecutorConfig::default());
    let request = Request::new("query Hero($episode: Episode) { hero(episode: $episode) { name } }")
        .with_variables(json!({"episode": "EMPIRE"}).as_object().cloned().unwrap());

    let response = session.execute(request).await;
    assert_eq!(response.data, json!({"hero": {"name": "Luke Skywalker"}}));
    assert_eq!(
        session.render(&response).unwrap(),
        "{\n  \"data\": {\n    \"hero\": {\n      \"name\": \"Luke Skywalker\"\n    }\n  }\n}"
    );
}

#[tokio::test]
async fn test_schema_file_serves_root_value() {
    let source = SchemaSource {
        schema: Some(schema_file("starwars.graphqls")),
        demo: None,
    };
    let session = Session::new(load_schema(&source).unwrap(), ExecutorConfig::default())
        .with_root_value(json!({
            "hero": {"__typename": "Droid", "id": "2001", "name": "R2-D2", "primaryFunction": "Astromech"}
        }))
        .compact(true);

    let response = session
        .execute(Request::new("{ hero { name ... on Droid { primaryFunction } } }"))
        .await;
    assert_eq!(
        session.render(&response).unwrap(),
        r#"{"data":{"hero":{"name":"R2-D2","primaryFunction":"Astromech"}}}"#
    );
}

#[test]
fn test_missing_schema_file() {
    let source = SchemaSource {
        schema: Some(schema_file("missing.graphqls")),
        demo: None,
    };
    let error = load_schema(&source).unwrap_err();
    assert!(error.to_string().starts_with("failed to read"));
}

#[tokio::test]
async fn test_repl_answers_each_block() {
    let session = Session::new(load_schema(&demo(Demo::Books)).unwrap(), ExecutorConfig::default()).compact(true);
    let input = b"{\n  bookById(id: \"book-2\") { name }\n}\n\n\n{ bookById(id: \"book-3\") {\n  author { lastName } } }\n\n{ nope }";
    let mut output = Vec::new();

    let served = session.repl(&input[..], &mut output).await.unwrap();

    assert_eq!(served, 3);
    let lines: Vec<_> = std::str::from_utf8(&output).unwrap().lines().collect();
    assert_eq!(lines[0], r#"{"data":{"bookById":{"name":"Moby Dick"}}}"#);
    assert_eq!(lines[1], r#"{"data":{"bookById":{"author":{"lastName":"Rice"}}}}"#);
    assert!(lines[2].starts_with(r#"{"data":null,"errors":[{"message":"Cannot query field \"nope\" on type \"Query\"."#));
}

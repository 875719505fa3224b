//! Integration tests for query execution.

use holocron_runtime::{
    DiscriminatorResolver, ExecutableSchema, Executor, ExecutorConfig, PathSegment, Request,
    ResolverError, SchemaBuilder, SchemaError,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const STAR_WARS: &str = r#"
"""A character in the Star Wars trilogy"""
interface Character {
  id: ID!
  name: String
  friends: [Character]
  appearsIn: [Episode]
}

enum Episode { NEWHOPE EMPIRE JEDI }

type Human implements Character {
  id: ID!
  name: String
  friends: [Character]
  appearsIn: [Episode]
  homePlanet: String
}

type Droid implements Character {
  id: ID!
  name: String
  friends: [Character]
  appearsIn: [Episode]
  primaryFunction: String
}

union SearchResult = Human | Droid

type Query {
  hero(episode: Episode): Character
  human(id: ID!): Human
  droid(id: ID!): Droid
  search(text: String!): [SearchResult]
}
"#;

fn characters() -> Vec<Value> {
    vec![
        json!({"kind": "human", "id": "1000", "name": "Luke Skywalker", "friends": ["2001"], "appearsIn": ["NEWHOPE", "EMPIRE", "JEDI"], "home_planet": "Tatooine"}),
        json!({"kind": "droid", "id": "2001", "name": "R2-D2", "friends": ["1000"], "appearsIn": ["NEWHOPE", "EMPIRE", "JEDI"], "primary_function": "Astromech"}),
    ]
}

fn find(id: &str) -> Value {
    characters()
        .into_iter()
        .find(|c| c["id"] == id)
        .unwrap_or(Value::Null)
}

fn star_wars() -> ExecutableSchema {
    let mut builder = SchemaBuilder::from_sdl(STAR_WARS).unwrap();
    builder
        .bind_fn("Query", "hero", |_, args, _, _| {
            Ok(match args.get_as::<String>("episode").as_deref() {
                Some("EMPIRE") => find("1000"),
                _ => find("2001"),
            })
        })
        .unwrap()
        .bind_fn("Query", "human", |_, args, _, _| {
            let id: String = args.require("id")?;
            Ok(find(&id)).map(|c| if c["kind"] == "human" { c } else { Value::Null })
        })
        .unwrap()
        .bind_fn("Query", "droid", |_, args, _, _| {
            let id: String = args.require("id")?;
            Ok(find(&id)).map(|c| if c["kind"] == "droid" { c } else { Value::Null })
        })
        .unwrap()
        .bind_fn("Query", "search", |_, _, _, _| Ok(Value::Array(characters())))
        .unwrap()
        .bind_fn("Human", "friends", |parent, _, _, _| friends(parent))
        .unwrap()
        .bind_fn("Droid", "friends", |parent, _, _, _| friends(parent))
        .unwrap()
        .bind_type_resolver(
            "Character",
            DiscriminatorResolver::new("kind")
                .variant("human", "Human")
                .variant("droid", "Droid"),
        )
        .unwrap()
        .bind_type_fn("SearchResult", |value, _| match value["kind"].as_str() {
            Some("human") => Some("Human".to_string()),
            Some("droid") => Some("Droid".to_string()),
            _ => None,
        })
        .unwrap();
    builder.build().unwrap()
}

fn friends(parent: &Value) -> Result<Value, ResolverError> {
    let ids = parent["friends"]
        .as_array()
        .ok_or_else(|| ResolverError::Internal("friends missing".into()))?;
    Ok(ids.iter().filter_map(Value::as_str).map(find).collect())
}

fn path(segments: &[Value]) -> Option<Vec<PathSegment>> {
    Some(
        segments
            .iter()
            .map(|s| match s {
                Value::Number(n) => PathSegment::Index(n.as_u64().unwrap() as usize),
                other => PathSegment::Field(other.as_str().unwrap().to_string()),
            })
            .collect(),
    )
}

#[tokio::test]
async fn test_hero_resolved_through_interface() {
    let response = star_wars().execute("{ hero { name } }").await;

    assert!(!response.has_errors());
    assert_eq!(response.data, json!({"hero": {"name": "R2-D2"}}));
}

#[tokio::test]
async fn test_fragments_on_concrete_types() {
    let query = r"
        query HeroDetails($episode: Episode) {
          hero(episode: $episode) {
            __typename
            ...CharacterName
            ... on Human { homePlanet }
            ... on Droid { primaryFunction }
            friends { name }
          }
        }
        fragment CharacterName on Character { name }
    ";
    let schema = star_wars();

    let response = schema
        .execute(Request::new(query).with_variables(json!({"episode": "EMPIRE"}).as_object().unwrap().clone()))
        .await;
    assert_eq!(
        response.data,
        json!({"hero": {
            "__typename": "Human",
            "name": "Luke Skywalker",
            "homePlanet": "Tatooine",
            "friends": [{"name": "R2-D2"}]
        }})
    );

    let response = schema.execute(query).await;
    assert_eq!(
        response.data,
        json!({"hero": {
            "__typename": "Droid",
            "name": "R2-D2",
            "primaryFunction": "Astromech",
            "friends": [{"name": "Luke Skywalker"}]
        }})
    );
}

#[tokio::test]
async fn test_union_search_preserves_order() {
    let response = star_wars()
        .execute(r#"{ search(text: "a") { __typename ... on Human { name } ... on Droid { id } } }"#)
        .await;

    assert_eq!(
        response.data,
        json!({"search": [
            {"__typename": "Human", "name": "Luke Skywalker"},
            {"__typename": "Droid", "id": "2001"}
        ]})
    );
}

#[tokio::test]
async fn test_field_order_follows_selection() {
    let response = star_wars().execute("{ human(id: 1000) { name id appearsIn } }").await;

    let human = response.data["human"].as_object().unwrap();
    assert_eq!(human.keys().collect::<Vec<_>>(), vec!["name", "id", "appearsIn"]);
}

#[tokio::test]
async fn test_aliases_skip_and_include() {
    let query = r"
        query($withFriends: Boolean!) {
          luke: human(id: 1000) { name friends @include(if: $withFriends) { name } }
          r2: droid(id: 2001) { name primaryFunction @skip(if: true) }
        }
    ";
    let response = star_wars()
        .execute(Request::new(query).with_variables(json!({"withFriends": false}).as_object().unwrap().clone()))
        .await;

    assert_eq!(
        response.data,
        json!({"luke": {"name": "Luke Skywalker"}, "r2": {"name": "R2-D2"}})
    );
}

#[tokio::test]
async fn test_throwing_resolver_yields_null_and_one_error() {
    let mut builder = SchemaBuilder::from_sdl("type Query { hello: String world: String }").unwrap();
    builder
        .bind_fn("Query", "hello", |_, _, _, _| Err(ResolverError::custom("hello failed")))
        .unwrap()
        .bind_fn("Query", "world", |_, _, _, _| Ok(json!("world")))
        .unwrap();
    let response = builder.build().unwrap().execute("{ hello world }").await;

    assert_eq!(response.data, json!({"hello": null, "world": "world"}));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "hello failed");
    assert_eq!(response.errors[0].path, path(&[json!("hello")]));
}

#[tokio::test]
async fn test_non_null_root_failure_nulls_data() {
    let mut builder = SchemaBuilder::from_sdl("type Query { hero: Human! } type Human { name: String }").unwrap();
    builder
        .bind_fn("Query", "hero", |_, _, _, _| Err(ResolverError::custom("no hero")))
        .unwrap();
    let response = builder.build().unwrap().execute("{ hero { name } }").await;

    assert_eq!(response.data, Value::Null);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].path, path(&[json!("hero")]));

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["data"], Value::Null);
    assert_eq!(json["errors"][0]["path"], json!(["hero"]));
}

#[tokio::test]
async fn test_null_for_non_null_field_propagates_to_parent() {
    let mut builder = SchemaBuilder::from_sdl(
        "type Query { me: User other: String } type User { id: ID! name: String }",
    )
    .unwrap();
    builder
        .bind_fn("Query", "me", |_, _, _, _| Ok(json!({"name": "nobody"})))
        .unwrap()
        .bind_fn("Query", "other", |_, _, _, _| Ok(json!("fine")))
        .unwrap();
    let response = builder.build().unwrap().execute("{ me { id name } other }").await;

    assert_eq!(response.data, json!({"me": null, "other": "fine"}));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].message,
        "Cannot return null for non-nullable field User.id."
    );
    assert_eq!(response.errors[0].path, path(&[json!("me"), json!("id")]));
}

#[tokio::test]
async fn test_list_element_failure_is_isolated() {
    let mut builder = SchemaBuilder::from_sdl(
        "type Query { books: [Book] } type Book { title: String rating: Int }",
    )
    .unwrap();
    builder
        .bind_fn("Query", "books", |_, _, _, _| {
            Ok(json!([{"title": "A", "rating": 1}, {"title": "B", "rating": 2}, {"title": "C", "rating": 3}]))
        })
        .unwrap()
        .bind_fn("Book", "rating", |parent, _, _, _| {
            if parent["title"] == "B" {
                Err(ResolverError::custom("rating unavailable"))
            } else {
                Ok(parent["rating"].clone())
            }
        })
        .unwrap();
    let schema = builder.build().unwrap();

    for config in [ExecutorConfig::default(), ExecutorConfig::default().parallel(false)] {
        let response = Executor::with_config(config)
            .execute(&schema, Request::new("{ books { title rating } }"))
            .await;

        assert_eq!(
            response.data,
            json!({"books": [
                {"title": "A", "rating": 1},
                {"title": "B", "rating": null},
                {"title": "C", "rating": 3}
            ]})
        );
        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].path,
            path(&[json!("books"), json!(1), json!("rating")])
        );
    }
}

#[tokio::test]
async fn test_non_null_list_item_nulls_the_list() {
    let mut builder =
        SchemaBuilder::from_sdl("type Query { ids: [ID!] names: [String] }").unwrap();
    builder
        .bind_fn("Query", "ids", |_, _, _, _| Ok(json!(["1", null, "3"])))
        .unwrap()
        .bind_fn("Query", "names", |_, _, _, _| Ok(json!("not a list")))
        .unwrap();
    let response = builder.build().unwrap().execute("{ ids names }").await;

    assert_eq!(response.data, json!({"ids": null, "names": null}));
    assert_eq!(response.errors.len(), 2);
    assert_eq!(response.errors[0].path, path(&[json!("ids"), json!(1)]));
    assert_eq!(
        response.errors[1].message,
        "Expected Iterable, but did not find one for field Query.names."
    );
}

#[tokio::test]
async fn test_unresolvable_abstract_type() {
    let mut builder = SchemaBuilder::from_sdl(STAR_WARS).unwrap();
    builder
        .bind_fn("Query", "hero", |_, _, _, _| Ok(json!({"kind": "wookiee", "name": "Chewbacca"})))
        .unwrap()
        .bind_fn("Query", "search", |_, _, _, _| Ok(json!([{"kind": "human"}])))
        .unwrap()
        .bind_type_resolver("Character", DiscriminatorResolver::new("kind"))
        .unwrap()
        .bind_type_fn("SearchResult", |_, _| Some("Episode".to_string()))
        .unwrap();
    let response = builder
        .build()
        .unwrap()
        .execute(r#"{ hero { name } search(text: "x") { __typename } }"#)
        .await;

    assert_eq!(response.data, json!({"hero": null, "search": [null]}));
    assert_eq!(
        response.errors[0].message,
        "Abstract type \"Character\" must resolve to an object type at runtime for field Query.hero."
    );
    assert_eq!(
        response.errors[1].message,
        "Runtime Object type \"Episode\" is not a possible type for \"SearchResult\"."
    );
}

#[tokio::test]
async fn test_rerun_is_deterministic() {
    let schema = star_wars();
    let query = "{ hero { name friends { name ... on Human { homePlanet } } } search(text: \"\") { __typename } }";

    let first = schema.execute(query).await;
    for _ in 0..5 {
        let again = schema.clone().execute(query).await;
        assert_eq!(again, first);
    }
}

#[tokio::test]
async fn test_concurrent_requests_share_schema() {
    let schema = star_wars();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let schema = schema.clone();
            tokio::spawn(async move { schema.execute("{ droid(id: 2001) { name } }").await })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.data, json!({"droid": {"name": "R2-D2"}}));
    }
}

#[tokio::test]
async fn test_mutation_root_fields_run_serially() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = SchemaBuilder::from_sdl(
        "type Query { count: Int } type Mutation { increment(by: Int = 1): Int }",
    )
    .unwrap();
    let counter = Arc::new(Mutex::new(0));
    {
        let log = Arc::clone(&log);
        let counter = Arc::clone(&counter);
        builder
            .bind_async("Mutation", "increment", move |_, args, _, info| {
                let log = Arc::clone(&log);
                let counter = Arc::clone(&counter);
                async move {
                    let by: i64 = args.require("by")?;
                    // Later fields would overtake earlier ones if run concurrently.
                    tokio::time::sleep(std::time::Duration::from_millis(if by == 1 { 20 } else { 1 })).await;
                    let mut counter = counter.lock().unwrap();
                    *counter += by;
                    log.lock().unwrap().push(info.response_key.clone());
                    Ok(json!(*counter))
                }
            })
            .unwrap();
    }
    let response = builder
        .build()
        .unwrap()
        .execute("mutation { first: increment second: increment(by: 10) third: increment(by: 100) }")
        .await;

    assert_eq!(response.data, json!({"first": 1, "second": 11, "third": 111}));
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_request_errors() {
    let schema = star_wars();

    let response = schema.execute("{ hero { name ").await;
    assert_eq!(response.data, Value::Null);
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].message.starts_with("Syntax Error"));
    assert!(!response.errors[0].locations.is_empty());

    let response = schema.execute("{ hero { mass } }").await;
    assert_eq!(response.data, Value::Null);
    assert_eq!(
        response.errors[0].message,
        "Cannot query field \"mass\" on type \"Character\"."
    );

    let response = schema.execute("query($id: ID!) { human(id: $id) { name } }").await;
    assert_eq!(response.data, Value::Null);
    assert_eq!(
        response.errors[0].message,
        "Variable \"$id\" of required type \"ID!\" was not provided."
    );

    let response = Executor::with_config(ExecutorConfig::default().max_depth(2))
        .execute(&schema, Request::new("{ hero { friends { name } } }"))
        .await;
    assert_eq!(response.data, Value::Null);
}

#[tokio::test]
async fn test_deeply_nested_query_is_rejected() {
    let depth = 10_000;
    let query = format!("{}{}", "{ hero { friends ".repeat(depth), "} }".repeat(depth));

    let response = Executor::with_config(ExecutorConfig::default().max_depth(8))
        .execute(&star_wars(), Request::new(query))
        .await;

    assert_eq!(response.data, Value::Null);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].message,
        "Syntax Error: nesting exceeds the maximum depth of 128"
    );
}

#[tokio::test]
async fn test_root_value_and_context() {
    let mut builder = SchemaBuilder::from_sdl("type Query { greeting: String viewer: String }").unwrap();
    builder
        .bind_fn("Query", "viewer", |_, _, ctx, _| {
            Ok(ctx.get::<String>("viewer").map_or(Value::Null, Value::String))
        })
        .unwrap();
    let mut context = holocron_runtime::Context::new();
    context.set("viewer", "leia");

    let response = builder
        .build()
        .unwrap()
        .execute(
            Request::new("{ greeting viewer }")
                .with_root_value(json!({"greeting": "hello"}))
                .with_context(context),
        )
        .await;

    assert_eq!(response.data, json!({"greeting": "hello", "viewer": "leia"}));
}

#[test]
fn test_duplicate_binding_in_either_order() {
    for order in [["hero", "human"], ["human", "hero"]] {
        let mut builder = SchemaBuilder::from_sdl(STAR_WARS).unwrap();
        builder.bind_fn("Query", order[0], |_, _, _, _| Ok(Value::Null)).unwrap();
        builder.bind_fn("Query", order[1], |_, _, _, _| Ok(Value::Null)).unwrap();
        let error = builder
            .bind_fn("Query", order[0], |_, _, _, _| Ok(Value::Null))
            .unwrap_err();
        assert!(matches!(error, SchemaError::DuplicateBinding(ref key) if *key == format!("Query.{}", order[0])));
    }
}

#[test]
fn test_complete_bindings_never_miss_type_resolvers() {
    let mut builder = SchemaBuilder::from_sdl(STAR_WARS).unwrap();
    for name in ["Character", "SearchResult"] {
        builder.bind_type_fn(name, |_, _| None).unwrap();
    }
    assert!(builder.build().is_ok());
}

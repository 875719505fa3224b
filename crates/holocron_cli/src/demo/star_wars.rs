use holocron_runtime::{DiscriminatorResolver, ExecutableSchema, ResolverError, SchemaBuilder, SchemaError};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::sync::Arc;

pub(super) const SDL: &str = include_str!("../../schemas/starwars.graphqls");

/// Characters keyed by id, humans first.
struct Saga {
    characters: IndexMap<&'static str, Value>,
}

impl Saga {
    fn new() -> Self {
        let characters = [
            json!({"kind": "human", "id": "1000", "name": "Luke Skywalker", "friends": ["1002", "1003", "2000", "2001"], "appearsIn": ["NEWHOPE", "EMPIRE", "JEDI"], "homePlanet": "Tatooine"}),
            json!({"kind": "human", "id": "1001", "name": "Darth Vader", "friends": ["1004"], "appearsIn": ["NEWHOPE", "EMPIRE", "JEDI"], "homePlanet": "Tatooine"}),
            json!({"kind": "human", "id": "1002", "name": "Han Solo", "friends": ["1000", "1003", "2001"], "appearsIn": ["NEWHOPE", "EMPIRE", "JEDI"]}),
            json!({"kind": "human", "id": "1003", "name": "Leia Organa", "friends": ["1000", "1002", "2000", "2001"], "appearsIn": ["NEWHOPE", "EMPIRE", "JEDI"], "homePlanet": "Alderaan"}),
            json!({"kind": "human", "id": "1004", "name": "Wilhuff Tarkin", "friends": ["1001"], "appearsIn": ["NEWHOPE"]}),
            json!({"kind": "droid", "id": "2000", "name": "C-3PO", "friends": ["1000", "1002", "1003", "2001"], "appearsIn": ["NEWHOPE", "EMPIRE", "JEDI"], "primaryFunction": "Protocol"}),
            json!({"kind": "droid", "id": "2001", "name": "R2-D2", "friends": ["1000", "1002", "1003"], "appearsIn": ["NEWHOPE", "EMPIRE", "JEDI"], "primaryFunction": "Astromech"}),
        ];
        let ids = ["1000", "1001", "1002", "1003", "1004", "2000", "2001"];
        Self {
            characters: ids.into_iter().zip(characters).collect(),
        }
    }

    fn character(&self, id: &str, kind: Option<&str>) -> Value {
        self.characters
            .get(id)
            .filter(|c| kind.map_or(true, |kind| c["kind"] == kind))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Luke is the hero of The Empire Strikes Back; R2-D2 of every other episode.
    fn hero(&self, episode: Option<&str>) -> Value {
        match episode {
            Some("EMPIRE") => self.character("1000", None),
            _ => self.character("2001", None),
        }
    }

    fn friends(&self, character: &Value) -> Result<Value, ResolverError> {
        let ids = character["friends"]
            .as_array()
            .ok_or_else(|| ResolverError::Internal(format!("{} has no friends list", character["id"])))?;
        Ok(ids
            .iter()
            .filter_map(Value::as_str)
            .map(|id| self.character(id, None))
            .collect())
    }
}

pub(super) fn schema() -> Result<ExecutableSchema, SchemaError> {
    let saga = Arc::new(Saga::new());
    let mut builder = SchemaBuilder::from_sdl(SDL)?;

    let data = Arc::clone(&saga);
    builder.bind_fn("Query", "hero", move |_, args, _, _| {
        Ok(data.hero(args.get("episode").and_then(Value::as_str)))
    })?;
    for (field, kind) in [("human", "human"), ("droid", "droid")] {
        let data = Arc::clone(&saga);
        builder.bind_fn("Query", field, move |_, args, _, _| {
            let id: String = args.require("id")?;
            Ok(data.character(&id, Some(kind)))
        })?;
    }
    for owner in ["Human", "Droid"] {
        let data = Arc::clone(&saga);
        builder.bind_fn(owner, "friends", move |parent, _, _, _| data.friends(parent))?;
    }
    builder.bind_type_resolver(
        "Character",
        DiscriminatorResolver::new("kind")
            .variant("human", "Human")
            .variant("droid", "Droid"),
    )?;

    builder.build()
}

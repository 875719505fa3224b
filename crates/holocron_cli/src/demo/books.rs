use holocron_runtime::{ExecutableSchema, SchemaBuilder, SchemaError};
use serde_json::{json, Value};
use std::sync::Arc;

pub(super) const SDL: &str = include_str!("../../schemas/books.graphqls");

struct Library {
    books: Vec<Value>,
    authors: Vec<Value>,
}

impl Library {
    fn new() -> Self {
        Self {
            books: vec![
                json!({"id": "book-1", "name": "Harry Potter and the Philosopher's Stone", "pageCount": 223, "authorId": "author-1"}),
                json!({"id": "book-2", "name": "Moby Dick", "pageCount": 635, "authorId": "author-2"}),
                json!({"id": "book-3", "name": "Interview with the vampire", "pageCount": 371, "authorId": "author-3"}),
            ],
            authors: vec![
                json!({"id": "author-1", "firstName": "Joanne", "lastName": "Rowling"}),
                json!({"id": "author-2", "firstName": "Herman", "lastName": "Melville"}),
                json!({"id": "author-3", "firstName": "Anne", "lastName": "Rice"}),
            ],
        }
    }

    fn find<'a>(records: &'a [Value], id: Option<&str>) -> Option<&'a Value> {
        let id = id?;
        records.iter().find(|record| record["id"] == id)
    }
}

pub(super) fn schema() -> Result<ExecutableSchema, SchemaError> {
    let library = Arc::new(Library::new());
    let mut builder = SchemaBuilder::from_sdl(SDL)?;

    let data = Arc::clone(&library);
    builder.bind_fn("Query", "bookById", move |_, args, _, _| {
        let id = args.get("id").and_then(Value::as_str);
        Ok(Library::find(&data.books, id).cloned().unwrap_or(Value::Null))
    })?;

    let data = Arc::clone(&library);
    builder.bind_fn("Book", "author", move |book, _, _, _| {
        let id = book.get("authorId").and_then(Value::as_str);
        Ok(Library::find(&data.authors, id).cloned().unwrap_or(Value::Null))
    })?;

    builder.build()
}

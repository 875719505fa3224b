//! Bundled demo schemas with in-memory data.

mod books;
mod star_wars;

use clap::ValueEnum;
use holocron_runtime::{ExecutableSchema, SchemaError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Demo {
    /// Star Wars characters: `hero`, `human` and `droid`
    StarWars,
    /// Books with authors: `bookById`
    Books,
}

impl Demo {
    /// The schema text of the demo.
    pub fn sdl(self) -> &'static str {
        match self {
            Self::StarWars => star_wars::SDL,
            Self::Books => books::SDL,
        }
    }

    /// Builds the executable schema of the demo.
    ///
    /// # Errors
    ///
    /// Only if the bundled schema and its bindings disagree.
    pub fn schema(self) -> Result<ExecutableSchema, SchemaError> {
        match self {
            Self::StarWars => star_wars::schema(),
            Self::Books => books::schema(),
        }
    }
}

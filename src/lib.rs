pub mod api_connection;
pub mod cli;
pub mod config;
pub mod generation;
pub mod logging;
pub mod prompt;
pub mod recipe_schema;
pub mod response_extractor;
pub mod safety;
pub mod search;

pub use generation::{GenerationFailure, GenerationService, RawResponse, RecipeGenerator};
pub use recipe_schema::{Recipe, SchemaViolation};
pub use safety::ClassificationFailure;

use clap::{Parser, ValueEnum};
use std::fmt::Write;
use std::path::PathBuf;
use thiserror::Error;

use crate::recipe_schema::Recipe;

pub const MIN_INGREDIENTS: usize = 2;
pub const MAX_INGREDIENTS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Suggest a recipe from the ingredients you have", long_about = None)]
pub struct Cli {
    /// Comma-separated ingredients; asked for on stdin when omitted
    #[arg(short, long)]
    pub ingredients: Option<String>,

    /// Prompt template file containing {{ingredients}} and optionally {{web_results}}
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Do not add web search results to the prompt
    #[arg(long)]
    pub no_web: bool,

    /// Refuse ingredient lists that look like prompt injection
    #[arg(long)]
    pub check_safety: bool,

    /// Override the generation model
    #[arg(long)]
    pub model: Option<String>,

    /// Override the sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngredientListError {
    #[error("enter at least 2 ingredients (got {0})")]
    TooFew(usize),
    #[error("enter at most 15 ingredients (got {0})")]
    TooMany(usize),
}

/// Splits on commas, trims, drops empty entries and enforces the 2..=15 count.
pub fn parse_ingredient_list(input: &str) -> Result<Vec<String>, IngredientListError> {
    let ingredients: Vec<String> = input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();

    match ingredients.len() {
        n if n < MIN_INGREDIENTS => Err(IngredientListError::TooFew(n)),
        n if n > MAX_INGREDIENTS => Err(IngredientListError::TooMany(n)),
        _ => Ok(ingredients),
    }
}

/// Human-readable rendering, steps numbered from 1.
pub fn render_text(recipe: &Recipe) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Description\n  {}\n", recipe.description);

    let _ = writeln!(out, "Main ingredients");
    for item in &recipe.ingredients.main {
        let _ = writeln!(out, "  - {item}");
    }
    let _ = writeln!(out, "\nSeasonings");
    for item in &recipe.ingredients.seasonings {
        let _ = writeln!(out, "  - {item}");
    }

    let _ = writeln!(out, "\nPreparation");
    for (index, step) in recipe.steps() {
        let _ = writeln!(out, "  {}. {step}", index + 1);
    }
    let _ = write!(out, "\nPreparation time\n  {}", recipe.preparation_time);
    out
}

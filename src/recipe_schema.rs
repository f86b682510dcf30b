//! Recipe structure and the validator that gates every model response.
//!
//! Validation runs in a fixed order: all top-level fields must be present,
//! then each field is checked on its own. The first violation wins.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

use crate::api_connection::endpoints::{JsonSchema, JsonSchemaDefinition};
use crate::config::FieldNaming;

/// A number followed by a recognised time unit, English or Portuguese. The
/// unit must end at a word boundary or run into digits, as in "1h30".
static DURATION_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\d+\s*(?:seconds?|segundos?|minutes?|minutos?|mins?|hours?|horas?|h|days?|dias?)(?:\b|\d)")
        .ok()
});

#[derive(Debug, Clone, Copy)]
struct FieldName {
    canonical: &'static str,
    alias: &'static str,
}

impl FieldName {
    fn for_naming(self, naming: FieldNaming) -> &'static str {
        match naming {
            FieldNaming::Canonical => self.canonical,
            FieldNaming::Localized => self.alias,
        }
    }

    fn lookup(self, map: &Map<String, Value>) -> Option<&Value> {
        map.get(self.canonical).or_else(|| map.get(self.alias))
    }
}

const DESCRIPTION: FieldName = FieldName {
    canonical: "description",
    alias: "Descrição",
};
const INGREDIENTS: FieldName = FieldName {
    canonical: "ingredients",
    alias: "Ingredientes",
};
const MAIN_INGREDIENTS: FieldName = FieldName {
    canonical: "main",
    alias: "principais",
};
const SEASONINGS: FieldName = FieldName {
    canonical: "seasonings",
    alias: "condimentos",
};
const PREPARATION_STEPS: FieldName = FieldName {
    canonical: "preparation_steps",
    alias: "Modo de preparo",
};
const PREPARATION_TIME: FieldName = FieldName {
    canonical: "preparation_time",
    alias: "Tempo de preparo",
};

const TOP_LEVEL_FIELDS: [FieldName; 4] =
    [DESCRIPTION, INGREDIENTS, PREPARATION_STEPS, PREPARATION_TIME];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingredients {
    pub main: Vec<String>,
    pub seasonings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    pub description: String,
    pub ingredients: Ingredients,
    /// Keyed 0..N-1 without gaps; serializes with the keys as text.
    pub preparation_steps: BTreeMap<usize, String>,
    pub preparation_time: String,
}

impl Recipe {
    /// Steps in order, paired with their zero-based index.
    pub fn steps(&self) -> impl Iterator<Item = (usize, &str)> {
        self.preparation_steps
            .iter()
            .map(|(index, step)| (*index, step.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationReason {
    #[error("field is missing")]
    MissingField,
    #[error("expected {expected}")]
    WrongType { expected: &'static str },
    #[error("preparation steps must not be empty")]
    EmptySteps,
    #[error("non-sequential keys: step key {key:?} is not an integer")]
    NonSequentialKeys { key: String },
    #[error("gap in sequence: expected step {expected}, found {found}")]
    GapInSequence { expected: usize, found: i64 },
    #[error("duplicate step number {index}")]
    DuplicateStep { index: i64 },
    #[error("missing duration unit")]
    MissingDurationUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{field}`: {reason}")]
pub struct SchemaViolation {
    pub field: String,
    pub reason: ViolationReason,
}

impl SchemaViolation {
    fn new(field: impl Into<String>, reason: ViolationReason) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}

/// Validates a candidate mapping and builds a [`Recipe`] from it.
///
/// Every field may use its canonical name or its localized alias.
pub fn validate_recipe(candidate: &Map<String, Value>) -> Result<Recipe, SchemaViolation> {
    check_presence(candidate)?;

    let ingredients = validate_ingredients(INGREDIENTS.lookup(candidate))?;
    let preparation_steps = validate_steps(PREPARATION_STEPS.lookup(candidate))?;
    let preparation_time = validate_time(PREPARATION_TIME.lookup(candidate))?;
    let description = expect_string(DESCRIPTION.lookup(candidate), DESCRIPTION.canonical)?;

    Ok(Recipe {
        description,
        ingredients,
        preparation_steps,
        preparation_time,
    })
}

/// Same as [`validate_recipe`] for an arbitrary JSON value.
pub fn validate_recipe_value(candidate: &Value) -> Result<Recipe, SchemaViolation> {
    match candidate.as_object() {
        Some(map) => validate_recipe(map),
        None => Err(SchemaViolation::new(
            "$",
            ViolationReason::WrongType { expected: "object" },
        )),
    }
}

fn check_presence(candidate: &Map<String, Value>) -> Result<(), SchemaViolation> {
    match TOP_LEVEL_FIELDS
        .iter()
        .find(|field| field.lookup(candidate).is_none())
    {
        Some(missing) => Err(SchemaViolation::new(
            missing.canonical,
            ViolationReason::MissingField,
        )),
        None => Ok(()),
    }
}

fn expect_string(value: Option<&Value>, field: &str) -> Result<String, SchemaViolation> {
    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaViolation::new(
            field,
            ViolationReason::WrongType { expected: "string" },
        )),
        None => Err(SchemaViolation::new(field, ViolationReason::MissingField)),
    }
}

fn expect_string_list(value: Option<&Value>, field: &str) -> Result<Vec<String>, SchemaViolation> {
    let wrong_type = || {
        SchemaViolation::new(
            field,
            ViolationReason::WrongType {
                expected: "array of strings",
            },
        )
    };
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(wrong_type))
            .collect(),
        Some(_) => Err(wrong_type()),
        None => Err(SchemaViolation::new(field, ViolationReason::MissingField)),
    }
}

fn validate_ingredients(value: Option<&Value>) -> Result<Ingredients, SchemaViolation> {
    let groups = value.and_then(Value::as_object).ok_or_else(|| {
        SchemaViolation::new(
            INGREDIENTS.canonical,
            ViolationReason::WrongType { expected: "object" },
        )
    })?;

    let main = expect_string_list(MAIN_INGREDIENTS.lookup(groups), "ingredients.main")?;
    let seasonings = expect_string_list(SEASONINGS.lookup(groups), "ingredients.seasonings")?;
    Ok(Ingredients { main, seasonings })
}

fn validate_steps(value: Option<&Value>) -> Result<BTreeMap<usize, String>, SchemaViolation> {
    let field = PREPARATION_STEPS.canonical;
    let steps = value.and_then(Value::as_object).ok_or_else(|| {
        SchemaViolation::new(field, ViolationReason::WrongType { expected: "object" })
    })?;
    if steps.is_empty() {
        return Err(SchemaViolation::new(field, ViolationReason::EmptySteps));
    }

    let mut numbered = Vec::with_capacity(steps.len());
    for (key, step) in steps {
        let index: i64 = key.trim().parse().map_err(|_| {
            SchemaViolation::new(
                field,
                ViolationReason::NonSequentialKeys { key: key.clone() },
            )
        })?;
        let text = step.as_str().ok_or_else(|| {
            SchemaViolation::new(
                format!("{field}.{key}"),
                ViolationReason::WrongType { expected: "string" },
            )
        })?;
        numbered.push((index, text.to_string()));
    }
    numbered.sort_by_key(|(index, _)| *index);

    let mut ordered = BTreeMap::new();
    let mut previous: Option<i64> = None;
    for (expected, (index, text)) in numbered.into_iter().enumerate() {
        if previous == Some(index) {
            return Err(SchemaViolation::new(
                field,
                ViolationReason::DuplicateStep { index },
            ));
        }
        if usize::try_from(index).ok() != Some(expected) {
            return Err(SchemaViolation::new(
                field,
                ViolationReason::GapInSequence {
                    expected,
                    found: index,
                },
            ));
        }
        previous = Some(index);
        ordered.insert(expected, text);
    }
    Ok(ordered)
}

fn validate_time(value: Option<&Value>) -> Result<String, SchemaViolation> {
    let field = PREPARATION_TIME.canonical;
    let time = expect_string(value, field)?;
    if has_duration_unit(&time) {
        Ok(time)
    } else {
        Err(SchemaViolation::new(
            field,
            ViolationReason::MissingDurationUnit,
        ))
    }
}

/// True when `text` holds a number followed by a recognised time unit.
pub fn has_duration_unit(text: &str) -> bool {
    DURATION_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(text))
}

/// Schema descriptor sent to the service for structured recipe output.
pub fn recipe_json_schema(naming: FieldNaming) -> JsonSchemaDefinition {
    let ingredients = JsonSchema::object(
        "Ingredients split by kind",
        vec![
            (
                MAIN_INGREDIENTS.for_naming(naming).to_string(),
                JsonSchema::string_array("Main ingredients of the recipe"),
            ),
            (
                SEASONINGS.for_naming(naming).to_string(),
                JsonSchema::string_array("Seasonings and condiments used"),
            ),
        ],
    );

    let recipe = JsonSchema::object(
        "A recipe built from the supplied ingredients",
        vec![
            (
                DESCRIPTION.for_naming(naming).to_string(),
                JsonSchema::string("Short description of the recipe"),
            ),
            (INGREDIENTS.for_naming(naming).to_string(), ingredients),
            (
                PREPARATION_STEPS.for_naming(naming).to_string(),
                JsonSchema::string_map(
                    "Preparation steps keyed by their zero-based number as text: \"0\", \"1\", ...",
                ),
            ),
            (
                PREPARATION_TIME.for_naming(naming).to_string(),
                JsonSchema::string("Estimated time with a unit, e.g. '30 minutes'"),
            ),
        ],
    );

    JsonSchemaDefinition::new("recipe", recipe)
}

const YES_TOKENS: &[&str] = &["YES", "SIM"];
const NO_TOKENS: &[&str] = &["NO", "NÃO", "NAO"];

/// A two-valued verdict from the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryAnswer {
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected one of YES/NO/SIM/NÃO, got {0:?}")]
pub struct InvalidBinaryAnswer(pub String);

impl BinaryAnswer {
    /// Trims and upper-cases `raw` before matching it against the accepted tokens.
    pub fn parse(raw: &str) -> Result<Self, InvalidBinaryAnswer> {
        let token = raw.trim().to_uppercase();
        if YES_TOKENS.contains(&token.as_str()) {
            Ok(BinaryAnswer::Yes)
        } else if NO_TOKENS.contains(&token.as_str()) {
            Ok(BinaryAnswer::No)
        } else {
            Err(InvalidBinaryAnswer(raw.to_string()))
        }
    }

    pub fn as_bool(self) -> bool {
        matches!(self, BinaryAnswer::Yes)
    }
}

pub fn binary_answer_json_schema(naming: FieldNaming) -> JsonSchemaDefinition {
    let tokens: &[&str] = match naming {
        FieldNaming::Canonical => &["YES", "NO"],
        FieldNaming::Localized => &["SIM", "NÃO"],
    };
    JsonSchemaDefinition::new(
        "binary_answer",
        JsonSchema::object(
            "A single yes/no verdict",
            vec![(
                "content".to_string(),
                JsonSchema::string_enum("The verdict", tokens),
            )],
        ),
    )
}

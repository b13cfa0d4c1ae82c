use crate::cache::CacheStatus;
use crate::error::InvalidInput;
use crate::model::Recipe;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: CacheStatus,
    pub recipes: usize,
}

#[derive(Debug, Deserialize, Default)]
pub struct DeleteRequest {
    #[serde(default)]
    pub password: Option<String>,
}

/// A validated `POST /api/recipe` body, minus the password.
#[derive(Debug, PartialEq)]
pub enum RecipeWrite {
    Create(Recipe),
    Replace { previous_name: String, recipe: Recipe },
}

impl RecipeWrite {
    /// The body carries the recipe fields next to `edit` and `previousName`.
    pub fn parse(body: JsonValue) -> Result<Self, InvalidInput> {
        let JsonValue::Object(mut fields) = body else {
            return Err(InvalidInput::new("request body must be a JSON object"));
        };

        let edit: Option<bool> = take_field(&mut fields, "edit")?;
        let previous_name: Option<String> = take_field(&mut fields, "previousName")?;
        let recipe = Recipe::from_value(JsonValue::Object(fields))?;

        match (edit.unwrap_or(false), previous_name) {
            (true, Some(previous_name)) => Ok(RecipeWrite::Replace {
                previous_name,
                recipe,
            }),
            (true, None) => Err(InvalidInput::new("previousName is required when edit is set")),
            (false, _) => Ok(RecipeWrite::Create(recipe)),
        }
    }
}

/// Removes `password` from the body. Anything but a string counts as absent.
pub fn take_password(body: &mut JsonValue) -> Option<String> {
    match body.as_object_mut()?.remove("password")? {
        JsonValue::String(password) => Some(password),
        _ => None,
    }
}

fn take_field<T: DeserializeOwned>(
    fields: &mut Map<String, JsonValue>,
    key: &str,
) -> Result<Option<T>, InvalidInput> {
    match fields.remove(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| InvalidInput::new(format!("{} is invalid: {}", key, e))),
    }
}

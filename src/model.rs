use crate::error::InvalidInput;
use crate::highlight::{highlight, sort_longest_first};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

// ============================================================================
// Untrusted input
// ============================================================================
//
// Every field is optional here so a missing field is reported by name rather
// than as a generic deserialization error. Mistyped and unknown fields are
// rejected by serde.

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngredientInput {
    pub entry: Option<String>,
    pub keywords: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct StepInput {
    pub text: Option<String>,
    pub is_heading: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub serves: Option<i64>,
    pub ingredients: Option<Vec<IngredientInput>>,
    pub steps: Option<Vec<StepInput>>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, InvalidInput> {
    value.ok_or_else(|| InvalidInput::new(format!("{} is required", field)))
}

// Control characters would collide with the emphasis markers, so only
// line breaks and tabs are allowed.
fn non_empty(value: String, field: &str) -> Result<String, InvalidInput> {
    if value.is_empty() {
        return Err(InvalidInput::new(format!("{} must not be empty", field)));
    }
    if value
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return Err(InvalidInput::new(format!(
            "{} must not contain control characters",
            field
        )));
    }
    Ok(value)
}

fn non_empty_list<T>(values: Vec<T>, field: &str) -> Result<Vec<T>, InvalidInput> {
    if values.is_empty() {
        return Err(InvalidInput::new(format!("{} must not be empty", field)));
    }
    Ok(values)
}

fn non_empty_strings(values: Vec<String>, field: &str) -> Result<Vec<String>, InvalidInput> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| non_empty(value, &format!("{}[{}]", field, i)))
        .collect()
}

// ============================================================================
// Ingredient
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingredient {
    entry: String,
    keywords: Vec<String>,
}

impl Ingredient {
    /// Keywords are stored longest first.
    pub fn new(entry: String, keywords: Vec<String>) -> Result<Self, InvalidInput> {
        let entry = non_empty(entry, "entry")?;
        let mut keywords = non_empty_strings(keywords, "keywords")?;
        sort_longest_first(&mut keywords);
        Ok(Ingredient { entry, keywords })
    }

    pub fn parse(input: IngredientInput) -> Result<Self, InvalidInput> {
        let entry = required(input.entry, "entry")?;
        let keywords = required(input.keywords, "keywords")?;
        Ingredient::new(entry, keywords)
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// The entry with this ingredient's own keywords emphasised.
    pub fn highlighted(&self) -> String {
        highlight(&self.entry, &self.keywords)
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entry)
    }
}

// ============================================================================
// Step
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    text: String,
    is_heading: bool,
}

impl Step {
    pub fn new(text: String, is_heading: bool) -> Result<Self, InvalidInput> {
        let text = non_empty(text, "text")?;
        Ok(Step { text, is_heading })
    }

    /// A missing `isHeading` means a regular step.
    pub fn parse(input: StepInput) -> Result<Self, InvalidInput> {
        let text = required(input.text, "text")?;
        Step::new(text, input.is_heading.unwrap_or(false))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_heading(&self) -> bool {
        self.is_heading
    }

    /// The step text with every keyword of `ingredients` emphasised.
    pub fn highlighted(&self, ingredients: &[Ingredient]) -> String {
        let keywords: Vec<&str> = ingredients
            .iter()
            .flat_map(|ingredient| ingredient.keywords.iter().map(String::as_str))
            .collect();
        highlight(&self.text, &keywords)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// ============================================================================
// Recipe
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    name: String,
    description: String,
    tags: Vec<String>,
    serves: u32,
    ingredients: Vec<Ingredient>,
    steps: Vec<Step>,
}

impl Recipe {
    pub fn parse(input: RecipeInput) -> Result<Self, InvalidInput> {
        let name = non_empty(required(input.name, "name")?, "name")?;
        let description = non_empty(required(input.description, "description")?, "description")?;

        let tags = non_empty_list(required(input.tags, "tags")?, "tags")?;
        let tags = non_empty_strings(tags, "tags")?;

        let serves = required(input.serves, "serves")?;
        if serves < 1 {
            return Err(InvalidInput::new("serves must be at least 1"));
        }
        let serves = u32::try_from(serves).map_err(|_| InvalidInput::new("serves is too large"))?;

        let ingredients = non_empty_list(required(input.ingredients, "ingredients")?, "ingredients")?
            .into_iter()
            .enumerate()
            .map(|(i, ingredient)| {
                Ingredient::parse(ingredient).map_err(|e| e.within(format!("ingredients[{}]", i)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let steps = non_empty_list(required(input.steps, "steps")?, "steps")?
            .into_iter()
            .enumerate()
            .map(|(i, step)| Step::parse(step).map_err(|e| e.within(format!("steps[{}]", i))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Recipe {
            name,
            description,
            tags,
            serves,
            ingredients,
            steps,
        })
    }

    pub fn from_value(value: JsonValue) -> Result<Self, InvalidInput> {
        let input: RecipeInput = serde_json::from_value(value)?;
        Recipe::parse(input)
    }

    /// Parses a document as written by the store.
    pub fn from_document(document: &str) -> Result<Self, InvalidInput> {
        let input: RecipeInput = serde_json::from_str(document)?;
        Recipe::parse(input)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn serves(&self) -> u32 {
        self.serves
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===={}====", self.name.to_uppercase())?;
        writeln!(f, "{}", self.description)?;
        writeln!(f, "===Ingredients===")?;
        for ingredient in &self.ingredients {
            writeln!(f, "{}", ingredient.highlighted())?;
        }
        writeln!(f, "===Steps===")?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "{}) {}", i + 1, step.highlighted(&self.ingredients))?;
        }
        Ok(())
    }
}

// ============================================================================
// RecipeBook
// ============================================================================

/// Recipes in arrival order. Serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RecipeBook {
    recipes: Vec<Recipe>,
}

impl RecipeBook {
    pub fn new() -> Self {
        RecipeBook::default()
    }

    pub fn from_recipes(recipes: Vec<Recipe>) -> Self {
        RecipeBook { recipes }
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|recipe| recipe.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether `name` is used by a recipe other than `except`.
    pub fn name_taken(&self, name: &str, except: Option<&str>) -> bool {
        self.recipes
            .iter()
            .any(|recipe| recipe.name == name && Some(recipe.name.as_str()) != except)
    }

    pub fn add(&mut self, recipe: Recipe) {
        self.recipes.push(recipe);
    }

    /// Drops `previous_name` and appends `recipe` at the end.
    pub fn replace(&mut self, previous_name: &str, recipe: Recipe) {
        self.remove(previous_name);
        self.add(recipe);
    }

    /// Removing a name that is not in the book is a no-op.
    pub fn remove(&mut self, name: &str) -> Option<Recipe> {
        let index = self.recipes.iter().position(|recipe| recipe.name == name)?;
        Some(self.recipes.remove(index))
    }
}

impl fmt::Display for RecipeBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=====RECIPE BOOK=====")?;
        writeln!(f)?;
        for recipe in &self.recipes {
            writeln!(f, "{}", recipe)?;
        }
        Ok(())
    }
}

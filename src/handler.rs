use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::api::{DeleteRequest, HealthResponse, RecipeWrite, take_password};
use crate::cache::RecipeCache;
use crate::db::RecipeStore;
use crate::error::AppError;
use crate::limiter::SlowDown;
use crate::model::{Recipe, RecipeBook};

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RecipeCache>,
    pub store: Arc<dyn RecipeStore>,
    pub limiter: Arc<SlowDown>,
    pub password: Arc<str>,
    pub unauthorized_delay: Duration,
}

impl AppState {
    /// Wrong or missing passwords are answered only after `unauthorized_delay`.
    async fn authorize(&self, password: Option<&str>, method: &str) -> Result<(), AppError> {
        if password == Some(self.password.as_ref()) {
            return Ok(());
        }

        tokio::time::sleep(self.unauthorized_delay).await;
        tracing::warn!("attempted {} with incorrect password denied", method);
        Err(AppError::Unauthorized)
    }
}

pub async fn healthcheck(State(state): State<AppState>) -> impl IntoResponse {
    info!("got healthcheck request");
    Json(HealthResponse {
        status: state.cache.status(),
        recipes: state.cache.len().await,
    })
}

pub async fn get_recipes(State(state): State<AppState>) -> Json<RecipeBook> {
    Json(state.cache.snapshot().await)
}

pub async fn get_recipes_text(State(state): State<AppState>) -> String {
    state.cache.snapshot().await.to_string()
}

pub async fn post_recipe(
    State(state): State<AppState>,
    body: Option<Json<JsonValue>>,
) -> Result<Json<Recipe>, AppError> {
    // A missing or non-JSON body carries no password
    let Json(mut body) = body.unwrap_or(Json(JsonValue::Null));
    let password = take_password(&mut body);
    state.authorize(password.as_deref(), "POST").await?;

    let write = RecipeWrite::parse(body).inspect_err(|e| {
        tracing::warn!(error = %e, "rejected recipe payload");
    })?;

    let recipe = match write {
        RecipeWrite::Create(recipe) => state.cache.add_recipe(state.store.as_ref(), recipe).await?,
        RecipeWrite::Replace {
            previous_name,
            recipe,
        } => {
            state
                .cache
                .replace_recipe(state.store.as_ref(), &previous_name, recipe)
                .await?
        }
    };

    Ok(Json(recipe))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<DeleteRequest>>,
) -> Result<Json<String>, AppError> {
    let Json(body) = body.unwrap_or_default();
    state.authorize(body.password.as_deref(), "DELETE").await?;

    state.cache.delete_recipe(state.store.as_ref(), &name).await?;
    Ok(Json(name))
}

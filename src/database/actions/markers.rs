use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{bad_request, ApiError, QueryError},
    schema::{ShortRecipe, Uuid},
};

use super::recipes::get_short_recipe;

use potion::Error;
use sqlx::{Pool, Postgres};

/// A per-user existence marker on a recipe.
pub trait RecipeMarker {
    const TABLE: &'static str;
    const ACTION: ActionType;
    const ALREADY_ADDED: &'static str;
    const NOT_ADDED: &'static str;
}

pub struct Favorite;

impl RecipeMarker for Favorite {
    const TABLE: &'static str = "favorites";
    const ACTION: ActionType = ActionType::ManageOwnFavorites;
    const ALREADY_ADDED: &'static str = "Recipe is already in favorites.";
    const NOT_ADDED: &'static str = "Recipe is not in favorites.";
}

pub struct ShoppingCart;

impl RecipeMarker for ShoppingCart {
    const TABLE: &'static str = "shopping_cart";
    const ACTION: ActionType = ActionType::ManageOwnCart;
    const ALREADY_ADDED: &'static str = "Recipe is already in the shopping cart.";
    const NOT_ADDED: &'static str = "Recipe is not in the shopping cart.";
}

/// Marks the recipe and returns its short representation.
pub async fn add_marker<M: RecipeMarker>(
    session: &SessionData,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, Error> {
    session.authenticate(M::ACTION)?;

    let recipe = get_short_recipe(pool, recipe_id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        M::TABLE
    ))
    .bind(session.user_id)
    .bind(recipe.id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(bad_request(M::ALREADY_ADDED));
    }

    log::debug!("{} added recipe {} to {}", session.username, recipe.id, M::TABLE);

    Ok(recipe)
}

pub async fn remove_marker<M: RecipeMarker>(
    session: &SessionData,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(M::ACTION)?;

    if get_short_recipe(pool, recipe_id).await?.is_none() {
        return Err(ApiError::not_found());
    }

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        M::TABLE
    ))
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(String::from(M::NOT_ADDED)).into());
    }

    log::debug!("{} removed recipe {recipe_id} from {}", session.username, M::TABLE);

    Ok(())
}

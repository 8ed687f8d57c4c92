use crate::{
    error::{QueryError, ValidationError},
    filters::{like_pattern, IngredientFilter},
    form::IngredientForm,
    schema::{Ingredient, RecipePart, Uuid},
};

use potion::Error;
use sqlx::{Pool, Postgres};

pub async fn list_ingredients(
    filter: &IngredientFilter,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = match &filter.name {
        Some(name) => sqlx::query_as(
            "SELECT id, name, measurement_unit FROM ingredients WHERE name ILIKE $1 ORDER BY name",
        )
        .bind(like_pattern(name))
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> =
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn create_ingredient(
    form: IngredientForm,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, Error> {
    let row: Ingredient = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        RETURNING id, name, measurement_unit
    ",
    )
    .bind(&form.name)
    .bind(&form.measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        let error = QueryError::from(e);
        if error.is_unique_violation() {
            Error::from(ValidationError::new(
                "name",
                format!(
                    "Ingredient \"{}\" measured in \"{}\" already exists.",
                    form.name, form.measurement_unit
                ),
            ))
        } else {
            Error::from(error)
        }
    })?;

    log::info!("Created ingredient {} ({})", row.name, row.id);

    Ok(row)
}

/// Ingredient amounts of every recipe in `recipe_ids`.
pub async fn list_recipe_parts(
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipePart>, Error> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT a.recipe_id, i.id AS ingredient_id, i.name, i.measurement_unit, a.amount
        FROM ingredient_amounts a
        INNER JOIN ingredients i ON i.id = a.ingredient_id
        WHERE a.recipe_id = ANY($1)
        ORDER BY a.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

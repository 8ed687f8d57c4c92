use crate::{
    error::{QueryError, ValidationError},
    form::TagForm,
    schema::{LinkedRecipeTag, Tag, Uuid},
};

use potion::Error;
use sqlx::{Pool, Postgres};

pub async fn create_tag(form: TagForm, pool: &Pool<Postgres>) -> Result<Tag, Error> {
    let tag: Tag = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING id, name, color, slug",
    )
    .bind(&form.name)
    .bind(&form.color)
    .bind(&form.slug)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        let error = QueryError::from(e);
        let field = match error.constraint() {
            Some(c) if c.contains("color") => "color",
            Some(c) if c.contains("slug") => "slug",
            _ => "name",
        };

        if error.is_unique_violation() {
            Error::from(ValidationError::new(
                field,
                format!("Tag with this {field} already exists."),
            ))
        } else {
            Error::from(error)
        }
    })?;

    log::info!("Created tag {} ({})", tag.slug, tag.id);

    Ok(tag)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

/// Tags of every recipe in `recipe_ids`.
pub async fn list_recipe_tags(
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<Vec<LinkedRecipeTag>, Error> {
    let list: Vec<LinkedRecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.name
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}

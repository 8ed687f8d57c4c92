//! Rows for database-backed tests, inserted directly.

use sqlx::PgPool;

use crate::{
    jwt::SessionData,
    schema::{UserRole, Uuid},
};

pub async fn member(pool: &PgPool, username: &str) -> SessionData {
    let user_id: Uuid = sqlx::query_scalar(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, 'Ann', 'Lee', '')
        RETURNING id
    ",
    )
    .bind(format!("{username}@example.com"))
    .bind(username)
    .fetch_one(pool)
    .await
    .unwrap();

    SessionData {
        user_id,
        username: username.to_string(),
        role: UserRole::User,
    }
}

pub async fn tag(pool: &PgPool, slug: &str, color: &str) -> Uuid {
    sqlx::query_scalar("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $1) RETURNING id")
        .bind(slug)
        .bind(color)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn ingredient(pool: &PgPool, name: &str, unit: &str) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(unit)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Recipe without tags or an image file, holding the given ingredient amounts.
pub async fn recipe(pool: &PgPool, author: &SessionData, name: &str, parts: &[(Uuid, i32)]) -> Uuid {
    let recipe_id: Uuid = sqlx::query_scalar(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, 'Cook it.', 'recipes/images/missing.png', 10)
        RETURNING id
    ",
    )
    .bind(author.user_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();

    for (ingredient_id, amount) in parts {
        sqlx::query(
            "INSERT INTO ingredient_amounts (recipe_id, ingredient_id, amount) VALUES ($1, $2, $3)",
        )
        .bind(recipe_id)
        .bind(ingredient_id)
        .bind(amount)
        .execute(pool)
        .await
        .unwrap();
    }

    recipe_id
}

use std::collections::HashMap;

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{bad_request, ApiError, QueryError},
    pagination::PageRequest,
    schema::{ShortRecipe, Subscription, UserPageRow, UserRow, Uuid},
};

use super::users::get_user_row;

use potion::Error;
use sqlx::{Pool, Postgres};

#[derive(sqlx::FromRow)]
struct AuthorRecipe {
    author_id: Uuid,
    id: Uuid,
    name: String,
    image: String,
    cooking_time: i32,
}

/// Newest recipes of each author, at most `limit` per author when given.
async fn list_author_recipes(
    author_ids: &[Uuid],
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, Vec<ShortRecipe>>, Error> {
    let rows: Vec<AuthorRecipe> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time FROM (
            SELECT r.author_id, r.id, r.name, r.image, r.cooking_time,
                ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS n
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR n <= $2
        ORDER BY author_id, n
    ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut recipes: HashMap<Uuid, Vec<ShortRecipe>> = HashMap::new();
    for row in rows {
        recipes.entry(row.author_id).or_default().push(ShortRecipe {
            id: row.id,
            name: row.name,
            image: row.image,
            cooking_time: row.cooking_time,
        });
    }

    Ok(recipes)
}

async fn count_author_recipes(
    author_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, i64>, Error> {
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().collect())
}

async fn attach_recipes(
    authors: Vec<UserRow>,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Subscription>, Error> {
    if authors.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<Uuid> = authors.iter().map(|a| a.id).collect();
    let mut recipes = list_author_recipes(&ids, recipes_limit, pool).await?;
    let counts = count_author_recipes(&ids, pool).await?;

    Ok(authors
        .into_iter()
        .map(|author| Subscription {
            recipes: recipes.remove(&author.id).unwrap_or_default(),
            recipes_count: counts.get(&author.id).copied().unwrap_or(0),
            author,
        })
        .collect())
}

/// Follows `author_id` and returns the author with their recipes.
pub async fn subscribe(
    session: &SessionData,
    author_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Subscription, Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let author = get_user_row(pool, author_id, Some(session.user_id))
        .await?
        .ok_or_else(ApiError::not_found)?;

    if author.id == session.user_id {
        return Err(bad_request("You cannot subscribe to yourself."));
    }

    let result = sqlx::query(
        "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(author.id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(bad_request("You are already subscribed to this author."));
    }

    log::debug!("{} subscribed to {}", session.username, author.username);

    let author = UserRow {
        is_subscribed: true,
        ..author
    };

    let mut subscription = attach_recipes(vec![author], recipes_limit, pool).await?;
    subscription.pop().ok_or_else(ApiError::not_found)
}

pub async fn unsubscribe(
    session: &SessionData,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    if get_user_row(pool, author_id, None).await?.is_none() {
        return Err(ApiError::not_found());
    }

    let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
        .bind(session.user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(String::from(
            "You are not subscribed to this author.",
        ))
        .into());
    }

    log::debug!("{} unsubscribed from {author_id}", session.username);

    Ok(())
}

/// Authors followed by the session owner, with the total count before paging.
pub async fn fetch_subscriptions(
    session: &SessionData,
    recipes_limit: Option<i64>,
    page: PageRequest,
    pool: &Pool<Postgres>,
) -> Result<(Vec<Subscription>, i64), Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    let offset = page.offset()?;

    let rows: Vec<UserPageRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            TRUE AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(page.limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    let authors: Vec<UserRow> = rows.into_iter().map(UserRow::from).collect();

    Ok((attach_recipes(authors, recipes_limit, pool).await?, total_count))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::PgPool;

    use super::*;
    use crate::{actions::fixtures, error::error_body};

    #[sqlx::test(migrations = "./migrations")]
    async fn follows_are_unique_and_never_self(pool: PgPool) {
        let cook = fixtures::member(&pool, "cook").await;
        let author = fixtures::member(&pool, "author").await;

        let error = subscribe(&cook, cook.user_id, None, &pool).await.err().unwrap();
        assert_eq!(
            error_body(&error),
            (400, json!({ "errors": "You cannot subscribe to yourself." }))
        );

        let subscription = subscribe(&cook, author.user_id, None, &pool)
            .await
            .ok()
            .unwrap();
        assert_eq!(subscription.author.id, author.user_id);
        assert!(subscription.author.is_subscribed);

        let error = subscribe(&cook, author.user_id, None, &pool).await.err().unwrap();
        assert_eq!(
            error_body(&error),
            (400, json!({ "errors": "You are already subscribed to this author." }))
        );

        assert!(unsubscribe(&cook, author.user_id, &pool).await.is_ok());

        let error = unsubscribe(&cook, author.user_id, &pool).await.err().unwrap();
        assert_eq!(error.code as u16, 404);

        let error = subscribe(&cook, 4242, None, &pool).await.err().unwrap();
        assert_eq!(error.code as u16, 404);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn recipes_limit_truncates_but_counts_everything(pool: PgPool) {
        let cook = fixtures::member(&pool, "cook").await;
        let author = fixtures::member(&pool, "author").await;
        let salt = fixtures::ingredient(&pool, "salt", "g").await;
        for name in ["first", "second", "third"] {
            fixtures::recipe(&pool, &author, name, &[(salt, 1)]).await;
        }

        let subscription = subscribe(&cook, author.user_id, Some(2), &pool)
            .await
            .ok()
            .unwrap();
        let names: Vec<&str> = subscription.recipes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["third", "second"]);
        assert_eq!(subscription.recipes_count, 3);

        let page = PageRequest { page: 1, limit: 6 };

        let (subscriptions, count) = fetch_subscriptions(&cook, Some(0), page, &pool)
            .await
            .ok()
            .unwrap();
        assert_eq!(count, 1);
        assert!(subscriptions[0].recipes.is_empty());
        assert_eq!(subscriptions[0].recipes_count, 3);

        let (subscriptions, _) = fetch_subscriptions(&cook, None, page, &pool)
            .await
            .ok()
            .unwrap();
        assert_eq!(subscriptions[0].recipes.len(), 3);
    }
}

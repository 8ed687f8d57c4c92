use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{generate_jwt_session, SessionData},
    },
    error::{bad_request, ApiError, QueryError, ValidationError},
    form::{validate_password, SetPasswordPayload, UserForm},
    pagination::PageRequest,
    schema::{User, UserPageRow, UserRow, Uuid},
};

use potion::Error;
use sqlx::{Pool, Postgres};

const USER_ROW: &str = "
    SELECT u.email, u.id, u.username, u.first_name, u.last_name,
        EXISTS (SELECT 1 FROM follows f WHERE f.user_id = $1 AND f.author_id = u.id) AS is_subscribed
    FROM users u
";

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = LOWER($1)")
        .bind(email.trim())
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Fetches a user as seen by `viewer`.
pub async fn get_user_row(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<Option<UserRow>, Error> {
    let row: Option<UserRow> = sqlx::query_as(&format!("{USER_ROW} WHERE u.id = $2"))
        .bind(viewer)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn fetch_users(
    pool: &Pool<Postgres>,
    viewer: Option<Uuid>,
    page: PageRequest,
) -> Result<(Vec<UserRow>, i64), Error> {
    let offset = page.offset()?;

    let rows: Vec<UserPageRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM follows f WHERE f.user_id = $1 AND f.author_id = u.id) AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(viewer)
    .bind(page.limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    Ok((rows.into_iter().map(UserRow::from).collect(), total_count))
}

/// Creates a user, storing the argon2 hash of their password.
pub async fn register_user(form: UserForm, pool: &Pool<Postgres>) -> Result<UserRow, Error> {
    let password = hash_password(&form.password)?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        let error = QueryError::from(e);
        match (error.is_unique_violation(), error.constraint()) {
            (true, Some(c)) if c.contains("email") => Error::from(ValidationError::new(
                "email",
                "A user with that email already exists.",
            )),
            (true, Some(c)) if c.contains("username") => Error::from(ValidationError::new(
                "username",
                "A user with that username already exists.",
            )),
            _ => error.or_conflict("A user with these credentials already exists."),
        }
    })?;

    log::info!("Registered user {} ({})", user.username, user.id);

    Ok(UserRow {
        email: user.email,
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed: false,
    })
}

pub async fn login_user(
    email: &str,
    password: &str,
    secret: &str,
    ttl_hours: i64,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let user = match get_user_by_email(pool, email).await? {
        Some(user) => user,
        None => return Err(bad_request("Unable to log in with provided credentials.")),
    };

    if !verify_password(password, &user.password) {
        return Err(bad_request("Unable to log in with provided credentials."));
    }

    generate_jwt_session(&user, secret, ttl_hours)
}

pub async fn set_password(
    session: &SessionData,
    payload: SetPasswordPayload,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let user = match get_user_by_id(pool, session.user_id).await? {
        Some(user) => user,
        None => return Err(ApiError::unauthorized()),
    };

    if !verify_password(&payload.current_password, &user.password) {
        return Err(ValidationError::new("current_password", "Invalid password.").into());
    }
    validate_password("new_password", &payload.new_password)?;

    let password = hash_password(&payload.new_password)?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

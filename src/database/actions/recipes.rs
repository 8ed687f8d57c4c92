use std::collections::HashMap;

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::RECIPE_EXISTS,
    error::{ApiError, QueryError, ValidationError},
    filters::RecipeFilter,
    form::{IngredientAmountForm, RecipeForm},
    images::{remove_image, store_image, DecodedImage},
    pagination::PageRequest,
    schema::{Recipe, RecipePartNoId, RecipeRow, RecipeView, ShortRecipe, Tag, UserRow, Uuid},
};

use super::{ingredients::list_recipe_parts, tags::list_recipe_tags};

use potion::Error;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

// Binds must be pushed for the requester three times: subscription, favorite, cart
fn recipe_select<'a>(viewer: Option<Uuid>) -> QueryBuilder<'a, Postgres> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "
        SELECT r.id, r.name, r.text, r.image, r.cooking_time, r.pub_date,
            u.id AS author_id, u.email AS author_email, u.username AS author_username,
            u.first_name AS author_first_name, u.last_name AS author_last_name,
            EXISTS (SELECT 1 FROM follows fl WHERE fl.author_id = u.id AND fl.user_id = ",
    );
    builder
        .push_bind(viewer)
        .push(") AS author_is_subscribed, EXISTS (SELECT 1 FROM favorites fv WHERE fv.recipe_id = r.id AND fv.user_id = ")
        .push_bind(viewer)
        .push(") AS is_favorited, EXISTS (SELECT 1 FROM shopping_cart sc WHERE sc.recipe_id = r.id AND sc.user_id = ")
        .push_bind(viewer)
        .push(
            ") AS is_in_shopping_cart,
            COUNT(*) OVER() AS count
        FROM recipes r
        INNER JOIN users u ON u.id = r.author_id
        WHERE TRUE",
        );

    builder
}

/// Attaches tags and ingredient amounts to the given rows, keeping row order.
async fn hydrate(rows: Vec<RecipeRow>, pool: &Pool<Postgres>) -> Result<Vec<RecipeView>, Error> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

    let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for tag in list_recipe_tags(&ids, pool).await? {
        tags.entry(tag.recipe_id).or_default().push(tag.into());
    }

    let mut parts: HashMap<Uuid, Vec<RecipePartNoId>> = HashMap::new();
    for part in list_recipe_parts(&ids, pool).await? {
        parts.entry(part.recipe_id).or_default().push(part.into());
    }

    let views = rows
        .into_iter()
        .map(|row| RecipeView {
            id: row.id,
            tags: tags.remove(&row.id).unwrap_or_default(),
            author: UserRow {
                email: row.author_email,
                id: row.author_id,
                username: row.author_username,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
                is_subscribed: row.author_is_subscribed,
            },
            ingredients: parts.remove(&row.id).unwrap_or_default(),
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
            name: row.name,
            image: row.image,
            text: row.text,
            cooking_time: row.cooking_time,
        })
        .collect();

    Ok(views)
}

/// Lists recipes newest first, along with the total count before paging.
pub async fn fetch_recipes(
    pool: &Pool<Postgres>,
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
    page: PageRequest,
) -> Result<(Vec<RecipeView>, i64), Error> {
    if filter.needs_user() && viewer.is_none() {
        return Ok((vec![], 0));
    }
    let offset = page.offset()?;

    let mut builder = recipe_select(viewer);
    filter.push_conditions(&mut builder, viewer);
    builder
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<RecipeRow> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    Ok((hydrate(rows, pool).await?, total_count))
}

pub async fn get_recipe(
    pool: &Pool<Postgres>,
    recipe_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<Option<RecipeView>, Error> {
    let mut builder = recipe_select(viewer);
    builder.push(" AND r.id = ").push_bind(recipe_id);

    let row: Option<RecipeRow> = builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    match row {
        Some(row) => Ok(hydrate(vec![row], pool).await?.pop()),
        None => Ok(None),
    }
}

/// Fetches a recipe the session is allowed to modify.
pub async fn get_recipe_mut(
    session: &SessionData,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe: Option<Recipe> = sqlx::query_as(
        "SELECT id, author_id, name, text, image, cooking_time, pub_date FROM recipes WHERE id = $1",
    )
    .bind(recipe_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    let recipe = recipe.ok_or_else(ApiError::not_found)?;
    session.authenticate_owner(
        recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )?;

    Ok(recipe)
}

pub async fn get_short_recipe(
    pool: &Pool<Postgres>,
    recipe_id: Uuid,
) -> Result<Option<ShortRecipe>, Error> {
    let row: Option<ShortRecipe> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

async fn begin(pool: &Pool<Postgres>) -> Result<Transaction<'static, Postgres>, Error> {
    let tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new(String::from("Could not start transaction")))?;
    Ok(tr)
}

async fn commit(tr: Transaction<'static, Postgres>) -> Result<(), Error> {
    tr.commit()
        .await
        .map_err(|_| QueryError::new(String::from("Could not commit transaction")))?;
    Ok(())
}

/// Fails with a field error naming the first id that is not in `table`.
async fn ensure_exists(
    field: &'static str,
    table: &str,
    ids: &[Uuid],
    tr: &mut Transaction<'static, Postgres>,
) -> Result<(), Error> {
    let known: Vec<Uuid> = sqlx::query_scalar(&format!("SELECT id FROM {table} WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_all(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    match ids.iter().find(|id| !known.contains(id)) {
        Some(id) => Err(ValidationError::new(
            field,
            format!("Invalid pk \"{id}\" - object does not exist."),
        )
        .into()),
        None => Ok(()),
    }
}

/// Replaces the tag set and ingredient list of a recipe.
async fn replace_links(
    recipe_id: Uuid,
    tags: &[Uuid],
    ingredients: &[IngredientAmountForm],
    tr: &mut Transaction<'static, Postgres>,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM ingredient_amounts WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    if !tags.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
        query_builder.push_values(tags.iter(), |mut b, tag_id| {
            b.push_bind(recipe_id).push_bind(*tag_id);
        });
        query_builder
            .build()
            .execute(&mut **tr)
            .await
            .map_err(QueryError::from)?;
    }

    if !ingredients.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO ingredient_amounts (recipe_id, ingredient_id, amount) ",
        );
        query_builder.push_values(ingredients.iter(), |mut b, part| {
            b.push_bind(recipe_id)
                .push_bind(part.ingredient_id)
                .push_bind(part.amount);
        });
        query_builder
            .build()
            .execute(&mut **tr)
            .await
            .map_err(QueryError::from)?;
    }

    Ok(())
}

fn decode_image(image: Option<&String>) -> Result<Option<DecodedImage>, Error> {
    match image {
        Some(image) => Ok(Some(DecodedImage::try_from(image.as_str())?)),
        None => Ok(None),
    }
}

async fn insert_recipe(
    author_id: Uuid,
    form: &RecipeForm,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    let mut tr = begin(pool).await?;

    ensure_exists("tags", "tags", &form.tags, &mut tr).await?;
    let ingredient_ids: Vec<Uuid> = form.ingredients.iter().map(|p| p.ingredient_id).collect();
    ensure_exists("ingredients", "ingredients", &ingredient_ids, &mut tr).await?;

    let (recipe_id,): (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&form.name)
    .bind(&form.text)
    .bind(image)
    .bind(form.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).or_conflict(RECIPE_EXISTS))?;

    replace_links(recipe_id, &form.tags, &form.ingredients, &mut tr).await?;
    commit(tr).await?;

    Ok(recipe_id)
}

/// Creates a recipe authored by the session owner and returns its id.
pub async fn create_recipe(
    session: &SessionData,
    form: RecipeForm,
    media_root: &str,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    session.authenticate(ActionType::CreateRecipes)?;

    let required = |field: &'static str| ValidationError::new(field, "This field is required.");
    if form.name.is_none() {
        return Err(required("name").into());
    }
    if form.text.is_none() {
        return Err(required("text").into());
    }
    if form.cooking_time.is_none() {
        return Err(required("cooking_time").into());
    }
    let image = decode_image(form.image.as_ref())?.ok_or_else(|| required("image"))?;

    let stored = store_image(media_root, &image).await?;
    match insert_recipe(session.user_id, &form, &stored, pool).await {
        Ok(recipe_id) => {
            log::info!("{} created recipe {recipe_id}", session.username);
            Ok(recipe_id)
        }
        Err(e) => {
            remove_image(media_root, &stored).await;
            Err(e)
        }
    }
}

async fn write_update(
    recipe_id: Uuid,
    form: &RecipeForm,
    image: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let mut tr = begin(pool).await?;

    ensure_exists("tags", "tags", &form.tags, &mut tr).await?;
    let ingredient_ids: Vec<Uuid> = form.ingredients.iter().map(|p| p.ingredient_id).collect();
    ensure_exists("ingredients", "ingredients", &ingredient_ids, &mut tr).await?;

    sqlx::query(
        "
        UPDATE recipes SET
            name = COALESCE($1, name),
            text = COALESCE($2, text),
            image = COALESCE($3, image),
            cooking_time = COALESCE($4, cooking_time)
        WHERE id = $5
    ",
    )
    .bind(&form.name)
    .bind(&form.text)
    .bind(image)
    .bind(form.cooking_time)
    .bind(recipe_id)
    .execute(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).or_conflict(RECIPE_EXISTS))?;

    replace_links(recipe_id, &form.tags, &form.ingredients, &mut tr).await?;
    commit(tr).await
}

/// Updates scalar fields present in `form` and fully replaces tags and
/// ingredients. `recipe` comes from [`get_recipe_mut`].
pub async fn update_recipe(
    session: &SessionData,
    recipe: Recipe,
    form: RecipeForm,
    media_root: &str,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let stored = match decode_image(form.image.as_ref())? {
        Some(image) => Some(store_image(media_root, &image).await?),
        None => None,
    };

    match write_update(recipe.id, &form, stored.as_deref(), pool).await {
        Ok(()) => {
            if stored.is_some() {
                remove_image(media_root, &recipe.image).await;
            }
            log::info!("{} updated recipe {}", session.username, recipe.id);
            Ok(())
        }
        Err(e) => {
            if let Some(stored) = stored {
                remove_image(media_root, &stored).await;
            }
            Err(e)
        }
    }
}

pub async fn delete_recipe(
    session: &SessionData,
    recipe_id: Uuid,
    media_root: &str,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let recipe = get_recipe_mut(session, recipe_id, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    remove_image(media_root, &recipe.image).await;
    log::info!("{} deleted recipe {}", session.username, recipe.id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use sqlx::PgPool;

    use super::*;
    use crate::{
        actions::{add_marker, fixtures, Favorite, ShoppingCart},
        error::error_body,
        form::{RecipePayload, WriteMode},
    };

    fn media_root() -> String {
        std::env::temp_dir()
            .join("foodgram-tests")
            .to_string_lossy()
            .into_owned()
    }

    fn form(name: &str, tags: &[Uuid], parts: &[(Uuid, i32)], mode: WriteMode) -> RecipeForm {
        let ingredients: Vec<Value> = parts
            .iter()
            .map(|(id, amount)| json!({ "id": id, "amount": amount }))
            .collect();

        let payload: RecipePayload = serde_json::from_value(json!({
            "tags": tags,
            "ingredients": ingredients,
            "name": name,
            "text": "Boil everything.",
            "image": "data:image/png;base64,iVBORw0KGgo=",
            "cooking_time": 20
        }))
        .unwrap();

        payload.validate(mode).unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_name_for_author_is_rejected(pool: PgPool) {
        let cook = fixtures::member(&pool, "cook").await;
        let other = fixtures::member(&pool, "other").await;
        let lunch = fixtures::tag(&pool, "lunch", "#49B64E").await;
        let salt = fixtures::ingredient(&pool, "salt", "g").await;

        let soup = form("Soup", &[lunch], &[(salt, 5)], WriteMode::Create);
        assert!(create_recipe(&cook, soup.clone(), &media_root(), &pool)
            .await
            .is_ok());

        let again = form("  SOUP ", &[lunch], &[(salt, 5)], WriteMode::Create);
        let error = create_recipe(&cook, again, &media_root(), &pool)
            .await
            .err()
            .unwrap();
        assert_eq!(error_body(&error), (400, json!({ "errors": RECIPE_EXISTS })));

        assert!(create_recipe(&other, soup, &media_root(), &pool).await.is_ok());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn renaming_onto_an_existing_recipe_is_rejected(pool: PgPool) {
        let cook = fixtures::member(&pool, "cook").await;
        let lunch = fixtures::tag(&pool, "lunch", "#49B64E").await;
        let salt = fixtures::ingredient(&pool, "salt", "g").await;

        let parts = [(salt, 5)];
        create_recipe(&cook, form("Soup", &[lunch], &parts, WriteMode::Create), &media_root(), &pool)
            .await
            .ok()
            .unwrap();
        let stew = create_recipe(&cook, form("Stew", &[lunch], &parts, WriteMode::Create), &media_root(), &pool)
            .await
            .ok()
            .unwrap();

        let recipe = get_recipe_mut(&cook, stew, &pool).await.ok().unwrap();
        let error = update_recipe(
            &cook,
            recipe,
            form("soup", &[lunch], &parts, WriteMode::Update),
            &media_root(),
            &pool,
        )
        .await
        .err()
        .unwrap();

        assert_eq!(error_body(&error), (400, json!({ "errors": RECIPE_EXISTS })));

        let view = get_recipe(&pool, stew, None).await.ok().flatten().unwrap();
        assert_eq!(view.name, "stew");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_replaces_tags_and_ingredients(pool: PgPool) {
        let cook = fixtures::member(&pool, "cook").await;
        let lunch = fixtures::tag(&pool, "lunch", "#49B64E").await;
        let dinner = fixtures::tag(&pool, "dinner", "#8775D2").await;
        let supper = fixtures::tag(&pool, "supper", "#E26C2D").await;
        let salt = fixtures::ingredient(&pool, "salt", "g").await;
        let flour = fixtures::ingredient(&pool, "flour", "g").await;
        let sugar = fixtures::ingredient(&pool, "sugar", "g").await;

        let created = form("Pie", &[lunch, dinner], &[(salt, 5), (flour, 200)], WriteMode::Create);
        let id = create_recipe(&cook, created, &media_root(), &pool)
            .await
            .ok()
            .unwrap();

        let recipe = get_recipe_mut(&cook, id, &pool).await.ok().unwrap();
        let updated = form("Pie", &[supper], &[(flour, 150), (sugar, 20)], WriteMode::Update);
        update_recipe(&cook, recipe, updated, &media_root(), &pool)
            .await
            .ok()
            .unwrap();

        let view = get_recipe(&pool, id, Some(cook.user_id))
            .await
            .ok()
            .flatten()
            .unwrap();

        let tags: Vec<Uuid> = view.tags.iter().map(|t| t.id).collect();
        assert_eq!(tags, vec![supper]);

        let mut parts: Vec<(Uuid, i32)> = view.ingredients.iter().map(|p| (p.id, p.amount)).collect();
        parts.sort();
        let mut expected = vec![(flour, 150), (sugar, 20)];
        expected.sort();
        assert_eq!(parts, expected);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_tag_leaves_nothing_behind(pool: PgPool) {
        let cook = fixtures::member(&pool, "cook").await;
        let salt = fixtures::ingredient(&pool, "salt", "g").await;

        let error = create_recipe(
            &cook,
            form("Soup", &[999], &[(salt, 5)], WriteMode::Create),
            &media_root(),
            &pool,
        )
        .await
        .err()
        .unwrap();

        assert_eq!(
            error_body(&error),
            (400, json!({ "tags": ["Invalid pk \"999\" - object does not exist."] }))
        );

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn anonymous_viewer_has_no_flags(pool: PgPool) {
        let cook = fixtures::member(&pool, "cook").await;
        let salt = fixtures::ingredient(&pool, "salt", "g").await;
        let id = fixtures::recipe(&pool, &cook, "toast", &[(salt, 1)]).await;

        add_marker::<Favorite>(&cook, id, &pool).await.ok().unwrap();
        add_marker::<ShoppingCart>(&cook, id, &pool).await.ok().unwrap();

        let own = get_recipe(&pool, id, Some(cook.user_id))
            .await
            .ok()
            .flatten()
            .unwrap();
        assert!(own.is_favorited);
        assert!(own.is_in_shopping_cart);

        let anonymous = get_recipe(&pool, id, None).await.ok().flatten().unwrap();
        assert!(!anonymous.is_favorited);
        assert!(!anonymous.is_in_shopping_cart);
        assert!(!anonymous.author.is_subscribed);

        let filter = RecipeFilter {
            is_favorited: true,
            ..RecipeFilter::default()
        };
        let page = PageRequest { page: 1, limit: 6 };

        let (rows, count) = fetch_recipes(&pool, &filter, None, page).await.ok().unwrap();
        assert!(rows.is_empty());
        assert_eq!(count, 0);

        let (rows, count) = fetch_recipes(&pool, &filter, Some(cook.user_id), page)
            .await
            .ok()
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(rows[0].id, id);
    }
}

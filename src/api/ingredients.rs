use potion::Error;
use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter};

use super::{
    context::{with_context, Context},
    reply::respond,
};
use crate::{
    actions::{create_ingredient, get_ingredient, list_ingredients},
    error::ApiError,
    filters::IngredientFilter,
    form::IngredientPayload,
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    schema::{Ingredient, Uuid},
    CacheKeyType, CacheLifetime,
};

async fn search(query: Vec<(String, String)>, ctx: Context) -> Result<Vec<Ingredient>, Error> {
    let filter = IngredientFilter::from_query(&query);

    ctx.cache
        .get_or(CacheKeyType::Ingredient.new(filter.cache_key()), || {
            list_ingredients(&filter, &ctx.pool)
        })
        .await
}

async fn detail(ingredient_id: Uuid, ctx: Context) -> Result<Ingredient, Error> {
    let ingredient: Option<Ingredient> = ctx
        .cache
        .get_or(CacheKeyType::Ingredient.new(ingredient_id), || {
            get_ingredient(ingredient_id, &ctx.pool)
        })
        .await?;

    ingredient.ok_or_else(ApiError::not_found)
}

async fn create(
    session: SessionData,
    payload: IngredientPayload,
    ctx: Context,
) -> Result<Ingredient, Error> {
    session.authenticate(ActionType::ManageIngredients)?;

    let form = payload.validate()?;
    let ingredient = create_ingredient(form, &ctx.pool).await?;
    ctx.cache
        .invalidate(CacheLifetime::BindIngredientCache)
        .await;

    Ok(ingredient)
}

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let list_route = warp::path!("ingredients")
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_context(ctx.clone()))
        .and_then(|query: Vec<(String, String)>, ctx: Context| async move {
            respond(search(query, ctx).await, StatusCode::OK)
        });

    let create_route = warp::path!("ingredients")
        .and(warp::post())
        .and(with_session(ctx.secret.clone()))
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(
            |session: SessionData, payload: IngredientPayload, ctx: Context| async move {
                respond(create(session, payload, ctx).await, StatusCode::CREATED)
            },
        );

    let detail_route = warp::path!("ingredients" / Uuid)
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(|id: Uuid, ctx: Context| async move {
            respond(detail(id, ctx).await, StatusCode::OK)
        });

    list_route
        .or(create_route)
        .unify()
        .or(detail_route)
        .unify()
        .boxed()
}

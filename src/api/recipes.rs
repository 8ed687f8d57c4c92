use potion::Error;
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    path::FullPath,
    reply::Response,
    Filter, Rejection, Reply,
};

use super::{
    context::{with_context, Context},
    reply::{error_reply, no_content, respond},
};
use crate::{
    actions::{
        add_marker, create_recipe, delete_recipe, download_shopping_list, fetch_recipes,
        get_recipe, get_recipe_mut, remove_marker, update_recipe, Favorite, RecipeMarker,
        ShoppingCart, ShoppingList,
    },
    error::ApiError,
    filters::RecipeFilter,
    form::{RecipePayload, WriteMode},
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::{PageContext, PageRequest},
    schema::{RecipeView, ShortRecipe, Uuid},
};

const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

type Query = Vec<(String, String)>;

async fn list(
    session: Option<SessionData>,
    query: Query,
    path: FullPath,
    ctx: Context,
) -> Result<PageContext<RecipeView>, Error> {
    let filter = RecipeFilter::from_query(&query)?;
    let page = PageRequest::from_query(&query, ctx.config.page_size);

    let (rows, count) =
        fetch_recipes(&ctx.pool, &filter, session.map(|s| s.user_id), page).await?;

    Ok(PageContext::from_rows(rows, count, page, path.as_str(), &query)?.map(|r| ctx.recipe(r)))
}

async fn detail(
    recipe_id: Uuid,
    viewer: Option<Uuid>,
    ctx: &Context,
) -> Result<RecipeView, Error> {
    get_recipe(&ctx.pool, recipe_id, viewer)
        .await?
        .map(|r| ctx.recipe(r))
        .ok_or_else(ApiError::not_found)
}

async fn create(
    session: SessionData,
    payload: RecipePayload,
    ctx: Context,
) -> Result<RecipeView, Error> {
    let form = payload.validate(WriteMode::Create)?;
    let recipe_id = create_recipe(&session, form, &ctx.config.media_root, &ctx.pool).await?;

    detail(recipe_id, Some(session.user_id), &ctx).await
}

async fn update(
    recipe_id: Uuid,
    session: SessionData,
    payload: RecipePayload,
    ctx: Context,
) -> Result<RecipeView, Error> {
    let recipe = get_recipe_mut(&session, recipe_id, &ctx.pool).await?;
    let form = payload.validate(WriteMode::Update)?;
    update_recipe(&session, recipe, form, &ctx.config.media_root, &ctx.pool).await?;

    detail(recipe_id, Some(session.user_id), &ctx).await
}

async fn add<M: RecipeMarker>(
    recipe_id: Uuid,
    session: SessionData,
    ctx: Context,
) -> Result<ShortRecipe, Error> {
    let recipe = add_marker::<M>(&session, recipe_id, &ctx.pool).await?;
    Ok(ctx.short_recipe(recipe))
}

async fn download(session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let text = match download_shopping_list(&session, &ctx.pool).await {
        Ok(text) => text,
        Err(e) => return Ok(error_reply(e)),
    };

    let reply = warp::reply::with_header(text, "content-type", "text/plain; charset=utf-8");
    let reply = warp::reply::with_header(
        reply,
        "content-disposition",
        format!(
            "attachment; filename=\"{}\"",
            ShoppingList::filename(&session.username)
        ),
    );

    Ok(reply.into_response())
}

fn markers<M: RecipeMarker + Send + Sync + 'static>(
    name: &'static str,
    ctx: Context,
) -> BoxedFilter<(Response,)> {
    let secret = ctx.secret.clone();
    let marker_path = || {
        warp::path("recipes")
            .and(warp::path::param::<Uuid>())
            .and(warp::path(name))
            .and(warp::path::end())
    };

    let add_route = marker_path()
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(with_context(ctx.clone()))
        .and_then(|id: Uuid, session: SessionData, ctx: Context| async move {
            respond(add::<M>(id, session, ctx).await, StatusCode::CREATED)
        });

    let remove_route = marker_path()
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_context(ctx))
        .and_then(|id: Uuid, session: SessionData, ctx: Context| async move {
            no_content(remove_marker::<M>(&session, id, &ctx.pool).await)
        });

    add_route.or(remove_route).unify().boxed()
}

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let secret = ctx.secret.clone();

    let download_route = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_context(ctx.clone()))
        .and_then(download);

    let list_route = warp::path!("recipes")
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(warp::query::<Query>())
        .and(warp::path::full())
        .and(with_context(ctx.clone()))
        .and_then(
            |session: Option<SessionData>, query: Query, path: FullPath, ctx: Context| async move {
                respond(list(session, query, path, ctx).await, StatusCode::OK)
            },
        );

    let create_route = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(
            |session: SessionData, payload: RecipePayload, ctx: Context| async move {
                respond(create(session, payload, ctx).await, StatusCode::CREATED)
            },
        );

    let detail_route = warp::path!("recipes" / Uuid)
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_context(ctx.clone()))
        .and_then(
            |id: Uuid, session: Option<SessionData>, ctx: Context| async move {
                let viewer = session.map(|s| s.user_id);
                respond(detail(id, viewer, &ctx).await, StatusCode::OK)
            },
        );

    let update_route = warp::path!("recipes" / Uuid)
        .and(warp::patch())
        .and(with_session(secret.clone()))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(
            |id: Uuid, session: SessionData, payload: RecipePayload, ctx: Context| async move {
                respond(update(id, session, payload, ctx).await, StatusCode::OK)
            },
        );

    let delete_route = warp::path!("recipes" / Uuid)
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_context(ctx.clone()))
        .and_then(|id: Uuid, session: SessionData, ctx: Context| async move {
            no_content(delete_recipe(&session, id, &ctx.config.media_root, &ctx.pool).await)
        });

    download_route
        .or(list_route)
        .unify()
        .or(create_route)
        .unify()
        .or(detail_route)
        .unify()
        .or(update_route)
        .unify()
        .or(delete_route)
        .unify()
        .or(markers::<Favorite>("favorite", ctx.clone()))
        .unify()
        .or(markers::<ShoppingCart>("shopping_cart", ctx))
        .unify()
        .boxed()
}

use potion::Error;
use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter};

use super::{
    context::{with_context, Context},
    reply::respond,
};
use crate::{
    actions::{create_tag, get_tag, list_tags},
    error::ApiError,
    form::TagPayload,
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    schema::{Tag, Uuid},
    CacheKeyType, CacheLifetime,
};

async fn list(ctx: Context) -> Result<Vec<Tag>, Error> {
    ctx.cache
        .get_or(CacheKeyType::Tag.new("list"), || list_tags(&ctx.pool))
        .await
}

async fn detail(tag_id: Uuid, ctx: Context) -> Result<Tag, Error> {
    let tag: Option<Tag> = ctx
        .cache
        .get_or(CacheKeyType::Tag.new(tag_id), || get_tag(tag_id, &ctx.pool))
        .await?;

    tag.ok_or_else(ApiError::not_found)
}

async fn create(session: SessionData, payload: TagPayload, ctx: Context) -> Result<Tag, Error> {
    session.authenticate(ActionType::ManageTags)?;

    let form = payload.validate()?;
    let tag = create_tag(form, &ctx.pool).await?;
    ctx.cache.invalidate(CacheLifetime::BindTagCache).await;

    Ok(tag)
}

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let list_route = warp::path!("tags")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(|ctx: Context| async move { respond(list(ctx).await, StatusCode::OK) });

    let create_route = warp::path!("tags")
        .and(warp::post())
        .and(with_session(ctx.secret.clone()))
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(
            |session: SessionData, payload: TagPayload, ctx: Context| async move {
                respond(create(session, payload, ctx).await, StatusCode::CREATED)
            },
        );

    let detail_route = warp::path!("tags" / Uuid)
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

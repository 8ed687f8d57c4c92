use potion::Error;
use serde_json::{json, Value};
use warp::{
    filters::BoxedFilter, http::StatusCode, path::FullPath, reply::Response, Filter,
};

use super::{
    context::{with_context, Context},
    reply::{no_content, respond},
};
use crate::{
    actions::{
        fetch_subscriptions, fetch_users, get_user_row, login_user, register_user, set_password,
        subscribe, unsubscribe,
    },
    error::{bad_request, ApiError},
    filters::recipes_limit,
    form::{LoginPayload, SetPasswordPayload, UserPayload},
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::{PageContext, PageRequest},
    permissions::ActionType,
    schema::{Subscription, UserRow, Uuid},
};

type Query = Vec<(String, String)>;

async fn list(
    session: Option<SessionData>,
    query: Query,
    path: FullPath,
    ctx: Context,
) -> Result<PageContext<UserRow>, Error> {
    let page = PageRequest::from_query(&query, ctx.config.page_size);
    let (rows, count) = fetch_users(&ctx.pool, session.map(|s| s.user_id), page).await?;

    PageContext::from_rows(rows, count, page, path.as_str(), &query)
}

async fn register(payload: UserPayload, ctx: Context) -> Result<UserRow, Error> {
    let form = payload.validate()?;
    register_user(form, &ctx.pool).await
}

async fn profile(user_id: Uuid, viewer: Option<Uuid>, ctx: Context) -> Result<UserRow, Error> {
    get_user_row(&ctx.pool, user_id, viewer)
        .await?
        .ok_or_else(ApiError::not_found)
}

async fn me(session: SessionData, ctx: Context) -> Result<UserRow, Error> {
    session.authenticate(ActionType::ManageOwnAccount)?;

    get_user_row(&ctx.pool, session.user_id, Some(session.user_id))
        .await?
        .ok_or_else(ApiError::unauthorized)
}

async fn change_password(
    session: SessionData,
    payload: SetPasswordPayload,
    ctx: Context,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnAccount)?;
    set_password(&session, payload, &ctx.pool).await
}

fn limit(query: &Query) -> Result<Option<i64>, Error> {
    recipes_limit(query).map_err(|e| bad_request(&e))
}

async fn subscriptions(
    session: SessionData,
    query: Query,
    path: FullPath,
    ctx: Context,
) -> Result<PageContext<Subscription>, Error> {
    let recipes_limit = limit(&query)?;
    let page = PageRequest::from_query(&query, ctx.config.page_size);

    let (rows, count) = fetch_subscriptions(&session, recipes_limit, page, &ctx.pool).await?;

    Ok(PageContext::from_rows(rows, count, page, path.as_str(), &query)?
        .map(|s| ctx.subscription(s)))
}

async fn follow(
    author_id: Uuid,
    session: SessionData,
    query: Query,
    ctx: Context,
) -> Result<Subscription, Error> {
    let recipes_limit = limit(&query)?;
    let subscription = subscribe(&session, author_id, recipes_limit, &ctx.pool).await?;

    Ok(ctx.subscription(subscription))
}

async fn login(payload: LoginPayload, ctx: Context) -> Result<Value, Error> {
    let token = login_user(
        &payload.email,
        &payload.password,
        &ctx.secret,
        ctx.config.token_ttl_hours,
        &ctx.pool,
    )
    .await?;

    Ok(json!({ "auth_token": token }))
}

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let secret = ctx.secret.clone();

    let login_route = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(|payload: LoginPayload, ctx: Context| async move {
            respond(login(payload, ctx).await, StatusCode::OK)
        });

    // Tokens are stateless, logging out only requires a valid one
    let logout_route = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and_then(|session: SessionData| async move {
            log::debug!("{} logged out", session.username);
            no_content(Ok(()))
        });

    let me_route = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_context(ctx.clone()))
        .and_then(|session: SessionData, ctx: Context| async move {
            respond(me(session, ctx).await, StatusCode::OK)
        });

    let set_password_route = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(
            |session: SessionData, payload: SetPasswordPayload, ctx: Context| async move {
                no_content(change_password(session, payload, ctx).await)
            },
        );

    let subscriptions_route = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(warp::query::<Query>())
        .and(warp::path::full())
        .and(with_context(ctx.clone()))
        .and_then(
            |session: SessionData, query: Query, path: FullPath, ctx: Context| async move {
                respond(subscriptions(session, query, path, ctx).await, StatusCode::OK)
            },
        );

    let list_route = warp::path!("users")
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

    let register_route = warp::path!("users")
        .and(warp::post())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(|payload: UserPayload, ctx: Context| async move {
            respond(register(payload, ctx).await, StatusCode::CREATED)
        });

    let profile_route = warp::path!("users" / Uuid)
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_context(ctx.clone()))
        .and_then(
            |id: Uuid, session: Option<SessionData>, ctx: Context| async move {
                respond(
                    profile(id, session.map(|s| s.user_id), ctx).await,
                    StatusCode::OK,
                )
            },
        );

    let subscribe_route = warp::path!("users" / Uuid / "subscribe")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(warp::query::<Query>())
        .and(with_context(ctx.clone()))
        .and_then(
            |id: Uuid, session: SessionData, query: Query, ctx: Context| async move {
                respond(follow(id, session, query, ctx).await, StatusCode::CREATED)
            },
        );

    let unsubscribe_route = warp::path!("users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_context(ctx))
        .and_then(|id: Uuid, session: SessionData, ctx: Context| async move {
            no_content(unsubscribe(&session, id, &ctx.pool).await)
        });

    login_route
        .or(logout_route)
        .unify()
        .or(me_route)
        .unify()
        .or(set_password_route)
        .unify()
        .or(subscriptions_route)
        .unify()
        .or(list_route)
        .unify()
        .or(register_route)
        .unify()
        .or(profile_route)
        .unify()
        .or(subscribe_route)
        .unify()
        .or(unsubscribe_route)
        .unify()
        .boxed()
}

use std::convert::Infallible;

use warp::{Filter, Reply};

mod context;
mod ingredients;
mod recipes;
mod reply;
mod tags;
mod users;

pub use context::Context;
pub use reply::handle_rejection;

/// Every route of the service, with rejections recovered into JSON bodies.
pub fn routes(
    ctx: Context,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media")
        .and(warp::get())
        .and(warp::fs::dir(ctx.config.media_root.clone()))
        .map(|file: warp::fs::File| file.into_response());

    users::routes(ctx.clone())
        .or(recipes::routes(ctx.clone()))
        .unify()
        .or(tags::routes(ctx.clone()))
        .unify()
        .or(ingredients::routes(ctx))
        .unify()
        .or(media)
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::log("foodgram::api"))
}

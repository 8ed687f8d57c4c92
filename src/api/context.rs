use std::{convert::Infallible, sync::Arc};

use sqlx::{Pool, Postgres};
use warp::Filter;

use crate::{
    images::image_url,
    schema::{RecipeView, ShortRecipe, Subscription},
    Cache, Config,
};

/// Shared handles every handler gets a clone of.
#[derive(Clone)]
pub struct Context {
    pub pool: Pool<Postgres>,
    pub cache: Cache,
    pub config: Arc<Config>,
    pub secret: Arc<str>,
}

impl Context {
    pub fn new(pool: Pool<Postgres>, cache: Cache, config: Config) -> Self {
        let secret: Arc<str> = Arc::from(config.secret_key.as_str());

        Self {
            pool,
            cache,
            config: Arc::new(config),
            secret,
        }
    }

    pub fn recipe(&self, view: RecipeView) -> RecipeView {
        RecipeView {
            image: image_url(&self.config.media_url, &view.image),
            ..view
        }
    }

    pub fn short_recipe(&self, recipe: ShortRecipe) -> ShortRecipe {
        ShortRecipe {
            image: image_url(&self.config.media_url, &recipe.image),
            ..recipe
        }
    }

    pub fn subscription(&self, subscription: Subscription) -> Subscription {
        Subscription {
            recipes: subscription
                .recipes
                .into_iter()
                .map(|r| self.short_recipe(r))
                .collect(),
            ..subscription
        }
    }
}

pub fn with_context(ctx: Context) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

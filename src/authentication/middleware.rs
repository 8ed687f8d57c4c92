use std::sync::Arc;

use warp::{
    reject::{self, Rejection},
    Filter,
};

use super::jwt::{verify_jwt_session, SessionData};

#[derive(Debug)]
pub struct Unauthorized;

impl reject::Reject for Unauthorized {}

/// Pulls the raw token out of `Authorization: Token <jwt>` (or `Bearer`),
/// falling back to the `session` cookie.
pub fn extract_token(header: Option<&str>, cookie: Option<&str>) -> Option<String> {
    let from_header = header.and_then(|value| {
        let (scheme, token) = value.trim().split_once(' ')?;
        match scheme {
            "Token" | "Bearer" | "token" | "bearer" => Some(token.trim().to_string()),
            _ => None,
        }
    });

    from_header
        .or_else(|| cookie.map(|c| c.trim().to_string()))
        .filter(|token| !token.is_empty())
}

fn with_token() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>("session"))
        .map(|header: Option<String>, cookie: Option<String>| {
            extract_token(header.as_deref(), cookie.as_deref())
        })
}

/// Requires a valid session, rejecting with `Unauthorized` otherwise.
pub fn with_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_token().and_then(move |token: Option<String>| {
        let secret = secret.clone();
        async move {
            match token.map(|t| verify_jwt_session(&t, &secret)) {
                Some(Ok(data)) => Ok(SessionData::from(data)),
                _ => Err(warp::reject::custom(Unauthorized)),
            }
        }
    })
}

/// Anonymous requests pass through as `None`; a present but invalid token is
/// still rejected.
pub fn with_possible_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    with_token().and_then(move |token: Option<String>| {
        let secret = secret.clone();
        async move {
            match token {
                None => Ok(None),
                Some(token) => match verify_jwt_session(&token, &secret) {
                    Ok(data) => Ok(Some(SessionData::from(data))),
                    Err(_) => Err(warp::reject::custom(Unauthorized)),
                },
            }
        }
    })
}

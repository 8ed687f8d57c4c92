use std::convert::Infallible;

use potion::Error;
use serde::Serialize;
use serde_json::json;
use warp::{
    body::BodyDeserializeError,
    http::StatusCode,
    reject::{InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType},
    reply::Response,
    Rejection, Reply,
};

use crate::{error::error_body, middleware::Unauthorized};

pub fn json_reply<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub fn error_reply(error: Error) -> Response {
    let (code, body) = error_body(&error);
    if code >= 500 {
        log::error!("{code}: {}", error.info.as_deref().unwrap_or_default());
    } else {
        log::debug!("{code}: {body}");
    }

    json_reply(
        &body,
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    )
}

pub fn respond<T: Serialize>(result: Result<T, Error>, status: StatusCode) -> Result<Response, Rejection> {
    Ok(match result {
        Ok(value) => json_reply(&value, status),
        Err(e) => error_reply(e),
    })
}

pub fn no_content(result: Result<(), Error>) -> Result<Response, Rejection> {
    Ok(match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_reply(e),
    })
}

/// Turns filter rejections into the same JSON shapes handlers produce.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, body) = if err.find::<Unauthorized>().is_some() {
        (
            StatusCode::UNAUTHORIZED,
            json!({ "detail": "Invalid or missing authentication token." }),
        )
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, json!({ "errors": e.to_string() }))
    } else if let Some(e) = err.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, json!({ "errors": e.to_string() }))
    } else if err.find::<PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({ "detail": "Request body is too large." }),
        )
    } else if err.find::<LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            json!({ "detail": "Content-Length is required." }),
        )
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            json!({ "detail": "Unsupported media type." }),
        )
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "detail": "Method not allowed." }),
        )
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, json!({ "detail": "Not found." }))
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "detail": "Internal server error" }),
        )
    };

    Ok(json_reply(&body, status))
}

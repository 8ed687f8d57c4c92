use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::error::ApiError;
use crate::database::schema::{User, UserRole, Uuid};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, username: String, role: UserRole, ttl_hours: i64) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(ttl_hours)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// The authenticated requester.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), potion::Error> {
        if !action.authenticate(self) {
            return Err(ApiError::forbidden());
        }
        Ok(())
    }

    /// Owners may always touch their rows, everybody else needs `manage_all`.
    pub fn authenticate_owner(
        &self,
        owner_id: Uuid,
        manage_own: ActionType,
        manage_all: ActionType,
    ) -> Result<(), potion::Error> {
        if owner_id == self.user_id {
            return self.authenticate(manage_own);
        }
        self.authenticate(manage_all)
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            role: value.role,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, potion::Error> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|_| {
        log::error!("Invalid signing key");
        potion::Error {
            code: 500,
            info: Some(String::from("Invalid signing key")),
            redirect: None,
        }
    })
}

pub fn generate_jwt_session(
    user: &User,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, potion::Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(
        user.id,
        user.username.to_owned(),
        user.role.to_owned(),
        ttl_hours,
    );

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign session: {e}");
        potion::Error {
            code: 500,
            info: Some(String::from("Failed to sign session")),
            redirect: None,
        }
    })
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, potion::Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token.verify_with_key(&key).map_err(|_| {
        potion::Error::from(ApiError::Unauthorized(String::from(
            "Invalid session; Invalid token",
        )))
    })?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(ApiError::Unauthorized(String::from("Invalid session; Token expired")).into());
    }

    Ok(session)
}

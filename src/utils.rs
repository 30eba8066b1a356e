use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, http::header, web};
use chrono::{NaiveDate, Utc};
use futures::future::LocalBoxFuture;
use mongodb::bson::DateTime;
use mongodb::bson::oid::ObjectId;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::types::User;

pub fn get_access_token_from_auth_header(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|header_value| header_value.to_str().ok())
        .and_then(|header| {
            if header.starts_with("Bearer ") {
                header.split_whitespace().nth(1)
            } else {
                None
            }
        })
        .map(|token| token.to_string())
}

/// The authenticated caller together with the token it presented.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = get_access_token_from_auth_header(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let token = token.ok_or_else(|| {
                AppError::Unauthorized("No authorization token provided".to_string())
            })?;
            let state =
                state.ok_or_else(|| AppError::Internal("Application state missing".to_string()))?;

            let user = state.credentials.authenticate(&token).await?;
            Ok(AuthUser { user, token })
        })
    }
}

pub fn parse_id(raw: &str, what: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| AppError::invalid(format!("Invalid {what} id")))
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: &str) -> Result<DateTime> {
    let raw = raw.trim();
    let parsed = match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(day) => day.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc()),
        Err(_) => chrono::DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|at| at.with_timezone(&Utc)),
    };

    parsed
        .map(|at| DateTime::from_millis(at.timestamp_millis()))
        .ok_or_else(|| AppError::invalid(format!("Invalid date: {raw}")))
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Rejects update payloads that are empty or touch fields outside `allowed`.
pub fn ensure_whitelisted(body: &serde_json::Value, allowed: &[&str]) -> Result<()> {
    let fields = body
        .as_object()
        .ok_or_else(|| AppError::invalid("Expected a JSON object"))?;

    if fields.is_empty() {
        return Err(AppError::invalid("Missing updates"));
    }
    if let Some(field) = fields.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(AppError::invalid(format!("Invalid updates: {field}")));
    }
    Ok(())
}

pub fn parse_patch<T: DeserializeOwned>(body: serde_json::Value, allowed: &[&str]) -> Result<T> {
    ensure_whitelisted(&body, allowed)?;
    serde_json::from_value(body).map_err(|err| AppError::invalid(err.to_string()))
}

use actix_web::{HttpResponse, web};
use mongodb::bson::DateTime;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::types::{Attendee, StudySession};
use crate::utils::{AuthUser, parse_date};
use crate::views::StudySessionView;

const DAY_MILLIS: i64 = 86_400_000;

#[derive(Deserialize)]
pub struct NewSession {
    date: String,
    location: String,
    name: String,
    description: String,
}

#[derive(Deserialize)]
pub struct SessionQuery {
    date: Option<String>,
}

/// The UTC calendar day containing `at`, as `[start, end)`.
fn day_window(at: DateTime) -> (DateTime, DateTime) {
    let millis = at.timestamp_millis();
    let start = millis - millis.rem_euclid(DAY_MILLIS);
    (
        DateTime::from_millis(start),
        DateTime::from_millis(start + DAY_MILLIS),
    )
}

fn required(field: &str, raw: &str) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::invalid(format!("{field} is required")));
    }
    Ok(value.to_string())
}

pub async fn create(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<NewSession>,
) -> Result<HttpResponse> {
    let session = StudySession {
        id: ObjectId::new(),
        date: parse_date(&body.date)?,
        location: required("location", &body.location)?,
        name: required("name", &body.name)?,
        description: required("description", &body.description)?,
        attendees: vec![Attendee {
            user_id: auth.user.id,
            username: auth.user.username.clone(),
        }],
        created_at: DateTime::now(),
    };
    state.store.insert_session(&session).await?;

    Ok(HttpResponse::Created().json(StudySessionView::from(&session)))
}

pub async fn list(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<SessionQuery>,
) -> Result<HttpResponse> {
    let window = match query.date.as_deref() {
        Some(raw) => Some(day_window(parse_date(raw)?)),
        None => None,
    };

    let sessions = state
        .store
        .sessions_for_attendee(auth.user.id, window)
        .await?;
    let views: Vec<StudySessionView> = sessions.iter().map(StudySessionView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

//! Per-user assignment tracking. Another user's assignment is reported as
//! missing rather than forbidden.

use actix_web::{HttpResponse, web};
use mongodb::bson::DateTime;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::types::{Assignment, AssignmentStatus, UserId};
use crate::utils::{AuthUser, parse_date, parse_id, parse_patch};
use crate::views::{AssignmentSummary, AssignmentView};

const UPDATE_FIELDS: &[&str] = &[
    "title",
    "course",
    "description",
    "isComplete",
    "status",
    "dueDate",
    "dateAssigned",
];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    title: String,
    description: Option<String>,
    course: Option<String>,
    status: Option<AssignmentStatus>,
    #[serde(default)]
    is_complete: bool,
    date_assigned: String,
    due_date: String,
}

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
struct AssignmentPatch {
    title: Option<String>,
    course: Option<String>,
    description: Option<String>,
    is_complete: Option<bool>,
    status: Option<AssignmentStatus>,
    due_date: Option<String>,
    date_assigned: Option<String>,
}

#[derive(Deserialize)]
struct StatusBody {
    status: AssignmentStatus,
}

#[derive(Deserialize)]
pub struct ListQuery {
    status: Option<AssignmentStatus>,
}

fn required_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AppError::invalid("title is required"));
    }
    Ok(title.to_string())
}

fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn apply_patch(assignment: &mut Assignment, patch: AssignmentPatch) -> Result<()> {
    if let Some(title) = patch.title {
        assignment.title = required_title(&title)?;
    }
    if patch.course.is_some() {
        assignment.course = optional_text(patch.course);
    }
    if patch.description.is_some() {
        assignment.description = optional_text(patch.description);
    }
    if let Some(due_date) = patch.due_date {
        assignment.due_date = parse_date(&due_date)?;
    }
    if let Some(date_assigned) = patch.date_assigned {
        assignment.date_assigned = parse_date(&date_assigned)?;
    }
    match patch.is_complete {
        Some(true) => assignment.status = AssignmentStatus::Complete,
        Some(false) if assignment.status == AssignmentStatus::Complete => {
            assignment.status = AssignmentStatus::NotStarted
        }
        _ => {}
    }
    // An explicit status wins over isComplete.
    if let Some(status) = patch.status {
        assignment.status = status;
    }

    assignment.updated_at = DateTime::now();
    Ok(())
}

fn summarize(assignments: &[Assignment]) -> AssignmentSummary {
    let mut summary = AssignmentSummary::default();
    for assignment in assignments {
        match assignment.status {
            AssignmentStatus::NotStarted => summary.not_started += 1,
            AssignmentStatus::InProgress => summary.in_progress += 1,
            AssignmentStatus::Complete => summary.complete += 1,
        }
    }
    summary
}

async fn load_owned(state: &AppState, id: ObjectId, owner: UserId) -> Result<Assignment> {
    state
        .store
        .find_assignment(id)
        .await?
        .filter(|a| a.user == owner)
        .ok_or_else(|| AppError::not_found("Assignment"))
}

async fn save(state: &AppState, assignment: &Assignment) -> Result<HttpResponse> {
    if !state.store.replace_assignment(assignment).await? {
        return Err(AppError::not_found("Assignment"));
    }
    Ok(HttpResponse::Ok().json(AssignmentView::from(assignment)))
}

pub async fn create(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<NewAssignment>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let status = match (body.status, body.is_complete) {
        (Some(status), _) => status,
        (None, true) => AssignmentStatus::Complete,
        (None, false) => AssignmentStatus::NotStarted,
    };
    let now = DateTime::now();

    let assignment = Assignment {
        id: ObjectId::new(),
        user: auth.user.id,
        title: required_title(&body.title)?,
        description: optional_text(body.description),
        course: optional_text(body.course),
        status,
        date_assigned: parse_date(&body.date_assigned)?,
        due_date: parse_date(&body.due_date)?,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_assignment(&assignment).await?;
    log::debug!("Assignment {} created for {}", assignment.id, auth.user.id);

    Ok(HttpResponse::Created().json(AssignmentView::from(&assignment)))
}

pub async fn list(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let views: Vec<AssignmentView> = state
        .store
        .assignments_for_user(auth.user.id)
        .await?
        .iter()
        .filter(|a| query.status.is_none_or(|s| a.status == s))
        .map(AssignmentView::from)
        .collect();

    Ok(HttpResponse::Ok().json(views))
}

pub async fn summary(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let assignments = state.store.assignments_for_user(auth.user.id).await?;
    Ok(HttpResponse::Ok().json(summarize(&assignments)))
}

pub async fn get(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let assignment = load_owned(&state, parse_id(&path, "assignment")?, auth.user.id).await?;
    Ok(HttpResponse::Ok().json(AssignmentView::from(&assignment)))
}

pub async fn update(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse> {
    let id = parse_id(&path, "assignment")?;
    let patch: AssignmentPatch = parse_patch(body.into_inner(), UPDATE_FIELDS)?;

    let mut assignment = load_owned(&state, id, auth.user.id).await?;
    apply_patch(&mut assignment, patch)?;
    save(&state, &assignment).await
}

pub async fn set_status(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse> {
    let id = parse_id(&path, "assignment")?;
    let StatusBody { status } = parse_patch(body.into_inner(), &["status"])?;

    let mut assignment = load_owned(&state, id, auth.user.id).await?;
    assignment.status = status;
    assignment.updated_at = DateTime::now();
    save(&state, &assignment).await
}

pub async fn delete(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let assignment = load_owned(&state, parse_id(&path, "assignment")?, auth.user.id).await?;
    if !state.store.delete_assignment(assignment.id).await? {
        return Err(AppError::not_found("Assignment"));
    }
    Ok(HttpResponse::Ok().json(AssignmentView::from(&assignment)))
}

//! REST handlers. Each takes the authenticated caller and the shared
//! `AppState`, does one operation, and answers with JSON.

pub mod assignments;
pub mod chats;
pub mod friends;
pub mod groups;
pub mod sessions;
pub mod user;

use actix_web::HttpResponse;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::social::render_requests;
use crate::types::{Chat, ChatId, Request};
use crate::utils::{AuthUser, parse_patch};
use crate::views::{ChatView, MessageView, RequestView, ResolvedRequestView};

#[derive(Deserialize)]
pub struct MessageBody {
    pub content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RespondBody {
    is_accepted: bool,
}

/// Reads `{"isAccepted": bool}`, rejecting any other field.
fn parse_respond_body(body: serde_json::Value) -> Result<bool> {
    Ok(parse_patch::<RespondBody>(body, &["isAccepted"])?.is_accepted)
}

async fn post_message(
    state: &AppState,
    auth: &AuthUser,
    chat_id: ChatId,
    body: MessageBody,
) -> Result<HttpResponse> {
    let message = state
        .chats
        .append_message(chat_id, auth.user.id, body.content)
        .await?;

    Ok(HttpResponse::Ok().json(MessageView::new(
        &message,
        Some(auth.user.username.clone()),
    )))
}

async fn request_view(state: &AppState, request: &Request) -> Result<RequestView> {
    render_requests(state.store.as_ref(), std::slice::from_ref(request))
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(format!("Request {} did not render", request.id)))
}

async fn created_request(state: &AppState, request: Request) -> Result<HttpResponse> {
    Ok(HttpResponse::Created().json(request_view(state, &request).await?))
}

async fn resolved_request(
    state: &AppState,
    request: Request,
    chat: Option<Chat>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(ResolvedRequestView {
        request: request_view(state, &request).await?,
        chat: chat.as_ref().map(ChatView::from),
    }))
}

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use super::{MessageBody, created_request, parse_respond_body, post_message, resolved_request};
use crate::error::Result;
use crate::server::AppState;
use crate::social;
use crate::types::ChatKind;
use crate::utils::{AuthUser, parse_id};
use crate::views::ChatView;

#[derive(Deserialize)]
pub struct NewGroup {
    #[serde(alias = "groupName")]
    name: String,
}

pub async fn create_group(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<NewGroup>,
) -> Result<HttpResponse> {
    let chat = social::create_group(state.store.as_ref(), &auth.user, &body.name).await?;
    Ok(HttpResponse::Created().json(ChatView::from(&chat)))
}

pub async fn list_groups(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let groups = social::list_groups(state.store.as_ref(), auth.user.id).await?;
    let views: Vec<ChatView> = groups.iter().map(ChatView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

pub async fn get_group(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let chat_id = parse_id(&path, "group")?;
    let chat = social::load_member_chat(
        state.store.as_ref(),
        chat_id,
        auth.user.id,
        Some(ChatKind::Group),
    )
    .await?;
    Ok(HttpResponse::Ok().json(ChatView::from(&chat)))
}

pub async fn delete_group(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let chat_id = parse_id(&path, "group")?;
    social::delete_group(state.store.as_ref(), auth.user.id, chat_id).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn invite(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (chat_id, user_id) = path.into_inner();
    let chat_id = parse_id(&chat_id, "group")?;
    let user_id = parse_id(&user_id, "user")?;

    let request =
        social::invite_to_group(state.store.as_ref(), &auth.user, chat_id, user_id).await?;
    created_request(&state, request).await
}

pub async fn list_invites(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let invites =
        social::list_requests(state.store.as_ref(), auth.user.id, ChatKind::Group).await?;
    Ok(HttpResponse::Ok().json(invites))
}

pub async fn respond(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse> {
    let request_id = parse_id(&path, "request")?;
    let accept = parse_respond_body(body.into_inner())?;

    let (request, chat) = social::respond_to_request(
        state.store.as_ref(),
        auth.user.id,
        request_id,
        ChatKind::Group,
        accept,
    )
    .await?;

    resolved_request(&state, request, chat).await
}

pub async fn cancel(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let request_id = parse_id(&path, "request")?;
    social::cancel_request(state.store.as_ref(), auth.user.id, request_id, ChatKind::Group)
        .await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn send_message(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<MessageBody>,
) -> Result<HttpResponse> {
    let chat_id = parse_id(&path, "group")?;
    social::load_member_chat(
        state.store.as_ref(),
        chat_id,
        auth.user.id,
        Some(ChatKind::Group),
    )
    .await?;

    post_message(&state, &auth, chat_id, body.into_inner()).await
}

pub async fn get_messages(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let chat_id = parse_id(&path, "group")?;
    social::load_member_chat(
        state.store.as_ref(),
        chat_id,
        auth.user.id,
        Some(ChatKind::Group),
    )
    .await?;

    let messages = state.chats.list_messages(chat_id).await?;
    Ok(HttpResponse::Ok().json(messages))
}

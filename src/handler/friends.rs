use actix_web::{HttpResponse, web};

use super::{MessageBody, created_request, parse_respond_body, post_message, resolved_request};
use crate::error::Result;
use crate::server::AppState;
use crate::social;
use crate::types::ChatKind;
use crate::utils::{AuthUser, parse_id};

pub async fn list_friends(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let friends = social::list_friends(state.store.as_ref(), &auth.user).await?;
    Ok(HttpResponse::Ok().json(friends))
}

pub async fn list_requests(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let requests =
        social::list_requests(state.store.as_ref(), auth.user.id, ChatKind::Direct).await?;
    Ok(HttpResponse::Ok().json(requests))
}

pub async fn send_request(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let receiver_id = parse_id(&path, "user")?;
    let request = social::send_friend_request(state.store.as_ref(), &auth.user, receiver_id).await?;

    created_request(&state, request).await
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
        ChatKind::Direct,
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
    social::cancel_request(state.store.as_ref(), auth.user.id, request_id, ChatKind::Direct)
        .await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn remove_friend(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let friend_id = parse_id(&path, "friend")?;
    social::remove_friend(state.store.as_ref(), &auth.user, friend_id).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn send_message(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<MessageBody>,
) -> Result<HttpResponse> {
    let chat_id = social::chat_id_of_friend(&auth.user, parse_id(&path, "friend")?)?;
    post_message(&state, &auth, chat_id, body.into_inner()).await
}

pub async fn get_messages(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let chat_id = social::chat_id_of_friend(&auth.user, parse_id(&path, "friend")?)?;
    let messages = state.chats.list_messages(chat_id).await?;
    Ok(HttpResponse::Ok().json(messages))
}

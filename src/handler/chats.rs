use actix_web::{HttpResponse, web};

use super::{MessageBody, post_message};
use crate::error::Result;
use crate::server::AppState;
use crate::social;
use crate::utils::{AuthUser, parse_id};
use crate::views::ChatView;

pub async fn list_chats(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let chats = social::list_chats(state.store.as_ref(), auth.user.id).await?;
    let views: Vec<ChatView> = chats.iter().map(ChatView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

pub async fn get_chat(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let chat_id = parse_id(&path, "chat")?;
    let chat = social::load_member_chat(state.store.as_ref(), chat_id, auth.user.id, None).await?;
    Ok(HttpResponse::Ok().json(ChatView::from(&chat)))
}

pub async fn send_message(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<MessageBody>,
) -> Result<HttpResponse> {
    let chat_id = parse_id(&path, "chat")?;
    post_message(&state, &auth, chat_id, body.into_inner()).await
}

pub async fn get_messages(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let chat_id = parse_id(&path, "chat")?;
    social::load_member_chat(state.store.as_ref(), chat_id, auth.user.id, None).await?;

    let messages = state.chats.list_messages(chat_id).await?;
    Ok(HttpResponse::Ok().json(messages))
}

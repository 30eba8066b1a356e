use std::sync::Arc;

use actix_web::web;

use crate::auth::Credentials;
use crate::chat_server::{ChatServer, ChatServerHandle};
use crate::config::Config;
use crate::error::AppError;
use crate::handler::{assignments, chats, friends, groups, sessions, user};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub credentials: Credentials,
    pub chats: ChatServerHandle,
}

impl AppState {
    /// Builds the shared state. The returned `ChatServer` must be spawned for
    /// message appends to make progress.
    pub fn new(store: Arc<dyn Store>, config: &Config) -> (Self, ChatServer) {
        let (chat_server, chats) = ChatServer::new(store.clone());
        let credentials = Credentials::new(store.clone(), config);

        (
            Self {
                store,
                credentials,
                chats,
            },
            chat_server,
        )
    }
}

pub fn rest_scope(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::invalid(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::invalid(err.to_string()).into()),
    )
    // Accounts
    .route("/user", web::post().to(user::create_user))
    .route("/user", web::get().to(user::get_me))
    .route("/user", web::patch().to(user::update_me))
    .route("/user", web::delete().to(user::delete_me))
    .route("/user/sign-in", web::post().to(user::sign_in))
    .route("/user/sign-out", web::post().to(user::sign_out))
    .route("/user/{user_id}", web::get().to(user::get_user))
    .route("/users", web::get().to(user::search_users))
    // Friends
    .route("/friends", web::get().to(friends::list_friends))
    .route("/friends/requests", web::get().to(friends::list_requests))
    .route("/friends/requests/{id}", web::post().to(friends::send_request))
    .route("/friends/requests/{id}", web::patch().to(friends::respond))
    .route("/friends/requests/{id}", web::delete().to(friends::cancel))
    .route("/friends/{friend_id}", web::delete().to(friends::remove_friend))
    .route("/friend/{friend_id}/message", web::post().to(friends::send_message))
    .route("/friend/{friend_id}/messages", web::get().to(friends::get_messages))
    // Groups
    .route("/group", web::post().to(groups::create_group))
    .route("/groups", web::get().to(groups::list_groups))
    .route("/group/requests", web::get().to(groups::list_invites))
    .route("/group/requests/{id}", web::patch().to(groups::respond))
    .route("/group/requests/{id}", web::delete().to(groups::cancel))
    .route("/group-invite/{chat_id}/{user_id}", web::post().to(groups::invite))
    .route("/group/{chat_id}", web::get().to(groups::get_group))
    .route("/group/{chat_id}", web::delete().to(groups::delete_group))
    .route("/group/{chat_id}/message", web::post().to(groups::send_message))
    .route("/group/{chat_id}/messages", web::get().to(groups::get_messages))
    // Chats
    .route("/chats", web::get().to(chats::list_chats))
    .route("/chat/{chat_id}", web::get().to(chats::get_chat))
    .route("/chat/{chat_id}/message", web::post().to(chats::send_message))
    .route("/chat/{chat_id}/messages", web::get().to(chats::get_messages))
    // Planner
    .route("/assignment", web::post().to(assignments::create))
    .route("/assignments", web::get().to(assignments::list))
    .route("/assignments/summary", web::get().to(assignments::summary))
    .route("/assignments/{id}", web::get().to(assignments::get))
    .route("/assignment/{id}", web::patch().to(assignments::update))
    .route("/assignment/{id}", web::delete().to(assignments::delete))
    .route("/assignment/{id}/status", web::patch().to(assignments::set_status))
    .route("/session", web::post().to(sessions::create))
    .route("/sessions", web::get().to(sessions::list));
}

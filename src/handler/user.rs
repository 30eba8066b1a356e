use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::auth::{NewUser, PROFILE_FIELDS, ProfilePatch};
use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::utils::{AuthUser, parse_id, parse_patch};
use crate::views::{AccountView, AuthResponse, PublicUser};

const DEFAULT_SEARCH_LIMIT: u64 = 20;
const MAX_SEARCH_LIMIT: u64 = 100;

#[derive(Deserialize)]
pub struct SignIn {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
    offset: Option<u64>,
    limit: Option<u64>,
}

pub async fn create_user(
    state: web::Data<AppState>,
    body: web::Json<NewUser>,
) -> Result<HttpResponse> {
    let (user, token) = state.credentials.register(body.into_inner()).await?;

    Ok(HttpResponse::Created().json(AuthResponse {
        user: AccountView::from(&user),
        token,
    }))
}

pub async fn sign_in(
    state: web::Data<AppState>,
    body: web::Json<SignIn>,
) -> Result<HttpResponse> {
    let (user, token) = state
        .credentials
        .sign_in(&body.email, &body.password)
        .await?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        user: AccountView::from(&user),
        token,
    }))
}

pub async fn sign_out(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    state.credentials.sign_out(auth.user.id, &auth.token).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn get_me(auth: AuthUser) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(AccountView::from(&auth.user)))
}

pub async fn update_me(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse> {
    let patch: ProfilePatch = parse_patch(body.into_inner(), PROFILE_FIELDS)?;
    let user = state.credentials.update_profile(auth.user.id, patch).await?;

    Ok(HttpResponse::Ok().json(AccountView::from(&user)))
}

pub async fn delete_me(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    state.credentials.delete_account(&auth.user).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn get_user(
    _auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = parse_id(&path, "user")?;
    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(HttpResponse::Ok().json(PublicUser::profile(&user)))
}

pub async fn search_users(
    _auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let users = state
        .store
        .search_users(
            query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()),
            query.offset.unwrap_or(0),
            Some(
                query
                    .limit
                    .unwrap_or(DEFAULT_SEARCH_LIMIT)
                    .clamp(1, MAX_SEARCH_LIMIT),
            ),
        )
        .await?;

    let results: Vec<PublicUser> = users.iter().map(PublicUser::summary).collect();
    Ok(HttpResponse::Ok().json(results))
}

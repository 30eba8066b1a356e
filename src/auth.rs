//! Accounts, password hashing, and bearer-token sessions.
//!
//! A token is an HS256 JWT naming the user. It is only honoured while it is
//! still listed in that user's `tokens`, so signing out revokes exactly one
//! session and leaves the others alive.

use std::collections::HashSet;
use std::sync::Arc;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, get_current_timestamp,
};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::store::Store;
use crate::types::{ProfileChanges, User, UserId};
use crate::utils::is_valid_email;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Serialize, Deserialize, Debug)]
struct Claims {
    _id: String,
    /// Keeps two tokens issued in the same second distinct.
    jti: String,
    iat: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub courses: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

pub const PROFILE_FIELDS: &[&str] = &["firstName", "lastName", "username", "password", "email"];

fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn check_username(username: &str) -> Result<()> {
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AppError::invalid(format!(
            "username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    Ok(())
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<()> {
    if !is_valid_email(email) {
        return Err(AppError::invalid("Invalid Email address"));
    }
    Ok(())
}

fn check_required(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AppError::invalid(format!("{field} is required")));
    }
    Ok(())
}

pub struct Credentials {
    store: Arc<dyn Store>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_secs: Option<u64>,
    bcrypt_cost: u32,
}

impl Credentials {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            store,
            encoding_key: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.token_secret.as_bytes()),
            token_ttl_secs: config.token_ttl_secs,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    async fn hash_password(&self, password: String) -> Result<String> {
        let cost = self.bcrypt_cost;
        Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
    }

    async fn verify_password(password: String, hash: String) -> Result<bool> {
        Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        if self.token_ttl_secs.is_none() {
            validation.required_spec_claims = HashSet::new();
        }
        validation
    }

    /// Signs a new token for `user_id` and adds it to the user's active set.
    pub async fn issue_token(&self, user_id: UserId) -> Result<String> {
        let iat = get_current_timestamp();
        let claims = Claims {
            _id: user_id.to_hex(),
            jti: ObjectId::new().to_hex(),
            iat,
            exp: self.token_ttl_secs.map(|ttl| iat + ttl),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        self.store.add_token(user_id, &token).await?;
        log::debug!("Issued token for user {}", user_id);
        Ok(token)
    }

    pub async fn register(&self, input: NewUser) -> Result<(User, String)> {
        let username = normalize_name(&input.username);
        let first_name = normalize_name(&input.first_name);
        let last_name = normalize_name(&input.last_name);
        let email = input.email.trim().to_lowercase();
        let password = input.password.trim().to_string();

        check_username(&username)?;
        check_password(&password)?;
        check_required("firstName", &first_name)?;
        check_required("lastName", &last_name)?;
        check_email(&email)?;

        let user = User {
            id: ObjectId::new(),
            username,
            password: self.hash_password(password).await?,
            first_name,
            last_name,
            email,
            courses: input.courses,
            friends: Vec::new(),
            groups: Vec::new(),
            tokens: Vec::new(),
        };
        self.store.insert_user(&user).await?;
        log::info!("Created user {} ({})", user.username, user.id);

        let token = self.issue_token(user.id).await?;
        Ok((user, token))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(User, String)> {
        let failed = || AppError::Unauthorized("Unable to sign in".to_string());

        let user = self
            .store
            .find_user_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or_else(failed)?;

        if !Self::verify_password(password.to_string(), user.password.clone()).await? {
            log::warn!("Failed sign-in attempt for user {}", user.id);
            return Err(failed());
        }

        let token = self.issue_token(user.id).await?;
        Ok((user, token))
    }

    /// Resolves a bearer token to its user. The token must verify and still be active.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let unauthorized = || AppError::Unauthorized("Unauthorized".to_string());

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map_err(|err| {
                log::debug!("Rejected token: {}", err);
                unauthorized()
            })?
            .claims;
        let user_id = ObjectId::parse_str(&claims._id).map_err(|_| unauthorized())?;

        match self.store.find_user(user_id).await? {
            Some(user) if user.tokens.iter().any(|t| t == token) => Ok(user),
            _ => Err(unauthorized()),
        }
    }

    pub async fn sign_out(&self, user_id: UserId, token: &str) -> Result<()> {
        self.store.remove_token(user_id, token).await?;
        log::debug!("Revoked token for user {}", user_id);
        Ok(())
    }

    pub async fn update_profile(&self, user_id: UserId, patch: ProfilePatch) -> Result<User> {
        let mut changes = ProfileChanges::default();

        if let Some(username) = patch.username {
            let username = normalize_name(&username);
            check_username(&username)?;
            changes.username = Some(username);
        }
        if let Some(first_name) = patch.first_name {
            let first_name = normalize_name(&first_name);
            check_required("firstName", &first_name)?;
            changes.first_name = Some(first_name);
        }
        if let Some(last_name) = patch.last_name {
            let last_name = normalize_name(&last_name);
            check_required("lastName", &last_name)?;
            changes.last_name = Some(last_name);
        }
        if let Some(email) = patch.email {
            let email = email.trim().to_lowercase();
            check_email(&email)?;
            changes.email = Some(email);
        }
        if let Some(password) = patch.password {
            let password = password.trim().to_string();
            check_password(&password)?;
            changes.password = Some(self.hash_password(password).await?);
        }

        if changes.is_empty() {
            return Err(AppError::invalid("Missing updates"));
        }
        if !self.store.update_profile(user_id, &changes).await? {
            return Err(AppError::not_found("User"));
        }

        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// Deletes the account and the friend edges pointing at it.
    pub async fn delete_account(&self, user: &User) -> Result<()> {
        for friend in &user.friends {
            self.store.remove_friend(friend.friend_id, user.id).await?;
        }
        if !self.store.delete_user(user.id).await? {
            return Err(AppError::not_found("User"));
        }
        log::info!("Deleted user {}", user.id);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::UserStore;
    use crate::store::memory::MemoryStore;

    pub fn test_config() -> Config {
        Config {
            mongodb_uri: String::new(),
            database_name: "test".to_string(),
            token_secret: "test-secret".to_string(),
            token_ttl_secs: None,
            bcrypt_cost: 4,
            http_addr: ([127, 0, 0, 1], 0).into(),
            workers: 1,
        }
    }

    pub fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "correct horse".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: format!("{username}@example.com"),
            courses: vec!["CS101".to_string()],
        }
    }

    fn credentials() -> (Arc<MemoryStore>, Credentials) {
        let store = Arc::new(MemoryStore::new());
        let credentials = Credentials::new(store.clone(), &test_config());
        (store, credentials)
    }

    #[actix_web::test]
    async fn register_normalizes_and_issues_token() {
        let (store, credentials) = credentials();

        let mut input = new_user("  Ada ");
        input.email = " Ada@Example.com".to_string();
        let (user, token) = credentials.register(input).await.unwrap();

        assert_eq!(user.username, "ada");
        assert_eq!(user.first_name, "test");
        assert_eq!(user.email, "ada@example.com");
        assert_ne!(user.password, "correct horse");
        let stored = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.tokens, vec![token.clone()]);
        assert_eq!(credentials.authenticate(&token).await.unwrap().id, user.id);
    }

    #[actix_web::test]
    async fn register_rejects_invalid_fields() {
        let (_, credentials) = credentials();

        let mut short = new_user("ab");
        short.email = "ab@example.com".to_string();
        assert!(matches!(
            credentials.register(short).await,
            Err(AppError::ValidationFailed(_))
        ));

        let mut weak = new_user("grace");
        weak.password = "short".to_string();
        assert!(matches!(
            credentials.register(weak).await,
            Err(AppError::ValidationFailed(_))
        ));

        let mut bad_email = new_user("linus");
        bad_email.email = "not-an-email".to_string();
        assert!(matches!(
            credentials.register(bad_email).await,
            Err(AppError::ValidationFailed(_))
        ));
    }

    #[actix_web::test]
    async fn duplicate_email_conflicts() {
        let (_, credentials) = credentials();
        credentials.register(new_user("ada")).await.unwrap();

        let mut again = new_user("other");
        again.email = "ada@example.com".to_string();
        assert!(matches!(
            credentials.register(again).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[actix_web::test]
    async fn sign_in_checks_password() {
        let (_, credentials) = credentials();
        credentials.register(new_user("ada")).await.unwrap();

        assert!(matches!(
            credentials.sign_in("ada@example.com", "wrong password").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            credentials.sign_in("nobody@example.com", "correct horse").await,
            Err(AppError::Unauthorized(_))
        ));

        let (user, token) = credentials
            .sign_in("ADA@example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(credentials.authenticate(&token).await.unwrap().id, user.id);
    }

    #[actix_web::test]
    async fn revoking_one_token_keeps_the_other_session() {
        let (_, credentials) = credentials();
        let (user, first) = credentials.register(new_user("ada")).await.unwrap();
        let (_, second) = credentials
            .sign_in("ada@example.com", "correct horse")
            .await
            .unwrap();
        assert_ne!(first, second);

        credentials.sign_out(user.id, &first).await.unwrap();

        assert!(matches!(
            credentials.authenticate(&first).await,
            Err(AppError::Unauthorized(_))
        ));
        assert_eq!(credentials.authenticate(&second).await.unwrap().id, user.id);
    }

    #[actix_web::test]
    async fn garbage_and_foreign_tokens_are_rejected() {
        let (_, credentials) = credentials();
        credentials.register(new_user("ada")).await.unwrap();

        assert!(credentials.authenticate("not.a.jwt").await.is_err());

        let mut other = test_config();
        other.token_secret = "another-secret".to_string();
        let foreign = encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                _id: ObjectId::new().to_hex(),
                jti: "x".to_string(),
                iat: get_current_timestamp(),
                exp: None,
            },
            &EncodingKey::from_secret(other.token_secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            credentials.authenticate(&foreign).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[actix_web::test]
    async fn expired_tokens_are_rejected_when_ttl_is_configured() {
        let store = Arc::new(MemoryStore::new());
        let mut config = test_config();
        config.token_ttl_secs = Some(3600);
        let credentials = Credentials::new(store.clone(), &config);

        let (user, fresh) = credentials.register(new_user("ada")).await.unwrap();
        assert!(credentials.authenticate(&fresh).await.is_ok());

        let now = get_current_timestamp();
        let stale = encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                _id: user.id.to_hex(),
                jti: "stale".to_string(),
                iat: now - 7200,
                exp: Some(now - 3600),
            },
            &EncodingKey::from_secret(config.token_secret.as_bytes()),
        )
        .unwrap();
        store.add_token(user.id, &stale).await.unwrap();

        assert!(matches!(
            credentials.authenticate(&stale).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[actix_web::test]
    async fn profile_updates_rehash_password_and_keep_uniqueness() {
        let (_, credentials) = credentials();
        let (ada, _) = credentials.register(new_user("ada")).await.unwrap();
        credentials.register(new_user("grace")).await.unwrap();

        let updated = credentials
            .update_profile(
                ada.id,
                ProfilePatch {
                    first_name: Some(" Augusta ".to_string()),
                    password: Some("new password!".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "augusta");
        assert!(credentials.sign_in("ada@example.com", "new password!").await.is_ok());

        let taken = credentials
            .update_profile(
                ada.id,
                ProfilePatch {
                    username: Some("grace".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));

        let empty = credentials.update_profile(ada.id, ProfilePatch::default()).await;
        assert!(matches!(empty, Err(AppError::ValidationFailed(_))));
    }
}

use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};

use crate::types::{Assignment, Chat, MessageBucket, Request, StudySession, User};

pub async fn get_db_client(uri: &str) -> mongodb::error::Result<Client> {
    Client::with_uri_str(uri).await
}

pub fn get_user_collection(db: &Database) -> Collection<User> {
    db.collection("users")
}

pub fn get_request_collection(db: &Database) -> Collection<Request> {
    db.collection("requests")
}

pub fn get_chat_collection(db: &Database) -> Collection<Chat> {
    db.collection("chats")
}

pub fn get_bucket_collection(db: &Database) -> Collection<MessageBucket> {
    db.collection("message_buckets")
}

pub fn get_assignment_collection(db: &Database) -> Collection<Assignment> {
    db.collection("assignments")
}

pub fn get_session_collection(db: &Database) -> Collection<StudySession> {
    db.collection("study_sessions")
}

/// Unique account fields plus the lookups the request and bucket queries rely on.
pub async fn ensure_indexes(db: &Database) -> mongodb::error::Result<()> {
    let unique = || IndexOptions::builder().unique(true).build();
    let users = get_user_collection(db);

    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    get_bucket_collection(db)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "chat_id": 1, "created_at": 1 })
                .build(),
        )
        .await?;

    let requests = get_request_collection(db);
    requests
        .create_index(IndexModel::builder().keys(doc! { "sender": 1 }).build())
        .await?;
    requests
        .create_index(IndexModel::builder().keys(doc! { "receiver": 1 }).build())
        .await?;
    requests
        .create_index(
            IndexModel::builder()
                .keys(doc! { "pair_key": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    get_chat_collection(db)
        .create_index(IndexModel::builder().keys(doc! { "members": 1 }).build())
        .await?;

    log::info!("Indexes ensured on database {}", db.name());
    Ok(())
}

//! Persistence seams, one trait per collection.
//!
//! `MongoStore` backs the running service. Tests run the same logic against
//! `MemoryStore`.

#[cfg(test)]
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::DateTime;
use mongodb::bson::oid::ObjectId;

use crate::error::StoreResult;
use crate::types::{
    Assignment, Chat, ChatId, ChatKind, Friend, GroupMembership, Message, MessageBucket,
    ProfileChanges, Request, StudySession, User, UserId,
};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `StoreError::Duplicate` when the username or email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_users(&self, ids: &[UserId]) -> StoreResult<Vec<User>>;
    /// Case-insensitive substring match on username, first or last name.
    async fn search_users(
        &self,
        query: Option<&str>,
        offset: u64,
        limit: Option<u64>,
    ) -> StoreResult<Vec<User>>;
    async fn update_profile(&self, id: UserId, changes: &ProfileChanges) -> StoreResult<bool>;
    async fn delete_user(&self, id: UserId) -> StoreResult<bool>;

    async fn add_token(&self, id: UserId, token: &str) -> StoreResult<()>;
    async fn remove_token(&self, id: UserId, token: &str) -> StoreResult<()>;

    async fn add_friend(&self, id: UserId, friend: &Friend) -> StoreResult<()>;
    async fn remove_friend(&self, id: UserId, friend_id: UserId) -> StoreResult<()>;
    async fn add_group(&self, id: UserId, group: &GroupMembership) -> StoreResult<()>;
    async fn remove_group(&self, id: UserId, chat_id: ChatId) -> StoreResult<()>;
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert_request(&self, request: &Request) -> StoreResult<()>;
    async fn find_request(&self, id: ObjectId) -> StoreResult<Option<Request>>;
    /// A pending friend request between `a` and `b`, in either direction.
    async fn find_friend_request_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> StoreResult<Option<Request>>;
    async fn find_group_invite(
        &self,
        chat_id: ChatId,
        receiver: UserId,
    ) -> StoreResult<Option<Request>>;
    /// Requests of `kind` the user sent or received, oldest first.
    async fn requests_for_user(&self, user_id: UserId, kind: ChatKind)
    -> StoreResult<Vec<Request>>;
    async fn delete_request(&self, id: ObjectId) -> StoreResult<bool>;
    async fn delete_requests_for_chat(&self, chat_id: ChatId) -> StoreResult<u64>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert_chat(&self, chat: &Chat) -> StoreResult<()>;
    async fn find_chat(&self, id: ChatId) -> StoreResult<Option<Chat>>;
    async fn chats_for_user(&self, user_id: UserId) -> StoreResult<Vec<Chat>>;
    /// Adds `user_id` unless already present or the chat already holds `max_members`.
    /// Returns whether the member list changed.
    async fn add_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        max_members: usize,
    ) -> StoreResult<bool>;
    async fn delete_chat(&self, id: ChatId) -> StoreResult<bool>;
    /// Registers a bucket as the chat's newest. Returns false when the chat is gone.
    async fn push_bucket(&self, chat_id: ChatId, bucket_id: ObjectId) -> StoreResult<bool>;
}

#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn insert_bucket(&self, bucket: &MessageBucket) -> StoreResult<()>;
    /// Appends only while the bucket holds fewer than `capacity` messages.
    /// Returns false when the bucket is full or missing.
    async fn append_to_bucket(
        &self,
        bucket_id: ObjectId,
        message: &Message,
        capacity: usize,
    ) -> StoreResult<bool>;
    async fn buckets_for_chat(&self, chat_id: ChatId) -> StoreResult<Vec<MessageBucket>>;
    async fn delete_bucket(&self, id: ObjectId) -> StoreResult<bool>;
    async fn delete_buckets_for_chat(&self, chat_id: ChatId) -> StoreResult<u64>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()>;
    async fn find_assignment(&self, id: ObjectId) -> StoreResult<Option<Assignment>>;
    async fn assignments_for_user(&self, user_id: UserId) -> StoreResult<Vec<Assignment>>;
    async fn replace_assignment(&self, assignment: &Assignment) -> StoreResult<bool>;
    async fn delete_assignment(&self, id: ObjectId) -> StoreResult<bool>;
}

#[async_trait]
pub trait StudySessionStore: Send + Sync {
    async fn insert_session(&self, session: &StudySession) -> StoreResult<()>;
    /// Sessions the user attends, optionally limited to `[from, until)`.
    async fn sessions_for_attendee(
        &self,
        user_id: UserId,
        window: Option<(DateTime, DateTime)>,
    ) -> StoreResult<Vec<StudySession>>;
}

pub trait Store:
    UserStore + RequestStore + ChatStore + BucketStore + AssignmentStore + StudySessionStore
{
}

impl<T> Store for T where
    T: UserStore + RequestStore + ChatStore + BucketStore + AssignmentStore + StudySessionStore
{
}

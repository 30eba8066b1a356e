use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Database;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{DateTime, Document, doc, to_bson};

use crate::db::{
    get_assignment_collection, get_bucket_collection, get_chat_collection,
    get_request_collection, get_session_collection, get_user_collection,
};
use crate::error::StoreResult;
use crate::store::{
    AssignmentStore, BucketStore, ChatStore, RequestStore, StudySessionStore, UserStore,
};
use crate::types::{
    Assignment, Chat, ChatId, ChatKind, Friend, GroupMembership, Message, MessageBucket,
    ProfileChanges, Request, StudySession, User, UserId,
};

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn kind_name(kind: ChatKind) -> &'static str {
    match kind {
        ChatKind::Direct => "direct",
        ChatKind::Group => "group",
    }
}

fn escape_regex(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl UserStore for MongoStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        get_user_collection(&self.db).insert_one(user).await?;
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(get_user_collection(&self.db)
            .find_one(doc! { "_id": id })
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(get_user_collection(&self.db)
            .find_one(doc! { "email": email })
            .await?)
    }

    async fn find_users(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = get_user_collection(&self.db)
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn search_users(
        &self,
        query: Option<&str>,
        offset: u64,
        limit: Option<u64>,
    ) -> StoreResult<Vec<User>> {
        let filter = match query {
            Some(q) if !q.is_empty() => {
                let pattern = doc! { "$regex": escape_regex(q), "$options": "i" };
                doc! {
                    "$or": [
                        { "username": pattern.clone() },
                        { "first_name": pattern.clone() },
                        { "last_name": pattern },
                    ]
                }
            }
            _ => Document::new(),
        };

        let users = get_user_collection(&self.db);
        let mut find = users
            .find(filter)
            .sort(doc! { "username": 1 })
            .skip(offset);
        if let Some(limit) = limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        Ok(find.await?.try_collect().await?)
    }

    async fn update_profile(&self, id: UserId, changes: &ProfileChanges) -> StoreResult<bool> {
        let mut set = Document::new();
        let fields = [
            ("username", &changes.username),
            ("password", &changes.password),
            ("first_name", &changes.first_name),
            ("last_name", &changes.last_name),
            ("email", &changes.email),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                set.insert(key, value.as_str());
            }
        }
        if set.is_empty() {
            return Ok(false);
        }

        let result = get_user_collection(&self.db)
            .update_one(doc! { "_id": id }, doc! { "$set": set })
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let result = get_user_collection(&self.db)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn add_token(&self, id: UserId, token: &str) -> StoreResult<()> {
        get_user_collection(&self.db)
            .update_one(doc! { "_id": id }, doc! { "$addToSet": { "tokens": token } })
            .await?;
        Ok(())
    }

    async fn remove_token(&self, id: UserId, token: &str) -> StoreResult<()> {
        get_user_collection(&self.db)
            .update_one(doc! { "_id": id }, doc! { "$pull": { "tokens": token } })
            .await?;
        Ok(())
    }

    async fn add_friend(&self, id: UserId, friend: &Friend) -> StoreResult<()> {
        let entry = to_bson(friend)?;
        get_user_collection(&self.db)
            .update_one(
                doc! { "_id": id, "friends.friend_id": { "$ne": friend.friend_id } },
                doc! { "$push": { "friends": entry } },
            )
            .await?;
        Ok(())
    }

    async fn remove_friend(&self, id: UserId, friend_id: UserId) -> StoreResult<()> {
        get_user_collection(&self.db)
            .update_one(
                doc! { "_id": id },
                doc! { "$pull": { "friends": { "friend_id": friend_id } } },
            )
            .await?;
        Ok(())
    }

    async fn add_group(&self, id: UserId, group: &GroupMembership) -> StoreResult<()> {
        let entry = to_bson(group)?;
        get_user_collection(&self.db)
            .update_one(
                doc! { "_id": id, "groups.group_id": { "$ne": group.group_id } },
                doc! { "$push": { "groups": entry } },
            )
            .await?;
        Ok(())
    }

    async fn remove_group(&self, id: UserId, chat_id: ChatId) -> StoreResult<()> {
        get_user_collection(&self.db)
            .update_one(
                doc! { "_id": id },
                doc! { "$pull": { "groups": { "group_id": chat_id } } },
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RequestStore for MongoStore {
    async fn insert_request(&self, request: &Request) -> StoreResult<()> {
        get_request_collection(&self.db).insert_one(request).await?;
        Ok(())
    }

    async fn find_request(&self, id: ObjectId) -> StoreResult<Option<Request>> {
        Ok(get_request_collection(&self.db)
            .find_one(doc! { "_id": id })
            .await?)
    }

    async fn find_friend_request_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> StoreResult<Option<Request>> {
        Ok(get_request_collection(&self.db)
            .find_one(doc! {
                "kind": kind_name(ChatKind::Direct),
                "$or": [
                    { "sender": a, "receiver": b },
                    { "sender": b, "receiver": a },
                ],
            })
            .await?)
    }

    async fn find_group_invite(
        &self,
        chat_id: ChatId,
        receiver: UserId,
    ) -> StoreResult<Option<Request>> {
        Ok(get_request_collection(&self.db)
            .find_one(doc! {
                "kind": kind_name(ChatKind::Group),
                "group.chat_id": chat_id,
                "receiver": receiver,
            })
            .await?)
    }

    async fn requests_for_user(
        &self,
        user_id: UserId,
        kind: ChatKind,
    ) -> StoreResult<Vec<Request>> {
        let cursor = get_request_collection(&self.db)
            .find(doc! {
                "kind": kind_name(kind),
                "$or": [ { "sender": user_id }, { "receiver": user_id } ],
            })
            .sort(doc! { "timestamp": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_request(&self, id: ObjectId) -> StoreResult<bool> {
        let result = get_request_collection(&self.db)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_requests_for_chat(&self, chat_id: ChatId) -> StoreResult<u64> {
        let result = get_request_collection(&self.db)
            .delete_many(doc! { "group.chat_id": chat_id })
            .await?;
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl ChatStore for MongoStore {
    async fn insert_chat(&self, chat: &Chat) -> StoreResult<()> {
        get_chat_collection(&self.db).insert_one(chat).await?;
        Ok(())
    }

    async fn find_chat(&self, id: ChatId) -> StoreResult<Option<Chat>> {
        Ok(get_chat_collection(&self.db)
            .find_one(doc! { "_id": id })
            .await?)
    }

    async fn chats_for_user(&self, user_id: UserId) -> StoreResult<Vec<Chat>> {
        let cursor = get_chat_collection(&self.db)
            .find(doc! { "members": user_id })
            .sort(doc! { "created_at": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn add_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        max_members: usize,
    ) -> StoreResult<bool> {
        // The member at index `max_members - 1` exists only when the chat is full.
        let mut filter = doc! { "_id": chat_id, "members": { "$ne": user_id } };
        filter.insert(
            format!("members.{}", max_members.saturating_sub(1)),
            doc! { "$exists": false },
        );

        let result = get_chat_collection(&self.db)
            .update_one(filter, doc! { "$push": { "members": user_id } })
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn delete_chat(&self, id: ChatId) -> StoreResult<bool> {
        let result = get_chat_collection(&self.db)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn push_bucket(&self, chat_id: ChatId, bucket_id: ObjectId) -> StoreResult<bool> {
        let result = get_chat_collection(&self.db)
            .update_one(
                doc! { "_id": chat_id },
                doc! { "$push": { "message_buckets": bucket_id } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl BucketStore for MongoStore {
    async fn insert_bucket(&self, bucket: &MessageBucket) -> StoreResult<()> {
        get_bucket_collection(&self.db).insert_one(bucket).await?;
        Ok(())
    }

    async fn append_to_bucket(
        &self,
        bucket_id: ObjectId,
        message: &Message,
        capacity: usize,
    ) -> StoreResult<bool> {
        let entry = to_bson(message)?;
        let capacity = capacity as i32;
        let result = get_bucket_collection(&self.db)
            .update_one(
                doc! { "_id": bucket_id, "size": { "$lt": capacity } },
                doc! {
                    "$push": { "messages": entry },
                    "$inc": { "size": 1 },
                    "$set": { "updated_at": message.timestamp },
                },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn buckets_for_chat(&self, chat_id: ChatId) -> StoreResult<Vec<MessageBucket>> {
        let cursor = get_bucket_collection(&self.db)
            .find(doc! { "chat_id": chat_id })
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_bucket(&self, id: ObjectId) -> StoreResult<bool> {
        let result = get_bucket_collection(&self.db)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(result.deleted_count == 1)
    }

    async fn delete_buckets_for_chat(&self, chat_id: ChatId) -> StoreResult<u64> {
        let result = get_bucket_collection(&self.db)
            .delete_many(doc! { "chat_id": chat_id })
            .await?;
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl AssignmentStore for MongoStore {
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        get_assignment_collection(&self.db)
            .insert_one(assignment)
            .await?;
        Ok(())
    }

    async fn find_assignment(&self, id: ObjectId) -> StoreResult<Option<Assignment>> {
        Ok(get_assignment_collection(&self.db)
            .find_one(doc! { "_id": id })
            .await?)
    }

    async fn assignments_for_user(&self, user_id: UserId) -> StoreResult<Vec<Assignment>> {
        let cursor = get_assignment_collection(&self.db)
            .find(doc! { "user": user_id })
            .sort(doc! { "due_date": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn replace_assignment(&self, assignment: &Assignment) -> StoreResult<bool> {
        let result = get_assignment_collection(&self.db)
            .replace_one(doc! { "_id": assignment.id }, assignment)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_assignment(&self, id: ObjectId) -> StoreResult<bool> {
        let result = get_assignment_collection(&self.db)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(result.deleted_count > 0)
    }
}

#[async_trait]
impl StudySessionStore for MongoStore {
    async fn insert_session(&self, session: &StudySession) -> StoreResult<()> {
        get_session_collection(&self.db).insert_one(session).await?;
        Ok(())
    }

    async fn sessions_for_attendee(
        &self,
        user_id: UserId,
        window: Option<(DateTime, DateTime)>,
    ) -> StoreResult<Vec<StudySession>> {
        let mut filter = doc! { "attendees.user_id": user_id };
        if let Some((from, until)) = window {
            filter.insert("date", doc! { "$gte": from, "$lt": until });
        }

        let cursor = get_session_collection(&self.db)
            .find(filter)
            .sort(doc! { "date": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

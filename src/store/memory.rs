use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mongodb::bson::DateTime;
use mongodb::bson::oid::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::store::{
    AssignmentStore, BucketStore, ChatStore, RequestStore, StudySessionStore, UserStore,
};
use crate::types::{
    Assignment, Chat, ChatId, ChatKind, Friend, GroupMembership, Message, MessageBucket,
    ProfileChanges, Request, StudySession, User, UserId,
};

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    requests: Vec<Request>,
    chats: Vec<Chat>,
    buckets: Vec<MessageBucket>,
    assignments: Vec<Assignment>,
    sessions: Vec<StudySession>,
}

fn apply_changes(changes: &ProfileChanges, user: &mut User) {
    if let Some(username) = &changes.username {
        user.username = username.clone();
    }
    if let Some(password) = &changes.password {
        user.password = password.clone();
    }
    if let Some(first_name) = &changes.first_name {
        user.first_name = first_name.clone();
    }
    if let Some(last_name) = &changes.last_name {
        user.last_name = last_name.clone();
    }
    if let Some(email) = &changes.email {
        user.email = email.clone();
    }
}

/// Vec-backed store mirroring the Mongo semantics, including unique account fields.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
    fail_bucket_registration: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.inner.lock().expect("memory store poisoned")
    }

    pub fn bucket_count(&self) -> usize {
        self.lock().buckets.len()
    }

    pub fn chat_count(&self) -> usize {
        self.lock().chats.len()
    }

    /// Makes every later `push_bucket` fail as a database error would.
    pub fn fail_bucket_registration(&self) {
        self.fail_bucket_registration.store(true, Ordering::SeqCst);
    }
}

fn check_unique(users: &[User], id: UserId, username: &str, email: &str) -> StoreResult<()> {
    for other in users.iter().filter(|u| u.id != id) {
        if other.username == username {
            return Err(StoreError::Duplicate("username".to_string()));
        }
        if other.email == email {
            return Err(StoreError::Duplicate("email".to_string()));
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut c = self.lock();
        check_unique(&c.users, user.id, &user.username, &user.email)?;
        c.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_users(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn search_users(
        &self,
        query: Option<&str>,
        offset: u64,
        limit: Option<u64>,
    ) -> StoreResult<Vec<User>> {
        let needle = query.unwrap_or_default().to_lowercase();
        let mut found: Vec<User> = self
            .lock()
            .users
            .iter()
            .filter(|u| {
                needle.is_empty()
                    || [&u.username, &u.first_name, &u.last_name]
                        .iter()
                        .any(|field| field.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));

        Ok(found
            .into_iter()
            .skip(offset as usize)
            .take(limit.map_or(usize::MAX, |l| l as usize))
            .collect())
    }

    async fn update_profile(&self, id: UserId, changes: &ProfileChanges) -> StoreResult<bool> {
        let mut c = self.lock();
        let Some(current) = c.users.iter().find(|u| u.id == id).cloned() else {
            return Ok(false);
        };
        let mut updated = current;
        apply_changes(changes, &mut updated);
        check_unique(&c.users, id, &updated.username, &updated.email)?;

        if let Some(user) = c.users.iter_mut().find(|u| u.id == id) {
            *user = updated;
        }
        Ok(true)
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let mut c = self.lock();
        let before = c.users.len();
        c.users.retain(|u| u.id != id);
        Ok(c.users.len() < before)
    }

    async fn add_token(&self, id: UserId, token: &str) -> StoreResult<()> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            if !user.tokens.iter().any(|t| t == token) {
                user.tokens.push(token.to_string());
            }
        }
        Ok(())
    }

    async fn remove_token(&self, id: UserId, token: &str) -> StoreResult<()> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            user.tokens.retain(|t| t != token);
        }
        Ok(())
    }

    async fn add_friend(&self, id: UserId, friend: &Friend) -> StoreResult<()> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            if user.friend(friend.friend_id).is_none() {
                user.friends.push(friend.clone());
            }
        }
        Ok(())
    }

    async fn remove_friend(&self, id: UserId, friend_id: UserId) -> StoreResult<()> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            user.friends.retain(|f| f.friend_id != friend_id);
        }
        Ok(())
    }

    async fn add_group(&self, id: UserId, group: &GroupMembership) -> StoreResult<()> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            if !user.groups.iter().any(|g| g.group_id == group.group_id) {
                user.groups.push(group.clone());
            }
        }
        Ok(())
    }

    async fn remove_group(&self, id: UserId, chat_id: ChatId) -> StoreResult<()> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            user.groups.retain(|g| g.group_id != chat_id);
        }
        Ok(())
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert_request(&self, request: &Request) -> StoreResult<()> {
        let mut c = self.lock();
        if c.requests.iter().any(|r| r.pair_key == request.pair_key) {
            return Err(StoreError::Duplicate("request".to_string()));
        }
        c.requests.push(request.clone());
        Ok(())
    }

    async fn find_request(&self, id: ObjectId) -> StoreResult<Option<Request>> {
        Ok(self.lock().requests.iter().find(|r| r.id == id).cloned())
    }

    async fn find_friend_request_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> StoreResult<Option<Request>> {
        Ok(self
            .lock()
            .requests
            .iter()
            .find(|r| {
                r.kind == ChatKind::Direct
                    && ((r.sender == a && r.receiver == b) || (r.sender == b && r.receiver == a))
            })
            .cloned())
    }

    async fn find_group_invite(
        &self,
        chat_id: ChatId,
        receiver: UserId,
    ) -> StoreResult<Option<Request>> {
        Ok(self
            .lock()
            .requests
            .iter()
            .find(|r| {
                r.kind == ChatKind::Group
                    && r.receiver == receiver
                    && r.group.as_ref().is_some_and(|g| g.chat_id == chat_id)
            })
            .cloned())
    }

    async fn requests_for_user(
        &self,
        user_id: UserId,
        kind: ChatKind,
    ) -> StoreResult<Vec<Request>> {
        Ok(self
            .lock()
            .requests
            .iter()
            .filter(|r| r.kind == kind && r.involves(user_id))
            .cloned()
            .collect())
    }

    async fn delete_request(&self, id: ObjectId) -> StoreResult<bool> {
        let mut c = self.lock();
        let before = c.requests.len();
        c.requests.retain(|r| r.id != id);
        Ok(c.requests.len() < before)
    }

    async fn delete_requests_for_chat(&self, chat_id: ChatId) -> StoreResult<u64> {
        let mut c = self.lock();
        let before = c.requests.len();
        c.requests
            .retain(|r| r.group.as_ref().is_none_or(|g| g.chat_id != chat_id));
        Ok((before - c.requests.len()) as u64)
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn insert_chat(&self, chat: &Chat) -> StoreResult<()> {
        self.lock().chats.push(chat.clone());
        Ok(())
    }

    async fn find_chat(&self, id: ChatId) -> StoreResult<Option<Chat>> {
        Ok(self.lock().chats.iter().find(|c| c.id == id).cloned())
    }

    async fn chats_for_user(&self, user_id: UserId) -> StoreResult<Vec<Chat>> {
        Ok(self
            .lock()
            .chats
            .iter()
            .filter(|c| c.is_member(user_id))
            .cloned()
            .collect())
    }

    async fn add_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        max_members: usize,
    ) -> StoreResult<bool> {
        let mut c = self.lock();
        match c.chats.iter_mut().find(|c| c.id == chat_id) {
            Some(chat) if !chat.is_member(user_id) && chat.members.len() < max_members => {
                chat.members.push(user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_chat(&self, id: ChatId) -> StoreResult<bool> {
        let mut c = self.lock();
        let before = c.chats.len();
        c.chats.retain(|chat| chat.id != id);
        Ok(c.chats.len() < before)
    }

    async fn push_bucket(&self, chat_id: ChatId, bucket_id: ObjectId) -> StoreResult<bool> {
        if self.fail_bucket_registration.load(Ordering::SeqCst) {
            return Err(StoreError::Serialization(
                serde::ser::Error::custom("bucket registration failed"),
            ));
        }
        match self.lock().chats.iter_mut().find(|c| c.id == chat_id) {
            Some(chat) => {
                chat.message_buckets.push(bucket_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl BucketStore for MemoryStore {
    async fn insert_bucket(&self, bucket: &MessageBucket) -> StoreResult<()> {
        self.lock().buckets.push(bucket.clone());
        Ok(())
    }

    async fn append_to_bucket(
        &self,
        bucket_id: ObjectId,
        message: &Message,
        capacity: usize,
    ) -> StoreResult<bool> {
        match self.lock().buckets.iter_mut().find(|b| b.id == bucket_id) {
            Some(bucket) if bucket.messages.len() < capacity => {
                bucket.messages.push(message.clone());
                bucket.size += 1;
                bucket.updated_at = message.timestamp;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn buckets_for_chat(&self, chat_id: ChatId) -> StoreResult<Vec<MessageBucket>> {
        Ok(self
            .lock()
            .buckets
            .iter()
            .filter(|b| b.chat_id == chat_id)
            .cloned()
            .collect())
    }

    async fn delete_bucket(&self, id: ObjectId) -> StoreResult<bool> {
        let mut c = self.lock();
        let before = c.buckets.len();
        c.buckets.retain(|b| b.id != id);
        Ok(c.buckets.len() < before)
    }

    async fn delete_buckets_for_chat(&self, chat_id: ChatId) -> StoreResult<u64> {
        let mut c = self.lock();
        let before = c.buckets.len();
        c.buckets.retain(|b| b.chat_id != chat_id);
        Ok((before - c.buckets.len()) as u64)
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        self.lock().assignments.push(assignment.clone());
        Ok(())
    }

    async fn find_assignment(&self, id: ObjectId) -> StoreResult<Option<Assignment>> {
        Ok(self.lock().assignments.iter().find(|a| a.id == id).cloned())
    }

    async fn assignments_for_user(&self, user_id: UserId) -> StoreResult<Vec<Assignment>> {
        let mut found: Vec<Assignment> = self
            .lock()
            .assignments
            .iter()
            .filter(|a| a.user == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.due_date);
        Ok(found)
    }

    async fn replace_assignment(&self, assignment: &Assignment) -> StoreResult<bool> {
        match self
            .lock()
            .assignments
            .iter_mut()
            .find(|a| a.id == assignment.id)
        {
            Some(existing) => {
                *existing = assignment.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_assignment(&self, id: ObjectId) -> StoreResult<bool> {
        let mut c = self.lock();
        let before = c.assignments.len();
        c.assignments.retain(|a| a.id != id);
        Ok(c.assignments.len() < before)
    }
}

#[async_trait]
impl StudySessionStore for MemoryStore {
    async fn insert_session(&self, session: &StudySession) -> StoreResult<()> {
        self.lock().sessions.push(session.clone());
        Ok(())
    }

    async fn sessions_for_attendee(
        &self,
        user_id: UserId,
        window: Option<(DateTime, DateTime)>,
    ) -> StoreResult<Vec<StudySession>> {
        let mut found: Vec<StudySession> = self
            .lock()
            .sessions
            .iter()
            .filter(|s| s.attendees.iter().any(|a| a.user_id == user_id))
            .filter(|s| window.is_none_or(|(from, until)| s.date >= from && s.date < until))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.date);
        Ok(found)
    }
}

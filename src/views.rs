//! JSON shapes returned to clients.
//!
//! Documents keep their BSON types; these views render ids as hex strings and
//! timestamps as RFC 3339, and never carry password hashes or tokens.

use std::collections::HashMap;

use mongodb::bson::DateTime;
use serde::Serialize;

use crate::types::{
    Assignment, AssignmentStatus, Chat, ChatKind, Message, Request, StudySession, User, UserId,
};

pub fn rfc3339(at: DateTime) -> String {
    at.try_to_rfc3339_string().unwrap_or_default()
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FriendView {
    pub friend_id: String,
    pub chat_id: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GroupRefView {
    pub group_name: String,
    pub group_id: String,
}

/// The signed-in user's own account.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub courses: Vec<String>,
    pub friends: Vec<FriendView>,
    pub groups: Vec<GroupRefView>,
}

impl From<&User> for AccountView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_hex(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            courses: user.courses.clone(),
            friends: user
                .friends
                .iter()
                .map(|f| FriendView {
                    friend_id: f.friend_id.to_hex(),
                    chat_id: f.chat_id.to_hex(),
                })
                .collect(),
            groups: user
                .groups
                .iter()
                .map(|g| GroupRefView {
                    group_name: g.group_name.clone(),
                    group_id: g.group_id.to_hex(),
                })
                .collect(),
        }
    }
}

/// What other users may see of an account.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courses: Option<Vec<String>>,
}

impl PublicUser {
    /// Search results: names only.
    pub fn summary(user: &User) -> Self {
        Self {
            id: user.id.to_hex(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: None,
            courses: None,
        }
    }

    pub fn contact(user: &User) -> Self {
        Self {
            email: Some(user.email.clone()),
            ..Self::summary(user)
        }
    }

    pub fn profile(user: &User) -> Self {
        Self {
            courses: Some(user.courses.clone()),
            ..Self::contact(user)
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: AccountView,
    pub token: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FriendEntry {
    pub user: Option<PublicUser>,
    pub friend_id: String,
    pub chat_id: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: String,
    pub kind: ChatKind,
    pub sender: Option<PublicUser>,
    pub receiver: Option<PublicUser>,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub timestamp: String,
}

impl RequestView {
    /// Joins the public profiles of both parties onto the request.
    pub fn joined(request: &Request, users: &HashMap<UserId, User>) -> Self {
        Self {
            id: request.id.to_hex(),
            kind: request.kind,
            sender: users.get(&request.sender).map(PublicUser::contact),
            receiver: users.get(&request.receiver).map(PublicUser::contact),
            sender_id: request.sender.to_hex(),
            receiver_id: request.receiver.to_hex(),
            group_name: request.group.as_ref().map(|g| g.name.clone()),
            chat_id: request.group.as_ref().map(|g| g.chat_id.to_hex()),
            timestamp: rfc3339(request.timestamp),
        }
    }
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct RequestsView {
    pub incoming: Vec<RequestView>,
    pub outgoing: Vec<RequestView>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: String,
    pub kind: ChatKind,
    pub members: Vec<String>,
    pub bucket_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub created_at: String,
}

impl From<&Chat> for ChatView {
    fn from(chat: &Chat) -> Self {
        Self {
            id: chat.id.to_hex(),
            kind: chat.kind,
            members: chat.members.iter().map(|m| m.to_hex()).collect(),
            bucket_count: chat.message_buckets.len(),
            group_name: chat.group_name.clone(),
            owner: chat.owner.map(|o| o.to_hex()),
            created_at: rfc3339(chat.created_at),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub content: String,
    pub sender_id: String,
    /// Resolved when the history is read; `None` once the sender's account is gone.
    pub sender_username: Option<String>,
    pub timestamp: String,
}

impl MessageView {
    pub fn new(message: &Message, sender_username: Option<String>) -> Self {
        Self {
            content: message.content.clone(),
            sender_id: message.sender.to_hex(),
            sender_username,
            timestamp: rfc3339(message.timestamp),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    pub id: String,
    pub user: String,
    pub title: String,
    pub description: Option<String>,
    pub course: Option<String>,
    pub status: AssignmentStatus,
    pub is_complete: bool,
    pub date_assigned: String,
    pub due_date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Assignment> for AssignmentView {
    fn from(a: &Assignment) -> Self {
        Self {
            id: a.id.to_hex(),
            user: a.user.to_hex(),
            title: a.title.clone(),
            description: a.description.clone(),
            course: a.course.clone(),
            status: a.status,
            is_complete: a.status == AssignmentStatus::Complete,
            date_assigned: rfc3339(a.date_assigned),
            due_date: rfc3339(a.due_date),
            created_at: rfc3339(a.created_at),
            updated_at: rfc3339(a.updated_at),
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSummary {
    pub not_started: usize,
    pub in_progress: usize,
    pub complete: usize,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeView {
    pub user_id: String,
    pub username: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StudySessionView {
    pub id: String,
    pub date: String,
    pub location: String,
    pub name: String,
    pub description: String,
    pub attendees: Vec<AttendeeView>,
    pub created_at: String,
}

impl From<&StudySession> for StudySessionView {
    fn from(s: &StudySession) -> Self {
        Self {
            id: s.id.to_hex(),
            date: rfc3339(s.date),
            location: s.location.clone(),
            name: s.name.clone(),
            description: s.description.clone(),
            attendees: s
                .attendees
                .iter()
                .map(|a| AttendeeView {
                    user_id: a.user_id.to_hex(),
                    username: a.username.clone(),
                })
                .collect(),
            created_at: rfc3339(s.created_at),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ResolvedRequestView {
    pub request: RequestView,
    pub chat: Option<ChatView>,
}

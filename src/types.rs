use mongodb::bson::DateTime;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

pub type UserId = ObjectId;
pub type ChatId = ObjectId;

/// Maximum number of messages a bucket holds before a new one is opened.
pub const BUCKET_CAPACITY: usize = 25;
pub const MAX_GROUP_MEMBERS: usize = 32;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Friend {
    pub friend_id: UserId,
    pub chat_id: ChatId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GroupMembership {
    pub group_name: String,
    pub group_id: ChatId,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub courses: Vec<String>,
    #[serde(default)]
    pub friends: Vec<Friend>,
    #[serde(default)]
    pub groups: Vec<GroupMembership>,
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl User {
    pub fn friend(&self, friend_id: UserId) -> Option<&Friend> {
        self.friends.iter().find(|f| f.friend_id == friend_id)
    }
}

/// Fields of a user that can change after sign-up. `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Group,
}

impl ChatKind {
    pub fn max_members(self) -> usize {
        match self {
            ChatKind::Direct => 2,
            ChatKind::Group => MAX_GROUP_MEMBERS,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Chat {
    #[serde(rename = "_id")]
    pub id: ChatId,
    pub kind: ChatKind,
    pub members: Vec<UserId>,
    /// Bucket ids in creation order; the last one is the current bucket.
    #[serde(default)]
    pub message_buckets: Vec<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
    pub created_at: DateTime,
}

impl Chat {
    pub fn direct(a: UserId, b: UserId) -> Self {
        Self {
            id: ObjectId::new(),
            kind: ChatKind::Direct,
            members: vec![a, b],
            message_buckets: Vec::new(),
            group_name: None,
            owner: None,
            created_at: DateTime::now(),
        }
    }

    pub fn group(owner: UserId, name: String) -> Self {
        Self {
            id: ObjectId::new(),
            kind: ChatKind::Group,
            members: vec![owner],
            message_buckets: Vec::new(),
            group_name: Some(name),
            owner: Some(owner),
            created_at: DateTime::now(),
        }
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    pub fn current_bucket(&self) -> Option<ObjectId> {
        self.message_buckets.last().copied()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub content: String,
    pub sender: UserId,
    pub timestamp: DateTime,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MessageBucket {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub chat_id: ChatId,
    pub messages: Vec<Message>,
    pub size: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl MessageBucket {
    /// Opens a bucket that already holds its first message.
    pub fn starting_with(chat_id: ChatId, message: Message) -> Self {
        let now = message.timestamp;
        Self {
            id: ObjectId::new(),
            chat_id,
            messages: vec![message],
            size: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GroupInvite {
    pub name: String,
    pub chat_id: ChatId,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Request {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub kind: ChatKind,
    pub sender: UserId,
    pub receiver: UserId,
    pub timestamp: DateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupInvite>,
    /// Unique among pending requests: the unordered user pair for friend
    /// requests, the (group, invitee) pair for invites.
    pub pair_key: String,
}

impl Request {
    pub fn friend(sender: UserId, receiver: UserId) -> Self {
        let (low, high) = if sender.bytes() <= receiver.bytes() {
            (sender, receiver)
        } else {
            (receiver, sender)
        };

        Self {
            id: ObjectId::new(),
            kind: ChatKind::Direct,
            sender,
            receiver,
            timestamp: DateTime::now(),
            group: None,
            pair_key: format!("direct:{low}:{high}"),
        }
    }

    pub fn group_invite(sender: UserId, receiver: UserId, group: GroupInvite) -> Self {
        let pair_key = format!("group:{}:{receiver}", group.chat_id);
        Self {
            id: ObjectId::new(),
            kind: ChatKind::Group,
            sender,
            receiver,
            timestamp: DateTime::now(),
            group: Some(group),
            pair_key,
        }
    }

    pub fn involves(&self, user_id: UserId) -> bool {
        self.sender == user_id || self.receiver == user_id
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Assignment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user: UserId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub status: AssignmentStatus,
    pub date_assigned: DateTime,
    pub due_date: DateTime,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Attendee {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StudySession {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub date: DateTime,
    pub location: String,
    pub name: String,
    pub description: String,
    pub attendees: Vec<Attendee>,
    pub created_at: DateTime,
}

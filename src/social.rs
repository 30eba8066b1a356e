//! Friend edges, group membership, and the request lifecycle.
//!
//! A request is pending while its document exists. Accepting or rejecting it
//! deletes the document first; whoever deletes it owns the outcome, so a
//! request accepted twice still yields a single chat.

use std::collections::{HashMap, HashSet};

use mongodb::bson::oid::ObjectId;

use crate::error::{AppError, Result, StoreError};
use crate::store::Store;
use crate::types::{
    Chat, ChatId, ChatKind, Friend, GroupInvite, GroupMembership, MAX_GROUP_MEMBERS, Request, User,
    UserId,
};
use crate::views::{FriendEntry, PublicUser, RequestView, RequestsView};

async fn users_by_id(store: &dyn Store, ids: Vec<UserId>) -> Result<HashMap<UserId, User>> {
    Ok(store
        .find_users(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect())
}

async fn require_user(store: &dyn Store, id: UserId) -> Result<User> {
    store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

/// Loads a chat the caller belongs to. A chat of another kind counts as missing.
pub async fn load_member_chat(
    store: &dyn Store,
    chat_id: ChatId,
    user_id: UserId,
    kind: Option<ChatKind>,
) -> Result<Chat> {
    let chat = store
        .find_chat(chat_id)
        .await?
        .filter(|chat| kind.is_none_or(|k| chat.kind == k))
        .ok_or_else(|| AppError::not_found("Chat"))?;

    if !chat.is_member(user_id) {
        return Err(AppError::Forbidden("Not a member of this chat".to_string()));
    }
    Ok(chat)
}

pub async fn list_chats(store: &dyn Store, user_id: UserId) -> Result<Vec<Chat>> {
    Ok(store.chats_for_user(user_id).await?)
}

pub async fn send_friend_request(
    store: &dyn Store,
    sender: &User,
    receiver_id: UserId,
) -> Result<Request> {
    if sender.id == receiver_id {
        return Err(AppError::invalid("Cannot send a friend request to yourself"));
    }
    require_user(store, receiver_id).await?;

    if sender.friend(receiver_id).is_some() {
        return Err(AppError::Conflict("Already friends".to_string()));
    }
    if store
        .find_friend_request_between(sender.id, receiver_id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "A friend request between these users is already pending".to_string(),
        ));
    }

    let request = Request::friend(sender.id, receiver_id);
    insert_pending(
        store,
        &request,
        "A friend request between these users is already pending",
    )
    .await?;
    log::info!(
        "Friend request {} from {} to {}",
        request.id,
        sender.id,
        receiver_id
    );
    Ok(request)
}

/// Inserts a request. The store's pair key catches a duplicate written since the
/// caller's pending check.
async fn insert_pending(store: &dyn Store, request: &Request, conflict: &str) -> Result<()> {
    match store.insert_request(request).await {
        Err(StoreError::Duplicate(_)) => Err(AppError::Conflict(conflict.to_string())),
        other => Ok(other?),
    }
}

/// Renders requests with both parties' public profiles joined in.
pub async fn render_requests(
    store: &dyn Store,
    requests: &[Request],
) -> Result<Vec<RequestView>> {
    let ids: HashSet<UserId> = requests
        .iter()
        .flat_map(|r| [r.sender, r.receiver])
        .collect();
    let users = users_by_id(store, ids.into_iter().collect()).await?;

    Ok(requests
        .iter()
        .map(|r| RequestView::joined(r, &users))
        .collect())
}

pub async fn list_requests(
    store: &dyn Store,
    user_id: UserId,
    kind: ChatKind,
) -> Result<RequestsView> {
    let requests = store.requests_for_user(user_id, kind).await?;
    let views = render_requests(store, &requests).await?;

    let mut listing = RequestsView::default();
    for (request, view) in requests.iter().zip(views) {
        if request.receiver == user_id {
            listing.incoming.push(view);
        } else {
            listing.outgoing.push(view);
        }
    }
    Ok(listing)
}

async fn find_request_of_kind(
    store: &dyn Store,
    request_id: ObjectId,
    kind: ChatKind,
) -> Result<Request> {
    store
        .find_request(request_id)
        .await?
        .filter(|r| r.kind == kind)
        .ok_or_else(|| AppError::not_found("Request"))
}

/// Removes the pending request, failing if someone else resolved it first.
async fn claim_request(store: &dyn Store, request: &Request) -> Result<()> {
    if !store.delete_request(request.id).await? {
        return Err(AppError::not_found("Request"));
    }
    Ok(())
}

/// Accepts or rejects a request addressed to `user_id`. Returns the chat that was
/// created or joined on acceptance.
pub async fn respond_to_request(
    store: &dyn Store,
    user_id: UserId,
    request_id: ObjectId,
    kind: ChatKind,
    accept: bool,
) -> Result<(Request, Option<Chat>)> {
    let request = find_request_of_kind(store, request_id, kind).await?;
    if request.receiver != user_id {
        return Err(AppError::Forbidden(
            "Only the receiver can respond to this request".to_string(),
        ));
    }
    claim_request(store, &request).await?;

    if !accept {
        log::info!("Request {} rejected", request.id);
        return Ok((request, None));
    }

    let chat = match kind {
        ChatKind::Direct => accept_friend_request(store, &request).await?,
        ChatKind::Group => accept_group_invite(store, &request).await?,
    };
    log::info!("Request {} accepted into chat {}", request.id, chat.id);
    Ok((request, Some(chat)))
}

async fn accept_friend_request(store: &dyn Store, request: &Request) -> Result<Chat> {
    require_user(store, request.sender).await?;

    let chat = Chat::direct(request.sender, request.receiver);
    store.insert_chat(&chat).await?;

    store
        .add_friend(
            request.sender,
            &Friend {
                friend_id: request.receiver,
                chat_id: chat.id,
            },
        )
        .await?;
    store
        .add_friend(
            request.receiver,
            &Friend {
                friend_id: request.sender,
                chat_id: chat.id,
            },
        )
        .await?;

    Ok(chat)
}

async fn accept_group_invite(store: &dyn Store, request: &Request) -> Result<Chat> {
    let invite = request
        .group
        .as_ref()
        .ok_or_else(|| AppError::Internal(format!("Group invite {} has no group", request.id)))?;

    let added = store
        .add_member(
            invite.chat_id,
            request.receiver,
            ChatKind::Group.max_members(),
        )
        .await?;
    let chat = store
        .find_chat(invite.chat_id)
        .await?
        .ok_or_else(|| AppError::not_found("Group"))?;
    if !added && !chat.is_member(request.receiver) {
        return Err(AppError::Conflict(format!(
            "Group is full ({MAX_GROUP_MEMBERS} members)"
        )));
    }

    store
        .add_group(
            request.receiver,
            &GroupMembership {
                group_name: invite.name.clone(),
                group_id: chat.id,
            },
        )
        .await?;
    Ok(chat)
}

/// Withdraws (sender) or dismisses (receiver) a pending request.
pub async fn cancel_request(
    store: &dyn Store,
    user_id: UserId,
    request_id: ObjectId,
    kind: ChatKind,
) -> Result<()> {
    let request = find_request_of_kind(store, request_id, kind).await?;
    if !request.involves(user_id) {
        return Err(AppError::Forbidden(
            "Not a party to this request".to_string(),
        ));
    }
    claim_request(store, &request).await
}

pub async fn list_friends(store: &dyn Store, user: &User) -> Result<Vec<FriendEntry>> {
    let ids = user.friends.iter().map(|f| f.friend_id).collect();
    let users = users_by_id(store, ids).await?;

    Ok(user
        .friends
        .iter()
        .map(|f| FriendEntry {
            user: users.get(&f.friend_id).map(PublicUser::contact),
            friend_id: f.friend_id.to_hex(),
            chat_id: f.chat_id.to_hex(),
        })
        .collect())
}

/// Drops the friend edge on both sides. The direct chat and its history stay.
pub async fn remove_friend(store: &dyn Store, user: &User, friend_id: UserId) -> Result<()> {
    if user.friend(friend_id).is_none() {
        return Err(AppError::NotFound(
            "friendId missing from user's friends list".to_string(),
        ));
    }
    store.remove_friend(user.id, friend_id).await?;
    store.remove_friend(friend_id, user.id).await?;
    Ok(())
}

pub fn chat_id_of_friend(user: &User, friend_id: UserId) -> Result<ChatId> {
    user.friend(friend_id)
        .map(|f| f.chat_id)
        .ok_or_else(|| AppError::NotFound("Invalid friend id".to_string()))
}

pub async fn create_group(store: &dyn Store, owner: &User, name: &str) -> Result<Chat> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::invalid("groupName is required"));
    }

    let chat = Chat::group(owner.id, name.to_string());
    store.insert_chat(&chat).await?;
    store
        .add_group(
            owner.id,
            &GroupMembership {
                group_name: name.to_string(),
                group_id: chat.id,
            },
        )
        .await?;
    log::info!("Group {} created by {}", chat.id, owner.id);
    Ok(chat)
}

pub async fn list_groups(store: &dyn Store, user_id: UserId) -> Result<Vec<Chat>> {
    Ok(store
        .chats_for_user(user_id)
        .await?
        .into_iter()
        .filter(|c| c.kind == ChatKind::Group)
        .collect())
}

pub async fn invite_to_group(
    store: &dyn Store,
    inviter: &User,
    chat_id: ChatId,
    invitee_id: UserId,
) -> Result<Request> {
    let chat = load_member_chat(store, chat_id, inviter.id, Some(ChatKind::Group)).await?;
    require_user(store, invitee_id).await?;

    if chat.is_member(invitee_id) {
        return Err(AppError::Conflict("User is already a member".to_string()));
    }
    if chat.members.len() >= chat.kind.max_members() {
        return Err(AppError::Conflict(format!(
            "Group is full ({MAX_GROUP_MEMBERS} members)"
        )));
    }
    if store.find_group_invite(chat_id, invitee_id).await?.is_some() {
        return Err(AppError::Conflict(
            "An invite for this user is already pending".to_string(),
        ));
    }

    let request = Request::group_invite(
        inviter.id,
        invitee_id,
        GroupInvite {
            name: chat.group_name.clone().unwrap_or_default(),
            chat_id,
        },
    );
    insert_pending(store, &request, "An invite for this user is already pending").await?;
    log::info!("User {} invited to group {}", invitee_id, chat_id);
    Ok(request)
}

/// Owner only. Removes memberships, pending invites, and the stored history.
pub async fn delete_group(store: &dyn Store, user_id: UserId, chat_id: ChatId) -> Result<()> {
    let chat = load_member_chat(store, chat_id, user_id, Some(ChatKind::Group)).await?;
    if chat.owner != Some(user_id) {
        return Err(AppError::Forbidden(
            "Only the owner can delete a group".to_string(),
        ));
    }

    for member in &chat.members {
        store.remove_group(*member, chat_id).await?;
    }
    store.delete_requests_for_chat(chat_id).await?;
    store.delete_buckets_for_chat(chat_id).await?;
    store.delete_chat(chat_id).await?;
    log::info!("Group {} deleted", chat_id);
    Ok(())
}

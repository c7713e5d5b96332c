//! Directed friendship edges.
//!
//! A request writes one PENDING edge `user -> friend`. When the target
//! confirms, that edge and its reciprocal both become CONFIRMED. Removal only
//! touches the caller's own outgoing edge.
//!
//! Every operation checks its arguments in the same order: a self-reference
//! is an `InvalidArgument`, a missing user is `NotFound`, and an edge in the
//! wrong state is a `Conflict`.

use crate::database::{FriendDb, UserDb};
use crate::error::{AppError, Result};
use crate::model::{Friend, FriendshipStatus, FriendshipStatusInfo, User};
use log::{debug, info};
use std::collections::BTreeSet;

fn check_distinct(user_id: u64, other_id: u64) -> Result<()> {
    if user_id == other_id {
        return Err(AppError::InvalidArgument(format!(
            "User {} cannot befriend themselves",
            user_id
        )));
    }
    Ok(())
}

fn require_user<D: UserDb>(db: &D, id: u64) -> Result<()> {
    if !db.user_exists(id)? {
        return Err(AppError::not_found(format!("user {}", id)));
    }
    Ok(())
}

fn validate_pair<D: UserDb>(db: &D, user_id: u64, other_id: u64) -> Result<()> {
    check_distinct(user_id, other_id)?;
    require_user(db, user_id)?;
    require_user(db, other_id)
}

pub fn send_request<D: UserDb + FriendDb>(db: &D, user_id: u64, friend_id: u64) -> Result<()> {
    debug!("Friend request {} -> {}", user_id, friend_id);
    validate_pair(db, user_id, friend_id)?;
    db.add_friend_request(user_id, friend_id)?;
    info!("Friend request created: {} -> {}", user_id, friend_id);
    Ok(())
}

/// `user_id` accepts the pending request sent by `friend_id`.
pub fn confirm<D: UserDb + FriendDb>(db: &D, user_id: u64, friend_id: u64) -> Result<()> {
    validate_pair(db, user_id, friend_id)?;
    db.confirm_friend_request(user_id, friend_id)?;
    info!("Friendship confirmed: {} <-> {}", user_id, friend_id);
    Ok(())
}

pub fn remove<D: UserDb + FriendDb>(db: &D, user_id: u64, friend_id: u64) -> Result<()> {
    validate_pair(db, user_id, friend_id)?;
    if db.remove_friend(user_id, friend_id)? {
        info!("Friendship edge removed: {} -> {}", user_id, friend_id);
    } else {
        debug!("No friendship edge {} -> {}", user_id, friend_id);
    }
    Ok(())
}

/// Users on the far end of `user_id`'s outgoing edges, optionally only those
/// with `status`.
pub fn list<D: UserDb + FriendDb>(
    db: &D,
    user_id: u64,
    status: Option<FriendshipStatus>,
) -> Result<Vec<Friend>> {
    require_user(db, user_id)?;
    db.friend_edges(user_id)?
        .into_iter()
        .filter(|(_, s)| status.map_or(true, |wanted| wanted == *s))
        .map(|(friend_id, status)| -> Result<Friend> {
            let user = db.get_user(friend_id)?.ok_or_else(|| {
                AppError::Corrupted(format!("edge {} -> {} has no user", user_id, friend_id))
            })?;
            Ok(Friend { user, status })
        })
        .collect()
}

pub fn confirmed<D: UserDb + FriendDb>(db: &D, user_id: u64) -> Result<Vec<Friend>> {
    list(db, user_id, Some(FriendshipStatus::Confirmed))
}

pub fn pending<D: UserDb + FriendDb>(db: &D, user_id: u64) -> Result<Vec<Friend>> {
    list(db, user_id, Some(FriendshipStatus::Pending))
}

fn confirmed_ids<D: FriendDb>(db: &D, user_id: u64) -> Result<BTreeSet<u64>> {
    Ok(db
        .friend_edges(user_id)?
        .into_iter()
        .filter(|(_, status)| *status == FriendshipStatus::Confirmed)
        .map(|(id, _)| id)
        .collect())
}

/// Only CONFIRMED edges count on either side.
pub fn common<D: UserDb + FriendDb>(db: &D, user_id: u64, other_id: u64) -> Result<Vec<User>> {
    validate_pair(db, user_id, other_id)?;
    let mine = confirmed_ids(db, user_id)?;
    let theirs = confirmed_ids(db, other_id)?;
    mine.intersection(&theirs)
        .map(|id| {
            db.get_user(*id)?
                .ok_or_else(|| AppError::Corrupted(format!("friend {} has no user", id)))
        })
        .collect()
}

pub fn statuses() -> Vec<FriendshipStatusInfo> {
    FriendshipStatus::ALL.iter().map(|s| s.info()).collect()
}

use crate::database::UserDb;
use crate::error::{AppError, Result};
use crate::model::User;
use crate::validation::normalize_user;
use log::info;
use validator::Validate;

pub fn all<D: UserDb>(db: &D) -> Result<Vec<User>> {
    db.get_users()
}

pub fn find<D: UserDb>(db: &D, id: u64) -> Result<User> {
    db.get_user(id)?
        .ok_or_else(|| AppError::not_found(format!("user {}", id)))
}

/// Any id sent by the client is ignored; the store assigns one.
pub fn create<D: UserDb>(db: &D, mut user: User) -> Result<User> {
    normalize_user(&mut user);
    user.validate()?;
    if db.email_exists(&user.email)? {
        return Err(AppError::Conflict(format!(
            "Email {} is already registered",
            user.email
        )));
    }
    let user = db.add_user(&user)?;
    info!("Created user {:?} ({})", user.id, user.login);
    Ok(user)
}

pub fn update<D: UserDb>(db: &D, mut user: User) -> Result<User> {
    let id = user
        .id
        .ok_or_else(|| AppError::Validation("id: is required".to_owned()))?;
    normalize_user(&mut user);
    user.validate()?;
    let user = db.update_user(&user)?;
    info!("Updated user {}", id);
    Ok(user)
}

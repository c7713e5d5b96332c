use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use crate::model::*;
use chrono::NaiveDate;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};
use sled::Transactional;

const FILMS: &[u8] = b"films";
const USERS: &[u8] = b"users";
const USERS_EMAIL: &[u8] = b"users_email";
const GENRE: &[u8] = b"genre";
const MPA_RATING: &[u8] = b"mpa_rating";
const LIKES: &[u8] = b"likes";
const FRIENDSHIP: &[u8] = b"friendship";
const SEQUENCES: &[u8] = b"sequences";

const MPA_RATINGS: [(u64, &str, &str); 5] = [
    (1, "G", "General audiences, all ages admitted"),
    (2, "PG", "Parental guidance suggested"),
    (3, "PG-13", "Parents strongly cautioned, some material may be inappropriate under 13"),
    (4, "R", "Restricted, under 17 requires accompanying adult"),
    (5, "NC-17", "Adults only, no one 17 and under admitted"),
];

const GENRES: [(u64, &str); 6] = [
    (1, "Comedy"),
    (2, "Drama"),
    (3, "Animation"),
    (4, "Thriller"),
    (5, "Documentary"),
    (6, "Action"),
];

// Big-endian so that tree order is id order.
fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> Result<u64> {
    let bytes: [u8; 8] = id
        .as_ref()
        .try_into()
        .map_err(|_| AppError::Corrupted(format!("bad id key of {} bytes", id.as_ref().len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn pair_key(first: u64, second: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&serialize_id(first));
    key[8..].copy_from_slice(&serialize_id(second));
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned, V: AsRef<[u8]>>(data: V) -> Result<T> {
    Ok(bincode::deserialize(data.as_ref())?)
}

type TxResult = ConflictableTransactionResult<(), AppError>;

fn abort<T>(err: impl Into<AppError>) -> ConflictableTransactionResult<T, AppError> {
    Err(ConflictableTransactionError::Abort(err.into()))
}

fn decode_status(data: &[u8]) -> Result<FriendshipStatus> {
    data.first()
        .copied()
        .and_then(FriendshipStatus::from_id)
        .ok_or_else(|| AppError::Corrupted("unknown friendship status".to_owned()))
}

#[derive(Serialize, Deserialize)]
struct UserRow {
    email: String,
    login: String,
    name: String,
    birthday: NaiveDate,
}

impl UserRow {
    fn from_user(user: &User) -> Self {
        UserRow {
            email: user.email.clone(),
            login: user.login.clone(),
            name: user.name.clone().unwrap_or_else(|| user.login.clone()),
            birthday: user.birthday,
        }
    }

    fn into_user(self, id: u64) -> User {
        User {
            id: Some(id),
            email: self.email,
            login: self.login,
            name: Some(self.name),
            birthday: self.birthday,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FilmRow {
    name: String,
    description: String,
    release_date: NaiveDate,
    duration: i32,
    mpa_id: u64,
    genre_ids: Vec<u64>,
}

impl FilmRow {
    fn from_film(film: &Film) -> Result<Self> {
        let mpa_id = film
            .mpa
            .as_ref()
            .map(|mpa| mpa.id)
            .ok_or_else(|| AppError::Validation("mpa: is required".to_owned()))?;
        let mut genre_ids: Vec<u64> = film.genres.iter().map(|g| g.id).collect();
        genre_ids.sort_unstable();
        genre_ids.dedup();
        Ok(FilmRow {
            name: film.name.clone(),
            description: film.description.clone(),
            release_date: film.release_date,
            duration: film.duration,
            mpa_id,
            genre_ids,
        })
    }
}

/// Opens the one store the process runs against.
pub fn open(cfg: &StorageConfig) -> Result<sled::Db> {
    let db = if cfg.temporary {
        info!("Opening temporary database");
        sled::Config::new().temporary(true).open()?
    } else {
        info!("Opening database at {}", cfg.path);
        sled::Config::new().path(&cfg.path).open()?
    };
    db.seed_catalog()?;
    Ok(db)
}

#[cfg(test)]
pub fn temporary() -> sled::Db {
    let db = sled::Config::new().temporary(true).open().unwrap();
    db.seed_catalog().unwrap();
    db
}

/// Per-table counter; ids start at 1 and are never handed out twice, even
/// when the insert that consumed one is aborted.
fn next_id(db: &sled::Db, sequence: &[u8]) -> Result<u64> {
    let sequences = db.open_tree(SEQUENCES)?;
    let next = sequences.update_and_fetch(sequence, |old| {
        let current = old
            .and_then(|v| <[u8; 8]>::try_from(v).ok())
            .map(u64::from_be_bytes)
            .unwrap_or(0);
        Some(serialize_id(current + 1).to_vec())
    })?;
    match next {
        Some(id) => deserialize_id(id),
        None => Err(AppError::Corrupted("sequence vanished".to_owned())),
    }
}

pub trait CatalogDb {
    fn seed_catalog(&self) -> Result<()>;
    fn get_genre(&self, id: u64) -> Result<Option<Genre>>;
    fn get_genres(&self) -> Result<Vec<Genre>>;
    fn get_mpa(&self, id: u64) -> Result<Option<Mpa>>;
    fn get_mpas(&self) -> Result<Vec<Mpa>>;
}

impl CatalogDb for sled::Db {
    fn seed_catalog(&self) -> Result<()> {
        let mpa_rating = self.open_tree(MPA_RATING)?;
        for (id, code, description) in MPA_RATINGS.iter() {
            let key = serialize_id(*id);
            if !mpa_rating.contains_key(key)? {
                let mpa = Mpa {
                    id: *id,
                    name: (*code).to_owned(),
                    description: (*description).to_owned(),
                };
                mpa_rating.insert(key, encode(&mpa)?)?;
            }
        }
        let genre = self.open_tree(GENRE)?;
        for (id, name) in GENRES.iter() {
            let key = serialize_id(*id);
            if !genre.contains_key(key)? {
                let g = Genre {
                    id: *id,
                    name: (*name).to_owned(),
                };
                genre.insert(key, encode(&g)?)?;
            }
        }
        Ok(())
    }

    fn get_genre(&self, id: u64) -> Result<Option<Genre>> {
        let genre = self.open_tree(GENRE)?;
        genre.get(serialize_id(id))?.map(decode).transpose()
    }

    fn get_genres(&self) -> Result<Vec<Genre>> {
        let genre = self.open_tree(GENRE)?;
        genre.iter().values().map(|v| decode(v?)).collect()
    }

    fn get_mpa(&self, id: u64) -> Result<Option<Mpa>> {
        let mpa_rating = self.open_tree(MPA_RATING)?;
        mpa_rating.get(serialize_id(id))?.map(decode).transpose()
    }

    fn get_mpas(&self) -> Result<Vec<Mpa>> {
        let mpa_rating = self.open_tree(MPA_RATING)?;
        mpa_rating.iter().values().map(|v| decode(v?)).collect()
    }
}

pub trait UserDb {
    /// Assigns the id. Fails with `Conflict` when the email is taken.
    fn add_user(&self, user: &User) -> Result<User>;
    /// Fails with `NotFound` for an unknown id and `Conflict` when the new
    /// email belongs to someone else.
    fn update_user(&self, user: &User) -> Result<User>;
    fn get_user(&self, id: u64) -> Result<Option<User>>;
    fn get_users(&self) -> Result<Vec<User>>;
    fn user_exists(&self, id: u64) -> Result<bool>;
    fn email_exists(&self, email: &str) -> Result<bool>;
}

impl UserDb for sled::Db {
    fn add_user(&self, user: &User) -> Result<User> {
        let users = self.open_tree(USERS)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        let id = next_id(self, USERS)?;
        let row = UserRow::from_user(user);
        let data = encode(&row)?;
        (&users, &users_email).transaction(|(users, users_email)| -> TxResult {
            if users_email
                .insert(row.email.as_bytes(), &serialize_id(id)[..])?
                .is_some()
            {
                return abort(AppError::Conflict(format!(
                    "Email {} is already registered",
                    row.email
                )));
            }
            users.insert(&serialize_id(id)[..], data.clone())?;
            Ok(())
        })?;
        Ok(row.into_user(id))
    }

    fn update_user(&self, user: &User) -> Result<User> {
        let id = user
            .id
            .ok_or_else(|| AppError::Validation("id: is required".to_owned()))?;
        let users = self.open_tree(USERS)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        let key = serialize_id(id);
        let row = UserRow::from_user(user);
        let data = encode(&row)?;
        (&users, &users_email).transaction(|(users, users_email)| -> TxResult {
            let old: UserRow = match users.get(&key[..])? {
                Some(old) => match decode(old) {
                    Ok(old) => old,
                    Err(e) => return abort(e),
                },
                None => return abort(AppError::not_found(format!("user {}", id))),
            };
            if old.email != row.email {
                if let Some(owner) = users_email.get(row.email.as_bytes())? {
                    if owner[..] != key[..] {
                        return abort(AppError::Conflict(format!(
                            "Email {} is already registered",
                            row.email
                        )));
                    }
                }
                users_email.remove(old.email.as_bytes())?;
                users_email.insert(row.email.as_bytes(), &key[..])?;
            }
            users.insert(&key[..], data.clone())?;
            Ok(())
        })?;
        Ok(row.into_user(id))
    }

    fn get_user(&self, id: u64) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        users
            .get(serialize_id(id))?
            .map(|d| -> Result<User> { Ok(decode::<UserRow, _>(d)?.into_user(id)) })
            .transpose()
    }

    fn get_users(&self) -> Result<Vec<User>> {
        let users = self.open_tree(USERS)?;
        users
            .iter()
            .map(|entry| -> Result<User> {
                let (key, data) = entry?;
                Ok(decode::<UserRow, _>(data)?.into_user(deserialize_id(key)?))
            })
            .collect()
    }

    fn user_exists(&self, id: u64) -> Result<bool> {
        Ok(self.open_tree(USERS)?.contains_key(serialize_id(id))?)
    }

    fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(self.open_tree(USERS_EMAIL)?.contains_key(email.as_bytes())?)
    }
}

pub trait FilmDb {
    fn add_film(&self, film: &Film) -> Result<Film>;
    /// Fails with `NotFound` for an unknown id.
    fn update_film(&self, film: &Film) -> Result<Film>;
    fn get_film(&self, id: u64) -> Result<Option<Film>>;
    fn get_films(&self) -> Result<Vec<Film>>;
    fn film_exists(&self, id: u64) -> Result<bool>;
}

fn film_from_row<D: CatalogDb>(db: &D, id: u64, row: FilmRow) -> Result<Film> {
    let mpa = db
        .get_mpa(row.mpa_id)?
        .ok_or_else(|| AppError::Corrupted(format!("film {} has unknown mpa {}", id, row.mpa_id)))?;
    let genres = row
        .genre_ids
        .iter()
        .map(|genre_id| {
            db.get_genre(*genre_id)?.ok_or_else(|| {
                AppError::Corrupted(format!("film {} has unknown genre {}", id, genre_id))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Film {
        id: Some(id),
        name: row.name,
        description: row.description,
        release_date: row.release_date,
        duration: row.duration,
        mpa: Some(mpa),
        genres,
    })
}

impl FilmDb for sled::Db {
    fn add_film(&self, film: &Film) -> Result<Film> {
        let films = self.open_tree(FILMS)?;
        let row = FilmRow::from_film(film)?;
        let id = next_id(self, FILMS)?;
        films.insert(serialize_id(id), encode(&row)?)?;
        film_from_row(self, id, row)
    }

    fn update_film(&self, film: &Film) -> Result<Film> {
        let id = film
            .id
            .ok_or_else(|| AppError::Validation("id: is required".to_owned()))?;
        let films = self.open_tree(FILMS)?;
        let row = FilmRow::from_film(film)?;
        let key = serialize_id(id);
        let data = encode(&row)?;
        films.transaction(|films| -> TxResult {
            if films.get(&key[..])?.is_none() {
                return abort(AppError::not_found(format!("film {}", id)));
            }
            films.insert(&key[..], data.clone())?;
            Ok(())
        })?;
        film_from_row(self, id, row)
    }

    fn get_film(&self, id: u64) -> Result<Option<Film>> {
        let films = self.open_tree(FILMS)?;
        match films.get(serialize_id(id))? {
            Some(data) => Ok(Some(film_from_row(self, id, decode(data)?)?)),
            None => Ok(None),
        }
    }

    fn get_films(&self) -> Result<Vec<Film>> {
        let films = self.open_tree(FILMS)?;
        films
            .iter()
            .map(|entry| {
                let (key, data) = entry?;
                film_from_row(self, deserialize_id(key)?, decode(data)?)
            })
            .collect()
    }

    fn film_exists(&self, id: u64) -> Result<bool> {
        Ok(self.open_tree(FILMS)?.contains_key(serialize_id(id))?)
    }
}

pub trait LikeDb {
    /// Fails with `NotFound` when the film or user is missing and `Conflict`
    /// when the like already exists.
    fn add_like(&self, film_id: u64, user_id: u64) -> Result<()>;
    /// Fails with `NotFound` when the film, user or like is missing.
    fn remove_like(&self, film_id: u64, user_id: u64) -> Result<()>;
    fn like_count(&self, film_id: u64) -> Result<usize>;
}

impl LikeDb for sled::Db {
    fn add_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        let films = self.open_tree(FILMS)?;
        let users = self.open_tree(USERS)?;
        let likes = self.open_tree(LIKES)?;
        let key = pair_key(film_id, user_id);
        (&films, &users, &likes).transaction(|(films, users, likes)| -> TxResult {
            if films.get(&serialize_id(film_id)[..])?.is_none() {
                return abort(AppError::not_found(format!("film {}", film_id)));
            }
            if users.get(&serialize_id(user_id)[..])?.is_none() {
                return abort(AppError::not_found(format!("user {}", user_id)));
            }
            if likes.insert(&key[..], Vec::<u8>::new())?.is_some() {
                return abort(AppError::Conflict(format!(
                    "User {} already liked film {}",
                    user_id, film_id
                )));
            }
            Ok(())
        })?;
        Ok(())
    }

    fn remove_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        let films = self.open_tree(FILMS)?;
        let users = self.open_tree(USERS)?;
        let likes = self.open_tree(LIKES)?;
        let key = pair_key(film_id, user_id);
        (&films, &users, &likes).transaction(|(films, users, likes)| -> TxResult {
            if films.get(&serialize_id(film_id)[..])?.is_none() {
                return abort(AppError::not_found(format!("film {}", film_id)));
            }
            if users.get(&serialize_id(user_id)[..])?.is_none() {
                return abort(AppError::not_found(format!("user {}", user_id)));
            }
            if likes.remove(&key[..])?.is_none() {
                return abort(AppError::not_found(format!(
                    "like from user {} on film {}",
                    user_id, film_id
                )));
            }
            Ok(())
        })?;
        Ok(())
    }

    fn like_count(&self, film_id: u64) -> Result<usize> {
        let likes = self.open_tree(LIKES)?;
        let mut count = 0;
        for entry in likes.scan_prefix(serialize_id(film_id)).keys() {
            entry?;
            count += 1;
        }
        Ok(count)
    }
}

pub trait FriendDb {
    /// Inserts a PENDING edge `user_id -> friend_id`. Fails with `NotFound`
    /// when either user is missing and `Conflict` when an edge exists in
    /// either direction.
    fn add_friend_request(&self, user_id: u64, friend_id: u64) -> Result<()>;
    /// Flips the PENDING edge `friend_id -> user_id` to CONFIRMED and writes
    /// the reciprocal CONFIRMED edge. Fails with `Conflict` without a
    /// pending request.
    fn confirm_friend_request(&self, user_id: u64, friend_id: u64) -> Result<()>;
    /// Deletes `user_id -> friend_id` only. Returns whether it existed.
    fn remove_friend(&self, user_id: u64, friend_id: u64) -> Result<bool>;
    /// Outgoing edges of `user_id`, ordered by friend id.
    fn friend_edges(&self, user_id: u64) -> Result<Vec<(u64, FriendshipStatus)>>;
}

impl FriendDb for sled::Db {
    fn add_friend_request(&self, user_id: u64, friend_id: u64) -> Result<()> {
        let users = self.open_tree(USERS)?;
        let friendship = self.open_tree(FRIENDSHIP)?;
        let forward = pair_key(user_id, friend_id);
        let reverse = pair_key(friend_id, user_id);
        (&users, &friendship).transaction(|(users, friendship)| -> TxResult {
            for id in [user_id, friend_id].iter() {
                if users.get(&serialize_id(*id)[..])?.is_none() {
                    return abort(AppError::not_found(format!("user {}", id)));
                }
            }
            let existing = friendship.get(&forward[..])?;
            let reverse_existing = friendship.get(&reverse[..])?;
            if existing.is_some() || reverse_existing.is_some() {
                let mut message = format!(
                    "Friendship relation already exists: {} and {}",
                    user_id, friend_id
                );
                if let Some(status) = existing.as_deref().and_then(|s| decode_status(s).ok()) {
                    message.push_str(&format!(" (status: {})", status.name()));
                }
                if let Some(status) = reverse_existing
                    .as_deref()
                    .and_then(|s| decode_status(s).ok())
                {
                    message.push_str(&format!(" (reverse status: {})", status.name()));
                }
                return abort(AppError::Conflict(message));
            }
            friendship.insert(&forward[..], vec![FriendshipStatus::Pending.id()])?;
            Ok(())
        })?;
        Ok(())
    }

    fn confirm_friend_request(&self, user_id: u64, friend_id: u64) -> Result<()> {
        let users = self.open_tree(USERS)?;
        let friendship = self.open_tree(FRIENDSHIP)?;
        let request = pair_key(friend_id, user_id);
        let reciprocal = pair_key(user_id, friend_id);
        (&users, &friendship).transaction(|(users, friendship)| -> TxResult {
            for id in [user_id, friend_id].iter() {
                if users.get(&serialize_id(*id)[..])?.is_none() {
                    return abort(AppError::not_found(format!("user {}", id)));
                }
            }
            let pending = match friendship.get(&request[..])? {
                Some(status) => match decode_status(&status) {
                    Ok(status) => status == FriendshipStatus::Pending,
                    Err(e) => return abort(e),
                },
                None => false,
            };
            if !pending {
                return abort(AppError::Conflict(format!(
                    "No pending friendship request from {} to {}",
                    friend_id, user_id
                )));
            }
            let confirmed = FriendshipStatus::Confirmed.id();
            friendship.insert(&request[..], vec![confirmed])?;
            friendship.insert(&reciprocal[..], vec![confirmed])?;
            Ok(())
        })?;
        Ok(())
    }

    fn remove_friend(&self, user_id: u64, friend_id: u64) -> Result<bool> {
        let friendship = self.open_tree(FRIENDSHIP)?;
        Ok(friendship.remove(pair_key(user_id, friend_id))?.is_some())
    }

    fn friend_edges(&self, user_id: u64) -> Result<Vec<(u64, FriendshipStatus)>> {
        let friendship = self.open_tree(FRIENDSHIP)?;
        friendship
            .scan_prefix(serialize_id(user_id))
            .map(|entry| -> Result<(u64, FriendshipStatus)> {
                let (key, status) = entry?;
                Ok((
                    deserialize_id(key.get(8..).unwrap_or_default())?,
                    decode_status(&status)?,
                ))
            })
            .collect()
    }
}

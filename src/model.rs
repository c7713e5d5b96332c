use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Serialize, Deserialize, Validate, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: Option<u64>,
    #[validate(custom(function = "crate::validation::email_with_at"))]
    pub email: String,
    #[validate(custom(function = "crate::validation::login_without_whitespace"))]
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[validate(custom(function = "crate::validation::not_in_future"))]
    pub birthday: NaiveDate,
}

#[derive(Serialize, Deserialize, Validate, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    #[serde(default)]
    pub id: Option<u64>,
    #[validate(custom(function = "crate::validation::not_blank"))]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(max = 200, message = "must not exceed 200 characters"))]
    pub description: String,
    #[validate(custom(function = "crate::validation::released_after_cinema_birthday"))]
    pub release_date: NaiveDate,
    /// Minutes.
    #[validate(range(min = 1, message = "must be positive"))]
    pub duration: i32,
    #[validate(required(message = "is required"))]
    pub mpa: Option<Mpa>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<Genre>,
}

/// MPA age rating. `name` carries the rating code ("PG-13").
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Mpa {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
impl Mpa {
    /// A bare id reference, as clients send it.
    pub fn reference(id: u64) -> Self {
        Mpa {
            id,
            name: String::new(),
            description: String::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
impl Genre {
    pub fn reference(id: u64) -> Self {
        Genre {
            id,
            name: String::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendshipStatus {
    Pending,
    Confirmed,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FriendshipStatusInfo {
    pub id: u8,
    pub name: &'static str,
    pub description: &'static str,
}

impl FriendshipStatus {
    pub const ALL: [FriendshipStatus; 2] = [FriendshipStatus::Pending, FriendshipStatus::Confirmed];

    pub fn id(self) -> u8 {
        match self {
            FriendshipStatus::Pending => 1,
            FriendshipStatus::Confirmed => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "PENDING",
            FriendshipStatus::Confirmed => "CONFIRMED",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "Request is awaiting confirmation",
            FriendshipStatus::Confirmed => "Friendship confirmed",
        }
    }

    pub fn info(self) -> FriendshipStatusInfo {
        FriendshipStatusInfo {
            id: self.id(),
            name: self.name(),
            description: self.description(),
        }
    }
}

/// A user seen through an outgoing friendship edge.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Friend {
    #[serde(flatten)]
    pub user: User,
    pub status: FriendshipStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lookup() {
        for status in FriendshipStatus::ALL.iter().copied() {
            assert_eq!(FriendshipStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(FriendshipStatus::from_id(9), None);
        assert_eq!(FriendshipStatus::Confirmed.info().name, "CONFIRMED");
    }

    #[test]
    fn film_json_shape() {
        let film: Film = serde_json::from_str(
            r#"{"name":"nisi eiusmod","description":"adipisicing","releaseDate":"1967-03-25",
                "duration":100,"mpa":{"id":1},"genres":[{"id":2}]}"#,
        )
        .unwrap();
        assert_eq!(film.id, None);
        assert_eq!(film.mpa, Some(Mpa::reference(1)));
        assert_eq!(film.genres, vec![Genre::reference(2)]);
        let json = serde_json::to_value(&film).unwrap();
        assert_eq!(json["releaseDate"], "1967-03-25");
    }

    #[test]
    fn null_description_and_genres_are_empty() {
        let film: Film = serde_json::from_str(
            r#"{"name":"n","description":null,"releaseDate":"2000-01-01",
                "duration":1,"mpa":{"id":1},"genres":null}"#,
        )
        .unwrap();
        assert_eq!(film.description, "");
        assert!(film.genres.is_empty());
    }

    #[test]
    fn friend_flattens_user() {
        let friend = Friend {
            user: User {
                id: Some(2),
                email: "friend@common.ru".to_owned(),
                login: "friend".to_owned(),
                name: Some("friend adipisicing".to_owned()),
                birthday: NaiveDate::from_ymd_opt(1976, 8, 20).unwrap(),
            },
            status: FriendshipStatus::Confirmed,
        };
        let json = serde_json::to_value(&friend).unwrap();
        assert_eq!(json["id"], 2);
        assert_eq!(json["status"], "CONFIRMED");
    }
}

use crate::database::{CatalogDb, FilmDb, LikeDb};
use crate::error::{AppError, Result};
use crate::model::{Film, Genre, Mpa};
use log::info;
use std::cmp::Reverse;
use validator::Validate;

pub const DEFAULT_POPULAR_COUNT: usize = 10;

pub fn all<D: FilmDb>(db: &D) -> Result<Vec<Film>> {
    db.get_films()
}

pub fn find<D: FilmDb>(db: &D, id: u64) -> Result<Film> {
    db.get_film(id)?
        .ok_or_else(|| AppError::not_found(format!("film {}", id)))
}

fn check_references<D: CatalogDb>(db: &D, film: &Film) -> Result<()> {
    if let Some(mpa) = &film.mpa {
        mpa_rating(db, mpa.id)?;
    }
    for g in &film.genres {
        genre(db, g.id)?;
    }
    Ok(())
}

pub fn create<D: FilmDb + CatalogDb>(db: &D, film: Film) -> Result<Film> {
    film.validate()?;
    check_references(db, &film)?;
    let film = db.add_film(&film)?;
    info!("Created film {:?} ({})", film.id, film.name);
    Ok(film)
}

pub fn update<D: FilmDb + CatalogDb>(db: &D, film: Film) -> Result<Film> {
    let id = film
        .id
        .ok_or_else(|| AppError::Validation("id: is required".to_owned()))?;
    film.validate()?;
    if !db.film_exists(id)? {
        return Err(AppError::not_found(format!("film {}", id)));
    }
    check_references(db, &film)?;
    let film = db.update_film(&film)?;
    info!("Updated film {}", id);
    Ok(film)
}

pub fn like<D: LikeDb>(db: &D, film_id: u64, user_id: u64) -> Result<()> {
    db.add_like(film_id, user_id)?;
    info!("User {} liked film {}", user_id, film_id);
    Ok(())
}

pub fn unlike<D: LikeDb>(db: &D, film_id: u64, user_id: u64) -> Result<()> {
    db.remove_like(film_id, user_id)?;
    info!("User {} unliked film {}", user_id, film_id);
    Ok(())
}

/// Most liked first; equal counts fall back to ascending id.
pub fn rank_by_likes(mut films: Vec<(Film, usize)>, count: usize) -> Vec<Film> {
    films.sort_by_key(|(film, likes)| (Reverse(*likes), film.id));
    films.into_iter().take(count).map(|(film, _)| film).collect()
}

pub fn popular<D: FilmDb + LikeDb>(db: &D, count: usize) -> Result<Vec<Film>> {
    let counted = db
        .get_films()?
        .into_iter()
        .map(|film| -> Result<(Film, usize)> {
            let likes = match film.id {
                Some(id) => db.like_count(id)?,
                None => 0,
            };
            Ok((film, likes))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(rank_by_likes(counted, count))
}

pub fn genres<D: CatalogDb>(db: &D) -> Result<Vec<Genre>> {
    db.get_genres()
}

pub fn genre<D: CatalogDb>(db: &D, id: u64) -> Result<Genre> {
    db.get_genre(id)?
        .ok_or_else(|| AppError::not_found(format!("genre {}", id)))
}

pub fn mpa_ratings<D: CatalogDb>(db: &D) -> Result<Vec<Mpa>> {
    db.get_mpas()
}

pub fn mpa_rating<D: CatalogDb>(db: &D, id: u64) -> Result<Mpa> {
    db.get_mpa(id)?
        .ok_or_else(|| AppError::not_found(format!("mpa rating {}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{self, UserDb};
    use crate::model::User;
    use crate::validation::cinema_birthday;
    use chrono::NaiveDate;

    fn film(name: &str) -> Film {
        Film {
            id: None,
            name: name.to_owned(),
            description: "adipisicing".to_owned(),
            release_date: NaiveDate::from_ymd_opt(1967, 3, 25).unwrap(),
            duration: 100,
            mpa: Some(Mpa::reference(1)),
            genres: Vec::new(),
        }
    }

    fn users(db: &sled::Db, n: usize) -> Vec<u64> {
        (0..n)
            .map(|i| {
                let user = User {
                    id: None,
                    email: format!("fan{}@mail.ru", i),
                    login: format!("fan{}", i),
                    name: None,
                    birthday: NaiveDate::from_ymd_opt(1990, 5, 5).unwrap(),
                };
                db.add_user(&user).unwrap().id.unwrap()
            })
            .collect()
    }

    #[test]
    fn release_date_boundary() {
        let db = database::temporary();
        let mut f = film("L'Arrivée d'un train");
        f.release_date = cinema_birthday();
        assert!(create(&db, f.clone()).is_ok());
        f.release_date = NaiveDate::from_ymd_opt(1895, 12, 27).unwrap();
        assert!(matches!(create(&db, f), Err(AppError::Validation(_))));
        assert_eq!(all(&db).unwrap().len(), 1);
    }

    #[test]
    fn unknown_references_are_not_found() {
        let db = database::temporary();
        let mut f = film("Nowhere");
        f.mpa = Some(Mpa::reference(99));
        assert!(matches!(create(&db, f.clone()), Err(AppError::NotFound(_))));
        f.mpa = Some(Mpa::reference(1));
        f.genres = vec![Genre::reference(99)];
        assert!(matches!(create(&db, f), Err(AppError::NotFound(_))));
    }

    #[test]
    fn update_checks_existence() {
        let db = database::temporary();
        let mut f = create(&db, film("Before")).unwrap();
        f.name = "After".to_owned();
        f.genres = vec![Genre::reference(2)];
        let updated = update(&db, f.clone()).unwrap();
        assert_eq!(updated.name, "After");
        assert_eq!(updated.genres[0].name, "Drama");

        f.id = Some(12345);
        assert!(matches!(update(&db, f), Err(AppError::NotFound(_))));
    }

    #[test]
    fn like_twice_then_again_after_unlike() {
        let db = database::temporary();
        let f = create(&db, film("Liked")).unwrap().id.unwrap();
        let u = users(&db, 1)[0];
        like(&db, f, u).unwrap();
        assert!(matches!(like(&db, f, u), Err(AppError::Conflict(_))));
        unlike(&db, f, u).unwrap();
        like(&db, f, u).unwrap();
    }

    #[test]
    fn unlike_without_like_is_not_found() {
        let db = database::temporary();
        let f = create(&db, film("Unliked")).unwrap().id.unwrap();
        let u = users(&db, 1)[0];
        assert!(matches!(unlike(&db, f, u), Err(AppError::NotFound(_))));
        assert!(matches!(unlike(&db, f, 777), Err(AppError::NotFound(_))));
    }

    #[test]
    fn popular_orders_by_likes_then_id() {
        let db = database::temporary();
        let fans = users(&db, 5);
        let ids: Vec<u64> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| create(&db, film(name)).unwrap().id.unwrap())
            .collect();
        // likes counts: d=5, b=5, c=2, a=1
        for (film_id, likes) in [(ids[3], 5), (ids[1], 5), (ids[2], 2), (ids[0], 1)].iter() {
            for fan in fans.iter().take(*likes) {
                like(&db, *film_id, *fan).unwrap();
            }
        }
        let top: Vec<_> = popular(&db, 3)
            .unwrap()
            .into_iter()
            .filter_map(|f| f.id)
            .collect();
        assert_eq!(top, vec![ids[1], ids[3], ids[2]]);
        assert_eq!(popular(&db, DEFAULT_POPULAR_COUNT).unwrap().len(), 4);
        assert!(popular(&db, 0).unwrap().is_empty());
    }

    #[test]
    fn films_without_likes_still_rank() {
        let ranked = rank_by_likes(
            vec![
                (Film { id: Some(2), ..film("two") }, 0),
                (Film { id: Some(1), ..film("one") }, 0),
            ],
            10,
        );
        assert_eq!(ranked.iter().map(|f| f.id).collect::<Vec<_>>(), vec![Some(1), Some(2)]);
    }

    #[test]
    fn catalog_lookups() {
        let db = database::temporary();
        assert_eq!(genres(&db).unwrap().len(), 6);
        assert_eq!(mpa_ratings(&db).unwrap()[0].name, "G");
        assert_eq!(mpa_rating(&db, 5).unwrap().name, "NC-17");
        assert!(matches!(genre(&db, 0), Err(AppError::NotFound(_))));
    }
}

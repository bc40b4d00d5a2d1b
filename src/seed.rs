//! Demo data: reference rows, demo accounts, genres and synthetic books.

use crate::catalog::{store_cover, CoverUpload};
use crate::error::LibraryError;
use crate::orm::{book_genres, books, genres, review_statuses, roles, users};
use crate::permission::Role;
use crate::reviews::ReviewStatus;
use crate::storage::StorageBackend;
use crate::user::{insert_new_user, NewUser};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr, TransactionTrait};
use std::time::Duration;

/// Genres every catalog starts with.
pub const GENRES: [&str; 8] = [
    "Fantasy",
    "Science Fiction",
    "Mystery",
    "History",
    "Business",
    "Self-Help",
    "Adventure",
    "Poetry",
];

struct DemoAccount {
    username: &'static str,
    password: &'static str,
    last_name: &'static str,
    first_name: &'static str,
    role: Role,
}

const DEMO_ACCOUNTS: [DemoAccount; 3] = [
    DemoAccount {
        username: "admin",
        password: "adminpass",
        last_name: "Admin",
        first_name: "Super",
        role: Role::Administrator,
    },
    DemoAccount {
        username: "mod",
        password: "modpass",
        last_name: "Moderator",
        first_name: "Mighty",
        role: Role::Moderator,
    },
    DemoAccount {
        username: "user",
        password: "userpass",
        last_name: "User",
        first_name: "Usual",
        role: Role::User,
    },
];

const TITLE_WORDS: [&str; 24] = [
    "Silent", "River", "Empire", "Glass", "Winter", "Garden", "Forgotten", "Iron", "Letters",
    "Storm", "Northern", "Lantern", "Hidden", "Crown", "Salt", "Orchard", "Distant", "Harbor",
    "Paper", "Shadow", "Golden", "Mountain", "Last", "Clockwork",
];

const FIRST_NAMES: [&str; 12] = [
    "Anna", "Boris", "Clara", "Daniel", "Elena", "Felix", "Grace", "Henry", "Irene", "Jonas",
    "Katya", "Leon",
];

const LAST_NAMES: [&str; 12] = [
    "Abbott", "Baranov", "Carver", "Dalton", "Egorova", "Fischer", "Gould", "Hale", "Ivanova",
    "Jensen", "Keller", "Lindqvist",
];

const PUBLISHERS: [&str; 8] = [
    "Northwind Press",
    "Bluebell Books",
    "Ashford & Lane",
    "Meridian House",
    "Copperleaf Publishing",
    "Old Mill Editions",
    "Starling Media",
    "Quayside Books",
];

const SENTENCES: [&str; 12] = [
    "The town had not seen a stranger in years.",
    "Nobody expected the letter to arrive on a Sunday.",
    "Every map in the library was missing the same island.",
    "She kept the key long after the door was gone.",
    "The expedition left at dawn and returned with more questions than answers.",
    "Old debts have a way of surfacing at the worst moment.",
    "A quiet bookseller notices what everyone else ignores.",
    "The winter lasted far longer than the almanac promised.",
    "His father's notebooks held a cipher no one could read.",
    "Two rival families share a single crumbling house.",
    "What began as a wager turned into a lifelong obsession.",
    "The final chapter was written by someone else entirely.",
];

/// Startup seed. Every step is skipped when its rows already exist, and
/// books are only generated into an empty catalog.
pub async fn seed<R>(db: &DatabaseConnection, rng: &mut R, book_count: usize) -> Result<(), DbErr>
where
    R: Rng + ?Sized,
{
    seed_reference_data(db).await?;
    seed_demo_accounts(db).await?;

    let existing = books::Entity::find().count(db).await?;
    if existing == 0 {
        let created = generate_books(db, rng, book_count).await?;
        log::info!("seed: generated {} books", created);
    } else {
        log::info!("seed: {} books present, generation skipped", existing);
    }

    Ok(())
}

/// Roles, review statuses and genres.
pub async fn seed_reference_data<C>(db: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    for role in Role::ALL {
        let found = roles::Entity::find()
            .filter(roles::Column::Name.eq(role.name()))
            .one(db)
            .await?;
        if found.is_none() {
            roles::ActiveModel {
                name: Set(role.name().to_owned()),
                description: Set(role.description().to_owned()),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }

    for status in ReviewStatus::ALL {
        let found = review_statuses::Entity::find()
            .filter(review_statuses::Column::Name.eq(status.name()))
            .one(db)
            .await?;
        if found.is_none() {
            review_statuses::ActiveModel {
                name: Set(status.name().to_owned()),
                description: Set(status.description().to_owned()),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }

    for name in GENRES {
        let found = genres::Entity::find()
            .filter(genres::Column::Name.eq(name))
            .one(db)
            .await?;
        if found.is_none() {
            genres::ActiveModel {
                name: Set(name.to_owned()),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }

    Ok(())
}

async fn seed_demo_accounts<C>(db: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    for account in DEMO_ACCOUNTS.iter() {
        let found = users::Entity::find()
            .filter(users::Column::Username.eq(account.username))
            .one(db)
            .await?;
        if found.is_some() {
            continue;
        }

        insert_new_user(
            db,
            NewUser {
                username: account.username,
                password: account.password,
                last_name: account.last_name,
                first_name: account.first_name,
                middle_name: None,
                role: account.role,
            },
        )
        .await?;
        log::info!("seed: created demo account {}", account.username);
    }
    Ok(())
}

fn pick<'a, R>(rng: &mut R, words: &'a [&'a str]) -> &'a str
where
    R: Rng + ?Sized,
{
    words.choose(rng).copied().unwrap_or_default()
}

fn fake_title<R: Rng + ?Sized>(rng: &mut R) -> String {
    let count = rng.gen_range(2..=4);
    TITLE_WORDS
        .choose_multiple(rng, count)
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn fake_description<R: Rng + ?Sized>(rng: &mut R) -> String {
    let count = rng.gen_range(3..=6);
    SENTENCES
        .choose_multiple(rng, count)
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn fake_author<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{} {}", pick(rng, &FIRST_NAMES), pick(rng, &LAST_NAMES))
}

/// Inserts `count` synthetic books, each with one to three random genres.
/// Returns the number of books created.
pub async fn generate_books<R>(db: &DatabaseConnection, rng: &mut R, count: usize) -> Result<usize, DbErr>
where
    R: Rng + ?Sized,
{
    let all_genres = genres::Entity::find()
        .order_by_asc(genres::Column::Id)
        .all(db)
        .await?;

    let txn = db.begin().await?;
    for _ in 0..count {
        let book = books::ActiveModel {
            title: Set(fake_title(rng)),
            description: Set(fake_description(rng)),
            year: Set(rng.gen_range(1950..=2024)),
            publisher: Set(pick(rng, &PUBLISHERS).to_owned()),
            author: Set(fake_author(rng)),
            pages: Set(rng.gen_range(120..=700)),
            cover_id: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let genre_count = rng.gen_range(1..=3).min(all_genres.len());
        for genre in all_genres.choose_multiple(rng, genre_count) {
            book_genres::ActiveModel {
                book_id: Set(book.id),
                genre_id: Set(genre.id),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }
    txn.commit().await?;

    Ok(count)
}

/// Somewhere to get placeholder cover images from.
#[async_trait]
pub trait CoverSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<CoverUpload>;
}

/// Fetches random images from a templated URL such as picsum.photos.
pub struct PicsumSource {
    client: reqwest::Client,
    /// `{seed}` is replaced by a fresh uuid on every fetch.
    url_template: String,
}

impl PicsumSource {
    pub fn new(url_template: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url_template: url_template.to_owned(),
        })
    }

    fn next_url(&self) -> String {
        self.url_template
            .replace("{seed}", &uuid::Uuid::new_v4().to_string())
    }
}

fn extension_for(mimetype: &str) -> &'static str {
    match mimetype {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

#[async_trait]
impl CoverSource for PicsumSource {
    async fn fetch(&self) -> anyhow::Result<CoverUpload> {
        let url = self.next_url();
        log::debug!("fetching cover from {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let mimetype = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_owned())
            .unwrap_or_else(|| "image/jpeg".to_owned());
        let data = response.bytes().await?.to_vec();

        Ok(CoverUpload {
            filename: Some(format!("cover.{}", extension_for(&mimetype))),
            mimetype: Some(mimetype),
            data,
        })
    }
}

/// Gives every cover-less book an image from `source`. Identical images are
/// shared instead of stored twice. Returns (new covers, books linked to an
/// existing cover). Failed fetches are logged and skipped.
pub async fn fill_covers(
    db: &DatabaseConnection,
    storage: &dyn StorageBackend,
    source: &dyn CoverSource,
) -> Result<(usize, usize), LibraryError> {
    let missing = books::Entity::find()
        .filter(books::Column::CoverId.is_null())
        .order_by_asc(books::Column::Id)
        .all(db)
        .await?;

    let (mut created, mut linked) = (0, 0);
    for book in missing {
        let upload = match source.fetch().await {
            Ok(upload) if !upload.data.is_empty() => upload,
            Ok(_) => {
                log::warn!("fill_covers: empty image for book {}", book.id);
                continue;
            }
            Err(e) => {
                log::warn!("fill_covers: fetch failed for book {}: {}", book.id, e);
                continue;
            }
        };

        let txn = db.begin().await?;
        let (cover, is_new) = store_cover(&txn, storage, upload).await?;
        let book_id = book.id;
        let mut active: books::ActiveModel = book.into();
        active.cover_id = Set(Some(cover.id));
        active.update(&txn).await?;
        txn.commit().await?;

        if is_new {
            created += 1;
        } else {
            linked += 1;
        }
        log::debug!("fill_covers: book {} -> cover {}", book_id, cover.id);
    }

    log::info!("fill_covers: {} new, {} linked to existing", created, linked);
    Ok((created, linked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_fake_text_is_deterministic() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        assert_eq!(fake_title(&mut a), fake_title(&mut b));
        assert_eq!(fake_author(&mut a), fake_author(&mut b));
        assert_eq!(fake_description(&mut a), fake_description(&mut b));
    }

    #[test]
    fn test_fake_title_word_count() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let words = fake_title(&mut rng).split(' ').count();
            assert!((2..=4).contains(&words));
        }
    }

    #[test]
    fn test_picsum_url_gets_fresh_seed() {
        let source = PicsumSource::new("https://picsum.photos/seed/{seed}/300/450")
            .expect("client builds");
        let a = source.next_url();
        let b = source.next_url();
        assert!(a.starts_with("https://picsum.photos/seed/"));
        assert!(!a.contains("{seed}"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/octet-stream"), "jpg");
    }
}

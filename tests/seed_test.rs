//! Seeding and cover back-fill tests.

mod common;

use async_trait::async_trait;
use bookshelf::catalog::CoverUpload;
use bookshelf::orm::{book_genres, books, covers, genres, review_statuses, roles, users};
use bookshelf::permission::Role;
use bookshelf::seed::{self, CoverSource};
use bookshelf::user::{self, LoginResultStatus};
use common::database::{count, setup_test_database};
use common::fixtures::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sea_orm::{entity::*, query::*, DatabaseConnection};

async fn fresh_database() -> DatabaseConnection {
    let db = bookshelf::db::init_db("sqlite::memory:")
        .await
        .expect("Failed to open database");
    bookshelf::db::create_schema(&db)
        .await
        .expect("Failed to create schema");
    db
}

async fn titles(db: &DatabaseConnection) -> Vec<String> {
    books::Entity::find()
        .order_by_asc(books::Column::Id)
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.title)
        .collect()
}

#[actix_rt::test]
async fn test_seed_is_idempotent() {
    let db = fresh_database().await;
    let mut rng = StdRng::seed_from_u64(1);

    seed::seed(&db, &mut rng, 10).await.expect("first seed failed");
    seed::seed(&db, &mut rng, 10).await.expect("second seed failed");

    assert_eq!(count::<roles::Entity>(&db).await, 3);
    assert_eq!(count::<review_statuses::Entity>(&db).await, 3);
    assert_eq!(count::<users::Entity>(&db).await, 3);
    assert_eq!(count::<genres::Entity>(&db).await, seed::GENRES.len());
    assert_eq!(count::<books::Entity>(&db).await, 10);
}

#[actix_rt::test]
async fn test_same_rng_seed_generates_same_catalog() {
    let first = fresh_database().await;
    let second = fresh_database().await;

    seed::seed(&first, &mut StdRng::seed_from_u64(42), 5)
        .await
        .unwrap();
    seed::seed(&second, &mut StdRng::seed_from_u64(42), 5)
        .await
        .unwrap();

    assert_eq!(titles(&first).await, titles(&second).await);
}

#[actix_rt::test]
async fn test_generated_books_are_within_bounds() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let mut rng = StdRng::seed_from_u64(9);

    let created = seed::generate_books(&db, &mut rng, 25).await.unwrap();
    assert_eq!(created, 25);

    for book in books::Entity::find().all(&db).await.unwrap() {
        assert!((1950..=2024).contains(&book.year), "year {}", book.year);
        assert!((120..=700).contains(&book.pages), "pages {}", book.pages);
        assert!(book.cover_id.is_none());
        assert!(!book.title.is_empty());

        let genre_count = book_genres::Entity::find()
            .filter(book_genres::Column::BookId.eq(book.id))
            .count(&db)
            .await
            .unwrap();
        assert!((1..=3).contains(&genre_count), "genres {}", genre_count);
    }
}

#[actix_rt::test]
async fn test_demo_accounts_can_sign_in() {
    let db = fresh_database().await;
    seed::seed(&db, &mut StdRng::seed_from_u64(3), 0).await.unwrap();

    for (name, password, role) in [
        ("admin", "adminpass", Role::Administrator),
        ("mod", "modpass", Role::Moderator),
        ("user", "userpass", Role::User),
    ] {
        match user::login(&db, name, password).await.unwrap() {
            LoginResultStatus::Success(profile) => assert_eq!(profile.role, role),
            _ => panic!("demo account {} cannot sign in", name),
        }
    }

    assert!(matches!(
        user::login(&db, "admin", "wrong").await.unwrap(),
        LoginResultStatus::BadPassword
    ));
}

struct SameImage;

#[async_trait]
impl CoverSource for SameImage {
    async fn fetch(&self) -> anyhow::Result<CoverUpload> {
        Ok(png_upload(PNG_PIXEL))
    }
}

struct Offline;

#[async_trait]
impl CoverSource for Offline {
    async fn fetch(&self) -> anyhow::Result<CoverUpload> {
        anyhow::bail!("network unreachable")
    }
}

#[actix_rt::test]
async fn test_fill_covers_shares_identical_images() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let (dir, storage) = test_storage();
    for title in ["One", "Two", "Three"] {
        create_test_book(&db, title, 2000).await.unwrap();
    }

    let (created, linked) = seed::fill_covers(&db, &storage, &SameImage).await.unwrap();
    assert_eq!((created, linked), (1, 2));
    assert_eq!(count::<covers::Entity>(&db).await, 1);
    assert_eq!(stored_files(&dir), 1);

    let uncovered = books::Entity::find()
        .filter(books::Column::CoverId.is_null())
        .count(&db)
        .await
        .unwrap();
    assert_eq!(uncovered, 0);

    // Nothing left to fill.
    let again = seed::fill_covers(&db, &storage, &SameImage).await.unwrap();
    assert_eq!(again, (0, 0));
}

#[actix_rt::test]
async fn test_fill_covers_skips_failed_fetches() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let (dir, storage) = test_storage();
    create_test_book(&db, "Bare", 2000).await.unwrap();

    let result = seed::fill_covers(&db, &storage, &Offline).await.unwrap();
    assert_eq!(result, (0, 0));
    assert_eq!(count::<covers::Entity>(&db).await, 0);
    assert_eq!(stored_files(&dir), 0);
}

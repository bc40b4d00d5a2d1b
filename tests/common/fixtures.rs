//! Test fixtures for creating test data
#![allow(dead_code)]
#![allow(clippy::needless_update)]

use bookshelf::catalog::{BookInput, CoverUpload};
use bookshelf::orm::{book_genres, books, genres, reviews};
use bookshelf::permission::Role;
use bookshelf::reviews::{status_id, ReviewStatus};
use bookshelf::storage::LocalStorage;
use bookshelf::user::{insert_new_user, NewUser, Profile};
use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::{entity::*, query::*, ActiveValue::Set, DatabaseConnection, DbErr};
use tempfile::TempDir;

/// Smallest valid PNG: 1x1 transparent pixel.
pub const PNG_PIXEL: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Create a user with a known password and role.
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    role: Role,
) -> Result<Profile, DbErr> {
    let user = insert_new_user(
        db,
        NewUser {
            username,
            password,
            last_name: "Tester",
            first_name: username,
            middle_name: None,
            role,
        },
    )
    .await?;

    Profile::get_by_id(db, user.id)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("profile {}", user.id)))
}

/// Upload directory that disappears with the returned guard.
pub fn test_storage() -> (TempDir, LocalStorage) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let storage = LocalStorage::new(dir.path().to_path_buf()).expect("Failed to init storage");
    (dir, storage)
}

/// Number of files in the upload directory.
pub fn stored_files(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path())
        .expect("Failed to read upload dir")
        .count()
}

pub fn png_upload(data: &[u8]) -> CoverUpload {
    CoverUpload {
        data: data.to_vec(),
        filename: Some("cover.PNG".to_owned()),
        mimetype: Some("image/png".to_owned()),
    }
}

/// Ids of the first `n` genres by id.
pub async fn genre_ids(db: &DatabaseConnection, n: usize) -> Vec<i32> {
    genres::Entity::find()
        .order_by_asc(genres::Column::Id)
        .all(db)
        .await
        .expect("Failed to load genres")
        .into_iter()
        .take(n)
        .map(|g| g.id)
        .collect()
}

/// A valid book form.
pub async fn book_input(db: &DatabaseConnection, title: &str) -> BookInput {
    BookInput {
        title: title.to_owned(),
        description: "A *gripping* tale.".to_owned(),
        year: Some(2001),
        publisher: "Test Press".to_owned(),
        author: "Jane Doe".to_owned(),
        pages: Some(320),
        genre_ids: genre_ids(db, 1).await,
    }
}

/// Insert a book directly, bypassing validation.
pub async fn create_test_book(
    db: &DatabaseConnection,
    title: &str,
    year: i32,
) -> Result<books::Model, DbErr> {
    let book = books::ActiveModel {
        title: Set(title.to_owned()),
        description: Set("Description".to_owned()),
        year: Set(year),
        publisher: Set("Test Press".to_owned()),
        author: Set("Jane Doe".to_owned()),
        pages: Set(100),
        cover_id: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    if let Some(genre_id) = genre_ids(db, 1).await.first() {
        book_genres::ActiveModel {
            book_id: Set(book.id),
            genre_id: Set(*genre_id),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(book)
}

/// Insert a review in any status. `age_minutes` pushes the timestamp into the past.
pub async fn create_test_review(
    db: &DatabaseConnection,
    book_id: i32,
    user_id: i32,
    rating: i32,
    status: ReviewStatus,
    age_minutes: i64,
) -> Result<reviews::Model, DbErr> {
    let created_at: NaiveDateTime = Utc::now().naive_utc() - Duration::minutes(age_minutes);
    reviews::ActiveModel {
        book_id: Set(book_id),
        user_id: Set(user_id),
        rating: Set(rating),
        text: Set(format!("Rated {}", rating)),
        created_at: Set(created_at),
        status_id: Set(status_id(db, status).await?),
        ..Default::default()
    }
    .insert(db)
    .await
}

//! Review store integration tests: submission, moderation and deletion.

mod common;

use bookshelf::error::LibraryError;
use bookshelf::orm::reviews as review_rows;
use bookshelf::permission::Role;
use bookshelf::reviews::{self, ReviewInput, ReviewStatus};
use common::database::{count, setup_test_database};
use common::fixtures::*;
use sea_orm::EntityTrait;

fn input(rating: i32, text: &str) -> ReviewInput {
    ReviewInput {
        rating: Some(rating),
        text: text.to_owned(),
    }
}

#[actix_rt::test]
async fn test_submitted_review_starts_pending() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let book = create_test_book(&db, "Pending", 2000).await.unwrap();
    let reader = create_test_user(&db, "reader", "password123", Role::User)
        .await
        .unwrap();

    let review = reviews::submit_review(&db, book.id, &reader, &input(4, "**Great** read"))
        .await
        .expect("Failed to submit review");

    let view = reviews::get_review(&db, review.id).await.unwrap();
    assert_eq!(view.status, ReviewStatus::Pending);
    assert_eq!(view.status_description(), "Pending review");
    assert_eq!(view.username, "reader");
    assert_eq!(view.book_title, "Pending");
    assert!(view.text_html().starts_with("<p><strong>Great</strong> read</p>"));

    // Pending reviews do not count toward the rating.
    assert_eq!(reviews::average_rating(&db, book.id).await.unwrap(), None);
}

#[actix_rt::test]
async fn test_second_review_for_same_book_is_rejected() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let book = create_test_book(&db, "Once", 2000).await.unwrap();
    let reader = create_test_user(&db, "reader", "password123", Role::User)
        .await
        .unwrap();

    reviews::submit_review(&db, book.id, &reader, &input(3, "First"))
        .await
        .unwrap();
    let err = reviews::submit_review(&db, book.id, &reader, &input(5, "Second"))
        .await
        .unwrap_err();

    assert!(matches!(err, LibraryError::Duplicate));
    assert_eq!(count::<review_rows::Entity>(&db).await, 1);
}

#[actix_rt::test]
async fn test_submit_review_validates_and_checks_book() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let book = create_test_book(&db, "Strict", 2000).await.unwrap();
    let reader = create_test_user(&db, "reader", "password123", Role::User)
        .await
        .unwrap();

    let err = reviews::submit_review(&db, book.id, &reader, &input(6, ""))
        .await
        .unwrap_err();
    assert_eq!(err.fields(), vec!["rating", "text"]);

    let missing_rating = ReviewInput {
        rating: None,
        text: "No stars".to_owned(),
    };
    let err = reviews::submit_review(&db, book.id, &reader, &missing_rating)
        .await
        .unwrap_err();
    assert_eq!(err.fields(), vec!["rating"]);

    let err = reviews::submit_review(&db, 9999, &reader, &input(3, "Ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, LibraryError::NotFound("Book")));

    assert_eq!(count::<review_rows::Entity>(&db).await, 0);
}

#[actix_rt::test]
async fn test_approval_is_idempotent_and_reversible() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let book = create_test_book(&db, "Moderated", 2000).await.unwrap();
    let reader = create_test_user(&db, "reader", "password123", Role::User)
        .await
        .unwrap();
    let review = reviews::submit_review(&db, book.id, &reader, &input(5, "Loved it"))
        .await
        .unwrap();

    let once = reviews::set_status(&db, review.id, ReviewStatus::Approved)
        .await
        .unwrap();
    let twice = reviews::set_status(&db, review.id, ReviewStatus::Approved)
        .await
        .unwrap();
    assert_eq!(once, twice);
    assert_eq!(reviews::average_rating(&db, book.id).await.unwrap(), Some(5.0));

    reviews::set_status(&db, review.id, ReviewStatus::Rejected)
        .await
        .unwrap();
    let view = reviews::get_review(&db, review.id).await.unwrap();
    assert_eq!(view.status, ReviewStatus::Rejected);
    assert_eq!(reviews::average_rating(&db, book.id).await.unwrap(), None);

    let err = reviews::set_status(&db, 9999, ReviewStatus::Approved)
        .await
        .unwrap_err();
    assert!(matches!(err, LibraryError::NotFound("Review")));
}

#[actix_rt::test]
async fn test_average_counts_only_approved_reviews() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let book = create_test_book(&db, "Averaged", 2000).await.unwrap();

    let mut users = Vec::new();
    for name in ["u1", "u2", "u3", "u4"] {
        users.push(create_test_user(&db, name, "password123", Role::User).await.unwrap());
    }

    create_test_review(&db, book.id, users[0].id, 5, ReviewStatus::Approved, 0).await.unwrap();
    create_test_review(&db, book.id, users[1].id, 3, ReviewStatus::Approved, 0).await.unwrap();
    create_test_review(&db, book.id, users[2].id, 1, ReviewStatus::Pending, 0).await.unwrap();
    create_test_review(&db, book.id, users[3].id, 4, ReviewStatus::Rejected, 0).await.unwrap();

    assert_eq!(reviews::average_rating(&db, book.id).await.unwrap(), Some(4.0));

    let empty = create_test_book(&db, "Unread", 2000).await.unwrap();
    assert_eq!(reviews::average_rating(&db, empty.id).await.unwrap(), None);
}

#[actix_rt::test]
async fn test_user_cannot_delete_someone_elses_review() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let book = create_test_book(&db, "Contested", 2000).await.unwrap();
    let author = create_test_user(&db, "author", "password123", Role::User)
        .await
        .unwrap();
    let other = create_test_user(&db, "other", "password123", Role::User)
        .await
        .unwrap();
    let review = create_test_review(&db, book.id, author.id, 2, ReviewStatus::Approved, 0)
        .await
        .unwrap();

    let err = reviews::delete_review(&db, review.id, &other).await.unwrap_err();
    assert!(matches!(err, LibraryError::PermissionDenied));
    assert!(review_rows::Entity::find_by_id(review.id)
        .one(&db)
        .await
        .unwrap()
        .is_some());

    reviews::delete_review(&db, review.id, &author).await.unwrap();
    assert_eq!(count::<review_rows::Entity>(&db).await, 0);
}

#[actix_rt::test]
async fn test_staff_can_delete_any_review() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let book = create_test_book(&db, "Cleanup", 2000).await.unwrap();
    let author = create_test_user(&db, "author", "password123", Role::User)
        .await
        .unwrap();
    let moderator = create_test_user(&db, "moderator", "password123", Role::Moderator)
        .await
        .unwrap();
    let admin = create_test_user(&db, "administrator", "password123", Role::Administrator)
        .await
        .unwrap();

    let first = create_test_review(&db, book.id, author.id, 1, ReviewStatus::Pending, 0)
        .await
        .unwrap();
    reviews::delete_review(&db, first.id, &moderator).await.unwrap();

    let second = create_test_review(&db, book.id, author.id, 1, ReviewStatus::Pending, 0)
        .await
        .unwrap();
    reviews::delete_review(&db, second.id, &admin).await.unwrap();

    assert_eq!(count::<review_rows::Entity>(&db).await, 0);

    let err = reviews::delete_review(&db, second.id, &admin).await.unwrap_err();
    assert!(matches!(err, LibraryError::NotFound("Review")));
}

#[actix_rt::test]
async fn test_list_mine_is_newest_first_in_every_status() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let reader = create_test_user(&db, "reader", "password123", Role::User)
        .await
        .unwrap();
    let other = create_test_user(&db, "other", "password123", Role::User)
        .await
        .unwrap();

    let a = create_test_book(&db, "A", 2000).await.unwrap();
    let b = create_test_book(&db, "B", 2000).await.unwrap();
    let c = create_test_book(&db, "C", 2000).await.unwrap();

    let oldest = create_test_review(&db, a.id, reader.id, 1, ReviewStatus::Rejected, 30)
        .await
        .unwrap();
    let middle = create_test_review(&db, b.id, reader.id, 2, ReviewStatus::Approved, 20)
        .await
        .unwrap();
    let newest = create_test_review(&db, c.id, reader.id, 3, ReviewStatus::Pending, 10)
        .await
        .unwrap();
    create_test_review(&db, a.id, other.id, 5, ReviewStatus::Approved, 0)
        .await
        .unwrap();

    let page = reviews::list_mine(&db, reader.id, 1, 10).await.unwrap();
    let ids: Vec<i32> = page.items.iter().map(|r| r.review.id).collect();
    assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);
    assert_eq!(page.total, 3);

    let small = reviews::list_mine(&db, reader.id, 2, 2).await.unwrap();
    assert_eq!(small.page_count, 2);
    assert_eq!(small.items.len(), 1);
    assert_eq!(small.items[0].review.id, oldest.id);
}

#[actix_rt::test]
async fn test_pending_queue_is_oldest_first() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let book = create_test_book(&db, "Queue", 2000).await.unwrap();

    let mut users = Vec::new();
    for name in ["q1", "q2", "q3", "q4"] {
        users.push(create_test_user(&db, name, "password123", Role::User).await.unwrap());
    }

    let recent = create_test_review(&db, book.id, users[0].id, 3, ReviewStatus::Pending, 1)
        .await
        .unwrap();
    let ancient = create_test_review(&db, book.id, users[1].id, 3, ReviewStatus::Pending, 100)
        .await
        .unwrap();
    create_test_review(&db, book.id, users[2].id, 3, ReviewStatus::Approved, 200)
        .await
        .unwrap();
    create_test_review(&db, book.id, users[3].id, 3, ReviewStatus::Rejected, 300)
        .await
        .unwrap();

    let page = reviews::list_pending(&db, 1, 10).await.unwrap();
    let ids: Vec<i32> = page.items.iter().map(|r| r.review.id).collect();
    assert_eq!(ids, vec![ancient.id, recent.id]);
}

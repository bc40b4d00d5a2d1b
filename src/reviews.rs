//! Review store and moderation workflow.
//!
//! A review starts `pending`. Staff move it to `approved` or `rejected`; only
//! approved reviews are public and count toward a book's rating. Each user
//! may review a book once.

use crate::error::LibraryError;
use crate::orm::{books, review_statuses, reviews, users};
use crate::page::{fetch_page, Page};
use crate::permission::Role;
use crate::user::Profile;
use chrono::Utc;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};
use std::collections::HashMap;
use validator::Validate;

/// Moderation states. Names match the `review_statuses` reference table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub const ALL: [ReviewStatus; 3] = [
        ReviewStatus::Pending,
        ReviewStatus::Approved,
        ReviewStatus::Rejected,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    /// Text shown to users and in moderation notices.
    pub fn description(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "Pending review",
            ReviewStatus::Approved => "Approved",
            ReviewStatus::Rejected => "Rejected",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ReviewStatus::ALL.into_iter().find(|s| s.name() == name)
    }
}

/// Review form fields.
#[derive(Clone, Debug, Default, Validate)]
pub struct ReviewInput {
    #[validate(
        required(message = "Rating is required."),
        range(min = 0, max = 5, message = "Rating must be between 0 and 5.")
    )]
    pub rating: Option<i32>,
    #[validate(length(min = 1, message = "Review text is required."))]
    pub text: String,
}

/// A review joined with what listings need to show it.
#[derive(Clone, Debug)]
pub struct ReviewView {
    pub review: reviews::Model,
    pub book_title: String,
    pub username: String,
    pub status: ReviewStatus,
}

impl ReviewView {
    pub fn text_html(&self) -> String {
        crate::markdown::render(&self.review.text)
    }

    pub fn created_at(&self) -> String {
        self.review.created_at.format("%Y-%m-%d %H:%M").to_string()
    }

    pub fn status_description(&self) -> &'static str {
        self.status.description()
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReviewStatus::Pending
    }
}

/// Id of the reference row for `status`.
pub async fn status_id<C>(db: &C, status: ReviewStatus) -> Result<i32, DbErr>
where
    C: ConnectionTrait,
{
    review_statuses::Entity::find()
        .filter(review_statuses::Column::Name.eq(status.name()))
        .one(db)
        .await?
        .map(|row| row.id)
        .ok_or_else(|| DbErr::RecordNotFound(format!("review status {}", status.name())))
}

/// Resolves usernames, titles and statuses for a batch of reviews.
async fn into_views<C>(db: &C, rows: Vec<reviews::Model>) -> Result<Vec<ReviewView>, DbErr>
where
    C: ConnectionTrait,
{
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let user_ids: Vec<i32> = rows.iter().map(|r| r.user_id).collect();
    let book_ids: Vec<i32> = rows.iter().map(|r| r.book_id).collect();

    let usernames: HashMap<i32, String> = users::Entity::find()
        .filter(users::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();
    let titles: HashMap<i32, String> = books::Entity::find()
        .filter(books::Column::Id.is_in(book_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|b| (b.id, b.title))
        .collect();
    let statuses: HashMap<i32, ReviewStatus> = review_statuses::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .filter_map(|s| ReviewStatus::from_name(&s.name).map(|status| (s.id, status)))
        .collect();

    Ok(rows
        .into_iter()
        .map(|review| ReviewView {
            book_title: titles.get(&review.book_id).cloned().unwrap_or_default(),
            username: usernames
                .get(&review.user_id)
                .cloned()
                .unwrap_or_else(|| crate::constants::UNKNOWN_USERNAME.to_owned()),
            status: statuses
                .get(&review.status_id)
                .copied()
                .unwrap_or(ReviewStatus::Pending),
            review,
        })
        .collect())
}

async fn into_view<C>(db: &C, row: reviews::Model) -> Result<ReviewView, DbErr>
where
    C: ConnectionTrait,
{
    into_views(db, vec![row])
        .await?
        .pop()
        .ok_or_else(|| DbErr::RecordNotFound("review".to_owned()))
}

/// Stores a new pending review by `author`.
pub async fn submit_review<C>(
    db: &C,
    book_id: i32,
    author: &Profile,
    input: &ReviewInput,
) -> Result<reviews::Model, LibraryError>
where
    C: ConnectionTrait,
{
    input.validate()?;

    books::Entity::find_by_id(book_id)
        .one(db)
        .await?
        .ok_or(LibraryError::NotFound("Book"))?;

    if find_row_for_book_and_user(db, book_id, author.id)
        .await?
        .is_some()
    {
        return Err(LibraryError::Duplicate);
    }

    let review = reviews::ActiveModel {
        book_id: Set(book_id),
        user_id: Set(author.id),
        rating: Set(input.rating.unwrap_or_default()),
        text: Set(input.text.clone()),
        created_at: Set(Utc::now().naive_utc()),
        status_id: Set(status_id(db, ReviewStatus::Pending).await?),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!(
        "review {} submitted by user {} for book {}",
        review.id,
        author.id,
        book_id
    );
    Ok(review)
}

/// Moves a review to `status`. Moderators may revisit earlier decisions.
pub async fn set_status<C>(
    db: &C,
    review_id: i32,
    status: ReviewStatus,
) -> Result<reviews::Model, LibraryError>
where
    C: ConnectionTrait,
{
    let review = reviews::Entity::find_by_id(review_id)
        .one(db)
        .await?
        .ok_or(LibraryError::NotFound("Review"))?;

    let mut active: reviews::ActiveModel = review.into();
    active.status_id = Set(status_id(db, status).await?);
    let review = active.update(db).await?;

    log::info!("review {} set to {}", review.id, status.name());
    Ok(review)
}

/// Deletes a review. Readers may only delete their own; staff may delete any.
pub async fn delete_review<C>(db: &C, review_id: i32, requester: &Profile) -> Result<(), LibraryError>
where
    C: ConnectionTrait,
{
    let review = reviews::Entity::find_by_id(review_id)
        .one(db)
        .await?
        .ok_or(LibraryError::NotFound("Review"))?;

    if requester.role == Role::User && review.user_id != requester.id {
        log::warn!(
            "user {} tried to delete review {} owned by {}",
            requester.id,
            review.id,
            review.user_id
        );
        return Err(LibraryError::PermissionDenied);
    }

    review.delete(db).await?;
    log::info!("review {} deleted by user {}", review_id, requester.id);
    Ok(())
}

/// The user's reviews in every status, newest first.
pub async fn list_mine<C>(
    db: &C,
    user_id: i32,
    page: usize,
    per_page: usize,
) -> Result<Page<ReviewView>, DbErr>
where
    C: ConnectionTrait,
{
    let select = reviews::Entity::find()
        .filter(reviews::Column::UserId.eq(user_id))
        .order_by_desc(reviews::Column::CreatedAt)
        .order_by_desc(reviews::Column::Id);
    let page = fetch_page(db, select, page, per_page).await?;
    let items = into_views(db, page.items.clone()).await?;
    Ok(page.with_items(items))
}

/// Moderation queue, oldest first.
pub async fn list_pending<C>(db: &C, page: usize, per_page: usize) -> Result<Page<ReviewView>, DbErr>
where
    C: ConnectionTrait,
{
    let pending = status_id(db, ReviewStatus::Pending).await?;
    let select = reviews::Entity::find()
        .filter(reviews::Column::StatusId.eq(pending))
        .order_by_asc(reviews::Column::CreatedAt)
        .order_by_asc(reviews::Column::Id);
    let page = fetch_page(db, select, page, per_page).await?;
    let items = into_views(db, page.items.clone()).await?;
    Ok(page.with_items(items))
}

/// One review for the moderation detail page.
pub async fn get_review<C>(db: &C, review_id: i32) -> Result<ReviewView, LibraryError>
where
    C: ConnectionTrait,
{
    let review = reviews::Entity::find_by_id(review_id)
        .one(db)
        .await?
        .ok_or(LibraryError::NotFound("Review"))?;
    Ok(into_view(db, review).await?)
}

/// Approved reviews of a book, newest first.
pub async fn approved_for_book<C>(db: &C, book_id: i32) -> Result<Vec<ReviewView>, DbErr>
where
    C: ConnectionTrait,
{
    let approved = status_id(db, ReviewStatus::Approved).await?;
    let rows = reviews::Entity::find()
        .filter(reviews::Column::BookId.eq(book_id))
        .filter(reviews::Column::StatusId.eq(approved))
        .order_by_desc(reviews::Column::CreatedAt)
        .order_by_desc(reviews::Column::Id)
        .all(db)
        .await?;
    into_views(db, rows).await
}

async fn find_row_for_book_and_user<C>(
    db: &C,
    book_id: i32,
    user_id: i32,
) -> Result<Option<reviews::Model>, DbErr>
where
    C: ConnectionTrait,
{
    reviews::Entity::find()
        .filter(reviews::Column::BookId.eq(book_id))
        .filter(reviews::Column::UserId.eq(user_id))
        .one(db)
        .await
}

/// The user's review of a book in any status.
pub async fn find_for_book_and_user<C>(
    db: &C,
    book_id: i32,
    user_id: i32,
) -> Result<Option<ReviewView>, DbErr>
where
    C: ConnectionTrait,
{
    match find_row_for_book_and_user(db, book_id, user_id).await? {
        Some(row) => Ok(Some(into_view(db, row).await?)),
        None => Ok(None),
    }
}

/// Arithmetic mean rounded to two decimals. None when there are no ratings.
pub fn mean_rating(ratings: &[i32]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    let mean = sum as f64 / ratings.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

/// Ratings of approved reviews grouped by book.
pub async fn approved_ratings_for<C>(db: &C, book_ids: &[i32]) -> Result<HashMap<i32, Vec<i32>>, DbErr>
where
    C: ConnectionTrait,
{
    let mut ratings: HashMap<i32, Vec<i32>> = HashMap::new();
    if book_ids.is_empty() {
        return Ok(ratings);
    }

    let approved = status_id(db, ReviewStatus::Approved).await?;
    let rows = reviews::Entity::find()
        .filter(reviews::Column::BookId.is_in(book_ids.to_vec()))
        .filter(reviews::Column::StatusId.eq(approved))
        .all(db)
        .await?;
    for row in rows {
        ratings.entry(row.book_id).or_default().push(row.rating);
    }
    Ok(ratings)
}

/// Mean rating over the book's approved reviews.
pub async fn average_rating<C>(db: &C, book_id: i32) -> Result<Option<f64>, DbErr>
where
    C: ConnectionTrait,
{
    let mut ratings = approved_ratings_for(db, &[book_id]).await?;
    Ok(mean_rating(&ratings.remove(&book_id).unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_rating() {
        assert_eq!(mean_rating(&[]), None);
        assert_eq!(mean_rating(&[5]), Some(5.0));
        assert_eq!(mean_rating(&[4, 5]), Some(4.5));
        assert_eq!(mean_rating(&[1, 2, 2]), Some(1.67));
        assert_eq!(mean_rating(&[0, 0]), Some(0.0));
    }

    #[test]
    fn test_status_names_roundtrip() {
        for status in ReviewStatus::ALL {
            assert_eq!(ReviewStatus::from_name(status.name()), Some(status));
        }
        assert_eq!(ReviewStatus::from_name("deleted"), None);
    }

    #[test]
    fn test_review_input_validation() {
        let ok = ReviewInput {
            rating: Some(0),
            text: "Fine.".to_owned(),
        };
        assert!(ok.validate().is_ok());

        let bad = ReviewInput {
            rating: Some(6),
            text: String::new(),
        };
        let err = LibraryError::from(bad.validate().unwrap_err());
        assert_eq!(err.fields(), vec!["rating", "text"]);

        let missing = ReviewInput {
            rating: None,
            text: "x".to_owned(),
        };
        assert!(missing.validate().is_err());
    }
}

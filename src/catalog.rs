//! Catalog store: books, genres and content-addressed covers.

use crate::error::{FieldError, LibraryError};
use crate::orm::{book_genres, books, covers, genres};
use crate::page::{fetch_page, Page};
use crate::reviews::{self, ReviewView};
use crate::storage::{content_hash, derive_filename, guess_mime_type, StorageBackend};
use sea_orm::{
    entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use validator::Validate;

/// Book form fields shared by create and edit.
#[derive(Clone, Debug, Default, Validate)]
pub struct BookInput {
    #[validate(length(min = 1, max = 256, message = "Title is required (256 characters max)."))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required."))]
    pub description: String,
    #[validate(
        required(message = "Year is required."),
        range(min = 1000, max = 2100, message = "Year must be between 1000 and 2100.")
    )]
    pub year: Option<i32>,
    #[validate(length(min = 1, max = 128, message = "Publisher is required (128 characters max)."))]
    pub publisher: String,
    #[validate(length(min = 1, max = 128, message = "Author is required (128 characters max)."))]
    pub author: String,
    #[validate(
        required(message = "Page count is required."),
        range(min = 1, message = "Page count must be at least 1.")
    )]
    pub pages: Option<i32>,
    #[validate(length(min = 1, message = "Pick at least one genre."))]
    pub genre_ids: Vec<i32>,
}

impl BookInput {
    /// Prefills the edit form.
    pub fn from_book(book: &books::Model, genre_ids: Vec<i32>) -> Self {
        Self {
            title: book.title.clone(),
            description: book.description.clone(),
            year: Some(book.year),
            publisher: book.publisher.clone(),
            author: book.author.clone(),
            pages: Some(book.pages),
            genre_ids,
        }
    }

    pub fn has_genre(&self, id: &i32) -> bool {
        self.genre_ids.contains(id)
    }
}

/// Raw cover image as received from the client.
#[derive(Clone, Debug)]
pub struct CoverUpload {
    pub data: Vec<u8>,
    /// Client-side filename; only its extension is used.
    pub filename: Option<String>,
    /// Declared content type, if any.
    pub mimetype: Option<String>,
}

impl CoverUpload {
    fn mimetype(&self) -> String {
        match &self.mimetype {
            Some(m) if m != "application/octet-stream" => m.clone(),
            _ => guess_mime_type(self.filename.as_deref().unwrap_or("")).to_owned(),
        }
    }
}

/// A book listing entry on the home page.
#[derive(Clone, Debug)]
pub struct BookSummary {
    pub book: books::Model,
    pub genres: Vec<String>,
    pub cover_filename: Option<String>,
    pub rating: Option<f64>,
    pub review_count: usize,
}

/// A book with its relations resolved.
#[derive(Clone, Debug)]
pub struct BookDetail {
    pub book: books::Model,
    pub genres: Vec<genres::Model>,
    pub cover: Option<covers::Model>,
    pub rating: Option<f64>,
}

impl BookDetail {
    pub fn genre_names(&self) -> String {
        self.genres
            .iter()
            .map(|g| g.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn description_html(&self) -> String {
        crate::markdown::render(&self.book.description)
    }
}

/// Everything the book page shows.
#[derive(Clone, Debug)]
pub struct BookView {
    pub detail: BookDetail,
    /// Approved reviews, newest first.
    pub reviews: Vec<ReviewView>,
    /// The viewer's own review in any status.
    pub own_review: Option<ReviewView>,
}

/// All genres ordered by name.
pub async fn list_genres<C>(db: &C) -> Result<Vec<genres::Model>, DbErr>
where
    C: ConnectionTrait,
{
    genres::Entity::find()
        .order_by_asc(genres::Column::Name)
        .all(db)
        .await
}

/// The subset of `genre_ids` that name existing genres, ascending.
async fn known_genre_ids<C>(db: &C, genre_ids: &[i32]) -> Result<Vec<i32>, DbErr>
where
    C: ConnectionTrait,
{
    let wanted: HashSet<i32> = genre_ids.iter().copied().collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    let known = genres::Entity::find()
        .filter(genres::Column::Id.is_in(wanted.into_iter().collect::<Vec<_>>()))
        .order_by_asc(genres::Column::Id)
        .all(db)
        .await?;
    Ok(known.into_iter().map(|g| g.id).collect())
}

/// Replaces the genre links of a book. `genre_ids` must already be filtered
/// by [`known_genre_ids`].
async fn set_genres<C>(db: &C, book_id: i32, genre_ids: &[i32]) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    book_genres::Entity::delete_many()
        .filter(book_genres::Column::BookId.eq(book_id))
        .exec(db)
        .await?;

    for genre_id in genre_ids {
        book_genres::ActiveModel {
            book_id: Set(book_id),
            genre_id: Set(*genre_id),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}

/// Finds or creates the cover for `upload`, deduplicating by content hash.
/// Returns the cover and whether a new file was written.
///
/// The file is written before the row is inserted, so a failed commit can
/// leave an unreferenced file behind but never a row without a file.
pub async fn store_cover<C>(
    db: &C,
    storage: &dyn StorageBackend,
    upload: CoverUpload,
) -> Result<(covers::Model, bool), LibraryError>
where
    C: ConnectionTrait,
{
    let hash = content_hash(&upload.data);

    if let Some(existing) = covers::Entity::find()
        .filter(covers::Column::ContentHash.eq(hash.as_str()))
        .one(db)
        .await?
    {
        log::debug!("cover {} reused for hash {}", existing.id, hash);
        return Ok((existing, false));
    }

    let mimetype = upload.mimetype();
    let filename = derive_filename(&hash, upload.filename.as_deref());
    storage.put_object(upload.data, &filename).await?;

    let cover = covers::ActiveModel {
        filename: Set(filename),
        mimetype: Set(mimetype),
        content_hash: Set(hash),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok((cover, true))
}

fn validate_cover(upload: &Option<CoverUpload>) -> Result<(), LibraryError> {
    if let Some(upload) = upload {
        if !upload.mimetype().starts_with("image/") {
            return Err(LibraryError::Validation(vec![FieldError::new(
                "cover",
                "Cover must be an image.",
            )]));
        }
    }
    Ok(())
}

/// `known_genres` is the submitted genre list after dropping unknown ids.
/// A book needs at least one genre that exists.
fn validate_book(
    input: &BookInput,
    known_genres: &[i32],
    cover: &Option<CoverUpload>,
) -> Result<(), LibraryError> {
    let mut errors = match input.validate() {
        Ok(()) => Vec::new(),
        Err(e) => match LibraryError::from(e) {
            LibraryError::Validation(errors) => errors,
            other => return Err(other),
        },
    };
    if !input.genre_ids.is_empty() && known_genres.is_empty() {
        errors.push(FieldError::new("genre_ids", "Pick at least one existing genre."));
    }
    if let Err(LibraryError::Validation(cover_errors)) = validate_cover(cover) {
        errors.extend(cover_errors);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(LibraryError::Validation(errors))
    }
}

/// Creates a book. An empty upload counts as no cover.
pub async fn create_book(
    db: &DatabaseConnection,
    storage: &dyn StorageBackend,
    input: &BookInput,
    cover: Option<CoverUpload>,
) -> Result<books::Model, LibraryError> {
    let cover = cover.filter(|c| !c.data.is_empty());
    let genre_ids = known_genre_ids(db, &input.genre_ids).await?;
    validate_book(input, &genre_ids, &cover)?;

    let txn = db.begin().await?;

    let mut book = books::ActiveModel {
        title: Set(input.title.clone()),
        description: Set(input.description.clone()),
        year: Set(input.year.unwrap_or_default()),
        publisher: Set(input.publisher.clone()),
        author: Set(input.author.clone()),
        pages: Set(input.pages.unwrap_or_default()),
        cover_id: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    set_genres(&txn, book.id, &genre_ids).await?;

    if let Some(upload) = cover {
        let (cover, _) = store_cover(&txn, storage, upload).await?;
        let mut active: books::ActiveModel = book.into();
        active.cover_id = Set(Some(cover.id));
        book = active.update(&txn).await?;
    }

    txn.commit().await?;
    log::info!("book {} created: {}", book.id, book.title);

    Ok(book)
}

/// Updates a book's fields and genres. The cover is never touched.
pub async fn update_book(
    db: &DatabaseConnection,
    book_id: i32,
    input: &BookInput,
) -> Result<books::Model, LibraryError> {
    let genre_ids = known_genre_ids(db, &input.genre_ids).await?;
    validate_book(input, &genre_ids, &None)?;

    let txn = db.begin().await?;

    let book = books::Entity::find_by_id(book_id)
        .one(&txn)
        .await?
        .ok_or(LibraryError::NotFound("Book"))?;

    let mut active: books::ActiveModel = book.into();
    active.title = Set(input.title.clone());
    active.description = Set(input.description.clone());
    active.year = Set(input.year.unwrap_or_default());
    active.publisher = Set(input.publisher.clone());
    active.author = Set(input.author.clone());
    active.pages = Set(input.pages.unwrap_or_default());
    let book = active.update(&txn).await?;

    set_genres(&txn, book.id, &genre_ids).await?;

    txn.commit().await?;
    log::info!("book {} updated", book.id);

    Ok(book)
}

/// Deletes a book with its reviews and genre links. The cover row and file go
/// too unless another book still references the same cover.
pub async fn delete_book(
    db: &DatabaseConnection,
    storage: &dyn StorageBackend,
    book_id: i32,
) -> Result<(), LibraryError> {
    use crate::orm::reviews as review_rows;

    let txn = db.begin().await?;

    let book = books::Entity::find_by_id(book_id)
        .one(&txn)
        .await?
        .ok_or(LibraryError::NotFound("Book"))?;
    let cover_id = book.cover_id;

    review_rows::Entity::delete_many()
        .filter(review_rows::Column::BookId.eq(book_id))
        .exec(&txn)
        .await?;
    book_genres::Entity::delete_many()
        .filter(book_genres::Column::BookId.eq(book_id))
        .exec(&txn)
        .await?;
    book.delete(&txn).await?;

    let mut orphaned_file = None;
    if let Some(cover_id) = cover_id {
        let still_referenced = books::Entity::find()
            .filter(books::Column::CoverId.eq(cover_id))
            .count(&txn)
            .await?;
        if still_referenced == 0 {
            if let Some(cover) = covers::Entity::find_by_id(cover_id).one(&txn).await? {
                orphaned_file = Some(cover.filename.clone());
                cover.delete(&txn).await?;
            }
        } else {
            log::debug!(
                "cover {} kept, still used by {} book(s)",
                cover_id,
                still_referenced
            );
        }
    }

    txn.commit().await?;
    log::info!("book {} deleted", book_id);

    if let Some(filename) = orphaned_file {
        if let Err(e) = storage.delete_object(&filename).await {
            log::error!("delete_book: unable to remove cover file {}: {}", filename, e);
        }
    }

    Ok(())
}

/// Genre names per book id.
async fn genre_names_for<C>(db: &C, book_ids: &[i32]) -> Result<HashMap<i32, Vec<String>>, DbErr>
where
    C: ConnectionTrait,
{
    let mut names: HashMap<i32, Vec<String>> = HashMap::new();
    if book_ids.is_empty() {
        return Ok(names);
    }

    let links = book_genres::Entity::find()
        .filter(book_genres::Column::BookId.is_in(book_ids.to_vec()))
        .find_also_related(genres::Entity)
        .all(db)
        .await?;

    for (link, genre) in links {
        if let Some(genre) = genre {
            names.entry(link.book_id).or_default().push(genre.name);
        }
    }
    for list in names.values_mut() {
        list.sort();
    }

    Ok(names)
}

/// Home page listing: newest publication year first.
pub async fn list_books<C>(db: &C, page: usize, per_page: usize) -> Result<Page<BookSummary>, DbErr>
where
    C: ConnectionTrait,
{
    let select = books::Entity::find()
        .order_by_desc(books::Column::Year)
        .order_by_desc(books::Column::Id);
    let page = fetch_page(db, select, page, per_page).await?;

    let book_ids: Vec<i32> = page.items.iter().map(|b| b.id).collect();
    let mut genre_names = genre_names_for(db, &book_ids).await?;

    let cover_ids: Vec<i32> = page.items.iter().filter_map(|b| b.cover_id).collect();
    let cover_files: HashMap<i32, String> = if cover_ids.is_empty() {
        HashMap::new()
    } else {
        covers::Entity::find()
            .filter(covers::Column::Id.is_in(cover_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.filename))
            .collect()
    };

    let mut ratings = reviews::approved_ratings_for(db, &book_ids).await?;

    Ok(page.map(|book| {
        let approved = ratings.remove(&book.id).unwrap_or_default();
        BookSummary {
            genres: genre_names.remove(&book.id).unwrap_or_default(),
            cover_filename: book.cover_id.and_then(|id| cover_files.get(&id).cloned()),
            rating: reviews::mean_rating(&approved),
            review_count: approved.len(),
            book,
        }
    }))
}

/// Loads one book with its genres, cover and average rating.
pub async fn get_book<C>(db: &C, book_id: i32) -> Result<BookDetail, LibraryError>
where
    C: ConnectionTrait,
{
    let book = books::Entity::find_by_id(book_id)
        .one(db)
        .await?
        .ok_or(LibraryError::NotFound("Book"))?;

    let mut genres = book.find_related(genres::Entity).all(db).await?;
    genres.sort_by(|a, b| a.name.cmp(&b.name));

    let cover = match book.cover_id {
        Some(id) => covers::Entity::find_by_id(id).one(db).await?,
        None => None,
    };

    let rating = reviews::average_rating(db, book.id).await?;

    Ok(BookDetail {
        book,
        genres,
        cover,
        rating,
    })
}

/// Book page: the book, its approved reviews and the viewer's own review.
pub async fn view_book<C>(db: &C, book_id: i32, viewer: Option<i32>) -> Result<BookView, LibraryError>
where
    C: ConnectionTrait,
{
    let detail = get_book(db, book_id).await?;
    let reviews = reviews::approved_for_book(db, book_id).await?;
    let own_review = match viewer {
        Some(user_id) => reviews::find_for_book_and_user(db, book_id, user_id).await?,
        None => None,
    };

    Ok(BookView {
        detail,
        reviews,
        own_review,
    })
}

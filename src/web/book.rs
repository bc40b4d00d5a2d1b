use super::{db_error, library_error, redirect};
use crate::app_config;
use crate::catalog::{self, BookInput, BookView, CoverUpload};
use crate::constants::{MAX_BOOK_YEAR, MIN_BOOK_YEAR};
use crate::error::{FieldError, LibraryError};
use crate::flash;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::orm::genres;
use crate::permission::RoleSet;
use crate::storage::StorageBackend;
use actix_multipart::Multipart;
use actix_web::{error, get, post, web, Error, HttpRequest, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // `/books/add` must precede `/books/{id}`.
    conf.service(view_add_book)
        .service(create_book)
        .service(view_book)
        .service(view_edit_book)
        .service(update_book)
        .service(delete_book);
}

#[derive(Template)]
#[template(path = "book.html")]
pub struct BookTemplate {
    pub client: ClientCtx,
    pub view: BookView,
}

impl BookTemplate {
    /// Signed-in readers without a review of this book get the review link.
    pub fn can_review(&self) -> bool {
        self.client.is_user() && self.view.own_review.is_none()
    }
}

#[derive(Template)]
#[template(path = "book_form.html")]
pub struct BookFormTemplate {
    pub client: ClientCtx,
    pub heading: &'static str,
    pub action: String,
    pub input: BookInput,
    pub genres: Vec<genres::Model>,
    pub errors: Vec<FieldError>,
    /// Covers are only accepted when a book is created.
    pub with_cover: bool,
    pub min_year: i32,
    pub max_year: i32,
}

impl BookFormTemplate {
    fn new(
        client: ClientCtx,
        heading: &'static str,
        action: String,
        input: BookInput,
        genres: Vec<genres::Model>,
        with_cover: bool,
    ) -> Self {
        Self {
            client,
            heading,
            action,
            input,
            genres,
            errors: Vec::new(),
            with_cover,
            min_year: MIN_BOOK_YEAR,
            max_year: MAX_BOOK_YEAR,
        }
    }

    fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = errors;
        self
    }

    pub fn error_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

/// Book form as read from a multipart body.
#[derive(Debug, Default)]
struct BookForm {
    csrf_token: String,
    input: BookInput,
    cover: Option<CoverUpload>,
}

impl BookForm {
    fn set_text(&mut self, name: &str, value: String) {
        let trimmed = value.trim();
        match name {
            "csrf_token" => self.csrf_token = trimmed.to_owned(),
            "title" => self.input.title = trimmed.to_owned(),
            "description" => self.input.description = trimmed.to_owned(),
            "year" => self.input.year = trimmed.parse().ok(),
            "publisher" => self.input.publisher = trimmed.to_owned(),
            "author" => self.input.author = trimmed.to_owned(),
            "pages" => self.input.pages = trimmed.parse().ok(),
            "genres" => {
                if let Ok(id) = trimmed.parse() {
                    self.input.genre_ids.push(id);
                }
            }
            _ => log::debug!("BookForm: ignoring field {:?}", name),
        }
    }
}

/// Reads every field of a book form. Fails once the body exceeds `max_bytes`.
async fn read_book_form(mut fields: Multipart, max_bytes: usize) -> Result<BookForm, Error> {
    use futures::{StreamExt, TryStreamExt};

    let mut form = BookForm::default();
    let mut total = 0usize;

    while let Some(mut field) = fields.try_next().await.map_err(|e| {
        log::error!("read_book_form: multipart error: {}", e);
        error::ErrorBadRequest("Error interpreting user input.")
    })? {
        let (name, filename) = {
            let disposition = field.content_disposition();
            (
                disposition.get_name().map(str::to_owned),
                disposition.get_filename().map(str::to_owned),
            )
        };
        let mimetype = field.content_type().map(|m| m.essence_str().to_owned());

        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let bytes = chunk.map_err(|e| {
                log::error!("read_book_form: multipart read error: {}", e);
                error::ErrorBadRequest("Error interpreting user input.")
            })?;
            total += bytes.len();
            if total > max_bytes {
                return Err(error::ErrorPayloadTooLarge("Upload is too large."));
            }
            buf.extend_from_slice(&bytes);
        }

        match name.as_deref() {
            Some("cover") => {
                form.cover = Some(CoverUpload {
                    data: buf,
                    filename,
                    mimetype,
                })
            }
            Some(name) => {
                let value = String::from_utf8(buf)
                    .map_err(|_| error::ErrorBadRequest("Form fields must be UTF-8."))?;
                form.set_text(name, value);
            }
            None => {}
        }
    }

    Ok(form)
}

#[derive(Deserialize)]
struct DeleteForm {
    csrf_token: String,
}

#[get("/books/add")]
async fn view_add_book(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, Error> {
    if let Err(resp) = client.require_roles(&cookies, &req, RoleSet::STAFF) {
        return Ok(resp);
    }

    let genres = catalog::list_genres(db.get_ref())
        .await
        .map_err(|e| db_error("view_add_book", e))?;

    Ok(BookFormTemplate::new(
        client,
        "Add book",
        "/books/add".to_owned(),
        BookInput::default(),
        genres,
        true,
    )
    .to_response())
}

#[post("/books/add")]
async fn create_book(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    storage: web::Data<dyn StorageBackend>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    if let Err(resp) = client.require_roles(&cookies, &req, RoleSet::STAFF) {
        return Ok(resp);
    }

    let form = read_book_form(payload, app_config::get_config().max_upload_bytes()).await?;
    validate_csrf_token(&cookies, &form.csrf_token)?;

    match catalog::create_book(db.get_ref(), storage.get_ref(), &form.input, form.cover).await {
        Ok(book) => {
            flash::success(&cookies, format!("Book \"{}\" added.", book.title));
            Ok(redirect(&format!("/books/{}", book.id)))
        }
        Err(LibraryError::Validation(errors)) => {
            let genres = catalog::list_genres(db.get_ref())
                .await
                .map_err(|e| db_error("create_book", e))?;
            Ok(BookFormTemplate::new(
                client,
                "Add book",
                "/books/add".to_owned(),
                form.input,
                genres,
                true,
            )
            .with_errors(errors)
            .to_response())
        }
        Err(e) => library_error(&cookies, &req, "/", e),
    }
}

#[get("/books/{id}")]
async fn view_book(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    match catalog::view_book(db.get_ref(), id.into_inner(), client.get_id()).await {
        Ok(view) => Ok(BookTemplate { client, view }.to_response()),
        Err(e) => library_error(&cookies, &req, "/", e),
    }
}

#[get("/books/{id}/edit")]
async fn view_edit_book(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    if let Err(resp) = client.require_roles(&cookies, &req, RoleSet::STAFF) {
        return Ok(resp);
    }

    let id = id.into_inner();
    let detail = match catalog::get_book(db.get_ref(), id).await {
        Ok(detail) => detail,
        Err(e) => return library_error(&cookies, &req, "/", e),
    };
    let genres = catalog::list_genres(db.get_ref())
        .await
        .map_err(|e| db_error("view_edit_book", e))?;
    let input = BookInput::from_book(&detail.book, detail.genres.iter().map(|g| g.id).collect());

    Ok(BookFormTemplate::new(
        client,
        "Edit book",
        format!("/books/{}/edit", id),
        input,
        genres,
        false,
    )
    .to_response())
}

#[post("/books/{id}/edit")]
async fn update_book(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    id: web::Path<i32>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    if let Err(resp) = client.require_roles(&cookies, &req, RoleSet::STAFF) {
        return Ok(resp);
    }

    let id = id.into_inner();
    let form = read_book_form(payload, app_config::get_config().max_upload_bytes()).await?;
    validate_csrf_token(&cookies, &form.csrf_token)?;
    if form.cover.as_ref().map_or(false, |c| !c.data.is_empty()) {
        log::debug!("update_book: ignoring cover upload for book {}", id);
    }

    match catalog::update_book(db.get_ref(), id, &form.input).await {
        Ok(book) => {
            flash::success(&cookies, format!("Book \"{}\" updated.", book.title));
            Ok(redirect(&format!("/books/{}", book.id)))
        }
        Err(LibraryError::Validation(errors)) => {
            let genres = catalog::list_genres(db.get_ref())
                .await
                .map_err(|e| db_error("update_book", e))?;
            Ok(BookFormTemplate::new(
                client,
                "Edit book",
                format!("/books/{}/edit", id),
                form.input,
                genres,
                false,
            )
            .with_errors(errors)
            .to_response())
        }
        Err(e) => library_error(&cookies, &req, "/", e),
    }
}

#[post("/books/{id}/delete")]
async fn delete_book(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    storage: web::Data<dyn StorageBackend>,
    id: web::Path<i32>,
    form: web::Form<DeleteForm>,
) -> Result<HttpResponse, Error> {
    if let Err(resp) = client.require_roles(&cookies, &req, RoleSet::ADMINISTRATOR) {
        return Ok(resp);
    }
    validate_csrf_token(&cookies, &form.csrf_token)?;

    match catalog::delete_book(db.get_ref(), storage.get_ref(), id.into_inner()).await {
        Ok(()) => {
            flash::success(&cookies, "Book deleted.");
            Ok(redirect("/"))
        }
        Err(e) => library_error(&cookies, &req, "/", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_form_parses_fields() {
        let mut form = BookForm::default();
        form.set_text("title", "  Dune ".to_owned());
        form.set_text("year", "1965".to_owned());
        form.set_text("pages", "abc".to_owned());
        form.set_text("genres", "2".to_owned());
        form.set_text("genres", "x".to_owned());
        form.set_text("genres", "5".to_owned());
        form.set_text("unexpected", "ignored".to_owned());

        assert_eq!(form.input.title, "Dune");
        assert_eq!(form.input.year, Some(1965));
        assert_eq!(form.input.pages, None);
        assert_eq!(form.input.genre_ids, vec![2, 5]);
    }
}

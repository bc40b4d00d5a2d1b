use super::{db_error, library_error, redirect, PageQuery};
use crate::app_config;
use crate::catalog;
use crate::constants::{MAX_RATING, MIN_RATING};
use crate::error::{FieldError, LibraryError};
use crate::flash;
use crate::middleware::client_ctx::referrer;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::orm::books;
use crate::page::Page;
use crate::permission::RoleSet;
use crate::reviews::{self, ReviewInput, ReviewView};
use crate::template::{Paginator, PaginatorToHtml};
use actix_web::{get, post, web, Error, HttpRequest, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_new_review)
        .service(create_review)
        .service(delete_review)
        .service(view_my_reviews);
}

#[derive(Template)]
#[template(path = "review_form.html")]
pub struct ReviewFormTemplate {
    pub client: ClientCtx,
    pub book: books::Model,
    pub input: ReviewInput,
    pub errors: Vec<FieldError>,
}

impl ReviewFormTemplate {
    /// Highest first, so the default choice is the best rating.
    pub fn rating_choices(&self) -> Vec<i32> {
        (MIN_RATING..=MAX_RATING).rev().collect()
    }

    pub fn is_selected(&self, rating: &i32) -> bool {
        self.input.rating.unwrap_or(MAX_RATING) == *rating
    }

    pub fn error_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

#[derive(Template)]
#[template(path = "my_reviews.html")]
pub struct MyReviewsTemplate {
    pub client: ClientCtx,
    pub page: Page<ReviewView>,
    pub paginator: Paginator,
}

#[derive(Deserialize)]
struct ReviewForm {
    csrf_token: String,
    #[serde(default)]
    rating: String,
    #[serde(default)]
    text: String,
}

impl ReviewForm {
    fn to_input(&self) -> ReviewInput {
        ReviewInput {
            rating: self.rating.trim().parse().ok(),
            text: self.text.trim().to_owned(),
        }
    }
}

#[derive(Deserialize)]
struct DeleteForm {
    csrf_token: String,
}

#[get("/reviews/new/{book_id}")]
async fn view_new_review(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    book_id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let profile = match client.require_roles(&cookies, &req, RoleSet::MEMBER) {
        Ok(profile) => profile,
        Err(resp) => return Ok(resp),
    };

    let book_id = book_id.into_inner();
    let detail = match catalog::get_book(db.get_ref(), book_id).await {
        Ok(detail) => detail,
        Err(e) => return library_error(&cookies, &req, "/", e),
    };

    let existing = reviews::find_for_book_and_user(db.get_ref(), book_id, profile.id)
        .await
        .map_err(|e| db_error("view_new_review", e))?;
    if existing.is_some() {
        return library_error(
            &cookies,
            &req,
            &format!("/books/{}", book_id),
            LibraryError::Duplicate,
        );
    }

    Ok(ReviewFormTemplate {
        client,
        book: detail.book,
        input: ReviewInput::default(),
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/reviews/new/{book_id}")]
async fn create_review(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    book_id: web::Path<i32>,
    form: web::Form<ReviewForm>,
) -> Result<HttpResponse, Error> {
    let profile = match client.require_roles(&cookies, &req, RoleSet::MEMBER) {
        Ok(profile) => profile,
        Err(resp) => return Ok(resp),
    };
    validate_csrf_token(&cookies, &form.csrf_token)?;

    let book_id = book_id.into_inner();
    let book_url = format!("/books/{}", book_id);
    let input = form.to_input();

    match reviews::submit_review(db.get_ref(), book_id, &profile, &input).await {
        Ok(_) => {
            flash::success(&cookies, "Review submitted. It will appear once approved.");
            Ok(redirect(&book_url))
        }
        Err(LibraryError::Validation(errors)) => {
            let detail = match catalog::get_book(db.get_ref(), book_id).await {
                Ok(detail) => detail,
                Err(e) => return library_error(&cookies, &req, "/", e),
            };
            Ok(ReviewFormTemplate {
                client,
                book: detail.book,
                input,
                errors,
            }
            .to_response())
        }
        Err(e) => library_error(&cookies, &req, &book_url, e),
    }
}

#[post("/reviews/{review_id}/delete")]
async fn delete_review(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    review_id: web::Path<i32>,
    form: web::Form<DeleteForm>,
) -> Result<HttpResponse, Error> {
    let profile = match client.require_roles(&cookies, &req, RoleSet::MEMBER) {
        Ok(profile) => profile,
        Err(resp) => return Ok(resp),
    };
    validate_csrf_token(&cookies, &form.csrf_token)?;

    match reviews::delete_review(db.get_ref(), review_id.into_inner(), &profile).await {
        Ok(()) => {
            flash::info(&cookies, "Review deleted.");
            let back = referrer(&req).unwrap_or_else(|| "/my_reviews".to_owned());
            Ok(redirect(&back))
        }
        Err(e) => library_error(&cookies, &req, "/my_reviews", e),
    }
}

#[get("/my_reviews")]
async fn view_my_reviews(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    let profile = match client.require_roles(&cookies, &req, RoleSet::MEMBER) {
        Ok(profile) => profile,
        Err(resp) => return Ok(resp),
    };

    let per_page = app_config::limits().reviews_per_page as usize;
    let page = reviews::list_mine(db.get_ref(), profile.id, query.number(), per_page)
        .await
        .map_err(|e| db_error("view_my_reviews", e))?;
    let paginator = Paginator::new("/my_reviews", &page);

    Ok(MyReviewsTemplate {
        client,
        page,
        paginator,
    }
    .to_response())
}

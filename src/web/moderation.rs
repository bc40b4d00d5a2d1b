use super::{db_error, library_error, redirect, PageQuery};
use crate::app_config;
use crate::flash;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::page::Page;
use crate::permission::RoleSet;
use crate::reviews::{self, ReviewStatus, ReviewView};
use crate::template::{Paginator, PaginatorToHtml};
use actix_web::{get, post, web, Error, HttpRequest, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_queue)
        .service(view_review)
        .service(approve_review)
        .service(reject_review);
}

#[derive(Template)]
#[template(path = "moderation.html")]
pub struct ModerationQueueTemplate {
    pub client: ClientCtx,
    pub page: Page<ReviewView>,
    pub paginator: Paginator,
}

#[derive(Template)]
#[template(path = "moderation_review.html")]
pub struct ModerationReviewTemplate {
    pub client: ClientCtx,
    pub review: ReviewView,
}

#[derive(Deserialize)]
struct ModerationForm {
    csrf_token: String,
}

#[get("/moderation")]
async fn view_queue(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    if let Err(resp) = client.require_roles(&cookies, &req, RoleSet::STAFF) {
        return Ok(resp);
    }

    let per_page = app_config::limits().reviews_per_page as usize;
    let page = reviews::list_pending(db.get_ref(), query.number(), per_page)
        .await
        .map_err(|e| db_error("view_queue", e))?;
    let paginator = Paginator::new("/moderation", &page);

    Ok(ModerationQueueTemplate {
        client,
        page,
        paginator,
    }
    .to_response())
}

#[get("/moderation/{review_id}")]
async fn view_review(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    review_id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    if let Err(resp) = client.require_roles(&cookies, &req, RoleSet::STAFF) {
        return Ok(resp);
    }

    match reviews::get_review(db.get_ref(), review_id.into_inner()).await {
        Ok(review) => Ok(ModerationReviewTemplate { client, review }.to_response()),
        Err(e) => library_error(&cookies, &req, "/moderation", e),
    }
}

async fn transition(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    review_id: i32,
    form: web::Form<ModerationForm>,
    status: ReviewStatus,
) -> Result<HttpResponse, Error> {
    if let Err(resp) = client.require_roles(&cookies, &req, RoleSet::STAFF) {
        return Ok(resp);
    }
    validate_csrf_token(&cookies, &form.csrf_token)?;

    match reviews::set_status(db.get_ref(), review_id, status).await {
        Ok(_) => {
            flash::success(
                &cookies,
                format!("Review status changed to \"{}\".", status.description()),
            );
            Ok(redirect("/moderation"))
        }
        Err(e) => library_error(&cookies, &req, "/moderation", e),
    }
}

#[post("/moderation/{review_id}/approve")]
async fn approve_review(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    review_id: web::Path<i32>,
    form: web::Form<ModerationForm>,
) -> Result<HttpResponse, Error> {
    transition(
        client,
        cookies,
        req,
        db,
        review_id.into_inner(),
        form,
        ReviewStatus::Approved,
    )
    .await
}

#[post("/moderation/{review_id}/reject")]
async fn reject_review(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    review_id: web::Path<i32>,
    form: web::Form<ModerationForm>,
) -> Result<HttpResponse, Error> {
    transition(
        client,
        cookies,
        req,
        db,
        review_id.into_inner(),
        form,
        ReviewStatus::Rejected,
    )
    .await
}

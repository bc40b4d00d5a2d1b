use super::{db_error, PageQuery};
use crate::app_config;
use crate::catalog::{self, BookSummary};
use crate::middleware::ClientCtx;
use crate::page::Page;
use crate::template::{Paginator, PaginatorToHtml};
use actix_web::{get, web, Error, Responder};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index);
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub client: ClientCtx,
    pub page: Page<BookSummary>,
    pub paginator: Paginator,
}

#[get("/")]
pub async fn view_index(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    query: web::Query<PageQuery>,
) -> Result<impl Responder, Error> {
    let per_page = app_config::limits().books_per_page as usize;
    let page = catalog::list_books(db.get_ref(), query.number(), per_page)
        .await
        .map_err(|e| db_error("view_index", e))?;
    let paginator = Paginator::new("/", &page);

    Ok(IndexTemplate {
        client,
        page,
        paginator,
    }
    .to_response())
}

pub mod book;
pub mod error;
pub mod index;
pub mod login;
pub mod logout;
pub mod moderation;
pub mod review;
pub mod upload;

use crate::error::LibraryError;
use crate::flash;
use crate::middleware::client_ctx::referrer;
use actix_session::Session;
use actix_web::http::header;
use actix_web::{error as web_error, Error, HttpRequest, HttpResponse};
use serde::Deserialize;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Descending order. Order is important.
    // Route resolution will stop at the first match.
    index::configure(conf);
    book::configure(conf);
    review::configure(conf);
    moderation::configure(conf);
    login::configure(conf);
    logout::configure(conf);
    upload::configure(conf);
}

/// 302 to `location`.
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, location))
        .finish()
}

/// `?page=N` on paginated listings. Anything unparsable means page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> usize {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .max(1)
    }
}

/// Turns a store error that is not a form validation failure into a response.
///
/// Duplicates and permission failures become a notice plus a redirect to
/// `fallback` (or the referring page for permission failures). Missing records
/// are a 404. Everything else is logged and reported as a 500.
pub(crate) fn library_error(
    cookies: &Session,
    req: &HttpRequest,
    fallback: &str,
    err: LibraryError,
) -> Result<HttpResponse, Error> {
    match err {
        LibraryError::Duplicate => {
            flash::warning(cookies, "You have already reviewed this book.");
            Ok(redirect(fallback))
        }
        LibraryError::PermissionDenied => {
            flash::danger(cookies, "You do not have permission to do that.");
            let back = referrer(req).unwrap_or_else(|| "/".to_owned());
            Ok(redirect(&back))
        }
        LibraryError::NotFound(what) => Err(web_error::ErrorNotFound(format!("{} not found.", what))),
        LibraryError::Validation(errors) => {
            log::debug!("{} {}: unhandled validation errors {:?}", req.method(), req.path(), errors);
            Err(web_error::ErrorBadRequest("Invalid input."))
        }
        LibraryError::Database(e) => {
            log::error!("{} {}: database error: {}", req.method(), req.path(), e);
            Err(web_error::ErrorInternalServerError("Database error."))
        }
        LibraryError::Storage(e) => {
            log::error!("{} {}: storage error: {}", req.method(), req.path(), e);
            Err(web_error::ErrorInternalServerError("Storage error."))
        }
    }
}

/// Logs a database failure and hides it behind a 500.
pub(crate) fn db_error(context: &str, e: impl std::fmt::Display) -> Error {
    log::error!("{}: {}", context, e);
    web_error::ErrorInternalServerError("Database error.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults_to_first_page() {
        let q = |p: Option<&str>| PageQuery {
            page: p.map(str::to_owned),
        };
        assert_eq!(q(None).number(), 1);
        assert_eq!(q(Some("3")).number(), 3);
        assert_eq!(q(Some("0")).number(), 1);
        assert_eq!(q(Some("abc")).number(), 1);
        assert_eq!(q(Some("-2")).number(), 1);
    }

    #[test]
    fn test_redirect_sets_location() {
        let resp = redirect("/books/4");
        assert_eq!(resp.status(), actix_web::http::StatusCode::FOUND);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/books/4");
    }
}

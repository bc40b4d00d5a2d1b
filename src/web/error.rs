use crate::middleware::ClientCtx;
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpMessage, HttpResponse, Result};
use askama_actix::Template;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    client: ClientCtx,
    code: u16,
    title: &'static str,
    message: &'static str,
}

pub fn render_400<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render(
        res,
        "Bad Request",
        "The request could not be understood. Please check the form and try again.",
    )
}

pub fn render_403<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render(
        res,
        "Forbidden",
        "This form has expired. Go back, reload the page and try again.",
    )
}

pub fn render_404<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render(
        res,
        "Not Found",
        "The page you are looking for does not exist.",
    )
}

pub fn render_500<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render(
        res,
        "Internal Server Error",
        "Something went wrong on our side. Please try again later.",
    )
}

/// Replaces the body of an error response with the error page, keeping the
/// status code. Error details stay in the log.
fn render<B>(
    res: ServiceResponse<B>,
    title: &'static str,
    message: &'static str,
) -> Result<ErrorHandlerResponse<B>> {
    let status = res.status();
    if let Some(e) = res.response().error() {
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("{} {}: {}", res.request().method(), res.request().path(), e);
        } else {
            log::debug!("{} {}: {}", res.request().method(), res.request().path(), e);
        }
    }

    let (req, _) = res.into_parts();
    let client = ClientCtx::get_or_default_from_extensions(&mut req.extensions_mut());
    let body = ErrorTemplate {
        client,
        code: status.as_u16(),
        title,
        message,
    }
    .render()
    .unwrap_or_else(|e| {
        log::error!("error page failed to render: {}", e);
        format!("{} {}", status.as_u16(), title)
    });

    let new = HttpResponse::build(status)
        .insert_header((header::CONTENT_TYPE, "text/html; charset=utf-8"))
        .body(body);

    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, new).map_into_right_body(),
    ))
}

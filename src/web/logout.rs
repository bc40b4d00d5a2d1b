use super::redirect;
use crate::flash;
use crate::middleware::client_ctx::referrer;
use crate::middleware::ClientCtx;
use crate::session;
use actix_web::{get, Error, HttpRequest, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_logout);
}

#[get("/logout")]
pub async fn view_logout(
    client: ClientCtx,
    cookies: actix_session::Session,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    if let Some(id) = client.get_id() {
        log::info!("user {} signed out", id);
    }
    session::logout(&cookies);
    flash::info(&cookies, "You have been signed out.");

    let back = referrer(&req).unwrap_or_else(|| "/".to_owned());
    Ok(redirect(&back))
}

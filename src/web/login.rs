use super::{db_error, redirect};
use crate::flash;
use crate::middleware::client_ctx::safe_next;
use crate::middleware::csrf::validate_csrf_token;
use crate::middleware::ClientCtx;
use crate::session;
use crate::user::{login, LoginResultStatus};
use actix_web::http::StatusCode;
use actix_web::{get, post, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_login).service(view_login);
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate<'a> {
    pub client: ClientCtx,
    pub username: &'a str,
    /// Local path to return to after signing in.
    pub next: &'a str,
    pub error: Option<&'a str>,
}

#[derive(Deserialize)]
pub struct LoginQuery {
    next: Option<String>,
}

#[derive(Deserialize)]
pub struct FormData {
    csrf_token: String,
    username: String,
    password: String,
    next: Option<String>,
}

#[post("/login")]
pub async fn post_login(
    client: ClientCtx,
    cookies: actix_session::Session,
    db: web::Data<DatabaseConnection>,
    form: web::Form<FormData>,
) -> Result<HttpResponse, Error> {
    validate_csrf_token(&cookies, &form.csrf_token)?;

    let next = safe_next(form.next.as_deref());
    let username = form.username.trim();

    let profile = match login(db.get_ref(), username, &form.password)
        .await
        .map_err(|e| db_error("post_login", e))?
    {
        LoginResultStatus::Success(profile) => profile,
        status @ (LoginResultStatus::BadName | LoginResultStatus::BadPassword) => {
            log::debug!("login failure: {:?} for {}", status, username);
            // Same message either way to avoid username enumeration.
            let mut resp = LoginTemplate {
                client,
                username,
                next,
                error: Some("Invalid username or password."),
            }
            .to_response();
            *resp.status_mut() = StatusCode::UNAUTHORIZED;
            return Ok(resp);
        }
    };

    session::login(&cookies, profile.id)?;
    log::info!("user {} signed in", profile.id);
    flash::success(&cookies, format!("Welcome, {}!", profile.full_name()));

    Ok(redirect(next))
}

#[get("/login")]
pub async fn view_login(
    client: ClientCtx,
    query: web::Query<LoginQuery>,
) -> Result<HttpResponse, Error> {
    let next = safe_next(query.next.as_deref());
    if client.is_user() {
        return Ok(redirect(next));
    }

    Ok(LoginTemplate {
        client,
        username: "",
        next,
        error: None,
    }
    .to_response())
}

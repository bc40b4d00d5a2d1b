use crate::flash::{self, Flash};
use crate::permission::{self, Access, RoleSet};
use crate::user::Profile;
use actix_session::{Session, SessionExt};
use actix_web::dev::{
    self, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::http::header;
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use futures::future::{ready, LocalBoxFuture, Ready};
use sea_orm::DatabaseConnection;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Client data stored for a single request cycle.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    /// User data. Optional. None is a guest user.
    pub client: Option<Profile>,
    /// Notices queued by the previous request.
    pub flashes: Vec<Flash>,
    /// CSRF token for form protection
    pub csrf_token: String,
    /// Time the request started for page load statistics.
    pub request_start: Instant,
}

impl Default for ClientCtxInner {
    fn default() -> Self {
        Self {
            client: None,
            flashes: Vec::new(),
            csrf_token: String::new(),
            request_start: Instant::now(),
        }
    }
}

impl ClientCtxInner {
    pub async fn from_session(session: &Session, db: &DatabaseConnection) -> Self {
        use crate::middleware::csrf::get_or_create_csrf_token;

        let client = match crate::session::get_user_id(session) {
            Some(user_id) => match Profile::get_by_id(db, user_id).await {
                Ok(Some(profile)) => Some(profile),
                Ok(None) => {
                    log::debug!("session references missing user {}", user_id);
                    crate::session::logout(session);
                    None
                }
                Err(e) => {
                    log::error!("ClientCtxInner::from_session: {}", e);
                    None
                }
            },
            None => None,
        };

        let csrf_token = get_or_create_csrf_token(session).unwrap_or_else(|_| String::new());
        let flashes = flash::take(session);

        ClientCtxInner {
            client,
            flashes,
            csrf_token,
            ..Default::default()
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug)]
pub struct ClientCtx(Data<ClientCtxInner>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self(Data::new(ClientCtxInner::default()))
    }
}

impl ClientCtx {
    /// Returns instance of Self with components required for ClientCtxInner.
    pub async fn from_session(session: &Session, db: &DatabaseConnection) -> Self {
        Self(Data::new(ClientCtxInner::from_session(session, db).await))
    }

    pub fn get_or_default_from_extensions(extensions: &mut Extensions) -> Self {
        match extensions.get::<Data<ClientCtxInner>>() {
            Some(cbox) => Self(cbox.clone()),
            None => {
                let cbox = Data::new(ClientCtxInner::default());
                extensions.insert(cbox.clone());
                Self(cbox)
            }
        }
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<i32> {
        self.0.client.as_ref().map(|u| u.id)
    }

    /// Returns either the user's name or the word for guest.
    pub fn get_name(&self) -> String {
        match &self.0.client {
            Some(user) => user.username.to_owned(),
            None => "Guest".to_owned(),
        }
    }

    pub fn get_user(&self) -> Option<&Profile> {
        self.0.client.as_ref()
    }

    pub fn get_csrf_token(&self) -> &str {
        &self.0.csrf_token
    }

    pub fn get_flashes(&self) -> &[Flash] {
        &self.0.flashes
    }

    pub fn is_user(&self) -> bool {
        self.0.client.is_some()
    }

    /// True if the current identity passes a route guard for `required`.
    pub fn has_any(&self, required: RoleSet) -> bool {
        permission::check(self.0.client.as_ref().map(|u| u.role), required) == Access::Allow
    }

    /// Template shorthand for book management and moderation links.
    pub fn is_staff(&self) -> bool {
        self.has_any(RoleSet::STAFF)
    }

    /// Template shorthand for the delete-book button.
    pub fn is_admin(&self) -> bool {
        self.has_any(RoleSet::ADMINISTRATOR)
    }

    /// Route guard. Returns the signed-in profile, or the redirect the handler
    /// must return as-is. Queues the matching notice.
    pub fn require_roles(
        &self,
        session: &Session,
        req: &HttpRequest,
        required: RoleSet,
    ) -> Result<Profile, HttpResponse> {
        match permission::check(self.0.client.as_ref().map(|u| u.role), required) {
            Access::Allow => match self.0.client.clone() {
                Some(profile) => Ok(profile),
                None => Err(crate::web::redirect("/login")),
            },
            Access::RedirectLogin => {
                flash::warning(session, "Please sign in to do that.");
                Err(crate::web::redirect(&login_url(req)))
            }
            Access::RedirectDenied => {
                log::warn!(
                    "access denied: user {:?} to {} {}",
                    self.get_id(),
                    req.method(),
                    req.path()
                );
                flash::danger(session, "You do not have permission to do that.");
                Err(crate::web::redirect("/"))
            }
        }
    }

    /// Returns Duration representing request time.
    pub fn request_time(&self) -> Duration {
        Instant::now() - self.0.request_start
    }

    /// Returns human readable representing request time.
    pub fn request_time_as_string(&self) -> String {
        let us = self.request_time().as_micros();
        if us > 5000 {
            format!("{}ms", us / 1000)
        } else {
            format!("{}μs", us)
        }
    }
}

/// `/login?next=<path and query>` for any method. After signing in the user
/// is sent to `next` with a GET, which for form posts is the form itself.
fn login_url(req: &HttpRequest) -> String {
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("/login?next={}", encoded)
}

/// Only local absolute paths are honoured as post-login targets.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') => {
            next
        }
        _ => "/",
    }
}

/// The Referer path, if present, for "go back" redirects.
pub fn referrer(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(ClientCtx::get_or_default_from_extensions(
            &mut req.extensions_mut(),
        )))
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ClientCtxMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ClientCtxMiddleware {
            service: Rc::new(service),
        }))
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        Box::pin(async move {
            // Without a database there is no identity to load; routes see a guest.
            if let Some(db) = req.app_data::<Data<DatabaseConnection>>().cloned() {
                let session = req.get_session();
                let inner = ClientCtxInner::from_session(&session, &db).await;
                req.extensions_mut().insert(Data::new(inner));
            }

            svc.call(req).await
        })
    }
}

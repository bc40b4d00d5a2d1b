use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{time::Duration as CookieDuration, Key, SameSite};
use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::middleware::{DefaultHeaders, ErrorHandlers, Logger};
use actix_web::web::{self, Data};
use actix_web::{App, HttpServer};
use anyhow::{bail, Context};
use bookshelf::app_config::{self, AppConfig};
use bookshelf::db::{create_schema, init_db};
use bookshelf::middleware::ClientCtx;
use bookshelf::seed;
use bookshelf::storage::{LocalStorage, StorageBackend};
use env_logger::Env;
use rand::{distributions::Alphanumeric, Rng};
use std::path::PathBuf;
use std::sync::Arc;

/// Minimum length `Key::from` accepts.
const SECRET_KEY_MIN_BYTES: usize = 64;

/// What to do this run. `serve` when no arguments are given.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Serve,
    FakeBooks(usize),
    FillCovers,
}

fn parse_command(args: &[String], default_count: usize) -> anyhow::Result<Command> {
    match args.first().map(String::as_str) {
        None | Some("serve") => Ok(Command::Serve),
        Some("fake-books") => {
            let count = match args.get(1) {
                Some(count) => count
                    .parse()
                    .with_context(|| format!("fake-books: invalid count {:?}", count))?,
                None => default_count,
            };
            Ok(Command::FakeBooks(count))
        }
        Some("fill-covers") => Ok(Command::FillCovers),
        Some(other) => bail!(
            "unknown command {:?}; expected serve, fake-books [count] or fill-covers",
            other
        ),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    init_our_mods();

    let config = app_config::get_config();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args, config.seed.book_count as usize)?;

    let db = init_db(&config.database.url)
        .await
        .context("database connection failed")?;
    create_schema(&db).await.context("schema creation failed")?;

    let storage: Arc<dyn StorageBackend> = Arc::new(
        LocalStorage::new(PathBuf::from(&config.storage.upload_dir))
            .context("upload directory is not usable")?,
    );

    match command {
        Command::FakeBooks(count) => {
            seed::seed_reference_data(&db).await?;
            let created = seed::generate_books(&db, &mut rand::thread_rng(), count).await?;
            log::info!("fake-books: added {} books", created);
            return Ok(());
        }
        Command::FillCovers => {
            let source = seed::PicsumSource::new(&config.seed.cover_source_url)?;
            let (created, linked) = seed::fill_covers(&db, storage.as_ref(), &source).await?;
            log::info!("fill-covers: new={}, linked to existing={}", created, linked);
            return Ok(());
        }
        Command::Serve => {}
    }

    seed::seed(&db, &mut rand::thread_rng(), config.seed.book_count as usize).await?;

    let secret_key = session_key(&config);
    let session_ttl = CookieDuration::hours(config.security.session_ttl_hours as i64);
    let db = Data::new(db);
    let storage: Data<dyn StorageBackend> = Data::from(storage);

    log::info!("Listening on {}", config.site.bind);

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .app_data(db.clone())
            .app_data(storage.clone())
            .app_data(web::FormConfig::default().limit(64 * 1024))
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_FRAME_OPTIONS, "DENY"))
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
            )
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::BAD_REQUEST, bookshelf::web::error::render_400)
                    .handler(StatusCode::FORBIDDEN, bookshelf::web::error::render_403)
                    .handler(StatusCode::NOT_FOUND, bookshelf::web::error::render_404)
                    .handler(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        bookshelf::web::error::render_500,
                    ),
            )
            .wrap(ClientCtx::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_same_site(SameSite::Lax)
                    .cookie_secure(false) // Allow HTTP for development
                    .session_lifecycle(PersistentSession::default().session_ttl(session_ttl))
                    .build(),
            )
            .wrap(Logger::new("%a %r %s %Dms"))
            .configure(bookshelf::web::configure)
    })
    .bind(&config.site.bind)?
    .run()
    .await?;

    Ok(())
}

/// The configured signing key, or a throwaway one if it is missing or short.
fn session_key(config: &AppConfig) -> Key {
    let secret = config.security.secret_key.as_bytes();
    if secret.len() >= SECRET_KEY_MIN_BYTES {
        return Key::from(secret);
    }

    let random_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(128)
        .map(char::from)
        .collect();
    log::warn!("SECRET_KEY is missing or shorter than {} bytes.\r\nThis means the key used for signing session cookies will invalidate every time the application is restarted.\r\n\r\nNeed a key? How about:\r\n{}", SECRET_KEY_MIN_BYTES, random_string);
    Key::from(random_string.as_bytes())
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    // A missing .env is normal outside development.
    if let Err(e) = dotenv::dotenv() {
        eprintln!("dotenv: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Initialize all local mods.
pub fn init_our_mods() {
    app_config::init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(&args(&[]), 40).unwrap(), Command::Serve);
        assert_eq!(parse_command(&args(&["serve"]), 40).unwrap(), Command::Serve);
        assert_eq!(
            parse_command(&args(&["fake-books"]), 40).unwrap(),
            Command::FakeBooks(40)
        );
        assert_eq!(
            parse_command(&args(&["fake-books", "7"]), 40).unwrap(),
            Command::FakeBooks(7)
        );
        assert_eq!(
            parse_command(&args(&["fill-covers"]), 40).unwrap(),
            Command::FillCovers
        );
        assert!(parse_command(&args(&["fake-books", "many"]), 40).is_err());
        assert!(parse_command(&args(&["migrate"]), 40).is_err());
    }
}

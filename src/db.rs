//! Database connection and schema bootstrap.

use crate::orm::{book_genres, books, covers, genres, review_statuses, reviews, roles, users};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
    Statement,
};

/// Unique indexes the entity derive cannot express.
const INDEXES: [&str; 2] = [
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_book_user ON reviews (book_id, user_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_book_genres_book_genre ON book_genres (book_id, genre_id)",
];

/// Opens a connection pool. SQLite pools are pinned to a single connection so
/// in-memory databases are shared by every query.
pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(false);
    if database_url.starts_with("sqlite:") {
        options.max_connections(1);
    }

    let db = Database::connect(options).await?;
    log::info!("Connected to database");
    Ok(db)
}

/// Creates all tables and indexes that do not exist yet. Parents first.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, roles::Entity).await?;
    create_table(db, users::Entity).await?;
    create_table(db, genres::Entity).await?;
    create_table(db, covers::Entity).await?;
    create_table(db, books::Entity).await?;
    create_table(db, book_genres::Entity).await?;
    create_table(db, review_statuses::Entity).await?;
    create_table(db, reviews::Entity).await?;

    let backend = db.get_database_backend();
    for sql in INDEXES {
        db.execute(Statement::from_string(backend, sql.to_owned()))
            .await?;
    }

    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

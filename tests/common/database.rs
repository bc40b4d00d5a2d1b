//! Test database setup and management
#![allow(dead_code)]

use sea_orm::{DatabaseConnection, DbErr};

/// A fresh in-memory database with the schema and reference rows
/// (roles, review statuses, genres) in place.
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    let db = bookshelf::db::init_db("sqlite::memory:").await?;
    bookshelf::db::create_schema(&db).await?;
    bookshelf::seed::seed_reference_data(&db).await?;
    Ok(db)
}

/// Row count of any entity.
pub async fn count<E>(db: &DatabaseConnection) -> usize
where
    E: sea_orm::EntityTrait,
    E::Model: Send + Sync + 'static,
{
    use sea_orm::PaginatorTrait;

    E::find().count(db).await.expect("count query failed")
}

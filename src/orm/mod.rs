//! SeaORM entities for the catalog schema.

pub mod book_genres;
pub mod books;
pub mod covers;
pub mod genres;
pub mod review_statuses;
pub mod reviews;
pub mod roles;
pub mod users;

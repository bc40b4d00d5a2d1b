//! Application-wide constants
//!
//! Reference data names and form limits shared by the stores, the seeder and
//! the templates.

/// Earliest publication year accepted by the book form.
pub const MIN_BOOK_YEAR: i32 = 1000;

/// Latest publication year accepted by the book form.
pub const MAX_BOOK_YEAR: i32 = 2100;

/// Lowest rating a review may carry.
pub const MIN_RATING: i32 = 0;

/// Highest rating a review may carry.
pub const MAX_RATING: i32 = 5;

/// Tags which survive markdown sanitization. Everything else is stripped.
pub const ALLOWED_HTML_TAGS: [&str; 13] = [
    "p",
    "ul",
    "ol",
    "li",
    "strong",
    "em",
    "code",
    "pre",
    "blockquote",
    "h1",
    "h2",
    "h3",
    "br",
];

/// Displayed for reviews whose author row has vanished.
pub const UNKNOWN_USERNAME: &str = "Unknown";

//! One page of an ordered listing.

use sea_orm::{ConnectionTrait, DbErr, EntityTrait, FromQueryResult, PaginatorTrait, Select};

/// Items of a 1-based page plus the totals needed for navigation.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number that was requested, clamped to at least 1.
    pub number: usize,
    pub page_count: usize,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Swaps in a different item list, keeping the paging information.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            number: self.number,
            page_count: self.page_count,
            total: self.total,
        }
    }

    /// Maps the items, keeping the paging information.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            page_count: self.page_count,
            total: self.total,
        }
    }
}

/// Fetches page `number` (1-based) of `select`. Pages past the end are empty.
pub async fn fetch_page<C, E>(
    db: &C,
    select: Select<E>,
    number: usize,
    per_page: usize,
) -> Result<Page<E::Model>, DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: FromQueryResult + Sized + Send + Sync + 'static,
{
    let number = number.max(1);
    let paginator = select.paginate(db, per_page.max(1));
    let total = paginator.num_items().await?;
    let page_count = paginator.num_pages().await?;
    let items = paginator.fetch_page(number - 1).await?;

    Ok(Page {
        items,
        number,
        page_count,
        total,
    })
}

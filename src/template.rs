use crate::page::Page;
use askama_actix::Template;

const PAGINATOR_LOOK_AHEAD: usize = 2;

/// [1] 2 3 ... 13
/// 1 2 3 4 [5] 6 7 ... 13
/// 1 ... 4 5 [6] 7 8 ... 13
/// 1 ... 9 10 [11] 12 13
#[derive(Debug)]
pub struct Paginator {
    /// Path the `page` query parameter is appended to.
    pub base_url: String,
    pub this_page: usize,
    pub page_count: usize,
}

#[derive(Template)]
#[template(path = "util/paginator.html")]
struct PaginatorTemplate<'a> {
    paginator: &'a Paginator,
}

pub trait PaginatorToHtml {
    fn as_html(&self) -> String;
    fn has_pages(&self) -> bool;
    fn is_current_page(&self, page: &usize) -> bool;
    fn page_url(&self, page: &usize) -> String;
    /// Page numbers to link, with `None` standing for a gap.
    fn get_pages(&self) -> Vec<Option<usize>>;
}

impl Paginator {
    pub fn new<T>(base_url: &str, page: &Page<T>) -> Self {
        Self {
            base_url: base_url.to_owned(),
            this_page: page.number,
            page_count: page.page_count,
        }
    }
}

impl PaginatorToHtml for Paginator {
    fn has_pages(&self) -> bool {
        self.page_count > 1
    }

    fn is_current_page(&self, page: &usize) -> bool {
        *page == self.this_page
    }

    fn page_url(&self, page: &usize) -> String {
        format!("{}?page={}", self.base_url, page)
    }

    fn get_pages(&self) -> Vec<Option<usize>> {
        if self.page_count == 0 {
            return Vec::new();
        }

        let cursor = self.this_page.clamp(1, self.page_count);
        let lo = cursor.saturating_sub(PAGINATOR_LOOK_AHEAD).max(1);
        let hi = (cursor + PAGINATOR_LOOK_AHEAD).min(self.page_count);

        let mut wanted = vec![1];
        wanted.extend(lo..=hi);
        wanted.push(self.page_count);
        wanted.dedup();

        let mut pages = Vec::with_capacity(wanted.len() + 2);
        let mut last = 0;
        for page in wanted {
            if page <= last {
                continue;
            }
            match page - last {
                1 => {}
                // A gap of one page is cheaper to show than an ellipsis.
                2 => pages.push(Some(last + 1)),
                _ => pages.push(None),
            }
            pages.push(Some(page));
            last = page;
        }
        pages
    }

    fn as_html(&self) -> String {
        if self.has_pages() {
            let mut buffer = String::new();
            let template = PaginatorTemplate { paginator: self };
            if template.render_into(&mut buffer).is_err() {
                "[Paginator Util Error]".to_owned()
            } else {
                buffer
            }
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paginator(this_page: usize, page_count: usize) -> Paginator {
        Paginator {
            base_url: "/".to_owned(),
            this_page,
            page_count,
        }
    }

    fn render(pages: Vec<Option<usize>>) -> String {
        pages
            .into_iter()
            .map(|p| match p {
                Some(n) => n.to_string(),
                None => "..".to_owned(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_first_page() {
        assert_eq!(render(paginator(1, 13).get_pages()), "1 2 3 .. 13");
    }

    #[test]
    fn test_middle_page() {
        assert_eq!(render(paginator(6, 13).get_pages()), "1 .. 4 5 6 7 8 .. 13");
    }

    #[test]
    fn test_near_edges_fill_single_gaps() {
        assert_eq!(render(paginator(4, 13).get_pages()), "1 2 3 4 5 6 .. 13");
        assert_eq!(render(paginator(11, 13).get_pages()), "1 .. 9 10 11 12 13");
    }

    #[test]
    fn test_single_page_renders_nothing() {
        let p = paginator(1, 1);
        assert!(!p.has_pages());
        assert_eq!(p.as_html(), "");
        assert!(paginator(1, 0).get_pages().is_empty());
    }

    #[test]
    fn test_page_url() {
        let p = Paginator {
            base_url: "/my_reviews".to_owned(),
            this_page: 2,
            page_count: 3,
        };
        assert_eq!(p.page_url(&3), "/my_reviews?page=3");
        assert!(p.is_current_page(&2));
    }
}

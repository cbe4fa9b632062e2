//! Page arithmetic for the feed and gallery

use serde::Serialize;

/// Splits a counted list into fixed-size pages
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

/// One resolved page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub number: i64,
    pub num_pages: i64,
    pub per_page: i64,
    pub count: i64,
}

impl Paginator {
    /// `per_page` values below 1 are treated as 1
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    /// Number of pages; an empty list still has one page
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// Resolve a raw `?page=` value
    ///
    /// Non-numeric or missing input gives the first page; numbers outside
    /// the valid range give the last page.
    pub fn page(&self, raw: Option<&str>) -> Page {
        let num_pages = self.num_pages();
        let number = match raw.map(str::trim).map(str::parse::<i64>) {
            Some(Ok(n)) if (1..=num_pages).contains(&n) => n,
            Some(Ok(_)) => num_pages,
            _ => 1,
        };

        Page {
            number,
            num_pages,
            per_page: self.per_page,
            count: self.count,
        }
    }
}

impl Page {
    /// Row offset of the first item on this page
    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous(&self) -> Option<i64> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn next(&self) -> Option<i64> {
        self.has_next().then(|| self.number + 1)
    }

    /// Page two back, shown as an extra jump link
    pub fn previous_previous(&self) -> Option<i64> {
        (self.number > 2).then(|| self.number - 2)
    }

    /// Page two ahead, shown as an extra jump link
    pub fn next_next(&self) -> Option<i64> {
        (self.number < self.num_pages - 1).then(|| self.number + 2)
    }
}

/// Feed page holding an item at 1-based `rank`
pub fn page_for_rank(rank: i64, per_page: i64) -> i64 {
    let per_page = per_page.max(1);
    ((rank.max(1) + per_page - 1) / per_page).max(1)
}

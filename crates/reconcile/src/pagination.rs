//! Pagination collector
//!
//! Drains page-based listing endpoints. GitLab endpoints are inconsistent about
//! how they say "done": some send an explicit next-page cursor of 0 (or omit
//! it), some just return an empty page. Both are honored here.
//!
//! Listings are lazy and restart from page 1 on every call; nothing is cached.

use crate::context::Context;
use crate::error::{Error, Result};

/// Page size used when the caller has no preference.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Largest page size GitLab accepts.
pub const MAX_PER_PAGE: u32 = 100;

/// One page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
}

impl PageRequest {
    /// Request for the first page, with `per_page` clamped to `1..=MAX_PER_PAGE`.
    pub fn first(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    fn at(self, page: u32) -> Self {
        Self { page, ..self }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PER_PAGE)
    }
}

/// Next-page signal reported with a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPage {
    /// There is a next page with this number.
    Page(u32),
    /// The server says this was the last page.
    Done,
    /// The server sent no cursor at all.
    Unknown,
}

impl NextPage {
    /// Interpret an `X-Next-Page` style header value.
    ///
    /// A missing header is `Unknown`; an empty value or `0` is `Done`.
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Unknown;
        };
        match value.trim() {
            "" | "0" => Self::Done,
            other => other.parse().map_or(Self::Unknown, |page: u32| {
                if page == 0 { Self::Done } else { Self::Page(page) }
            }),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page, in server order.
    pub items: Vec<T>,
    /// What the server said about the next page.
    pub next: NextPage,
}

impl<T> Page<T> {
    /// A page with an explicit cursor.
    pub fn new(items: Vec<T>, next: NextPage) -> Self {
        Self { items, next }
    }

    /// A page without any cursor information.
    pub fn uncursored(items: Vec<T>) -> Self {
        Self::new(items, NextPage::Unknown)
    }
}

/// Lazy iterator over the items of every page.
///
/// The first failing request ends the iteration after yielding its error.
pub struct Pages<'a, T, F> {
    ctx: &'a Context,
    fetch: F,
    request: Option<PageRequest>,
    buffer: std::vec::IntoIter<T>,
    requests: usize,
}

impl<T, F> Pages<'_, T, F> {
    /// Number of page requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests
    }
}

impl<T, F> Pages<'_, T, F>
where
    F: FnMut(PageRequest) -> Result<Page<T>>,
{
    fn fetch_next(&mut self, request: PageRequest) -> Result<()> {
        self.ctx.check(&format!("page {}", request.page))?;

        let page = (self.fetch)(request)?;
        self.requests += 1;

        let count = page.items.len();
        self.request = match page.next {
            _ if count == 0 => None,
            NextPage::Done => None,
            NextPage::Unknown if count < request.per_page as usize => None,
            NextPage::Unknown => request.page.checked_add(1).map(|next| request.at(next)),
            NextPage::Page(next) if next <= request.page => {
                return Err(Error::PaginationStalled {
                    page: request.page,
                    next,
                });
            }
            NextPage::Page(next) => Some(request.at(next)),
        };

        log::trace!(
            "page {} returned {count} items, next {:?}",
            request.page,
            self.request.map(|r| r.page)
        );

        self.buffer = page.items.into_iter();
        Ok(())
    }
}

impl<T, F> Iterator for Pages<'_, T, F>
where
    F: FnMut(PageRequest) -> Result<Page<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }
            let request = self.request.take()?;
            if let Err(err) = self.fetch_next(request) {
                self.request = None;
                return Some(Err(err));
            }
        }
    }
}

/// Iterate lazily over every item of a paginated listing.
pub fn pages<T, F>(ctx: &Context, per_page: u32, fetch: F) -> Pages<'_, T, F>
where
    F: FnMut(PageRequest) -> Result<Page<T>>,
{
    Pages {
        ctx,
        fetch,
        request: Some(PageRequest::first(per_page)),
        buffer: Vec::new().into_iter(),
        requests: 0,
    }
}

/// Collect every item of a paginated listing.
///
/// All-or-nothing: if any page fails, items collected so far are dropped and
/// the error is returned.
pub fn collect<T, F>(ctx: &Context, per_page: u32, fetch: F) -> Result<Vec<T>>
where
    F: FnMut(PageRequest) -> Result<Page<T>>,
{
    pages(ctx, per_page, fetch).collect()
}

/// Return the first item matching `predicate`, fetching no more pages than needed.
pub fn find_first<T, F, P>(
    ctx: &Context,
    per_page: u32,
    fetch: F,
    mut predicate: P,
) -> Result<Option<T>>
where
    F: FnMut(PageRequest) -> Result<Page<T>>,
    P: FnMut(&T) -> bool,
{
    for item in pages(ctx, per_page, fetch) {
        let item = item?;
        if predicate(&item) {
            return Ok(Some(item));
        }
    }
    Ok(None)
}

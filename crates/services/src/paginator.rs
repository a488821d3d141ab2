//! Splits an ordered thread listing into fixed-size pages.

use domains::{DomainError, Result, Thread};

/// One page of items, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub number: usize,
    pub items: Vec<T>,
}

/// Partitions `items` into pages of `per_page`, keeping input order.
///
/// `N` items yield `N / per_page` full pages plus one page holding the
/// remainder when `N % per_page != 0`. No empty trailing page is produced,
/// and an empty input yields no pages at all.
pub fn paginate<T>(items: Vec<T>, per_page: usize) -> Result<Vec<Page<T>>> {
    if per_page == 0 {
        return Err(DomainError::validation("page size must be at least 1"));
    }
    let full_pages = items.len() / per_page;
    let remainder = items.len() % per_page;

    let mut pages = Vec::with_capacity(full_pages + usize::from(remainder > 0));
    let mut iter = items.into_iter();
    for number in 1..=full_pages {
        pages.push(Page {
            number,
            items: iter.by_ref().take(per_page).collect(),
        });
    }
    if remainder > 0 {
        pages.push(Page {
            number: full_pages + 1,
            items: iter.collect(),
        });
    }
    Ok(pages)
}

/// Board ordering: stickied threads first, then most recently bumped.
/// The sort is stable, so ties keep their input order.
pub fn sort_for_listing<T>(items: &mut [T], thread_of: impl Fn(&T) -> &Thread) {
    items.sort_by(|a, b| {
        let (a, b) = (thread_of(a), thread_of(b));
        b.stickied
            .cmp(&a.stickied)
            .then_with(|| b.last_bump.cmp(&a.last_bump))
    });
}

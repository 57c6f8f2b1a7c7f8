use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// Query parameters selecting one page of a listing.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct PageParams {
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn first_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        PageParams {
            page: first_page(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageParams {
    /// Clamp into the accepted range: pages start at 1, sizes at 1..=100.
    pub fn normalized(self) -> Self {
        PageParams {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageInfo {
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_info: PageInfo,
}

/// Cut one page out of `items`. A page past the end is empty.
pub fn paginate<T>(items: Vec<T>, params: PageParams) -> Page<T> {
    let PageParams { page, page_size } = params.normalized();
    let total = items.len();
    let pages = total.div_ceil(page_size);

    let items: Vec<T> = items
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Page {
        items,
        page_info: PageInfo {
            total,
            page,
            page_size,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        },
    }
}

//! Page requests and page results.

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    Name,
    #[default]
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Sort order for document listings. Ties are broken by id ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl DocumentSort {
    pub fn order_by_sql(&self) -> &'static str {
        match (self.field, self.direction) {
            (SortField::Name, SortDirection::Asc) => {
                "documents.name COLLATE NOCASE ASC, documents.id ASC"
            }
            (SortField::Name, SortDirection::Desc) => {
                "documents.name COLLATE NOCASE DESC, documents.id ASC"
            }
            (SortField::UpdatedAt, SortDirection::Asc) => {
                "documents.updated_at ASC, documents.id ASC"
            }
            (SortField::UpdatedAt, SortDirection::Desc) => {
                "documents.updated_at DESC, documents.id ASC"
            }
        }
    }
}

/// Zero-based page index, optional size and sort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    /// Defaults to 20 and clamps to 100.
    pub size: Option<u32>,
    pub sort: DocumentSort,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: Some(size),
            sort: DocumentSort::default(),
        }
    }

    pub fn sorted_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort = DocumentSort { field, direction };
        self
    }

    pub fn applied_size(&self) -> u32 {
        normalize_page_size(self.size)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.applied_size())
    }
}

/// Normalizes a page size according to the listing contract.
pub fn normalize_page_size(size: Option<u32>) -> u32 {
    match size {
        Some(0) | None => DEFAULT_PAGE_SIZE,
        Some(value) if value > MAX_PAGE_SIZE => MAX_PAGE_SIZE,
        Some(value) => value,
    }
}

/// One page of results plus the total element count across all pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(u64::from(self.size))
    }

    pub fn is_last(&self) -> bool {
        u64::from(self.page) + 1 >= self.total_pages()
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_page_size, Page, PageRequest};

    #[test]
    fn page_size_defaults_and_clamps() {
        assert_eq!(normalize_page_size(None), 20);
        assert_eq!(normalize_page_size(Some(0)), 20);
        assert_eq!(normalize_page_size(Some(7)), 7);
        assert_eq!(normalize_page_size(Some(5_000)), 100);
    }

    #[test]
    fn offset_uses_applied_size() {
        assert_eq!(PageRequest::new(3, 10).offset(), 30);
        assert_eq!(PageRequest::new(2, 1_000).offset(), 200);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = Page {
            items: vec![1, 2],
            page: 2,
            size: 2,
            total_elements: 5,
        };
        assert_eq!(page.total_pages(), 3);
        assert!(page.is_last());
        assert_eq!(page.map(|n| n * 10).items, vec![10, 20]);
    }
}

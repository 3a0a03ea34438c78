//! Page descriptor and listing result

/// (limit, offset, sort) triple controlling a listing
///
/// `sort` is an ordering directive such as `"id desc"`; it is forwarded to
/// the persistence port verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageRequest {
    /// `None` returns every row after `offset`
    pub limit: Option<usize>,
    pub offset: usize,
    pub sort: String,
}

impl PageRequest {
    pub fn new(limit: usize, offset: usize, sort: impl Into<String>) -> Self {
        Self {
            limit: Some(limit),
            offset,
            sort: sort.into(),
        }
    }

    /// Every row, in store order
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }
}

/// One page of results plus the total number of matching rows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

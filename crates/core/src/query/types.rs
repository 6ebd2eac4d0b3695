use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::predicate::Predicate;
use crate::record::Record;

/// Page request with a 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
}

impl Pagination {
    pub const DEFAULT_SIZE: u32 = 50;
    pub const MAX_SIZE: u32 = 1000;

    /// Creates a page request, clamping page to at least 1 and size into
    /// `1..=MAX_SIZE`.
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page: page.max(1),
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.size as usize
    }

    pub fn limit(&self) -> usize {
        self.size as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{}:{}", self.field, dir)
    }
}

impl FromStr for Sort {
    type Err = String;

    /// Parses `field`, `field:asc` or `field:desc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, dir) = match s.split_once(':') {
            Some((field, dir)) => (field, dir),
            None => (s, "asc"),
        };
        if field.is_empty() {
            return Err(format!("invalid sort: {s}"));
        }
        match dir.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::asc(field)),
            "desc" => Ok(Self::desc(field)),
            other => Err(format!("invalid sort direction: {other}")),
        }
    }
}

/// A compiled list request handed to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub predicate: Predicate,
    pub pagination: Option<Pagination>,
    pub sort: Vec<Sort>,
}

impl ListQuery {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            pagination: None,
            sort: Vec::new(),
        }
    }

    pub fn with_pagination(mut self, pagination: Option<Pagination>) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_sort(mut self, sort: Vec<Sort>) -> Self {
        self.sort = sort;
        self
    }

    /// Cache fingerprint covering predicate, paging and ordering.
    pub fn fingerprint(&self) -> String {
        let page = match self.pagination {
            Some(p) => format!("p{}x{}", p.page, p.size),
            None => "all".to_string(),
        };
        let sort = self
            .sort
            .iter()
            .map(Sort::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!("{}|{}|{}", self.predicate.fingerprint(), page, sort)
    }
}

/// One page of records plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListResult {
    pub items: Vec<Record>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::new(0, 0);
        assert_eq!(p, Pagination { page: 1, size: 1 });
        assert_eq!(Pagination::new(3, 5000).size, Pagination::MAX_SIZE);
    }

    #[test]
    fn test_pagination_offset() {
        assert_eq!(Pagination::new(1, 20).offset(), 0);
        assert_eq!(Pagination::new(3, 20).offset(), 40);
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!("name".parse::<Sort>().unwrap(), Sort::asc("name"));
        assert_eq!("amount:DESC".parse::<Sort>().unwrap(), Sort::desc("amount"));
        assert!("amount:sideways".parse::<Sort>().is_err());
        assert!(":asc".parse::<Sort>().is_err());
    }

    #[test]
    fn test_fingerprint_includes_paging_and_sort() {
        let base = ListQuery::new(Predicate::eq("status", "normal"));
        let paged = base.clone().with_pagination(Some(Pagination::new(2, 10)));
        let sorted = base.clone().with_sort(vec![Sort::desc("amount")]);

        assert_ne!(base.fingerprint(), paged.fingerprint());
        assert_ne!(base.fingerprint(), sorted.fingerprint());
        assert_eq!(base.fingerprint(), base.clone().fingerprint());
    }
}

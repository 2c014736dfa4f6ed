// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::query_error::QueryError;

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageParams {
    /// `page` is 1-based; `pageSize` is bounded to 1..=100. Absent values
    /// take the defaults, malformed ones are rejected.
    pub fn parse(page: Option<&str>, page_size: Option<&str>) -> Result<Self, QueryError> {
        let page = match page {
            None => 1,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| QueryError::validation("page", "page must be an integer >= 1"))?,
        };
        let page_size = match page_size {
            None => DEFAULT_PAGE_SIZE,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
                .ok_or_else(|| {
                    QueryError::validation(
                        "pageSize",
                        format!("pageSize must be between 1 and {MAX_PAGE_SIZE}"),
                    )
                })?,
        };
        Ok(Self { page, page_size })
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    #[must_use]
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_absent() {
        assert_eq!(PageParams::parse(None, None).expect("defaults"), PageParams::default());
    }

    #[test]
    fn bounds_are_enforced() {
        assert!(PageParams::parse(Some("0"), None).is_err());
        assert!(PageParams::parse(Some("-1"), None).is_err());
        assert!(PageParams::parse(None, Some("101")).is_err());
        assert!(PageParams::parse(None, Some("0")).is_err());
        let err = PageParams::parse(None, Some("abc")).expect_err("invalid");
        assert_eq!(err.param, "pageSize");
        let p = PageParams::parse(Some("3"), Some("100")).expect("valid");
        assert_eq!(p.offset(), 200);
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = PageParams { page: 1, page_size: 25 };
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(25), 1);
        assert_eq!(p.total_pages(26), 2);
    }
}

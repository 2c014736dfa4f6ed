// SPDX-License-Identifier: Apache-2.0

use rusqlite::types::Value;
use unicode_normalization::UnicodeNormalization;

use crate::page::PageParams;
use crate::sort::SortSpec;

pub const MAX_SEARCH_LEN: usize = 100;

/// One typed predicate on a descriptor column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    Gte(&'static str, Value),
    Lte(&'static str, Value),
    In(&'static str, Vec<Value>),
}

impl Filter {
    #[must_use]
    pub fn column(&self) -> &'static str {
        match self {
            Self::Eq(c, _) | Self::Gte(c, _) | Self::Lte(c, _) | Self::In(c, _) => c,
        }
    }
}

/// Everything a list endpoint needs besides the tenant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub page: PageParams,
    pub sort: SortSpec,
    pub search: Option<String>,
    pub filters: Vec<Filter>,
}

#[must_use]
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            '!' | '%' | '_' => {
                out.push('!');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// NFKC then lowercase, trimmed.
#[must_use]
pub fn normalize_search(input: &str) -> String {
    input.trim().nfkc().collect::<String>().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off!"), "50!%!_off!!");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn search_terms_fold_width_and_case() {
        assert_eq!(normalize_search("  ＩＳＴＡＮＢＵＬ "), "istanbul");
        assert_eq!(normalize_search("Kapadokya"), "kapadokya");
    }
}

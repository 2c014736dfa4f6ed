// SPDX-License-Identifier: Apache-2.0

use crate::query_error::{QueryError, QueryErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub descending: bool,
}

/// Ordered sort keys. Always ends with `id` so paging is stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            keys: vec![SortKey {
                column: "id",
                descending: false,
            }],
        }
    }
}

impl SortSpec {
    /// Parses `-created_at,name`. A leading `-` sorts descending. Fields must
    /// be in `allowed`; `default` is used when `raw` is absent or blank.
    pub fn parse(
        raw: Option<&str>,
        allowed: &[&'static str],
        default: &str,
    ) -> Result<Self, QueryError> {
        let text = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(default);
        let mut keys: Vec<SortKey> = Vec::new();
        for part in text.split(',').map(str::trim) {
            let (descending, name) = match part.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, part.strip_prefix('+').unwrap_or(part)),
            };
            let column = allowed.iter().copied().find(|c| *c == name).ok_or_else(|| {
                QueryError::new(
                    QueryErrorCode::UnknownField,
                    "sort",
                    format!("cannot sort by `{name}`; allowed: {}", allowed.join(", ")),
                )
            })?;
            if keys.iter().any(|k| k.column == column) {
                return Err(QueryError::validation(
                    "sort",
                    format!("sort field `{name}` listed twice"),
                ));
            }
            keys.push(SortKey { column, descending });
        }
        if !keys.iter().any(|k| k.column == "id") {
            keys.push(SortKey {
                column: "id",
                descending: false,
            });
        }
        Ok(Self { keys })
    }

    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// `ORDER BY` body, e.g. `created_at DESC, id ASC`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{} {}", k.column, if k.descending { "DESC" } else { "ASC" }))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Wire form echoed in list metadata.
    #[must_use]
    pub fn as_param(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{}{}", if k.descending { "-" } else { "" }, k.column))
            .collect::<Vec<_>>()
            .join(",")
    }
}

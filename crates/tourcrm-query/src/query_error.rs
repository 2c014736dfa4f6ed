// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueryErrorCode {
    Validation,
    UnknownField,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub code: QueryErrorCode,
    /// Query parameter the error refers to.
    pub param: String,
    pub message: String,
}

impl QueryError {
    #[must_use]
    pub fn new(code: QueryErrorCode, param: &str, message: impl Into<String>) -> Self {
        Self {
            code,
            param: param.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(param: &str, message: impl Into<String>) -> Self {
        Self::new(QueryErrorCode::Validation, param, message)
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.param, self.message)
    }
}

impl std::error::Error for QueryError {}

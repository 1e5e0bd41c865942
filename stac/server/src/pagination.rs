//! Page sizes and continuation tokens shared by item listings and search.

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 10_000;

const TOKEN_PREFIX: &str = "next:";
const MAX_OFFSET: u64 = i64::MAX as u64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid pagination token '{0}'")]
pub struct InvalidToken(pub String);

/// Clamps a requested page size into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Decodes a `next:{offset}` token into an offset. No token means the first page.
///
/// Offsets are bound as signed 64-bit integers, so anything above `i64::MAX` is invalid.
pub fn parse_token(token: Option<&str>) -> Result<u64, InvalidToken> {
    match token {
        None => Ok(0),
        Some(token) => token
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|offset| offset.parse::<u64>().ok())
            .filter(|offset| *offset <= MAX_OFFSET)
            .ok_or_else(|| InvalidToken(token.to_string())),
    }
}

pub fn format_token(offset: u64) -> String {
    format!("{}{}", TOKEN_PREFIX, offset)
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub matched: u64,
    pub offset: u64,
}

impl<T> Page<T> {
    /// The token for the following page, if any results remain.
    pub fn next_token(&self) -> Option<String> {
        let seen = self.offset + self.items.len() as u64;
        (!self.items.is_empty() && seen < self.matched).then(|| format_token(seen))
    }
}

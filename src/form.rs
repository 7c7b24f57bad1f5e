//! The upload page served on `GET /`.

/// Static HTML form posting `cookies`, `baseurl` and `pages` back to `/`.
pub const INDEX_HTML: &str = include_str!("../templates/index.html");

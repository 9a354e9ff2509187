use axum::{extract::Request, middleware::Next, response::Response};
use lazy_static::lazy_static;
use regex::RegexSet;

use crate::error::AppError;

lazy_static! {
    static ref SUSPICIOUS: RegexSet = RegexSet::new([
        // path traversal, raw or percent-encoded
        r"\.\./|\.\.\\|%2e%2e(%2f|%5c|/)",
        r"<\s*script|%3c\s*script|javascript:|vbscript:",
        r"union(\s|\+|%20)+(all(\s|\+|%20)+)?select",
        r"(;|%3b)(\s|\+|%20)*(drop|truncate)(\s|\+|%20)+table",
        r"(^|/)(wp-admin|wp-login\.php|phpmyadmin|\.env|\.git|\.htaccess)(/|$)",
        r"%00",
    ])
    .expect("valid suspicious request patterns");
}

/// Whether a request target (path plus query) looks like a scan or injection attempt.
pub fn is_suspicious(target: &str) -> bool {
    SUSPICIOUS.is_match(&target.to_ascii_lowercase())
}

/// Reject probing requests before they reach routing.
pub async fn reject_suspicious(req: Request, next: Next) -> Result<Response, AppError> {
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| req.uri().path());

    if is_suspicious(target) {
        tracing::warn!(method = %req.method(), target = %target, "Rejected suspicious request");
        return Err(AppError::BadRequest);
    }

    Ok(next.run(req).await)
}

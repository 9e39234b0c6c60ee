//! Error types for ampr-audit.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Invalid prefix: {0}")]
    InvalidPrefix(String),

    #[error("Not an IPv4 prefix: {0}")]
    NotIpv4(String),

    #[error("Invalid AS number: {0}")]
    InvalidAsn(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Portal page error: {0}")]
    Page(String),

    #[error("Whois error: {0}")]
    Whois(String),
}

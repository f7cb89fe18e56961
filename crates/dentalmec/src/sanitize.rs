//! Helpers for keeping client data and file system layout out of log output.
//!
//! Stored paths contain the upload root and order ids; span fields only get
//! the file name. E-mail addresses keep their domain and first letter.

use std::path::Path;

/// Returns only the file name component of a path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks the local part of an e-mail address: `marta@example.com` becomes
/// `m***@example.com`. Anything without an `@` is masked entirely.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        _ => "***".to_string(),
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

static VALIDATE_EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Canonical comparison key for an email address.
///
/// The whole address is lower-cased, then every `.` and `_` is dropped from the
/// local part so that `Fulano.Algo@x.com` and `fulano_algo@x.com` collide. The
/// domain is kept as-is. Input without an `@` is only lower-cased.
pub fn normalize_email(email: &str) -> String {
    let lower = email.to_lowercase();

    match lower.split_once('@') {
        None => lower,
        Some((local, domain)) => {
            let local: String = local.chars().filter(|c| *c != '.' && *c != '_').collect();
            format!("{}@{}", local, domain)
        }
    }
}

pub fn email_domain(email: &str) -> Option<String> {
    email.split_once('@').map(|(_, domain)| domain.to_lowercase())
}

pub fn is_valid_email(email: &str) -> bool {
    VALIDATE_EMAIL.is_match(email)
}

/// Checks an email against a raffle's domain restriction. A restriction may be
/// written with or without the leading `@`.
pub fn domain_allowed(email: &str, allowed_domain: Option<&str>) -> bool {
    let allowed = match allowed_domain.map(str::trim) {
        None | Some("") => return true,
        Some(v) => v.trim_start_matches('@').to_lowercase(),
    };

    match email_domain(email) {
        None => false,
        Some(domain) => domain == allowed,
    }
}

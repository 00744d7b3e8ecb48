//! Address normalization and domain helpers.

/// Canonical form used for every address field of a `MessageRecord`.
///
/// Strips anything outside `[A-Za-z0-9_.@+-]`, then for `local@domain` drops
/// dots and `+tag` from the local part and lower-cases both halves, so
/// `John.Doe+news@Example.COM` and `johndoe@example.com` compare equal.
pub fn normalize_address(addr: &str) -> String {
    let filtered: String = addr
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
        .collect();

    let Some((local, domain)) = filtered.rsplit_once('@') else {
        return filtered;
    };

    let local = local.replace('.', "");
    let local = match local.split_once('+') {
        Some((base, _)) => base,
        None => local.as_str(),
    };

    format!("{}@{}", local.to_lowercase(), domain.to_lowercase())
}

/// Split `local@domain` on the last `@`. Both halves must be non-empty.
pub fn split_address(addr: &str) -> Option<(&str, &str)> {
    let (local, domain) = addr.trim().rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some((local, domain))
}

/// Registrable domain of a host name: `mail.service.co.uk` -> `service.co.uk`
pub fn registrable_domain(host: &str) -> Option<String> {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    if host.is_empty() {
        return None;
    }
    psl::domain_str(&host).map(|d| d.to_string())
}

/// Registrable domain of the domain half of an address
pub fn address_domain(addr: &str) -> Option<String> {
    let (_, domain) = split_address(addr)?;
    registrable_domain(domain)
}

/// Split a raw `X-Forwarded-To` / `X-Forwarded-For` value into addresses
pub fn split_forwarded(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

//! Address-grammar check shared by the parser and the lead store.

use std::sync::LazyLock;

use regex::Regex;

/// HTML5-style address grammar: a permissive local part and a dotted host
/// of RFC 1035 labels.
static EMAIL_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\A[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*\z",
    )
    .unwrap()
});

/// Whether `value` is a syntactically valid email address.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_ADDRESS.is_match(value)
}

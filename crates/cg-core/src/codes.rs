//! # Product-code normalization and format rules
//!
//! The one place where code canonicalization and the reserved-prefix
//! business rule live. Every entry point (web form, admin API, bulk
//! import) calls in here instead of re-deriving the rules.

use crate::models::CodeCheck;

/// Codes beginning with this prefix are manufactured exclusively for the
/// Dream Case line and may only be registered under that product type.
pub const RESERVED_PREFIX: &str = "8899";

/// The product-type label tied to [`RESERVED_PREFIX`].
pub const RESERVED_PRODUCT_TYPE: &str = "Dream Case";

/// Warranty codes are printed as 16 or 20 characters.
pub const VALID_LENGTHS: [usize; 2] = [16, 20];

/// Canonicalizes a raw user-entered code: uppercase, then strip all
/// whitespace and hyphens. Idempotent; an empty result is allowed here and
/// rejected by the length check downstream.
pub fn normalize_code(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

fn grouped(code: &str, sep: char) -> String {
    code.chars()
        .collect::<Vec<_>>()
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(&sep.to_string())
}

/// `"XXXX XXXX XXXX XXXX[ XXXX]"` — the space-grouped historical form.
pub fn space_grouped(code: &str) -> String {
    grouped(code, ' ')
}

/// `"XXXX-XXXX-XXXX-XXXX[-XXXX]"` — the hyphen-grouped historical form.
pub fn hyphen_grouped(code: &str) -> String {
    grouped(code, '-')
}

/// All on-disk spellings of a normalized code, in lookup priority order.
/// The inventory store only offers exact-match lookup, so the resolver
/// probes each of these until one hits.
pub fn storage_variants(code: &str) -> Vec<String> {
    vec![code.to_string(), space_grouped(code), hyphen_grouped(code)]
}

/// Checks a normalized code against the format rules, cross-validating the
/// reserved-prefix rule against `product_type` (the type asserted by the
/// customer, or the type stored in the inventory — both must pass).
///
/// Length is measured on the normalized form, never on raw input.
pub fn check_format(normalized: &str, product_type: Option<&str>) -> CodeCheck {
    let length = normalized.chars().count();
    let begins_reserved_prefix = normalized.starts_with(RESERVED_PREFIX);
    CodeCheck {
        exists: false,
        product_type: product_type.map(str::to_string),
        length,
        length_ok: VALID_LENGTHS.contains(&length),
        valid_product_type: !begins_reserved_prefix
            || product_type == Some(RESERVED_PRODUCT_TYPE),
        begins_reserved_prefix,
    }
}

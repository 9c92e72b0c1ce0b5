//! Invariant checks excluded from coverage reports.

#![cfg_attr(coverage_nightly, coverage(off))]

/// Strings of a loaded symbol file are validated at load time.
pub(crate) fn ensure_utf8(bytes: &[u8]) -> &str {
    std::str::from_utf8(bytes)
        .unwrap_or_else(|e| panic!("SymbolFile: string validated at load is not UTF-8: {e}"))
}

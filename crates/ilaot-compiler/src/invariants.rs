//! Invariant checks excluded from coverage.

#![cfg_attr(coverage_nightly, coverage(off))]

use ilaot_core::MethodId;

/// Every queued instance method has its ultimate base queued by the VMT sweep
/// before code generation starts.
pub fn ensure_queued(ordinal: Option<usize>, method: MethodId) -> usize {
    match ordinal {
        Some(index) => index,
        None => panic!("method {method} reached code generation without being queued"),
    }
}

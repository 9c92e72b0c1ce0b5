//! Assembler label names.
//!
//! Labels are derived from display signatures through an escape that keeps
//! ASCII letters and digits and maps every other character to a `_`-prefixed
//! code. `_` itself is doubled, so distinct inputs never collide.

use std::fmt::Write as _;

use crate::StrId;

pub const INIT_VMT_LABEL: &str = "____INIT__VMT____";
pub const ENTRY_POINT_LABEL: &str = "ilaot_EntryPoint";
pub const ENTRY_HALT_LABEL: &str = "ilaot_EntryPoint__HALT";
pub const DEBUG_STUB_LABEL: &str = "DebugStub_Step";
pub const CURRENT_EXCEPTION_LABEL: &str = "ilaot_CurrentException";

/// Escape arbitrary text into a valid, collision-free label fragment.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => out.push(c),
            '_' => out.push_str("__"),
            '.' => out.push_str("_D"),
            ' ' => out.push_str("_S"),
            ',' => out.push_str("_C"),
            '(' => out.push_str("_L"),
            ')' => out.push_str("_R"),
            '<' => out.push_str("_G"),
            '>' => out.push_str("_H"),
            '[' => out.push_str("_A"),
            ']' => out.push_str("_B"),
            '*' => out.push_str("_P"),
            '&' => out.push_str("_M"),
            '`' => out.push_str("_T"),
            '/' => out.push_str("_N"),
            '+' => out.push_str("_E"),
            c if (c as u32) <= 0xFFFF => {
                let _ = write!(out, "_X{:04X}", c as u32);
            }
            c => {
                let _ = write!(out, "_Y{:06X}", c as u32);
            }
        }
    }
    out
}

/// Label of a method, from its display signature.
pub fn method_label(signature: &str) -> String {
    escape(signature)
}

/// Data member holding a static field, from the field's full name.
pub fn static_field_label(field_full_name: &str) -> String {
    format!("static_field__{}", escape(field_full_name))
}

/// Data member holding an interned string literal.
pub fn string_literal_label(id: StrId) -> String {
    format!("ilaot_string__{}", id.as_u32())
}

pub fn instruction_label(method_label: &str, offset: u32) -> String {
    format!("{method_label}.IL_{offset:04X}")
}

pub fn end_of_method_label(method_label: &str) -> String {
    format!("{method_label}__END_OF_METHOD")
}

pub fn exception_exit_label(method_label: &str) -> String {
    format!("{method_label}__EXCEPTION_EXIT")
}

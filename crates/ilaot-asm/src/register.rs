//! General purpose registers and condition codes.

/// 32-bit general purpose register. Discriminants are the ModRM codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    Eax = 0,
    Ecx = 1,
    Edx = 2,
    Ebx = 3,
    Esp = 4,
    Ebp = 5,
    Esi = 6,
    Edi = 7,
}

impl Register {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::Eax => "eax",
            Register::Ecx => "ecx",
            Register::Edx => "edx",
            Register::Ebx => "ebx",
            Register::Esp => "esp",
            Register::Ebp => "ebp",
            Register::Esi => "esi",
            Register::Edi => "edi",
        }
    }

    /// Low byte view (`al`, `cl`, `dl`, `bl`). Only the first four registers have one.
    pub fn byte_name(self) -> Option<&'static str> {
        match self {
            Register::Eax => Some("al"),
            Register::Ecx => Some("cl"),
            Register::Edx => Some("dl"),
            Register::Ebx => Some("bl"),
            _ => None,
        }
    }

    /// Low word view (`ax`, `cx`, ...).
    pub fn word_name(self) -> &'static str {
        match self {
            Register::Eax => "ax",
            Register::Ecx => "cx",
            Register::Edx => "dx",
            Register::Ebx => "bx",
            Register::Esp => "sp",
            Register::Ebp => "bp",
            Register::Esi => "si",
            Register::Edi => "di",
        }
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Condition codes for `jcc`/`setcc`. Discriminants are the low opcode nibble.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Condition {
    /// Unsigned below.
    B = 0x2,
    /// Unsigned above or equal.
    Ae = 0x3,
    E = 0x4,
    Ne = 0x5,
    /// Unsigned below or equal.
    Be = 0x6,
    /// Unsigned above.
    A = 0x7,
    L = 0xC,
    Ge = 0xD,
    Le = 0xE,
    G = 0xF,
}

impl Condition {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Condition::B => "b",
            Condition::Ae => "ae",
            Condition::E => "e",
            Condition::Ne => "ne",
            Condition::Be => "be",
            Condition::A => "a",
            Condition::L => "l",
            Condition::Ge => "ge",
            Condition::Le => "le",
            Condition::G => "g",
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Condition::B => Condition::Ae,
            Condition::Ae => Condition::B,
            Condition::E => Condition::Ne,
            Condition::Ne => Condition::E,
            Condition::Be => Condition::A,
            Condition::A => Condition::Be,
            Condition::L => Condition::Ge,
            Condition::Ge => Condition::L,
            Condition::Le => Condition::G,
            Condition::G => Condition::Le,
        }
    }
}

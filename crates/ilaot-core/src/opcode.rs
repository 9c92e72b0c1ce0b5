//! Instruction kinds of the input bytecode.
//!
//! Kinds are identified by their assembler mnemonic (`ldc.i4.s`, `callvirt`, ...),
//! which is also their serialized form in program images.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! opcodes {
    ($($variant:ident => $mnemonic:literal,)*) => {
        /// Bytecode instruction kind.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum OpCode {
            $($variant,)*
        }

        impl OpCode {
            /// Every kind, in declaration order.
            pub const ALL: &'static [OpCode] = &[$(OpCode::$variant,)*];

            /// Assembler mnemonic of this kind.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(OpCode::$variant => $mnemonic,)*
                }
            }

            /// Parse an assembler mnemonic.
            pub fn from_mnemonic(s: &str) -> Option<Self> {
                match s {
                    $($mnemonic => Some(OpCode::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    Nop => "nop",
    Break => "break",
    Ldarg0 => "ldarg.0",
    Ldarg1 => "ldarg.1",
    Ldarg2 => "ldarg.2",
    Ldarg3 => "ldarg.3",
    Ldloc0 => "ldloc.0",
    Ldloc1 => "ldloc.1",
    Ldloc2 => "ldloc.2",
    Ldloc3 => "ldloc.3",
    Stloc0 => "stloc.0",
    Stloc1 => "stloc.1",
    Stloc2 => "stloc.2",
    Stloc3 => "stloc.3",
    LdargS => "ldarg.s",
    LdargaS => "ldarga.s",
    StargS => "starg.s",
    LdlocS => "ldloc.s",
    LdlocaS => "ldloca.s",
    StlocS => "stloc.s",
    Ldnull => "ldnull",
    LdcI4M1 => "ldc.i4.m1",
    LdcI40 => "ldc.i4.0",
    LdcI41 => "ldc.i4.1",
    LdcI42 => "ldc.i4.2",
    LdcI43 => "ldc.i4.3",
    LdcI44 => "ldc.i4.4",
    LdcI45 => "ldc.i4.5",
    LdcI46 => "ldc.i4.6",
    LdcI47 => "ldc.i4.7",
    LdcI48 => "ldc.i4.8",
    LdcI4S => "ldc.i4.s",
    LdcI4 => "ldc.i4",
    LdcI8 => "ldc.i8",
    LdcR4 => "ldc.r4",
    LdcR8 => "ldc.r8",
    Dup => "dup",
    Pop => "pop",
    Jmp => "jmp",
    Call => "call",
    Calli => "calli",
    Ret => "ret",
    BrS => "br.s",
    BrfalseS => "brfalse.s",
    BrtrueS => "brtrue.s",
    BeqS => "beq.s",
    BgeS => "bge.s",
    BgtS => "bgt.s",
    BleS => "ble.s",
    BltS => "blt.s",
    BneUnS => "bne.un.s",
    BgeUnS => "bge.un.s",
    BgtUnS => "bgt.un.s",
    BleUnS => "ble.un.s",
    BltUnS => "blt.un.s",
    Br => "br",
    Brfalse => "brfalse",
    Brtrue => "brtrue",
    Beq => "beq",
    Bge => "bge",
    Bgt => "bgt",
    Ble => "ble",
    Blt => "blt",
    BneUn => "bne.un",
    BgeUn => "bge.un",
    BgtUn => "bgt.un",
    BleUn => "ble.un",
    BltUn => "blt.un",
    Switch => "switch",
    LdindI1 => "ldind.i1",
    LdindU1 => "ldind.u1",
    LdindI2 => "ldind.i2",
    LdindU2 => "ldind.u2",
    LdindI4 => "ldind.i4",
    LdindU4 => "ldind.u4",
    LdindI8 => "ldind.i8",
    LdindI => "ldind.i",
    LdindR4 => "ldind.r4",
    LdindR8 => "ldind.r8",
    LdindRef => "ldind.ref",
    StindRef => "stind.ref",
    StindI1 => "stind.i1",
    StindI2 => "stind.i2",
    StindI4 => "stind.i4",
    StindI8 => "stind.i8",
    StindR4 => "stind.r4",
    StindR8 => "stind.r8",
    Add => "add",
    Sub => "sub",
    Mul => "mul",
    Div => "div",
    DivUn => "div.un",
    Rem => "rem",
    RemUn => "rem.un",
    And => "and",
    Or => "or",
    Xor => "xor",
    Shl => "shl",
    Shr => "shr",
    ShrUn => "shr.un",
    Neg => "neg",
    Not => "not",
    ConvI1 => "conv.i1",
    ConvI2 => "conv.i2",
    ConvI4 => "conv.i4",
    ConvI8 => "conv.i8",
    ConvR4 => "conv.r4",
    ConvR8 => "conv.r8",
    ConvU4 => "conv.u4",
    ConvU8 => "conv.u8",
    Callvirt => "callvirt",
    Cpobj => "cpobj",
    Ldobj => "ldobj",
    Ldstr => "ldstr",
    Newobj => "newobj",
    Castclass => "castclass",
    Isinst => "isinst",
    ConvRUn => "conv.r.un",
    Unbox => "unbox",
    Throw => "throw",
    Ldfld => "ldfld",
    Ldflda => "ldflda",
    Stfld => "stfld",
    Ldsfld => "ldsfld",
    Ldsflda => "ldsflda",
    Stsfld => "stsfld",
    Stobj => "stobj",
    Box => "box",
    Newarr => "newarr",
    Ldlen => "ldlen",
    Ldelema => "ldelema",
    LdelemI1 => "ldelem.i1",
    LdelemU1 => "ldelem.u1",
    LdelemI2 => "ldelem.i2",
    LdelemU2 => "ldelem.u2",
    LdelemI4 => "ldelem.i4",
    LdelemU4 => "ldelem.u4",
    LdelemI8 => "ldelem.i8",
    LdelemI => "ldelem.i",
    LdelemR4 => "ldelem.r4",
    LdelemR8 => "ldelem.r8",
    LdelemRef => "ldelem.ref",
    StelemI => "stelem.i",
    StelemI1 => "stelem.i1",
    StelemI2 => "stelem.i2",
    StelemI4 => "stelem.i4",
    StelemI8 => "stelem.i8",
    StelemR4 => "stelem.r4",
    StelemR8 => "stelem.r8",
    StelemRef => "stelem.ref",
    Ldelem => "ldelem",
    Stelem => "stelem",
    UnboxAny => "unbox.any",
    ConvU2 => "conv.u2",
    ConvU1 => "conv.u1",
    ConvI => "conv.i",
    ConvU => "conv.u",
    Ckfinite => "ckfinite",
    Mkrefany => "mkrefany",
    Refanyval => "refanyval",
    Ldtoken => "ldtoken",
    AddOvf => "add.ovf",
    MulOvf => "mul.ovf",
    SubOvf => "sub.ovf",
    Endfinally => "endfinally",
    Leave => "leave",
    LeaveS => "leave.s",
    StindI => "stind.i",
    Arglist => "arglist",
    Ceq => "ceq",
    Cgt => "cgt",
    CgtUn => "cgt.un",
    Clt => "clt",
    CltUn => "clt.un",
    Ldftn => "ldftn",
    Ldvirtftn => "ldvirtftn",
    Ldarg => "ldarg",
    Ldarga => "ldarga",
    Starg => "starg",
    Ldloc => "ldloc",
    Ldloca => "ldloca",
    Stloc => "stloc",
    Localloc => "localloc",
    Endfilter => "endfilter",
    Unaligned => "unaligned.",
    Volatile => "volatile.",
    Tail => "tail.",
    Initobj => "initobj",
    Constrained => "constrained.",
    Cpblk => "cpblk",
    Initblk => "initblk",
    Rethrow => "rethrow",
    Sizeof => "sizeof",
    Refanytype => "refanytype",
    Readonly => "readonly.",
}

impl OpCode {
    /// Whether this kind transfers control to an explicit target offset.
    pub fn is_branch(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            BrS | BrfalseS
                | BrtrueS
                | BeqS
                | BgeS
                | BgtS
                | BleS
                | BltS
                | BneUnS
                | BgeUnS
                | BgtUnS
                | BleUnS
                | BltUnS
                | Br
                | Brfalse
                | Brtrue
                | Beq
                | Bge
                | Bgt
                | Ble
                | Blt
                | BneUn
                | BgeUn
                | BgtUn
                | BleUn
                | BltUn
                | Leave
                | LeaveS
        )
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        OpCode::from_mnemonic(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown opcode `{s}`")))
    }
}

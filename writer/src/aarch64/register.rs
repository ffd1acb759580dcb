// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::{fmt::Display, str::FromStr};

use serde::Deserialize;
use strum::{EnumIter, IntoStaticStr};

use crate::WriterError;

/// An architectural register of the AArch64 register file.
///
/// The set is closed: every value of this type names a register that exists,
/// so [`ArmRegister::describe`] is total. Numbers outside of the register file
/// can only be produced by a programming error, and the constructors panic on
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct ArmRegister {
    kind: ArmRegisterKind,
    number: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ArmRegisterKind {
    X,
    W,
    Sp,
    Wsp,
    Xzr,
    Wzr,
    D,
    S,
}

macro_rules! register_constants {
    ($kind:ident: $($name:ident = $number:literal),* $(,)?) => {
        $(
            pub const $name: Self = Self { kind: ArmRegisterKind::$kind, number: $number };
        )*
    };
}

#[allow(unused)]
impl ArmRegister {
    register_constants!(X:
        X0 = 0, X1 = 1, X2 = 2, X3 = 3, X4 = 4, X5 = 5, X6 = 6, X7 = 7,
        X8 = 8, X9 = 9, X10 = 10, X11 = 11, X12 = 12, X13 = 13, X14 = 14, X15 = 15,
        X16 = 16, X17 = 17, X18 = 18, X19 = 19, X20 = 20, X21 = 21, X22 = 22, X23 = 23,
        X24 = 24, X25 = 25, X26 = 26, X27 = 27, X28 = 28, X29 = 29, X30 = 30,
    );

    register_constants!(W:
        W0 = 0, W1 = 1, W2 = 2, W3 = 3, W4 = 4, W5 = 5, W6 = 6, W7 = 7,
        W8 = 8, W9 = 9, W10 = 10, W11 = 11, W12 = 12, W13 = 13, W14 = 14, W15 = 15,
        W16 = 16, W17 = 17, W18 = 18, W19 = 19, W20 = 20, W21 = 21, W22 = 22, W23 = 23,
        W24 = 24, W25 = 25, W26 = 26, W27 = 27, W28 = 28, W29 = 29, W30 = 30,
    );

    /// Intra-procedure-call scratch register, free to clobber in veneers.
    pub const IP0: Self = Self::X16;

    /// Intra-procedure-call scratch register, free to clobber in veneers.
    pub const IP1: Self = Self::X17;

    /// Frame Pointer
    pub const FP: Self = Self::X29;

    /// Link Register
    pub const LR: Self = Self::X30;

    /// Stack Pointer
    pub const SP: Self = Self { kind: ArmRegisterKind::Sp, number: 31 };

    pub const WSP: Self = Self { kind: ArmRegisterKind::Wsp, number: 31 };

    /// Zero Register
    pub const XZR: Self = Self { kind: ArmRegisterKind::Xzr, number: 31 };

    pub const WZR: Self = Self { kind: ArmRegisterKind::Wzr, number: 31 };

    #[must_use]
    pub const fn x(number: u8) -> Self {
        assert!(number < 31, "x-registers are numbered 0 to 30");
        Self { kind: ArmRegisterKind::X, number }
    }

    #[must_use]
    pub const fn w(number: u8) -> Self {
        assert!(number < 31, "w-registers are numbered 0 to 30");
        Self { kind: ArmRegisterKind::W, number }
    }

    #[must_use]
    pub const fn d(number: u8) -> Self {
        assert!(number < 32, "d-registers are numbered 0 to 31");
        Self { kind: ArmRegisterKind::D, number }
    }

    #[must_use]
    pub const fn s(number: u8) -> Self {
        assert!(number < 32, "s-registers are numbered 0 to 31");
        Self { kind: ArmRegisterKind::S, number }
    }

    /// Resolves the encoding metadata of this register.
    #[must_use]
    pub const fn describe(self) -> RegisterDescriptor {
        let (width, class) = match self.kind {
            ArmRegisterKind::X | ArmRegisterKind::Sp | ArmRegisterKind::Xzr => (RegisterWidth::W64, RegisterClass::Integer),
            ArmRegisterKind::W | ArmRegisterKind::Wsp | ArmRegisterKind::Wzr => (RegisterWidth::W32, RegisterClass::Integer),
            ArmRegisterKind::D => (RegisterWidth::W64, RegisterClass::Vector),
            ArmRegisterKind::S => (RegisterWidth::W32, RegisterClass::Vector),
        };

        RegisterDescriptor {
            index: self.number,
            width,
            class,
        }
    }

    /// `x0` to `x30` or `w0` to `w30`, i.e. not `sp`, not the zero register and not a vector register.
    #[must_use]
    pub const fn is_general_purpose(self) -> bool {
        matches!(self.kind, ArmRegisterKind::X | ArmRegisterKind::W)
    }

    #[must_use]
    pub const fn is_stack_pointer(self) -> bool {
        matches!(self.kind, ArmRegisterKind::Sp | ArmRegisterKind::Wsp)
    }

    #[must_use]
    pub const fn is_zero_register(self) -> bool {
        matches!(self.kind, ArmRegisterKind::Xzr | ArmRegisterKind::Wzr)
    }

    /// Builds the integer register that register field value `index` names.
    /// Index 31 is either the stack pointer or the zero register, depending on
    /// the operand it is found in.
    #[must_use]
    pub(super) const fn integer(index: u8, width: RegisterWidth, index_31: IndexThirtyOne) -> Self {
        debug_assert!(index < 32);

        let kind = match (index, width, index_31) {
            (31, RegisterWidth::W64, IndexThirtyOne::StackPointer) => ArmRegisterKind::Sp,
            (31, RegisterWidth::W32, IndexThirtyOne::StackPointer) => ArmRegisterKind::Wsp,
            (31, RegisterWidth::W64, IndexThirtyOne::ZeroRegister) => ArmRegisterKind::Xzr,
            (31, RegisterWidth::W32, IndexThirtyOne::ZeroRegister) => ArmRegisterKind::Wzr,
            (_, RegisterWidth::W64, _) => ArmRegisterKind::X,
            (_, RegisterWidth::W32, _) => ArmRegisterKind::W,
        };

        Self { kind, number: index }
    }

    #[must_use]
    pub(super) const fn vector(index: u8, width: RegisterWidth) -> Self {
        match width {
            RegisterWidth::W64 => Self::d(index),
            RegisterWidth::W32 => Self::s(index),
        }
    }

    /// Every register of the register file, aliases excluded.
    pub fn iter() -> impl Iterator<Item = Self> {
        let numbered = |kind: ArmRegisterKind, count: u8| (0..count).map(move |number| Self { kind, number });

        numbered(ArmRegisterKind::X, 31)
            .chain(numbered(ArmRegisterKind::W, 31))
            .chain([Self::SP, Self::WSP, Self::XZR, Self::WZR])
            .chain(numbered(ArmRegisterKind::D, 32))
            .chain(numbered(ArmRegisterKind::S, 32))
    }
}

impl Display for ArmRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::FP => return f.write_str("fp"),
            Self::LR => return f.write_str("lr"),
            _ => (),
        }

        let prefix = match self.kind {
            ArmRegisterKind::Sp => return f.write_str("sp"),
            ArmRegisterKind::Wsp => return f.write_str("wsp"),
            ArmRegisterKind::Xzr => return f.write_str("xzr"),
            ArmRegisterKind::Wzr => return f.write_str("wzr"),
            ArmRegisterKind::X => "x",
            ArmRegisterKind::W => "w",
            ArmRegisterKind::D => "d",
            ArmRegisterKind::S => "s",
        };

        f.write_str(prefix)?;
        self.number.fmt(f)
    }
}

impl FromStr for ArmRegister {
    type Err = WriterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();

        let named = match name.as_str() {
            "sp" => Some(Self::SP),
            "wsp" => Some(Self::WSP),
            "xzr" => Some(Self::XZR),
            "wzr" => Some(Self::WZR),
            "fp" => Some(Self::FP),
            "lr" => Some(Self::LR),
            "ip0" => Some(Self::IP0),
            "ip1" => Some(Self::IP1),
            _ => None,
        };

        if let Some(register) = named {
            return Ok(register);
        }

        let unknown = || WriterError::UnknownRegister(s.to_string());

        let mut chars = name.chars();
        let prefix = chars.next().ok_or_else(unknown)?;
        let digits = chars.as_str();

        // Reject things like `x+1` and `x007` that `u8::from_str` would accept.
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || (digits.len() > 1 && digits.starts_with('0')) {
            return Err(unknown());
        }

        let number: u8 = digits.parse().map_err(|_| unknown())?;

        let (kind, count) = match prefix {
            'x' => (ArmRegisterKind::X, 31),
            'w' => (ArmRegisterKind::W, 31),
            'd' => (ArmRegisterKind::D, 32),
            's' => (ArmRegisterKind::S, 32),
            _ => return Err(unknown()),
        };

        if number >= count {
            return Err(unknown());
        }

        Ok(Self { kind, number })
    }
}

impl TryFrom<String> for ArmRegister {
    type Error = WriterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The encoding metadata of a register, as used to populate instruction
/// bit-fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterDescriptor {
    index: u8,
    width: RegisterWidth,
    class: RegisterClass,
}

impl RegisterDescriptor {
    /// The value of the 5-bit register field, 0 to 31.
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.index
    }

    #[must_use]
    pub const fn width(&self) -> RegisterWidth {
        self.width
    }

    #[must_use]
    pub const fn class(&self) -> RegisterClass {
        self.class
    }

    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self.class, RegisterClass::Integer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[repr(u8)]
pub enum RegisterWidth {
    #[strum(serialize = "32-bit")]
    W32 = 32,

    #[strum(serialize = "64-bit")]
    W64 = 64,
}

impl RegisterWidth {
    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn bytes(self) -> u32 {
        self.bits() / 8
    }

    /// The `size` field of load/store instructions: log2 of the access width
    /// in bytes.
    #[must_use]
    pub(super) const fn size_field(self) -> u32 {
        match self {
            Self::W32 => 0b10,
            Self::W64 => 0b11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum RegisterClass {
    /// General-purpose registers, including `sp` and the zero register.
    Integer,

    /// SIMD & floating-point registers.
    Vector,
}

/// What register field value 31 names in a particular operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum IndexThirtyOne {
    StackPointer,
    ZeroRegister,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use pretty_assertions::assert_eq;

    #[rstest]
    #[case(ArmRegister::X0, 0, RegisterWidth::W64, RegisterClass::Integer)]
    #[case(ArmRegister::X17, 17, RegisterWidth::W64, RegisterClass::Integer)]
    #[case(ArmRegister::LR, 30, RegisterWidth::W64, RegisterClass::Integer)]
    #[case(ArmRegister::W5, 5, RegisterWidth::W32, RegisterClass::Integer)]
    #[case(ArmRegister::SP, 31, RegisterWidth::W64, RegisterClass::Integer)]
    #[case(ArmRegister::WZR, 31, RegisterWidth::W32, RegisterClass::Integer)]
    #[case(ArmRegister::d(31), 31, RegisterWidth::W64, RegisterClass::Vector)]
    #[case(ArmRegister::s(2), 2, RegisterWidth::W32, RegisterClass::Vector)]
    fn describe(#[case] register: ArmRegister, #[case] index: u8, #[case] width: RegisterWidth, #[case] class: RegisterClass) {
        let descriptor = register.describe();
        assert_eq!(descriptor.index(), index);
        assert_eq!(descriptor.width(), width);
        assert_eq!(descriptor.class(), class);
    }

    #[test]
    fn describe_is_total_and_in_range() {
        for register in ArmRegister::iter() {
            let descriptor = register.describe();
            assert!(descriptor.index() <= 31, "{register} has index {}", descriptor.index());
            assert!(matches!(descriptor.width().bits(), 32 | 64));
            assert_eq!(descriptor, register.describe());
        }
    }

    #[test]
    fn register_file_size() {
        assert_eq!(ArmRegister::iter().count(), 31 + 31 + 4 + 32 + 32);
    }

    #[test]
    fn display_then_parse_gives_same_register() {
        for register in ArmRegister::iter() {
            let name = register.to_string();
            let parsed: ArmRegister = name.parse().unwrap();
            assert_eq!(parsed, register, "name was {name}");
        }
    }

    #[rstest]
    #[case("x17", ArmRegister::X17)]
    #[case("X3", ArmRegister::X3)]
    #[case(" ip0 ", ArmRegister::X16)]
    #[case("fp", ArmRegister::X29)]
    #[case("w30", ArmRegister::W30)]
    #[case("d7", ArmRegister::d(7))]
    fn parse(#[case] input: &str, #[case] expected: ArmRegister) {
        assert_eq!(input.parse::<ArmRegister>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("x31")]
    #[case("w31")]
    #[case("s32")]
    #[case("x")]
    #[case("x+1")]
    #[case("x07")]
    #[case("r0")]
    #[case("q0")]
    fn parse_unknown(#[case] input: &str) {
        let error = input.parse::<ArmRegister>().unwrap_err();
        assert!(matches!(error, WriterError::UnknownRegister(name) if name == input));
    }

    #[test]
    #[should_panic]
    fn x31_is_not_a_register() {
        let number = std::hint::black_box(31);
        _ = ArmRegister::x(number);
    }
}

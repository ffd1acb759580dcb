// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

use strum::{EnumIter, EnumString, FromRepr, IntoStaticStr};

/// **Reference:** [Arm® Architecture Reference Manual for A-profile architecture](arm) \
/// **Section:** C1.2.4 Condition code \
///
/// [arm]: https://developer.arm.com/documentation/ddi0487/latest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[repr(u8)]
pub enum ArmConditionCode {
    /// Equal, Z == 1
    EQ = 0b0000,

    /// Not equal, Z == 0
    NE = 0b0001,

    /// Carry set / unsigned higher or same, C == 1
    #[strum(to_string = "cs", serialize = "hs")]
    CS = 0b0010,

    /// Carry clear / unsigned lower, C == 0
    #[strum(to_string = "cc", serialize = "lo")]
    CC = 0b0011,

    /// Negative, N == 1
    MI = 0b0100,

    /// Positive or zero, N == 0
    PL = 0b0101,

    /// Overflow, V == 1
    VS = 0b0110,

    /// No overflow, V == 0
    VC = 0b0111,

    /// Unsigned higher, C == 1 && Z == 0
    HI = 0b1000,

    /// Unsigned lower or same, !(C == 1 && Z == 0)
    LS = 0b1001,

    /// Signed greater than or equal, N == V
    GE = 0b1010,

    /// Signed less than, N != V
    LT = 0b1011,

    /// Signed greater than, Z == 0 && N == V
    GT = 0b1100,

    /// Signed less than or equal, !(Z == 0 && N == V)
    LE = 0b1101,

    /// Always
    AL = 0b1110,

    /// Always, behaves as AL
    NV = 0b1111,
}

impl ArmConditionCode {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// The 4-bit `cond` field.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u8 as u32
    }

    /// The condition that holds exactly when this one does not. Flipping the
    /// lowest bit inverts every condition except `al` and `nv`, which both
    /// mean "always".
    #[must_use]
    pub const fn invert(self) -> Self {
        match self {
            Self::AL | Self::NV => self,
            _ => match Self::from_repr(self as u8 ^ 1) {
                Some(inverted) => inverted,
                None => unreachable!(),
            },
        }
    }
}

impl Display for ArmConditionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    #[rstest]
    #[case(ArmConditionCode::EQ, ArmConditionCode::NE)]
    #[case(ArmConditionCode::CS, ArmConditionCode::CC)]
    #[case(ArmConditionCode::GE, ArmConditionCode::LT)]
    #[case(ArmConditionCode::LE, ArmConditionCode::GT)]
    #[case(ArmConditionCode::AL, ArmConditionCode::AL)]
    fn invert(#[case] cond: ArmConditionCode, #[case] inverted: ArmConditionCode) {
        assert_eq!(cond.invert(), inverted);
        assert_eq!(inverted.invert(), cond);
    }

    #[test]
    fn every_condition_fits_in_four_bits() {
        for cond in ArmConditionCode::iter() {
            assert!(cond.bits() < 16);
        }
        assert_eq!(ArmConditionCode::iter().count(), 16);
    }

    #[rstest]
    #[case("eq", ArmConditionCode::EQ)]
    #[case("HS", ArmConditionCode::CS)]
    #[case("lo", ArmConditionCode::CC)]
    #[case("le", ArmConditionCode::LE)]
    fn parse(#[case] input: &str, #[case] expected: ArmConditionCode) {
        assert_eq!(input.parse::<ArmConditionCode>().unwrap(), expected);
    }

    #[test]
    fn names_are_lowercase_mnemonics() {
        assert_eq!(ArmConditionCode::CS.to_string(), "cs");
        assert_eq!(ArmConditionCode::NE.name(), "ne");
    }
}

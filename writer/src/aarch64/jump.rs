// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::fmt::Display;

/// The distance a single `B` instruction reaches in either direction: its
/// 26-bit immediate counts instructions, so it spans `(1 << 25) << 2` bytes.
#[must_use]
pub const fn near_jump_range_size() -> usize {
    (1 << 25) << 2
}

/// How control gets from one address to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    /// A direct `B`, `offset` bytes away from the branch itself.
    Near {
        offset: i32,
    },

    /// An indirect branch through a scratch register loaded from a literal.
    Far,
}

impl Display for JumpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Near { offset } => f.write_fmt(format_args!("near ({offset:+})")),
            Self::Far => f.write_str("far"),
        }
    }
}

/// Decides whether a branch placed at `from` can reach `to` directly.
#[must_use]
pub fn select_jump(from: u64, to: u64, allow_near: bool) -> JumpKind {
    if !allow_near {
        return JumpKind::Far;
    }

    let distance = to as i128 - from as i128;
    let range = near_jump_range_size() as i128;

    if distance % 4 != 0 || distance < -range || distance >= range {
        return JumpKind::Far;
    }

    JumpKind::Near { offset: distance as i32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use pretty_assertions::assert_eq;

    #[test]
    fn range_is_128_mib() {
        assert_eq!(near_jump_range_size(), 134_217_728);
        assert_eq!(near_jump_range_size(), 128 * 1024 * 1024);
    }

    #[rstest]
    #[case(0x1000, 0x1000, JumpKind::Near { offset: 0 })]
    #[case(0x1000, 0x2000, JumpKind::Near { offset: 0x1000 })]
    #[case(0x8000_0000, 0x8000_0000 - 0x0800_0000, JumpKind::Near { offset: -0x0800_0000 })]
    #[case(0x1000, 0x1000 + 0x0800_0000 - 4, JumpKind::Near { offset: 0x0800_0000 - 4 })]
    #[case(0x1000, 0x1000 + 0x0800_0000, JumpKind::Far)]
    #[case(0x8000_0000, 0x8000_0000 - 0x0800_0004, JumpKind::Far)]
    #[case(0x1000, 0x1002, JumpKind::Far)]
    #[case(0, u64::MAX - 3, JumpKind::Far)]
    #[case(0x7FFF_0000_0000, 0x1122_3344_5566_7788, JumpKind::Far)]
    fn select(#[case] from: u64, #[case] to: u64, #[case] expected: JumpKind) {
        assert_eq!(select_jump(from, to, true), expected);
    }

    #[test]
    fn near_jumps_can_be_disabled() {
        assert_eq!(select_jump(0x1000, 0x1004, false), JumpKind::Far);
    }
}

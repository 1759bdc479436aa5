//! Element classification and color-scoped addressing.

use std::fmt;
use std::ops::BitOr;

/// Classification of a stored element along two axes: whether it is backed
/// by a source value (real) or synthesized (virtual), and whether it is
/// currently visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    RealVisible,
    RealHidden,
    VirtualVisible,
    VirtualHidden,
}

impl Color {
    /// Stable bit position of this color, 0..4.
    pub(crate) fn bit(self) -> usize {
        match self {
            Color::RealVisible => 0,
            Color::RealHidden => 1,
            Color::VirtualVisible => 2,
            Color::VirtualHidden => 3,
        }
    }

    pub fn is_real(self) -> bool {
        matches!(self, Color::RealVisible | Color::RealHidden)
    }

    pub fn is_visible(self) -> bool {
        matches!(self, Color::RealVisible | Color::VirtualVisible)
    }

    /// Same backing axis, requested visibility.
    pub fn with_visibility(self, visible: bool) -> Color {
        match (self.is_real(), visible) {
            (true, true) => Color::RealVisible,
            (true, false) => Color::RealHidden,
            (false, true) => Color::VirtualVisible,
            (false, false) => Color::VirtualHidden,
        }
    }

    /// Same visibility axis, requested backing.
    pub fn with_real(self, real: bool) -> Color {
        match (real, self.is_visible()) {
            (true, true) => Color::RealVisible,
            (true, false) => Color::RealHidden,
            (false, true) => Color::VirtualVisible,
            (false, false) => Color::VirtualHidden,
        }
    }

    pub fn mask(self) -> ColorMask {
        ColorMask(1 << self.bit())
    }
}

/// Union of base colors. Every indexed operation on the tree takes a mask
/// that selects which logical subsequence indices refer to.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorMask(u8);

impl ColorMask {
    pub const ALL: ColorMask = ColorMask(0b1111);
    pub const VISIBLE: ColorMask = ColorMask(0b0101);
    pub const HIDDEN: ColorMask = ColorMask(0b1010);
    pub const REAL: ColorMask = ColorMask(0b0011);
    pub const VIRTUAL: ColorMask = ColorMask(0b1100);

    pub fn contains(self, color: Color) -> bool {
        self.0 & (1 << color.bit()) != 0
    }

    pub(crate) fn contains_bit(self, bit: usize) -> bool {
        self.0 & (1 << bit) != 0
    }
}

impl BitOr for ColorMask {
    type Output = ColorMask;

    fn bitor(self, rhs: ColorMask) -> ColorMask {
        ColorMask(self.0 | rhs.0)
    }
}

impl From<Color> for ColorMask {
    fn from(color: Color) -> ColorMask {
        color.mask()
    }
}

impl fmt::Debug for ColorMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Color::RealVisible, "RealVisible"),
            (Color::RealHidden, "RealHidden"),
            (Color::VirtualVisible, "VirtualVisible"),
            (Color::VirtualHidden, "VirtualHidden"),
        ];
        let mut first = true;
        write!(f, "ColorMask(")?;
        for (color, name) in names {
            if self.contains(color) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axes() {
        assert!(Color::RealVisible.is_real());
        assert!(Color::RealVisible.is_visible());
        assert!(!Color::VirtualHidden.is_real());
        assert!(!Color::VirtualHidden.is_visible());
        assert_eq!(Color::RealVisible.with_visibility(false), Color::RealHidden);
        assert_eq!(Color::VirtualHidden.with_visibility(true), Color::VirtualVisible);
        assert_eq!(Color::RealHidden.with_real(false), Color::VirtualHidden);
        assert_eq!(Color::VirtualVisible.with_real(true), Color::RealVisible);
    }

    #[test]
    fn masks() {
        assert!(ColorMask::VISIBLE.contains(Color::VirtualVisible));
        assert!(!ColorMask::VISIBLE.contains(Color::RealHidden));
        assert!(ColorMask::REAL.contains(Color::RealHidden));
        let union = Color::RealVisible.mask() | Color::VirtualHidden.mask();
        assert!(union.contains(Color::RealVisible));
        assert!(union.contains(Color::VirtualHidden));
        assert!(!union.contains(Color::RealHidden));
        for color in [
            Color::RealVisible,
            Color::RealHidden,
            Color::VirtualVisible,
            Color::VirtualHidden,
        ] {
            assert!(ColorMask::ALL.contains(color));
        }
    }
}

use std::ops;

/// An rgb color with floating point channels.
/// A displayable color keeps every channel in [0, 1]; the shading code is
/// allowed to accumulate above that range and clamp at the end.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl ops::Add<Color> for Color {
    type Output = Self;

    #[inline(always)]
    fn add(self, rhs: Color) -> Self::Output {
        Color {
            r: self.r + rhs.r,
            g: self.g + rhs.g,
            b: self.b + rhs.b,
        }
    }
}

impl ops::AddAssign<Color> for Color {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Color) {
        self.r += rhs.r;
        self.g += rhs.g;
        self.b += rhs.b;
    }
}

impl ops::Mul<Color> for Color {
    type Output = Self;

    #[inline(always)]
    fn mul(self, rhs: Color) -> Self::Output {
        Color {
            r: self.r * rhs.r,
            g: self.g * rhs.g,
            b: self.b * rhs.b,
        }
    }
}

impl ops::Mul<f64> for Color {
    type Output = Self;

    #[inline(always)]
    fn mul(self, rhs: f64) -> Self::Output {
        Color {
            r: self.r * rhs,
            g: self.g * rhs,
            b: self.b * rhs,
        }
    }
}

impl ops::Div<f64> for Color {
    type Output = Self;

    #[inline(always)]
    fn div(self, rhs: f64) -> Self::Output {
        Color {
            r: self.r / rhs,
            g: self.g / rhs,
            b: self.b / rhs,
        }
    }
}

impl Color {
    #[inline(always)]
    pub fn new(r: f64, g: f64, b: f64) -> Color {
        Color { r, g, b }
    }

    #[inline(always)]
    pub fn black() -> Color {
        Color::new(0.0, 0.0, 0.0)
    }

    #[inline(always)]
    pub fn white() -> Color {
        Color::new(1.0, 1.0, 1.0)
    }

    /// Clamps every channel into the displayable [0, 1] range.
    #[inline(always)]
    pub fn clamp(self) -> Color {
        Color {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
        }
    }
}

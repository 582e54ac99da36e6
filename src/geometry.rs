//! Integer rectangles used for component bounds and blit clipping.
//!
//! A [`Bounds`] is defined by its top-left corner `(x, y)` and its
//! `width`/`height` in pixels. Coordinates are top-left origin, which is what
//! components report. GL wants bottom-left origin for scissoring; see
//! [`Bounds::flipped_within`].
//!
//! # Examples
//!
//! ```
//! use gosub_gl::geometry::Bounds;
//!
//! let a = Bounds::new(0, 0, 100, 50);
//! let b = Bounds::new(50, 25, 100, 100);
//! assert_eq!(a.intersection(&b), Bounds::new(50, 25, 50, 25));
//! assert!(!a.is_empty());
//! ```

/// Represents a rectangle in pixels.
#[derive(Clone, Eq, PartialEq, Copy, Default, Hash)]
pub struct Bounds {
    /// Horizontal offset in pixels from the origin.
    pub x: i32,

    /// Vertical offset in pixels from the origin.
    pub y: i32,

    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,
}

impl std::fmt::Debug for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bounds {{ x: {}, y: {}, width: {}, height: {} }}",
            self.x, self.y, self.width, self.height
        )
    }
}

impl Bounds {
    /// Creates new [`Bounds`] with the given position and size.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Bounds at the origin with the given size.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// True when the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    #[inline]
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Returns the overlapping area, or an empty rectangle at `self`'s origin
    /// when the two do not overlap.
    pub fn intersection(&self, other: &Bounds) -> Bounds {
        let left = (self.x as i64).max(other.x as i64);
        let top = (self.y as i64).max(other.y as i64);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return Bounds::new(self.x, self.y, 0, 0);
        }

        Bounds::new(left as i32, top as i32, (right - left) as u32, (bottom - top) as u32)
    }

    /// Converts a top-left origin rectangle into bottom-left origin
    /// coordinates inside an area `height` pixels tall.
    pub fn flipped_within(&self, height: u32) -> Bounds {
        let y = height as i64 - self.bottom();
        Bounds::new(self.x, y as i32, self.width, self.height)
    }
}

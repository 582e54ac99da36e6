use crate::geometry::Bounds;

/// How a native context should draw a [`TextureQuad`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawPath {
    /// Programmable pipeline with a textured-quad shader.
    Shader,
    /// Fixed-function pipeline for drivers without GLSL.
    Legacy,
}

/// Geometry for blitting the currently bound texture into the framebuffer.
///
/// Vertices are in triangle-strip order: top-left, top-right, bottom-left,
/// bottom-right. Texture coordinates use GL's bottom-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureQuad {
    /// Clip-space positions.
    pub positions: [[f32; 2]; 4],
    pub tex_coords: [[f32; 2]; 4],
    /// Scissor rectangle in bottom-left origin framebuffer pixels.
    pub scissor: Bounds,
}

impl TextureQuad {
    /// Maps `anchor` (texture's top-left position and full size, in top-left
    /// origin pixels of a `width` x `height` target) into clip space and
    /// clamps the scissor to `target_clip`.
    ///
    /// Returns `None` when nothing would be drawn.
    pub fn new(target_clip: Bounds, anchor: Bounds, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 || anchor.is_empty() {
            return None;
        }

        let clip = target_clip.intersection(&Bounds::with_size(width, height));
        if clip.is_empty() {
            return None;
        }

        let to_x = |px: i64| 2.0 * px as f32 / width as f32 - 1.0;
        let to_y = |py: i64| 1.0 - 2.0 * py as f32 / height as f32;

        let left = to_x(anchor.x as i64);
        let right = to_x(anchor.right());
        let top = to_y(anchor.y as i64);
        let bottom = to_y(anchor.bottom());

        Some(Self {
            positions: [[left, top], [right, top], [left, bottom], [right, bottom]],
            tex_coords: [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]],
            scissor: clip.flipped_within(height),
        })
    }
}

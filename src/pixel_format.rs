/// Describes the surface format requested from the GPU backend.
///
/// Backends treat this as a preference: they pick the closest format the
/// driver offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat {
    pub red_bits: u8,
    pub green_bits: u8,
    pub blue_bits: u8,
    pub alpha_bits: u8,
    pub depth_bits: u8,
    pub stencil_bits: u8,
    /// Bits per channel of the accumulation buffer, 0 for none.
    pub accumulation_bits: u8,
    /// Number of samples per pixel, 0 to disable multisampling.
    pub multisampling_level: u8,
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::with_rgba_bits(8, 8)
    }
}

impl PixelFormat {
    /// Format with the same bit count for each colour component, a 16 bit
    /// depth buffer and no stencil, accumulation or multisampling.
    pub fn with_rgba_bits(bits_per_component: u8, alpha_bits: u8) -> Self {
        Self {
            red_bits: bits_per_component,
            green_bits: bits_per_component,
            blue_bits: bits_per_component,
            alpha_bits,
            depth_bits: 16,
            stencil_bits: 0,
            accumulation_bits: 0,
            multisampling_level: 0,
        }
    }

    pub fn depth(mut self, bits: u8) -> Self {
        self.depth_bits = bits;
        self
    }

    pub fn stencil(mut self, bits: u8) -> Self {
        self.stencil_bits = bits;
        self
    }

    pub fn multisampling(mut self, level: u8) -> Self {
        self.multisampling_level = level;
        self
    }

    /// Total colour bits per pixel.
    pub fn color_bits(&self) -> u32 {
        self.red_bits as u32 + self.green_bits as u32 + self.blue_bits as u32 + self.alpha_bits as u32
    }
}

//! A host-side pixel buffer in the exact byte layout `show` expects.
//!
//! The driver itself only consumes raw framebuffer bytes; this canvas is the
//! convenient way to produce them with `embedded-graphics` instead of poking
//! little-endian words by hand. It is plain storage — one RGB565 word per
//! pixel — not a compositor.

use core::convert::Infallible;

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::pixelcolor::raw::ToBytes;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::{OriginDimensions, Point, Size};

/// A `WIDTH` × `HEIGHT` RGB565 framebuffer with little-endian storage.
///
/// Feed [`as_bytes`](Self::as_bytes) straight into
/// [`crate::matrix::LedMatrix::show`] with
/// [`PixelFormat::Rgb565`](crate::pixels::PixelFormat::Rgb565).
///
/// # Example
///
/// ```rust
/// use embedded_graphics::pixelcolor::Rgb565;
/// use embedded_graphics::prelude::*;
/// use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
/// use hub75_bitstream::canvas::Rgb565Canvas;
///
/// let mut canvas = Rgb565Canvas::<64, 32>::new();
/// Rectangle::new(Point::new(10, 10), Size::new(20, 8))
///     .into_styled(PrimitiveStyle::with_fill(Rgb565::RED))
///     .draw(&mut canvas)
///     .unwrap();
/// assert_eq!(canvas.as_bytes().len(), 64 * 32 * 2);
/// ```
#[derive(Clone)]
pub struct Rgb565Canvas<const WIDTH: usize, const HEIGHT: usize> {
    pixels: [[[u8; 2]; WIDTH]; HEIGHT],
}

impl<const WIDTH: usize, const HEIGHT: usize> Rgb565Canvas<WIDTH, HEIGHT> {
    /// Create an all-black canvas.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pixels: [[[0; 2]; WIDTH]; HEIGHT],
        }
    }

    /// The canvas content as the byte sequence `show` expects.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // Safety: the nested arrays are one contiguous block of
        // WIDTH * HEIGHT * 2 initialized bytes.
        unsafe {
            core::slice::from_raw_parts(self.pixels.as_ptr().cast::<u8>(), WIDTH * HEIGHT * 2)
        }
    }

    /// Set a single pixel; coordinates outside the canvas are ignored.
    pub fn set_pixel(&mut self, p: Point, color: Rgb565) {
        if p.x < 0 || p.y < 0 {
            return;
        }
        let (x, y) = (p.x as usize, p.y as usize);
        if x >= WIDTH || y >= HEIGHT {
            return;
        }
        self.pixels[y][x] = color.to_le_bytes();
    }

    /// Fill the whole canvas with one colour.
    pub fn fill(&mut self, color: Rgb565) {
        let bytes = color.to_le_bytes();
        for row in &mut self.pixels {
            for pixel in row.iter_mut() {
                *pixel = bytes;
            }
        }
    }
}

impl<const WIDTH: usize, const HEIGHT: usize> Default for Rgb565Canvas<WIDTH, HEIGHT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const WIDTH: usize, const HEIGHT: usize> core::fmt::Debug for Rgb565Canvas<WIDTH, HEIGHT> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Rgb565Canvas")
            .field("width", &WIDTH)
            .field("height", &HEIGHT)
            .finish()
    }
}

impl<const WIDTH: usize, const HEIGHT: usize> OriginDimensions for Rgb565Canvas<WIDTH, HEIGHT> {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl<const WIDTH: usize, const HEIGHT: usize> DrawTarget for Rgb565Canvas<WIDTH, HEIGHT> {
    type Color = Rgb565;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for pixel in pixels {
            self.set_pixel(pixel.0, pixel.1);
        }
        Ok(())
    }
}

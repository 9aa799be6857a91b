//! Stream-word encoding.
//!
//! Every 16-bit word clocked onto the parallel bus is split into a colour
//! byte (bus lanes 0..=7) and a control byte (lanes 8..=15). The control
//! bytes depend only on the geometry and the global brightness, so they are
//! written once and only rewritten on a brightness change; the colour bytes
//! are rewritten for every frame.
//!
//! Both passes store through raw pointers with volatile writes: the DMA
//! engine is reading the very same bytes while the CPU updates them.

use bitfield::bitfield;

use crate::config::Geometry;
use crate::pixels::Sampler;

/// Byte offset of the colour lanes within a stream word.
pub(crate) const COLOR_BYTE: usize = 0;
/// Byte offset of the control lanes within a stream word.
pub(crate) const CTRL_BYTE: usize = 1;

bitfield! {
    /// Low byte of a stream word: one bit per colour shift-register input.
    ///
    /// Bits 0..=2 feed the upper half of the panel, bits 3..=5 the lower
    /// half. Bits 6 and 7 are not connected.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct ColorByte(u8);
    impl Debug;
    pub red1, set_red1: 0;
    pub grn1, set_grn1: 1;
    pub blu1, set_blu1: 2;
    pub red2, set_red2: 3;
    pub grn2, set_grn2: 4;
    pub blu2, set_blu2: 5;
}

impl ColorByte {
    /// Pack two 3-bit channel samples (`r | g << 1 | b << 2`) into one byte.
    pub(crate) fn from_samples(upper: u8, lower: u8) -> Self {
        Self((upper & 0x07) | ((lower & 0x07) << 3))
    }

    pub(crate) fn into_raw(self) -> u8 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u8) -> Self {
        Self(raw)
    }
}

bitfield! {
    /// High byte of a stream word: blanking, latch and row address.
    ///
    /// `blank` drives the panel's OE input, which is active low: a set bit
    /// darkens the display. The row address occupies bits 2..=7 in ascending
    /// weight.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct ControlByte(u8);
    impl Debug;
    pub blank, set_blank: 0;
    pub latch, set_latch: 1;
    pub row, set_row: 7, 2;
}

impl ControlByte {
    pub(crate) fn into_raw(self) -> u8 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u8) -> Self {
        Self(raw)
    }
}

/// Compute the control byte for one column tick of one row.
pub(crate) fn control_byte(geometry: &Geometry, row: u16, pixel: u16) -> u8 {
    let mut ctrl = ControlByte::default();

    // While this row is being shifted in, the panel still displays the
    // previously latched row, so that is the address we put on the bus. Row
    // addresses only ever change inside the blanking window below.
    let shown = row.wrapping_sub(1) & (geometry.rows - 1);
    ctrl.set_row(shown as u8);

    // Blank while the address lines settle at the start of the row, and
    // again once the brightness window is used up: truncating the lit part
    // of every row is what implements the global brightness.
    ctrl.set_blank(pixel < 2 || pixel > geometry.brightness);

    // Latch on the second-to-last pixel so the falling edge lands on the
    // last one. Data for this line is still being clocked at that point;
    // latching a tick early is what keeps it reliable.
    ctrl.set_latch(pixel == geometry.width - 2);

    if geometry.invert {
        !ctrl.into_raw()
    } else {
        ctrl.into_raw()
    }
}

/// Compute the colour byte for one stream word of one bit plane.
pub(crate) fn color_byte(
    geometry: &Geometry,
    sampler: &Sampler<'_>,
    row: u16,
    pixel: u16,
    bit: u8,
) -> u8 {
    let src_x = if geometry.column_swap { pixel ^ 1 } else { pixel };
    let upper = sampler.sample(src_x, row, bit);
    let lower = if geometry.single_channel {
        0
    } else {
        sampler.sample(src_x, row + geometry.rows, bit)
    };
    let byte = ColorByte::from_samples(upper, lower).into_raw();
    if geometry.invert {
        !byte
    } else {
        byte
    }
}

/// Write the control byte of every stream word.
///
/// Idempotent; depends only on the geometry (including the stored
/// brightness). Colour bytes are left untouched.
///
/// # Safety
///
/// `stream` must point to at least [`Geometry::stream_len`] writable bytes.
pub(crate) unsafe fn write_control(stream: *mut u8, geometry: &Geometry) {
    let subimage_stride = geometry.subimage_stride();
    let row_stride = 2 * geometry.width as usize;
    for plane in 0..geometry.color_depth as usize {
        for row in 0..geometry.rows {
            let row_base = plane * subimage_stride + row as usize * row_stride;
            for pixel in 0..geometry.width {
                let ctrl = control_byte(geometry, row, pixel);
                let offset = row_base + 2 * pixel as usize + CTRL_BYTE;
                unsafe { stream.add(offset).write_volatile(ctrl) };
            }
        }
    }
}

/// Write the colour byte of every stream word from the given sampler.
///
/// Control bytes are left untouched. This is the per-frame hot loop: it runs
/// `depth * rows * width` times per [`crate::matrix::LedMatrix::show`].
///
/// # Safety
///
/// `stream` must point to at least [`Geometry::stream_len`] writable bytes.
pub(crate) unsafe fn write_colors(stream: *mut u8, geometry: &Geometry, sampler: &Sampler<'_>) {
    let subimage_stride = geometry.subimage_stride();
    let row_stride = 2 * geometry.width as usize;
    for plane in 0..geometry.color_depth {
        // MSB first: plane 0 carries the top colour bit.
        let bit = geometry.color_depth - plane - 1;
        for row in 0..geometry.rows {
            let row_base = plane as usize * subimage_stride + row as usize * row_stride;
            for pixel in 0..geometry.width {
                let byte = color_byte(geometry, sampler, row, pixel, bit);
                let offset = row_base + 2 * pixel as usize + COLOR_BYTE;
                unsafe { stream.add(offset).write_volatile(byte) };
            }
        }
    }
}

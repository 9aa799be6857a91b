//! Panel parameters and the validated geometry derived from them.
//!
//! A [`MatrixConfig`] is what the caller fills in; [`MatrixConfig::validate`]
//! checks it once and produces an immutable [`Geometry`] that every other
//! component reads. Nothing downstream re-validates.

use crate::Error;

/// Most row-address decoders expose at most six address lines (1/64 scan).
pub const MAX_ROW_PINS: usize = 6;

/// User-facing panel configuration.
///
/// Pin indices are platform GPIO numbers; the mapping from bus bit positions
/// to these GPIOs is handed to the parallel-bus driver on
/// [`crate::matrix::LedMatrix::init`], so the bitstream encoder itself never
/// needs them.
///
/// `Default` fills in the customary values (colour depth 4, 2.5 MHz clock,
/// column swap on) but leaves `width` and all pins zeroed — a default config
/// on its own does not validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MatrixConfig<'p> {
    /// Colour data lines, `[R1, G1, B1, R2, G2, B2]`, or just `[R1, G1, B1]`
    /// for a single-channel panel.
    pub io_colors: &'p [u8],
    /// Row-address lines, LSB first (usually labelled A, B, C, … on the
    /// panel). The panel height is implied by how many there are.
    pub io_rows: &'p [u8],
    /// Output-enable line (active low; blanks the panel while high).
    pub io_oe: u8,
    /// Latch line.
    pub io_lat: u8,
    /// Pixel clock line.
    pub io_clk: u8,
    /// Panel width in pixels. Chained panels just extend the width.
    pub width: u16,
    /// Bits per colour channel, 1..=8. Higher depths need a faster clock to
    /// stay flicker-free.
    pub color_depth: u8,
    /// Pixel clock in kHz. Passed through to the bus driver, which enforces
    /// its own supported range.
    pub clock_speed_khz: u32,
    /// Invert all output signals, for inverting level shifters.
    pub invert: bool,
    /// Keep two stream buffers and hand frames over tear-free. Doubles the
    /// DMA memory requirement.
    pub double_buffer: bool,
    /// Swap every adjacent column pair; many panels are wired that way
    /// internally.
    pub column_swap: bool,
    /// Panel with a single set of colour lines instead of the usual
    /// upper/lower split.
    pub single_channel: bool,
    /// Global brightness, `0..=width - 2`. `None` selects maximum.
    pub brightness: Option<u16>,
}

impl Default for MatrixConfig<'_> {
    fn default() -> Self {
        Self {
            io_colors: &[],
            io_rows: &[],
            io_oe: 0,
            io_lat: 0,
            io_clk: 0,
            width: 0,
            color_depth: 4,
            clock_speed_khz: 2500,
            invert: false,
            double_buffer: false,
            column_swap: true,
            single_channel: false,
            brightness: None,
        }
    }
}

impl MatrixConfig<'_> {
    /// Validate the configuration and derive the panel [`Geometry`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when the width is odd or below 4, the
    /// colour depth is outside 1..=8, the pin counts do not match the channel
    /// mode, the brightness exceeds `width - 2`, or any pin index is
    /// duplicated or out of range.
    pub fn validate(&self) -> Result<Geometry, Error> {
        if self.width < 4 || self.width % 2 != 0 {
            return Err(Error::InvalidArgument("width must be an even number of at least 4"));
        }
        if self.color_depth == 0 || self.color_depth > 8 {
            return Err(Error::InvalidArgument("color depth must be between 1 and 8"));
        }
        let expected_colors = if self.single_channel { 3 } else { 6 };
        if self.io_colors.len() != expected_colors {
            return Err(Error::InvalidArgument("unexpected number of color io lines"));
        }
        if self.io_rows.is_empty() || self.io_rows.len() > MAX_ROW_PINS {
            return Err(Error::InvalidArgument("between 1 and 6 row io lines required"));
        }
        if let Some(brightness) = self.brightness {
            if brightness > self.width - 2 {
                return Err(Error::InvalidArgument("brightness must be between 0 and width - 2"));
            }
        }

        let mut seen = 0u64;
        let fixed = [self.io_oe, self.io_lat, self.io_clk];
        for &pin in self.io_colors.iter().chain(self.io_rows).chain(&fixed) {
            if pin >= 64 {
                return Err(Error::InvalidArgument("pin index out of range"));
            }
            let mask = 1u64 << pin;
            if seen & mask != 0 {
                return Err(Error::InvalidArgument("pin indices must be distinct"));
            }
            seen |= mask;
        }

        let row_bits = self.io_rows.len() as u8;
        let rows = 1u16 << row_bits;
        // Split panels scan two rows per address, one per colour channel set.
        let height = if self.single_channel { rows } else { rows * 2 };

        Ok(Geometry {
            width: self.width,
            rows,
            row_bits,
            height,
            color_depth: self.color_depth,
            brightness: self.brightness.unwrap_or(self.width - 2) + 1,
            invert: self.invert,
            column_swap: self.column_swap,
            double_buffer: self.double_buffer,
            single_channel: self.single_channel,
        })
    }
}

/// Validated panel geometry.
///
/// Produced once by [`MatrixConfig::validate`]; every later component reads
/// it without mutation (the one exception is the stored brightness, which the
/// lifecycle controller updates on a brightness change).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    pub(crate) width: u16,
    pub(crate) rows: u16,
    pub(crate) row_bits: u8,
    pub(crate) height: u16,
    pub(crate) color_depth: u8,
    // Stored as the user value plus one, so the blanking compare in the
    // control pass is a plain `pixel > brightness`.
    pub(crate) brightness: u16,
    pub(crate) invert: bool,
    pub(crate) column_swap: bool,
    pub(crate) double_buffer: bool,
    pub(crate) single_channel: bool,
}

impl Geometry {
    /// Panel width in pixels.
    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Panel height in pixels.
    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Number of distinct row addresses.
    #[must_use]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Number of row-address lines on the bus.
    #[must_use]
    pub fn row_address_bits(&self) -> u8 {
        self.row_bits
    }

    /// Bits per colour channel.
    #[must_use]
    pub fn color_depth(&self) -> u8 {
        self.color_depth
    }

    /// Current global brightness on the user scale, `0..=width - 2`.
    #[must_use]
    pub fn brightness(&self) -> u16 {
        self.brightness - 1
    }

    /// Whether two stream buffers are kept for tear-free updates.
    #[must_use]
    pub fn double_buffered(&self) -> bool {
        self.double_buffer
    }

    pub(crate) fn subimage_stride(&self) -> usize {
        crate::subimage_stride(self.width, self.rows)
    }

    pub(crate) fn stream_len(&self) -> usize {
        self.subimage_stride() * self.color_depth as usize
    }

    pub(crate) fn descriptors_per_subimage(&self) -> usize {
        crate::descriptors_per_subimage(self.width, self.rows)
    }

    pub(crate) fn descriptor_count(&self) -> usize {
        crate::descriptor_count(self.width, self.rows, self.color_depth)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    fn dual_config() -> MatrixConfig<'static> {
        MatrixConfig {
            io_colors: &[2, 15, 4, 16, 27, 17],
            io_rows: &[5, 18, 19, 21],
            io_oe: 25,
            io_lat: 26,
            io_clk: 22,
            width: 64,
            ..MatrixConfig::default()
        }
    }

    #[test]
    fn test_dual_channel_geometry() {
        let geometry = dual_config().validate().unwrap();
        assert_eq!(geometry.width(), 64);
        assert_eq!(geometry.rows(), 16);
        assert_eq!(geometry.row_bits, 4);
        assert_eq!(geometry.height(), 32);
        assert_eq!(geometry.color_depth(), 4);
        assert!(!geometry.single_channel);
        assert!(geometry.column_swap);
    }

    #[test]
    fn test_single_channel_geometry() {
        let config = MatrixConfig {
            io_colors: &[2, 15, 4],
            io_rows: &[5, 18, 19],
            single_channel: true,
            ..dual_config()
        };
        let geometry = config.validate().unwrap();
        assert_eq!(geometry.rows(), 8);
        assert_eq!(geometry.height(), 8);
    }

    #[test]
    fn test_default_brightness_is_maximum() {
        let geometry = dual_config().validate().unwrap();
        // stored one above the user value
        assert_eq!(geometry.brightness, 63);
        assert_eq!(geometry.brightness(), 62);
    }

    #[test]
    fn test_explicit_brightness() {
        let config = MatrixConfig {
            brightness: Some(0),
            ..dual_config()
        };
        assert_eq!(config.validate().unwrap().brightness, 1);

        let config = MatrixConfig {
            brightness: Some(62),
            ..dual_config()
        };
        assert_eq!(config.validate().unwrap().brightness, 63);
    }

    #[test]
    fn test_brightness_out_of_range() {
        let config = MatrixConfig {
            brightness: Some(63),
            ..dual_config()
        };
        assert_eq!(
            config.validate(),
            Err(Error::InvalidArgument("brightness must be between 0 and width - 2"))
        );
    }

    #[test]
    fn test_odd_width_rejected() {
        let config = MatrixConfig {
            width: 63,
            ..dual_config()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_tiny_width_rejected() {
        let config = MatrixConfig {
            width: 2,
            ..dual_config()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_color_depth_bounds() {
        for depth in [0u8, 9, 16] {
            let config = MatrixConfig {
                color_depth: depth,
                ..dual_config()
            };
            assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));
        }
        for depth in 1..=8u8 {
            let config = MatrixConfig {
                color_depth: depth,
                ..dual_config()
            };
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_color_pin_count_must_match_channel_mode() {
        let config = MatrixConfig {
            io_colors: &[2, 15, 4],
            ..dual_config()
        };
        assert_eq!(
            config.validate(),
            Err(Error::InvalidArgument("unexpected number of color io lines"))
        );

        let config = MatrixConfig {
            single_channel: true,
            ..dual_config()
        };
        assert_eq!(
            config.validate(),
            Err(Error::InvalidArgument("unexpected number of color io lines"))
        );
    }

    #[test]
    fn test_row_pin_count_bounds() {
        let config = MatrixConfig {
            io_rows: &[],
            ..dual_config()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));

        let config = MatrixConfig {
            io_rows: &[5, 18, 19, 21, 23, 32, 33],
            ..dual_config()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_duplicate_pins_rejected() {
        let config = MatrixConfig {
            // clock reuses a colour line
            io_clk: 15,
            ..dual_config()
        };
        assert_eq!(
            config.validate(),
            Err(Error::InvalidArgument("pin indices must be distinct"))
        );
    }

    #[test]
    fn test_pin_out_of_range_rejected() {
        let config = MatrixConfig {
            io_oe: 64,
            ..dual_config()
        };
        assert_eq!(config.validate(), Err(Error::InvalidArgument("pin index out of range")));
    }

    #[test]
    fn test_derived_sizes() {
        let geometry = dual_config().validate().unwrap();
        assert_eq!(geometry.subimage_stride(), 2048);
        assert_eq!(geometry.stream_len(), 2048 * 4);
        assert_eq!(geometry.descriptors_per_subimage(), 1);
        assert_eq!(geometry.descriptor_count(), 15);
    }
}

//! The parallel output engine, seen from the core.
//!
//! The core never touches the peripheral itself: it lays out stream words
//! against the fixed lane positions below, builds a [`BusConfig`] that maps
//! those lanes to real GPIOs, and drives the engine through [`ParallelBus`].
//! Platform drivers (I2S/LCD-CAM style parallel DMA) implement the trait.

use core::ptr::NonNull;

use crate::config::MatrixConfig;
use crate::ring::DmaDescriptor;

/// Bus bit position of the first colour lane (R1 G1 B1 R2 G2 B2 in order).
pub const COLOR_LANE_BASE: usize = 0;
/// Bus bit position of the output-enable (blank) lane.
pub const BLANK_LANE: usize = 8;
/// Bus bit position of the latch lane.
pub const LATCH_LANE: usize = 9;
/// Bus bit position of the first row-address lane, ascending weight.
pub const ROW_LANE_BASE: usize = 10;
/// Width of the parallel bus in lanes.
pub const BUS_LANES: usize = 16;

/// Sample width of the parallel bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordSize {
    /// 8-bit samples
    Eight,
    /// 16-bit samples
    Sixteen,
}

/// Everything a platform driver needs to set up the output engine.
///
/// Because the stream words always use the same lane layout, this mapping is
/// the only place GPIO numbers appear.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// GPIO number per bus lane; unused lanes stay `None`.
    pub lanes: [Option<u8>; BUS_LANES],
    /// GPIO number of the pixel clock output.
    pub clock_pin: u8,
    /// Sample rate in Hz, i.e. the panel pixel clock.
    pub sample_rate_hz: u32,
    /// Sample width; this core always emits 16-bit words.
    pub word_size: WordSize,
}

impl BusConfig {
    /// Map a validated matrix configuration onto the fixed lane layout.
    pub(crate) fn from_matrix(config: &MatrixConfig<'_>) -> Self {
        let mut lanes = [None; BUS_LANES];
        for (lane, &pin) in config.io_colors.iter().enumerate() {
            lanes[COLOR_LANE_BASE + lane] = Some(pin);
        }
        lanes[BLANK_LANE] = Some(config.io_oe);
        lanes[LATCH_LANE] = Some(config.io_lat);
        for (lane, &pin) in config.io_rows.iter().enumerate() {
            lanes[ROW_LANE_BASE + lane] = Some(pin);
        }
        Self {
            lanes,
            clock_pin: config.io_clk,
            sample_rate_hz: config.clock_speed_khz * 1000,
            word_size: WordSize::Sixteen,
        }
    }
}

/// A non-success code reported by the platform driver, passed through to the
/// caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverError(pub i32);

/// The memory-mapped parallel output engine with descriptor-chasing DMA.
///
/// `send` starts transmitting from a linked descriptor and the engine then
/// follows `next` pointers on its own — a closed ring streams forever. The
/// implementation owns pin muxing, clocking and cache maintenance.
pub trait ParallelBus {
    /// Configure pin mux, clock and sample width.
    ///
    /// # Errors
    ///
    /// The platform's error code, passed through as [`DriverError`].
    fn install(&mut self, config: &BusConfig) -> Result<(), DriverError>;

    /// Begin transferring from `head`, following descriptor links
    /// indefinitely.
    ///
    /// # Errors
    ///
    /// The platform's error code, passed through as [`DriverError`].
    fn send(&mut self, head: NonNull<DmaDescriptor>) -> Result<(), DriverError>;

    /// Whether the transmitter has gone idle.
    fn is_idle(&self) -> bool;
}

impl<B: ParallelBus + ?Sized> ParallelBus for &mut B {
    fn install(&mut self, config: &BusConfig) -> Result<(), DriverError> {
        (**self).install(config)
    }

    fn send(&mut self, head: NonNull<DmaDescriptor>) -> Result<(), DriverError> {
        (**self).send(head)
    }

    fn is_idle(&self) -> bool {
        (**self).is_idle()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn test_lane_mapping() {
        let config = MatrixConfig {
            io_colors: &[2, 15, 4, 16, 27, 17],
            io_rows: &[5, 18, 19, 21],
            io_oe: 25,
            io_lat: 26,
            io_clk: 22,
            width: 64,
            ..MatrixConfig::default()
        };
        let bus = BusConfig::from_matrix(&config);

        assert_eq!(bus.lanes[0], Some(2));
        assert_eq!(bus.lanes[1], Some(15));
        assert_eq!(bus.lanes[2], Some(4));
        assert_eq!(bus.lanes[3], Some(16));
        assert_eq!(bus.lanes[4], Some(27));
        assert_eq!(bus.lanes[5], Some(17));
        assert_eq!(bus.lanes[6], None);
        assert_eq!(bus.lanes[7], None);
        assert_eq!(bus.lanes[BLANK_LANE], Some(25));
        assert_eq!(bus.lanes[LATCH_LANE], Some(26));
        assert_eq!(bus.lanes[ROW_LANE_BASE], Some(5));
        assert_eq!(bus.lanes[ROW_LANE_BASE + 1], Some(18));
        assert_eq!(bus.lanes[ROW_LANE_BASE + 2], Some(19));
        assert_eq!(bus.lanes[ROW_LANE_BASE + 3], Some(21));
        assert_eq!(bus.lanes[14], None);
        assert_eq!(bus.lanes[15], None);

        assert_eq!(bus.clock_pin, 22);
        assert_eq!(bus.sample_rate_hz, 2_500_000);
        assert_eq!(bus.word_size, WordSize::Sixteen);
    }

    #[test]
    fn test_single_channel_lane_mapping() {
        let config = MatrixConfig {
            io_colors: &[2, 15, 4],
            io_rows: &[5],
            io_oe: 25,
            io_lat: 26,
            io_clk: 22,
            width: 64,
            single_channel: true,
            clock_speed_khz: 313,
            ..MatrixConfig::default()
        };
        let bus = BusConfig::from_matrix(&config);

        assert_eq!(bus.lanes[2], Some(4));
        assert_eq!(bus.lanes[3], None);
        assert_eq!(bus.lanes[ROW_LANE_BASE], Some(5));
        assert_eq!(bus.lanes[ROW_LANE_BASE + 1], None);
        assert_eq!(bus.sample_rate_hz, 313_000);
    }
}

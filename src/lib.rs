//! DMA bitstream driver core for chained HUB75 LED matrix panels.
//!
//! ## The display, in one paragraph
//!
//! HUB75 panels are shift-register displays: per pixel clock they accept six
//! colour bits (R1 G1 B1 for the upper half, R2 G2 B2 for the lower half), a
//! row address (A B C …), a latch strobe and an active-low output-enable. The
//! panel has no brightness control of its own — greyscale comes from Binary
//! Code Modulation (BCM): the refresh cycle shows one subimage per colour bit,
//! with display times weighted 1 : 2 : 4 : … : 2^(depth−1).
//!
//! ## What this crate does
//!
//! This crate turns user framebuffers into the *bitstream* such a panel needs
//! and keeps it flowing without CPU involvement:
//!
//! - Every emitted 16-bit stream word carries the six colour lanes in its low
//!   byte and the OE/LAT/row-address control signals in its high byte. The
//!   control bytes are fixed between frames (they also encode the global
//!   brightness as a per-row blanking window); only the colour bytes are
//!   rewritten on [`matrix::LedMatrix::show`].
//! - The stream is fed to a memory-mapped 16-lane parallel output engine
//!   through a closed ring of DMA descriptors ([`ring`]). Subimages are
//!   time-interleaved across the ring — heavier bit planes appear more often —
//!   so the effective refresh rate stays high and low-frequency flicker is
//!   suppressed.
//! - With double buffering enabled, updates are tear-free: a frame is encoded
//!   into the back buffer and the running transfer is redirected by rewriting
//!   the two rings' tail links, a single pointer store the engine picks up at
//!   its next wrap ([`matrix`]).
//! - User pixels may arrive as little-endian RGB565, 8-bit greyscale with a
//!   colour tint, or 1-bpp MSB-first monochrome ([`pixels`]).
//!
//! The platform pieces stay outside: the parallel-DMA peripheral itself is
//! reached through the [`bus::ParallelBus`] trait and DMA-capable memory
//! through the [`mem::DmaAlloc`] trait, so the core is testable on the host
//! and portable between HALs.
//!
//! ## Example
//!
//! ```rust
//! use hub75_bitstream::config::MatrixConfig;
//!
//! let config = MatrixConfig {
//!     io_colors: &[2, 15, 4, 16, 27, 17],
//!     io_rows: &[5, 18, 19, 21],
//!     io_oe: 25,
//!     io_lat: 26,
//!     io_clk: 22,
//!     width: 64,
//!     ..MatrixConfig::default()
//! };
//! let geometry = config.validate()?;
//! assert_eq!(geometry.height(), 32);
//! assert_eq!(hub75_bitstream::descriptor_count(64, 16, 4), 15);
//! # Ok::<(), hub75_bitstream::Error>(())
//! ```
//!
//! See [`matrix::LedMatrix`] for the full driver lifecycle.
//!
//! ## Feature flags
//!
//! ### `defmt`
//! Implements `defmt::Format` for the public types and emits a few
//! `defmt::debug!`/`trace!` lines from the lifecycle and ring-builder paths.
//! No functional changes.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use embedded_graphics::pixelcolor::Rgb888;

pub mod buffer;
pub mod bus;
pub mod canvas;
pub mod config;
mod encoder;
pub mod matrix;
pub mod mem;
pub mod pixels;
pub mod ring;

/// Colour type used for the monochrome/greyscale tint
pub type Color = Rgb888;

/// Errors surfaced by the driver core.
///
/// All errors propagate to the caller; nothing is retried internally. A
/// failed [`matrix::LedMatrix::init`] rolls back every allocation it made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An operation other than `init`/`deinit` was called while no matrix is
    /// configured.
    NotInitialized,
    /// Bad geometry or a framebuffer whose size does not match the panel.
    InvalidArgument(&'static str),
    /// DMA-capable memory for the stream or the descriptor ring could not be
    /// allocated.
    OutOfMemory,
    /// The parallel-DMA collaborator reported a non-success code; the value
    /// is passed through unchanged.
    Driver(i32),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "led matrix not initialized"),
            Self::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Self::OutOfMemory => write!(f, "out of DMA-capable memory"),
            Self::Driver(code) => write!(f, "parallel bus driver error {code}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<bus::DriverError> for Error {
    fn from(error: bus::DriverError) -> Self {
        Self::Driver(error.0)
    }
}

impl From<mem::OutOfMemory> for Error {
    fn from(_: mem::OutOfMemory) -> Self {
        Self::OutOfMemory
    }
}

/// Computes the number of subimages (bit planes) shown per refresh cycle
///
/// Each bit plane `l` is displayed `2^l` times per cycle, which sums to
/// `2^depth - 1` subimage slots.
///
/// # Arguments
///
/// * `color_depth` - Number of bits per colour channel (1..=8)
///
/// # Returns
///
/// Number of subimage slots in one refresh cycle
#[must_use]
pub const fn subimage_count(color_depth: u8) -> usize {
    (1usize << color_depth) - 1
}

/// Computes the size of one subimage in bytes
///
/// One 16-bit stream word is emitted per (row, column) cell.
///
/// # Arguments
///
/// * `width` - Panel width in pixels
/// * `rows` - Number of distinct row addresses (`2^row_pins`)
///
/// # Returns
///
/// Subimage size in bytes
#[must_use]
pub const fn subimage_stride(width: u16, rows: u16) -> usize {
    2 * width as usize * rows as usize
}

/// Computes how many DMA descriptors one subimage needs
///
/// A single descriptor moves at most [`ring::MAX_TRANSFER`] bytes, so larger
/// subimages are split into consecutive segments.
#[must_use]
pub const fn descriptors_per_subimage(width: u16, rows: u16) -> usize {
    subimage_stride(width, rows).div_ceil(ring::MAX_TRANSFER)
}

/// Computes the total length of the descriptor ring
///
/// # Arguments
///
/// * `width` - Panel width in pixels
/// * `rows` - Number of distinct row addresses
/// * `color_depth` - Number of bits per colour channel
///
/// # Returns
///
/// Number of descriptors in one ring
#[must_use]
pub const fn descriptor_count(width: u16, rows: u16, color_depth: u8) -> usize {
    subimage_count(color_depth) * descriptors_per_subimage(width, rows)
}

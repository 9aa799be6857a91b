//! Driver lifecycle: init, show, brightness, stop/resume, deinit.
//!
//! [`LedMatrix`] is the single owning cell for a configured panel. `init`
//! builds the stream buffers and descriptor rings, installs the parallel-bus
//! driver and starts the transfer; from then on the engine refreshes the
//! panel on its own and the CPU only rewrites bytes the engine happens to be
//! reading. `show` updates colour bytes (tear-free when double-buffered),
//! `set_brightness` rewrites control bytes, and `stop` parks the output on a
//! single blanked word so the panel goes dark instead of freezing on a lit
//! row.

use core::alloc::Layout;
use core::ptr::NonNull;

use embedded_graphics::pixelcolor::RgbColor;

use crate::buffer::StreamBuffer;
use crate::bus::{BusConfig, ParallelBus};
use crate::config::{Geometry, MatrixConfig};
use crate::encoder::{ControlByte, COLOR_BYTE, CTRL_BYTE};
use crate::mem::{DmaAlloc, DmaRegion};
use crate::pixels::{PixelFormat, Sampler};
use crate::ring::{DescriptorFlags, DmaDescriptor};
use crate::{Color, Error};

/// A configured LED matrix driver.
///
/// Generic over the two platform capabilities it consumes: a DMA-capable
/// allocator and the parallel output engine. Both are owned for the life of
/// the driver, so one `LedMatrix` value is the whole lifecycle — dropping it
/// blanks the panel and frees every DMA allocation.
///
/// # Example
///
/// ```rust
/// use core::alloc::Layout;
/// use core::ptr::NonNull;
///
/// use hub75_bitstream::bus::{BusConfig, DriverError, ParallelBus};
/// use hub75_bitstream::config::MatrixConfig;
/// use hub75_bitstream::matrix::LedMatrix;
/// use hub75_bitstream::mem::{DmaAlloc, OutOfMemory};
/// use hub75_bitstream::pixels::PixelFormat;
/// use hub75_bitstream::ring::DmaDescriptor;
///
/// // Any memory works on the host; a real target returns DMA-capable RAM.
/// struct HeapAlloc;
///
/// impl DmaAlloc for HeapAlloc {
///     fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, OutOfMemory> {
///         NonNull::new(unsafe { std::alloc::alloc(layout) }).ok_or(OutOfMemory)
///     }
///
///     unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
///         unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
///     }
/// }
///
/// // Stand-in for the platform's parallel-DMA driver.
/// struct NullBus;
///
/// impl ParallelBus for NullBus {
///     fn install(&mut self, _config: &BusConfig) -> Result<(), DriverError> {
///         Ok(())
///     }
///
///     fn send(&mut self, _head: NonNull<DmaDescriptor>) -> Result<(), DriverError> {
///         Ok(())
///     }
///
///     fn is_idle(&self) -> bool {
///         true
///     }
/// }
///
/// let mut matrix = LedMatrix::new(HeapAlloc, NullBus);
/// matrix.init(&MatrixConfig {
///     io_colors: &[2, 15, 4, 16, 27, 17],
///     io_rows: &[5, 18, 19, 21],
///     io_oe: 25,
///     io_lat: 26,
///     io_clk: 22,
///     width: 64,
///     ..MatrixConfig::default()
/// })?;
///
/// let frame = [0u8; 64 * 32 * 2];
/// matrix.show(&frame, PixelFormat::Rgb565, None)?;
/// # Ok::<(), hub75_bitstream::Error>(())
/// ```
pub struct LedMatrix<A: DmaAlloc, B: ParallelBus> {
    alloc: A,
    bus: B,
    active: Option<Active>,
}

struct Active {
    geometry: Geometry,
    mono_color: [u8; 3],
    primary: StreamBuffer,
    secondary: Option<StreamBuffer>,
    backbuffer: usize,
    safe_word: SafeWord,
}

impl Active {
    fn buffer(&self, index: usize) -> &StreamBuffer {
        match (index, self.secondary.as_ref()) {
            (0, _) | (_, None) => &self.primary,
            (_, Some(secondary)) => secondary,
        }
    }

    fn front_index(&self) -> usize {
        if self.secondary.is_some() {
            self.backbuffer ^ 1
        } else {
            0
        }
    }
}

impl<A: DmaAlloc, B: ParallelBus> LedMatrix<A, B> {
    /// Create an unconfigured driver owning its platform capabilities.
    pub fn new(alloc: A, bus: B) -> Self {
        Self {
            alloc,
            bus,
            active: None,
        }
    }

    /// Whether a panel is currently configured.
    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    /// Geometry of the configured panel, if any.
    pub fn geometry(&self) -> Option<&Geometry> {
        self.active.as_ref().map(|active| &active.geometry)
    }

    /// The stream buffer the engine is (or will be) transmitting.
    ///
    /// Mainly useful for HALs that want the raw stream through the
    /// `embedded-dma` `ReadBuffer` seam instead of the descriptor ring.
    pub fn front_buffer(&self) -> Option<&StreamBuffer> {
        self.active
            .as_ref()
            .map(|active| active.buffer(active.front_index()))
    }

    /// The parallel-bus driver.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// The parallel-bus driver, mutably.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Configure the panel and start refreshing it.
    ///
    /// Runs a defensive [`deinit`](Self::deinit) first, validates the
    /// configuration, allocates one stream buffer (two when double-buffered)
    /// plus the parked safe word, installs the bus driver and starts the
    /// transfer from the front ring.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for bad geometry, [`Error::OutOfMemory`]
    /// when DMA memory runs out, [`Error::Driver`] when the bus driver
    /// refuses the configuration. On any failure every allocation made here
    /// is rolled back and the driver stays unconfigured.
    pub fn init(&mut self, config: &MatrixConfig<'_>) -> Result<(), Error> {
        self.deinit();

        let geometry = config.validate()?;
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "led matrix {=u16}x{=u16}, depth {=u8}, {=usize} descriptors per ring",
            geometry.width(),
            geometry.height(),
            geometry.color_depth(),
            geometry.descriptor_count()
        );

        let primary = StreamBuffer::allocate(&self.alloc, &geometry)?;
        primary.write_control(&geometry);

        let secondary = if geometry.double_buffered() {
            match StreamBuffer::allocate(&self.alloc, &geometry) {
                Ok(buffer) => {
                    buffer.write_control(&geometry);
                    Some(buffer)
                }
                Err(error) => {
                    primary.release(&self.alloc);
                    return Err(error);
                }
            }
        } else {
            None
        };

        let safe_word = match SafeWord::allocate(&self.alloc, &geometry) {
            Ok(safe_word) => safe_word,
            Err(error) => {
                primary.release(&self.alloc);
                if let Some(secondary) = secondary {
                    secondary.release(&self.alloc);
                }
                return Err(error);
            }
        };

        if let Err(error) = self.bus.install(&BusConfig::from_matrix(config)) {
            primary.release(&self.alloc);
            if let Some(secondary) = secondary {
                secondary.release(&self.alloc);
            }
            safe_word.release(&self.alloc);
            return Err(error.into());
        }

        self.active = Some(Active {
            geometry,
            mono_color: [0xff; 3],
            primary,
            secondary,
            // With two buffers the second one starts writable while the
            // first is streamed.
            backbuffer: usize::from(geometry.double_buffered()),
            safe_word,
        });

        self.start()
    }

    fn start(&mut self) -> Result<(), Error> {
        let active = self.active.as_ref().ok_or(Error::NotInitialized)?;
        let head = active.buffer(active.front_index()).head();
        self.bus.send(head)?;
        Ok(())
    }

    /// Encode a user framebuffer into the panel stream.
    ///
    /// `fb` must match the byte size [`PixelFormat::buffer_len`] gives for
    /// the panel. A `mono_color` replaces the stored tint used by the
    /// [`Gray8`](PixelFormat::Gray8) and [`MonoHlsb`](PixelFormat::MonoHlsb)
    /// formats; `None` keeps the previous tint (initially white).
    ///
    /// Single-buffered, this rewrites the live stream in place and the frame
    /// may tear; double-buffered, the frame is encoded into the back buffer
    /// and both rings' tail links are retargeted so the engine switches over
    /// at its next wrap, without stopping.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] without a prior `init`;
    /// [`Error::InvalidArgument`] on a size mismatch, in which case no byte
    /// of the stream has been touched.
    pub fn show(
        &mut self,
        fb: &[u8],
        format: PixelFormat,
        mono_color: Option<Color>,
    ) -> Result<(), Error> {
        let active = self.active.as_mut().ok_or(Error::NotInitialized)?;
        if fb.len() != format.buffer_len(&active.geometry) {
            return Err(Error::InvalidArgument("unexpected framebuffer size"));
        }

        if let Some(color) = mono_color {
            active.mono_color = [color.r(), color.g(), color.b()];
        }

        let geometry = active.geometry;
        let sampler = Sampler::new(format, fb, geometry.width(), active.mono_color);
        active.buffer(active.backbuffer).write_colors(&geometry, &sampler);

        if active.secondary.is_some() {
            // Close the loop of the freshly written buffer for the running
            // engine: whichever ring it is currently walking, its tail now
            // leads into the new frame.
            let target = active.buffer(active.backbuffer).head();
            active.primary.retarget_tail(target);
            if let Some(secondary) = active.secondary.as_ref() {
                secondary.retarget_tail(target);
            }
            active.backbuffer ^= 1;
        }

        Ok(())
    }

    /// Change the global brightness, `0..=width - 2`; larger values clamp.
    ///
    /// Rewrites the control bytes of every buffer in place. That bypasses
    /// double buffering, which is fine for a knob that changes rarely and
    /// cannot tear into anything visible.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] without a prior `init`.
    pub fn set_brightness(&mut self, level: u16) -> Result<(), Error> {
        let active = self.active.as_mut().ok_or(Error::NotInitialized)?;
        active.geometry.brightness = level.min(active.geometry.width() - 2) + 1;

        let geometry = active.geometry;
        active.primary.write_control(&geometry);
        if let Some(secondary) = active.secondary.as_ref() {
            secondary.write_control(&geometry);
        }
        Ok(())
    }

    /// Blank the panel and stop streaming; buffers stay allocated.
    ///
    /// Transmits the parked safe word — colour lanes dark, blank asserted —
    /// and busy-waits until the transmitter reports idle. There is no
    /// timeout: a bus driver that never goes idle hangs this call.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] without a prior `init`; [`Error::Driver`]
    /// when the bus refuses the send.
    pub fn stop(&mut self) -> Result<(), Error> {
        let active = self.active.as_ref().ok_or(Error::NotInitialized)?;
        self.bus.send(active.safe_word.head())?;
        while !self.bus.is_idle() {
            core::hint::spin_loop();
        }
        Ok(())
    }

    /// Resume streaming from the current front buffer after a
    /// [`stop`](Self::stop).
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] without a prior `init`; [`Error::Driver`]
    /// when the bus refuses the send.
    pub fn resume(&mut self) -> Result<(), Error> {
        self.start()
    }

    /// Blank the panel and free all DMA allocations. Idempotent.
    pub fn deinit(&mut self) {
        if let Some(active) = self.active.take() {
            // Best-effort blanking; the buffers are freed regardless.
            let _ = self.bus.send(active.safe_word.head());
            while !self.bus.is_idle() {
                core::hint::spin_loop();
            }
            active.primary.release(&self.alloc);
            if let Some(secondary) = active.secondary {
                secondary.release(&self.alloc);
            }
            active.safe_word.release(&self.alloc);
        }
    }
}

impl<A: DmaAlloc, B: ParallelBus> Drop for LedMatrix<A, B> {
    fn drop(&mut self) {
        self.deinit();
    }
}

/// One parked descriptor transmitting a single blanked stream word.
///
/// Panels are generally safe when the signal just stops, but leaving a row
/// driver latched on is the kind of thing that shortens a panel's life — so
/// `stop` ends the transfer on this word with the blank line asserted. Lives
/// in DMA memory for as long as the driver is configured.
struct SafeWord {
    word: DmaRegion,
    descriptor: DmaRegion,
}

// Raw pointers inside only ever target the regions owned right here.
unsafe impl Send for SafeWord {}

impl SafeWord {
    fn allocate<A: DmaAlloc>(alloc: &A, geometry: &Geometry) -> Result<Self, Error> {
        let word_layout = Layout::from_size_align(4, 4).map_err(|_| Error::OutOfMemory)?;
        let word = DmaRegion::allocate(alloc, word_layout)?;
        word.fill(0);

        let mut ctrl = ControlByte::default();
        ctrl.set_blank(true);
        let (color, ctrl) = if geometry.invert {
            (0xff, !ctrl.into_raw())
        } else {
            (0x00, ctrl.into_raw())
        };
        // Safety: the region holds 4 writable bytes.
        unsafe {
            word.as_ptr().add(COLOR_BYTE).write_volatile(color);
            word.as_ptr().add(CTRL_BYTE).write_volatile(ctrl);
        }

        let descriptor = match DmaRegion::allocate(alloc, Layout::new::<DmaDescriptor>()) {
            Ok(region) => region,
            Err(error) => {
                word.release(alloc);
                return Err(error.into());
            }
        };

        let mut flags = DescriptorFlags::new();
        flags.set_size(2);
        flags.set_length(2);
        flags.set_owner(true);
        flags.set_suc_eof(true);
        let parked = DmaDescriptor {
            flags,
            buffer: word.as_ptr().cast_const(),
            next: core::ptr::null(),
        };
        // Safety: the region was allocated with the descriptor's layout.
        unsafe { descriptor.as_ptr().cast::<DmaDescriptor>().write(parked) };

        Ok(Self { word, descriptor })
    }

    fn head(&self) -> NonNull<DmaDescriptor> {
        self.descriptor.non_null().cast()
    }

    fn release<A: DmaAlloc>(self, alloc: &A) {
        self.word.release(alloc);
        self.descriptor.release(alloc);
    }
}

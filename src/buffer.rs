//! One `(stream bytes, descriptor ring)` pair.
//!
//! A [`StreamBuffer`] is everything the transfer engine needs for one frame:
//! the raw stream bytes for all bit planes plus the closed descriptor ring
//! that schedules them. Single-buffered drivers mutate the one live pair in
//! place (colour writes may tear); double-buffered drivers keep two and hand
//! frames over by retargeting tail links.

use core::alloc::Layout;
use core::ptr::NonNull;

use embedded_dma::ReadBuffer;

use crate::config::Geometry;
use crate::encoder;
use crate::mem::{DmaAlloc, DmaRegion};
use crate::pixels::Sampler;
use crate::ring::{self, DmaDescriptor};
use crate::Error;

/// A stream buffer and its descriptor ring, both in DMA-capable memory.
///
/// Owned by the driver; carries no allocator handle, so it must be given
/// back through [`release`](Self::release) with the allocator it came from.
pub struct StreamBuffer {
    stream: DmaRegion,
    descriptors: DmaRegion,
    descriptor_count: usize,
}

// The raw pointers only ever target the regions owned right here.
unsafe impl Send for StreamBuffer {}

impl StreamBuffer {
    /// Allocate stream and ring for the given geometry and build the
    /// descriptor cycle. Colour and control bytes start out blank (all ones
    /// when inverted).
    pub(crate) fn allocate<A: DmaAlloc>(alloc: &A, geometry: &Geometry) -> Result<Self, Error> {
        let stream_layout = Layout::from_size_align(geometry.stream_len(), 4)
            .map_err(|_| Error::OutOfMemory)?;
        let count = geometry.descriptor_count();
        let ring_layout = Layout::array::<DmaDescriptor>(count).map_err(|_| Error::OutOfMemory)?;

        let stream = DmaRegion::allocate(alloc, stream_layout)?;
        stream.fill(if geometry.invert { 0xff } else { 0x00 });

        let descriptors = match DmaRegion::allocate(alloc, ring_layout) {
            Ok(region) => region,
            Err(error) => {
                stream.release(alloc);
                return Err(error.into());
            }
        };

        // Safety: the region was allocated for exactly `count` descriptors
        // and nothing else references it yet.
        let table = unsafe {
            core::slice::from_raw_parts_mut(descriptors.as_ptr().cast::<DmaDescriptor>(), count)
        };
        table.fill(DmaDescriptor::EMPTY);
        ring::build_ring(table, stream.as_ptr().cast_const(), geometry);

        Ok(Self {
            stream,
            descriptors,
            descriptor_count: count,
        })
    }

    /// Hand both regions back to the allocator.
    pub(crate) fn release<A: DmaAlloc>(self, alloc: &A) {
        self.stream.release(alloc);
        self.descriptors.release(alloc);
    }

    /// First descriptor of the ring; where the engine starts or re-enters.
    #[must_use]
    pub fn head(&self) -> NonNull<DmaDescriptor> {
        self.descriptors.non_null().cast()
    }

    /// Number of descriptors in the ring.
    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        self.descriptor_count
    }

    /// Snapshot of one descriptor.
    ///
    /// # Panics
    ///
    /// When `index` is outside the ring.
    #[must_use]
    pub fn descriptor(&self, index: usize) -> DmaDescriptor {
        assert!(index < self.descriptor_count);
        // Safety: in-bounds read of a descriptor the engine may be sharing.
        unsafe {
            self.descriptors
                .as_ptr()
                .cast::<DmaDescriptor>()
                .add(index)
                .read_volatile()
        }
    }

    /// Point the ring's tail link at `target` instead of the own head.
    ///
    /// This is a single aligned pointer store: the transfer engine fetches
    /// either the old or the new link, never a torn value. It is the whole
    /// hand-off mechanism for tear-free double buffering.
    pub(crate) fn retarget_tail(&self, target: NonNull<DmaDescriptor>) {
        let tail = self
            .descriptors
            .as_ptr()
            .cast::<DmaDescriptor>()
            .wrapping_add(self.descriptor_count - 1);
        // Safety: tail is in-bounds; the engine only reads this field.
        unsafe {
            core::ptr::addr_of_mut!((*tail).next).write_volatile(target.as_ptr().cast_const());
        }
    }

    pub(crate) fn write_control(&self, geometry: &Geometry) {
        // Safety: the stream region spans `geometry.stream_len()` bytes.
        unsafe { encoder::write_control(self.stream.as_ptr(), geometry) }
    }

    pub(crate) fn write_colors(&self, geometry: &Geometry, sampler: &Sampler<'_>) {
        // Safety: the stream region spans `geometry.stream_len()` bytes.
        unsafe { encoder::write_colors(self.stream.as_ptr(), geometry, sampler) }
    }

    pub(crate) fn stream_ptr(&self) -> *mut u8 {
        self.stream.as_ptr()
    }

    pub(crate) fn stream_len(&self) -> usize {
        self.stream.len()
    }
}

unsafe impl ReadBuffer for StreamBuffer {
    type Word = u8;

    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        (self.stream_ptr().cast_const(), self.stream_len())
    }
}

unsafe impl ReadBuffer for &StreamBuffer {
    type Word = u8;

    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        (self.stream_ptr().cast_const(), self.stream_len())
    }
}

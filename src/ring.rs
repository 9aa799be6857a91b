//! DMA descriptor ring construction.
//!
//! The whole refresh frame lives in one closed chain of transfer
//! descriptors: the engine follows `next` forever and the panel is refreshed
//! without any CPU involvement. One subimage (bit plane) occupies one or
//! more consecutive descriptors, and subimages are spread across the ring so
//! that heavier bit planes recur more often — showing
//! `4 2 4 3 4 3 1 4 2 4 3 4 3 4 4` instead of `1 2 2 3 3 3 3 4 4 4 4 4 4 4 4`
//! keeps the blink frequency of every plane high enough not to be seen.

use bitfield::bitfield;

use crate::config::Geometry;

/// Largest byte count a single descriptor can move: the hardware length
/// field is 12 bits wide and transfers are word aligned.
pub const MAX_TRANSFER: usize = (1 << 12) - 4;

bitfield! {
    /// First word of a descriptor: buffer size, transfer length and the
    /// handshake bits.
    ///
    /// The bit layout is as follows:
    /// - Bit 31: Ownership handshake; 1 hands the descriptor to the engine
    /// - Bit 30: Marks the final descriptor of a transfer
    /// - Bits 23-12: Number of valid bytes to transmit
    /// - Bits 11-0: Size of the buffer pointed at
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct DescriptorFlags(u32);
    impl Debug;
    pub size, set_size: 11, 0;
    pub length, set_length: 23, 12;
    pub suc_eof, set_suc_eof: 30;
    pub owner, set_owner: 31;
}

impl DescriptorFlags {
    /// An all-zero flags word.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }
}

/// One hardware DMA transfer descriptor.
///
/// Field order matches the in-memory layout the transfer engine walks:
/// flags word, buffer pointer, link to the next descriptor. Descriptors
/// must live in DMA-reachable memory, just like the stream bytes they point
/// at.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DmaDescriptor {
    /// Size/length/ownership word.
    pub flags: DescriptorFlags,
    /// Start of the stream slice this descriptor transmits.
    pub buffer: *const u8,
    /// Next descriptor in the chain; the ring's tail links back to its head.
    pub next: *const DmaDescriptor,
}

impl DmaDescriptor {
    /// A zeroed descriptor with null buffer and link.
    pub const EMPTY: Self = Self {
        flags: DescriptorFlags::new(),
        buffer: core::ptr::null(),
        next: core::ptr::null(),
    };
}

/// Populate `descriptors` as one refresh ring over the stream at `stream`.
///
/// `descriptors` must hold exactly [`Geometry::descriptor_count`] zeroed
/// entries and `stream` must point at [`Geometry::stream_len`] bytes laid
/// out as `color_depth` consecutive subimages.
///
/// Bit plane `l` ends up referenced `2^l` times: every plane except the
/// heaviest claims its evenly-spaced slots first (colliding claims advance
/// to the next free slot), and whatever remains belongs to plane
/// `depth - 1`. The ring is then closed by linking the last descriptor back
/// to the first.
pub(crate) fn build_ring(descriptors: &mut [DmaDescriptor], stream: *const u8, geometry: &Geometry) {
    let stride = geometry.subimage_stride();
    let seg = geometry.descriptors_per_subimage();
    let count = descriptors.len();
    debug_assert_eq!(count, geometry.descriptor_count());

    // Claim slots for all but the heaviest plane, centering the 2^l copies
    // of plane l across the ring. A claim marks only the first descriptor of
    // a slot; sizes and the remaining segment descriptors are filled below.
    for plane in 0..geometry.color_depth as usize - 1 {
        let copies = 1usize << plane;
        for k in 0..copies {
            let mut pos = count * k / copies + count / copies / 2;
            pos = pos / seg * seg;
            while !descriptors[pos].buffer.is_null() {
                pos += seg;
                if pos >= count {
                    pos = 0;
                }
            }
            #[cfg(feature = "defmt")]
            defmt::trace!("plane {=usize} copy {=usize} -> descriptor {=usize}", plane, k, pos);
            descriptors[pos].buffer = stream.wrapping_add(stride * plane);
        }
    }

    // Everything still unclaimed shows the heaviest plane. Expand each slot
    // into its segment descriptors, splitting at the transfer size cap.
    let heaviest = stream.wrapping_add(stride * (geometry.color_depth as usize - 1));
    for slot in (0..count).step_by(seg) {
        let base = if descriptors[slot].buffer.is_null() {
            heaviest
        } else {
            descriptors[slot].buffer
        };
        let mut remaining = stride;
        for (i, descriptor) in descriptors[slot..slot + seg].iter_mut().enumerate() {
            let block = remaining.min(MAX_TRANSFER);
            descriptor.buffer = base.wrapping_add(i * MAX_TRANSFER);
            descriptor.flags = DescriptorFlags::new();
            descriptor.flags.set_size(block as u32);
            descriptor.flags.set_length(block as u32);
            descriptor.flags.set_owner(true);
            remaining -= block;
        }
    }

    let head = descriptors.as_ptr();
    for (i, descriptor) in descriptors.iter_mut().enumerate() {
        descriptor.next = head.wrapping_add((i + 1) % count);
    }
}

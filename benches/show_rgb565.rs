// Run with:  cargo bench --bench show_rgb565

use core::alloc::Layout;
use core::ptr::NonNull;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use hub75_bitstream::bus::{BusConfig, DriverError, ParallelBus};
use hub75_bitstream::config::MatrixConfig;
use hub75_bitstream::matrix::LedMatrix;
use hub75_bitstream::mem::{DmaAlloc, OutOfMemory};
use hub75_bitstream::pixels::PixelFormat;
use hub75_bitstream::ring::DmaDescriptor;

const WIDTH: u16 = 64;
const HEIGHT: u16 = 32;

struct HeapAlloc;

impl DmaAlloc for HeapAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, OutOfMemory> {
        NonNull::new(unsafe { std::alloc::alloc(layout) }).ok_or(OutOfMemory)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

struct NullBus;

impl ParallelBus for NullBus {
    fn install(&mut self, _config: &BusConfig) -> Result<(), DriverError> {
        Ok(())
    }

    fn send(&mut self, _head: NonNull<DmaDescriptor>) -> Result<(), DriverError> {
        Ok(())
    }

    fn is_idle(&self) -> bool {
        true
    }
}

fn show_rgb565(c: &mut Criterion) {
    let mut group = c.benchmark_group("show_rgb565");
    group.throughput(Throughput::Elements(u64::from(WIDTH) * u64::from(HEIGHT)));

    group.bench_function("encode_frame", |b| {
        let mut matrix = LedMatrix::new(HeapAlloc, NullBus);
        matrix
            .init(&MatrixConfig {
                io_colors: &[2, 15, 4, 16, 27, 17],
                io_rows: &[5, 18, 19, 21],
                io_oe: 25,
                io_lat: 26,
                io_clk: 22,
                width: WIDTH,
                ..MatrixConfig::default()
            })
            .unwrap();
        let frame = vec![0x5au8; WIDTH as usize * HEIGHT as usize * 2];

        b.iter(|| {
            black_box(&mut matrix)
                .show(black_box(&frame), PixelFormat::Rgb565, None)
                .unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, show_rgb565);
criterion_main!(benches);

use criterion::{Criterion, Throughput};
use std::hint::black_box;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal::delay::DelayNs;
use ulocate::location::{
    Backends, DeviceHandle, DeviceType, Error, GnssBackend, KeepGoing, Location, LocationService,
    LocationType, RawFix, RrlpThresholds, Unsupported,
};

/// Receiver that accepts every start and never reports by itself.
struct IdleReceiver;

impl GnssBackend for IdleReceiver {
    fn get(&mut self, _: DeviceHandle, _: Option<KeepGoing<'_>>) -> Result<RawFix, Error> {
        Ok(RawFix::UNKNOWN)
    }

    fn start(&mut self, _: DeviceHandle) -> Result<(), Error> {
        Ok(())
    }

    fn streamed_start(&mut self, _: DeviceHandle, _: u32) -> Result<(), Error> {
        Ok(())
    }

    fn stop(&mut self, _: DeviceHandle) -> Result<(), Error> {
        Ok(())
    }

    fn streamed_stop(&mut self, _: DeviceHandle) -> Result<(), Error> {
        Ok(())
    }

    fn get_rrlp(
        &mut self,
        _: DeviceHandle,
        _: &mut [u8],
        _: &RrlpThresholds,
        _: Option<KeepGoing<'_>>,
    ) -> Result<usize, Error> {
        Ok(0)
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _: u32) {}
}

type Service = LocationService<NoopRawMutex, IdleReceiver, Unsupported, Unsupported, NoDelay>;

const RECEIVER: DeviceHandle = DeviceHandle::new(0, DeviceType::Gnss);

const FIX: RawFix = RawFix {
    latitude_x1e7: 520_187_499,
    longitude_x1e7: 2_471_071,
    altitude_millimetres: 120_216,
    radius_millimetres: 29_877,
    speed_millimetres_per_second: 0,
    satellites: 8,
    time_utc: 1_636_482_251,
};

fn sink(_: DeviceHandle, result: Result<(), Error>, location: Option<&Location>) {
    black_box((result, location));
}

fn setup_service() -> Service {
    let service = Service::new(Backends::new(IdleReceiver, Unsupported, Unsupported, NoDelay));
    service.init();
    service
}

pub fn bench_continuous_gnss_completion(c: &mut Criterion) {
    let mut group = c.benchmark_group("continuous_gnss_completion");
    group.throughput(Throughput::Elements(100));
    group.bench_function("continuous_gnss_completion", |b| {
        b.iter_batched_ref(
            || {
                let service = setup_service();
                service
                    .get_continuous_start(RECEIVER, 1_000, LocationType::Gnss, None, sink)
                    .expect("start must succeed");
                service
            },
            |service| {
                for _ in 0..100 {
                    service.on_gnss_result(RECEIVER, Ok(()), &FIX);
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_start_and_complete(c: &mut Criterion) {
    let mut group = c.benchmark_group("start_and_complete");
    let service = setup_service();
    group.bench_function("start_and_complete", |b| {
        b.iter(|| {
            service
                .get_start(RECEIVER, LocationType::Gnss, None, sink)
                .expect("start must succeed");
            service.on_gnss_result(RECEIVER, Ok(()), &FIX);
        })
    });
    group.finish();
}

use criterion::{Criterion, Throughput};
use std::hint::black_box;
use embedded_hal::delay::DelayNs;
use ulocate::location::cloud_locate::parse::{parse_location, string_to_fixed};
use ulocate::location::cloud_locate::{self, CloudLocateConfig, CloudLocateRequest};
use ulocate::location::{
    DeviceHandle, DeviceType, Error, GnssBackend, KeepGoing, RawFix, RrlpThresholds,
};
use ulocate::network::error::Error as MqttError;
use ulocate::network::mqtt::{MqttSession, QoS, ReadMessage};

const ANSWER: &str =
    "{\"Lat\":52.0187499,\"Lon\":0.2471071,\"Alt\":120.216,\"Acc\":29.877,\"MeasTime\":\"2021-11-09T18:24:11\"}";
const ANSWER_TOPIC: &str = "CloudLocate/bench/GNSS/response";

/// Receiver that always has the same measurements ready.
struct CannedReceiver;

impl GnssBackend for CannedReceiver {
    fn get(&mut self, _: DeviceHandle, _: Option<KeepGoing<'_>>) -> Result<RawFix, Error> {
        Err(Error::NotSupported)
    }

    fn start(&mut self, _: DeviceHandle) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn streamed_start(&mut self, _: DeviceHandle, _: u32) -> Result<(), Error> {
        Err(Error::NotSupported)
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
        buffer: &mut [u8],
        _: &RrlpThresholds,
        _: Option<KeepGoing<'_>>,
    ) -> Result<usize, Error> {
        let len = buffer.len().min(600);
        buffer[..len].fill(0xA5);
        Ok(len)
    }
}

/// Session where the answer is always already waiting.
struct AnsweringSession;

impl MqttSession for AnsweringSession {
    fn subscribe(&mut self, _: &str, qos: QoS) -> Result<QoS, MqttError> {
        Ok(qos)
    }

    fn unsubscribe(&mut self, _: &str) -> Result<(), MqttError> {
        Ok(())
    }

    fn publish(&mut self, _: &str, payload: &[u8], _: QoS, _: bool) -> Result<(), MqttError> {
        black_box(payload);
        Ok(())
    }

    fn unread(&self) -> usize {
        1
    }

    fn read_message(&mut self, topic: &mut [u8], payload: &mut [u8]) -> Result<ReadMessage, MqttError> {
        topic[..ANSWER_TOPIC.len()].copy_from_slice(ANSWER_TOPIC.as_bytes());
        payload[..ANSWER.len()].copy_from_slice(ANSWER.as_bytes());
        Ok(ReadMessage {
            topic_len: ANSWER_TOPIC.len(),
            payload_len: ANSWER.len(),
            qos: QoS::AtMostOnce,
        })
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _: u32) {}
}

pub fn bench_parse_location(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_location");
    group.throughput(Throughput::Bytes(ANSWER.len() as u64));
    group.bench_function("parse_location", |b| {
        b.iter(|| parse_location(black_box(ANSWER)).expect("answer must decode"))
    });
    group.finish();
}

pub fn bench_string_to_fixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("string_to_fixed");
    let inputs = ["52.0187499", "-758.7387289", "120.216", "2147483647.999999999"];
    group.throughput(Throughput::Elements(inputs.len() as u64));
    group.bench_function("string_to_fixed", |b| {
        b.iter(|| {
            for input in inputs {
                black_box(string_to_fixed(black_box(input), 7, 9));
            }
        })
    });
    group.finish();
}

pub fn bench_locate_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate_round_trip");
    let request = CloudLocateRequest {
        device: DeviceHandle::new(0, DeviceType::Cellular),
        gnss_device: DeviceHandle::new(0, DeviceType::Cellular),
        thresholds: RrlpThresholds::DONT_CARE,
        client_id: Some("bench"),
        want_location: true,
    };
    group.bench_function("locate_round_trip", |b| {
        b.iter(|| {
            cloud_locate::locate(
                &CloudLocateConfig::DEFAULT,
                &mut CannedReceiver,
                &mut AnsweringSession,
                &mut NoDelay,
                &request,
                None,
            )
            .expect("exchange must succeed")
        })
    });
    group.finish();
}

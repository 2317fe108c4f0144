//! Scriptable stand-ins for the positioning drivers, the MQTT session and
//! the delay source.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal::delay::DelayNs;
use ulocate::location::{
    Backends, CellLocateBackend, DeviceHandle, Error, GnssBackend, KeepGoing, Location,
    LocationService, LocationStatus, RawFix, RrlpThresholds, WifiBackend, WifiSettings,
};
use ulocate::network::error::Error as MqttError;
use ulocate::network::mqtt::{MqttSession, QoS, ReadMessage};

/// A backend call, as seen by a mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get(u8),
    Start(u8),
    StreamedStart(u8, u32),
    Stop(u8),
    StreamedStop(u8),
    Rrlp(u8),
    Accuracy(i32),
    FixTimeout(i32),
    GnssEnable(bool),
    Status(u8),
}

#[derive(Debug)]
pub struct MockGnss {
    pub calls: Vec<Call>,
    pub fix: Result<RawFix, Error>,
    pub start_results: VecDeque<Result<(), Error>>,
    pub rrlp: &'static [u8],
    pub rrlp_result: Result<(), Error>,
    pub thresholds: Option<RrlpThresholds>,
}

impl MockGnss {
    pub const fn new() -> Self {
        Self {
            calls: Vec::new(),
            fix: Err(Error::Timeout),
            start_results: VecDeque::new(),
            rrlp: b"rrlp",
            rrlp_result: Ok(()),
            thresholds: None,
        }
    }

    fn next_start(&mut self) -> Result<(), Error> {
        self.start_results.pop_front().unwrap_or(Ok(()))
    }
}

impl GnssBackend for MockGnss {
    fn get(&mut self, device: DeviceHandle, keep_going: Option<KeepGoing<'_>>) -> Result<RawFix, Error> {
        self.calls.push(Call::Get(device.id));
        if let Some(keep_going) = keep_going {
            if !keep_going(device) {
                return Err(Error::Timeout);
            }
        }
        self.fix
    }

    fn start(&mut self, device: DeviceHandle) -> Result<(), Error> {
        self.calls.push(Call::Start(device.id));
        self.next_start()
    }

    fn streamed_start(&mut self, device: DeviceHandle, period_ms: u32) -> Result<(), Error> {
        self.calls.push(Call::StreamedStart(device.id, period_ms));
        self.next_start()
    }

    fn stop(&mut self, device: DeviceHandle) -> Result<(), Error> {
        self.calls.push(Call::Stop(device.id));
        Ok(())
    }

    fn streamed_stop(&mut self, device: DeviceHandle) -> Result<(), Error> {
        self.calls.push(Call::StreamedStop(device.id));
        // nothing was streaming
        Err(Error::Backend(-1000))
    }

    fn get_rrlp(
        &mut self,
        device: DeviceHandle,
        buffer: &mut [u8],
        thresholds: &RrlpThresholds,
        _keep_going: Option<KeepGoing<'_>>,
    ) -> Result<usize, Error> {
        self.calls.push(Call::Rrlp(device.id));
        self.thresholds = Some(*thresholds);
        self.rrlp_result?;
        let len = self.rrlp.len().min(buffer.len());
        buffer[..len].copy_from_slice(&self.rrlp[..len]);
        Ok(len)
    }
}

#[derive(Debug)]
pub struct MockCell {
    pub calls: Vec<Call>,
    pub fix: Result<RawFix, Error>,
    pub start_results: VecDeque<Result<(), Error>>,
    pub status: LocationStatus,
}

impl MockCell {
    pub const fn new() -> Self {
        Self {
            calls: Vec::new(),
            fix: Err(Error::Timeout),
            start_results: VecDeque::new(),
            status: LocationStatus::Unknown,
        }
    }

    pub fn starts(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Start(_))).count()
    }
}

impl CellLocateBackend for MockCell {
    fn set_desired_accuracy(&mut self, _device: DeviceHandle, millimetres: i32) -> Result<(), Error> {
        self.calls.push(Call::Accuracy(millimetres));
        Ok(())
    }

    fn set_desired_fix_timeout(&mut self, _device: DeviceHandle, seconds: i32) -> Result<(), Error> {
        self.calls.push(Call::FixTimeout(seconds));
        Ok(())
    }

    fn set_gnss_enable(&mut self, _device: DeviceHandle, enable: bool) -> Result<(), Error> {
        self.calls.push(Call::GnssEnable(enable));
        Ok(())
    }

    fn get(&mut self, device: DeviceHandle, _keep_going: Option<KeepGoing<'_>>) -> Result<RawFix, Error> {
        self.calls.push(Call::Get(device.id));
        self.fix
    }

    fn start(&mut self, device: DeviceHandle) -> Result<(), Error> {
        self.calls.push(Call::Start(device.id));
        self.start_results.pop_front().unwrap_or(Ok(()))
    }

    fn stop(&mut self, device: DeviceHandle) -> Result<(), Error> {
        self.calls.push(Call::Stop(device.id));
        Ok(())
    }

    fn status(&mut self, device: DeviceHandle) -> Result<LocationStatus, Error> {
        self.calls.push(Call::Status(device.id));
        Ok(self.status)
    }
}

#[derive(Debug)]
pub struct MockWifi {
    pub calls: Vec<Call>,
    pub settings: Vec<WifiSettings>,
    pub location: Result<Location, Error>,
    pub start_results: VecDeque<Result<(), Error>>,
}

impl MockWifi {
    pub const fn new() -> Self {
        Self {
            calls: Vec::new(),
            settings: Vec::new(),
            location: Err(Error::Timeout),
            start_results: VecDeque::new(),
        }
    }

    pub fn starts(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Start(_))).count()
    }
}

impl WifiBackend for MockWifi {
    fn get(
        &mut self,
        device: DeviceHandle,
        settings: &WifiSettings,
        _keep_going: Option<KeepGoing<'_>>,
    ) -> Result<Location, Error> {
        self.calls.push(Call::Get(device.id));
        self.settings.push(settings.clone());
        self.location
    }

    fn start(&mut self, device: DeviceHandle, settings: &WifiSettings) -> Result<(), Error> {
        self.calls.push(Call::Start(device.id));
        self.settings.push(settings.clone());
        self.start_results.pop_front().unwrap_or(Ok(()))
    }

    fn stop(&mut self, device: DeviceHandle) -> Result<(), Error> {
        self.calls.push(Call::Stop(device.id));
        Ok(())
    }
}

/// Records delays instead of sleeping.
#[derive(Debug, Default)]
pub struct MockDelay {
    pub delays_ms: Vec<u32>,
}

impl MockDelay {
    pub const fn new() -> Self {
        Self { delays_ms: Vec::new() }
    }

    pub fn total_ms(&self) -> u32 {
        self.delays_ms.iter().sum()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.push(ms);
    }
}

/// An in-memory MQTT session.
#[derive(Debug, Default)]
pub struct MockMqtt {
    pub subscribed: Vec<String>,
    pub unsubscribed: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
    pub inbox: VecDeque<(String, Vec<u8>)>,
    pub publish_error: Option<MqttError>,
    pub read_errors: usize,
}

impl MockMqtt {
    pub fn deliver(&mut self, topic: &str, payload: &str) {
        self.inbox.push_back((topic.into(), payload.as_bytes().to_vec()));
    }
}

impl MqttSession for MockMqtt {
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<QoS, MqttError> {
        self.subscribed.push(topic.into());
        Ok(qos)
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.unsubscribed.push(topic.into());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], _qos: QoS, _retain: bool) -> Result<(), MqttError> {
        if let Some(e) = self.publish_error {
            return Err(e);
        }
        self.published.push((topic.into(), payload.to_vec()));
        Ok(())
    }

    fn unread(&self) -> usize {
        self.inbox.len() + self.read_errors
    }

    fn read_message(&mut self, topic: &mut [u8], payload: &mut [u8]) -> Result<ReadMessage, MqttError> {
        if self.read_errors > 0 {
            self.read_errors -= 1;
            return Err(MqttError::ReadError);
        }
        let (message_topic, message_payload) = self.inbox.pop_front().ok_or(MqttError::ReadError)?;
        if message_topic.len() > topic.len() {
            return Err(MqttError::BufferTooSmall);
        }
        topic[..message_topic.len()].copy_from_slice(message_topic.as_bytes());
        let payload_len = message_payload.len().min(payload.len());
        payload[..payload_len].copy_from_slice(&message_payload[..payload_len]);
        Ok(ReadMessage {
            topic_len: message_topic.len(),
            payload_len,
            qos: QoS::AtMostOnce,
        })
    }
}

pub type MockBackends = Backends<MockGnss, MockCell, MockWifi, MockDelay>;

pub type Service = LocationService<NoopRawMutex, MockGnss, MockCell, MockWifi, MockDelay>;

pub const fn backends() -> MockBackends {
    Backends::new(MockGnss::new(), MockCell::new(), MockWifi::new(), MockDelay::new())
}

/// An initialised service over fresh mocks.
pub fn service() -> Service {
    let service = LocationService::new(backends());
    service.init();
    service
}

pub type Outcome = (DeviceHandle, Result<(), Error>, Option<Location>);

thread_local! {
    static OUTCOMES: RefCell<Vec<Outcome>> = const { RefCell::new(Vec::new()) };
}

/// Callback that records what it was given.
pub fn record(device: DeviceHandle, result: Result<(), Error>, location: Option<&Location>) {
    OUTCOMES.with(|outcomes| outcomes.borrow_mut().push((device, result, location.copied())));
}

/// Everything recorded on this thread since the last call.
pub fn outcomes() -> Vec<Outcome> {
    OUTCOMES.with(|outcomes| outcomes.borrow_mut().drain(..).collect())
}

pub fn sample_fix() -> RawFix {
    RawFix {
        latitude_x1e7: 520_187_499,
        longitude_x1e7: 2_471_071,
        altitude_millimetres: 120_216,
        radius_millimetres: 29_877,
        speed_millimetres_per_second: 1_500,
        satellites: 9,
        time_utc: 1_636_482_251,
    }
}

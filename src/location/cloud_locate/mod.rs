//! Cloud Locate: position from raw GNSS measurements computed in the cloud.
//!
//! One call to [`locate`] runs the whole exchange synchronously:
//!
//! 1. if the caller wants the fix back, subscribe to
//!    `prefix + client_id + postfix`;
//! 2. read raw RRLP measurements from the GNSS receiver, subject to the
//!    quality thresholds;
//! 3. publish them on the service's request topic;
//! 4. if subscribed, poll the session until a message arrives on exactly
//!    the subscribed topic, then decode it.
//!
//! The subscription is removed again before returning, whatever the
//! outcome.

use embedded_hal::delay::DelayNs;
use heapless::String;
use log::{debug, info, warn};

use super::backend::{self, GnssBackend, KeepGoing, RrlpThresholds};
use super::error::Error;
use super::{DeviceHandle, Location};
use crate::network::mqtt::{MqttSession, QoS};

pub mod parse;

pub use parse::parse_location;

/// Largest RRLP block read from the receiver.
pub const RRLP_MAX_LENGTH_BYTES: usize = 1024;

/// Largest answer read from the service.
pub const RESPONSE_MAX_LENGTH_BYTES: usize = 512;

/// Longest subscribe topic (prefix, client ID and postfix together).
pub const TOPIC_MAX_LENGTH: usize = 128;

/// Topics and timing of the Cloud Locate exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudLocateConfig {
    /// Topic the RRLP data is published on.
    pub publish_topic: &'static str,
    /// Start of the per-client answer topic.
    pub subscribe_topic_prefix: &'static str,
    /// End of the per-client answer topic.
    pub subscribe_topic_postfix: &'static str,
    /// Overall wait for the answer when no keep-going predicate is given.
    pub timeout_seconds: u32,
    /// Pause between unsuccessful polls of the session.
    pub poll_interval_ms: u32,
}

impl CloudLocateConfig {
    /// The u-blox Cloud Locate service.
    pub const DEFAULT: Self = Self {
        publish_topic: "CloudLocate/GNSS/request",
        subscribe_topic_prefix: "CloudLocate/",
        subscribe_topic_postfix: "/GNSS/response",
        timeout_seconds: 240,
        poll_interval_ms: 1000,
    };

    /// The answer topic for `client_id`.
    pub fn subscribe_topic(&self, client_id: &str) -> Result<String<TOPIC_MAX_LENGTH>, Error> {
        let mut topic = String::new();
        topic
            .push_str(self.subscribe_topic_prefix)
            .and_then(|_| topic.push_str(client_id))
            .and_then(|_| topic.push_str(self.subscribe_topic_postfix))
            .map_err(|_| Error::NoMemory)?;
        Ok(topic)
    }
}

impl Default for CloudLocateConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What to ask Cloud Locate for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudLocateRequest<'a> {
    /// Device carrying the MQTT session; passed to the keep-going predicate.
    pub device: DeviceHandle,
    /// Device the RRLP data is read from; may equal `device`.
    pub gnss_device: DeviceHandle,
    /// Measurement quality gates.
    pub thresholds: RrlpThresholds,
    /// MQTT client ID; required when `want_location` is set.
    pub client_id: Option<&'a str>,
    /// Wait for the fix and return it, rather than leaving it server-side.
    pub want_location: bool,
}

/// Run one Cloud Locate exchange.
///
/// Returns `Ok(None)` once the measurements are published if the caller
/// did not ask for the fix, otherwise the decoded fix.
///
/// # Errors
///
/// * [`Error::InvalidParameter`] if the fix is wanted but there is no client ID.
/// * [`Error::NoMemory`] if the answer topic does not fit.
/// * [`Error::Timeout`] if no answer arrives on the answer topic in time.
/// * [`Error::Unknown`] if the answer cannot be decoded.
/// * Errors of the RRLP read and of subscribe/publish, unchanged.
pub fn locate<G, S, D>(
    config: &CloudLocateConfig,
    gnss: &mut G,
    mqtt: &mut S,
    delay: &mut D,
    request: &CloudLocateRequest<'_>,
    mut keep_going: Option<KeepGoing<'_>>,
) -> Result<Option<Location>, Error>
where
    G: GnssBackend + ?Sized,
    S: MqttSession + ?Sized,
    D: DelayNs + ?Sized,
{
    let topic = if request.want_location {
        let client_id = request
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or(Error::InvalidParameter)?;
        let topic = config.subscribe_topic(client_id)?;
        mqtt.subscribe(&topic, QoS::AtMostOnce)?;
        debug!("cloud locate: subscribed to {}", topic.as_str());
        Some(topic)
    } else {
        None
    };

    let outcome = exchange(config, gnss, mqtt, delay, request, topic.as_deref(), &mut keep_going);

    if let Some(topic) = topic {
        if let Err(e) = mqtt.unsubscribe(&topic) {
            warn!("cloud locate: unsubscribe from {} failed: {}", topic.as_str(), e);
        }
    }
    outcome
}

fn exchange<G, S, D>(
    config: &CloudLocateConfig,
    gnss: &mut G,
    mqtt: &mut S,
    delay: &mut D,
    request: &CloudLocateRequest<'_>,
    topic: Option<&str>,
    keep_going: &mut Option<KeepGoing<'_>>,
) -> Result<Option<Location>, Error>
where
    G: GnssBackend + ?Sized,
    S: MqttSession + ?Sized,
    D: DelayNs + ?Sized,
{
    publish_rrlp(config, gnss, mqtt, request, keep_going)?;
    match topic {
        Some(topic) => wait_for_answer(config, mqtt, delay, request.device, topic, keep_going).map(Some),
        None => Ok(None),
    }
}

fn publish_rrlp<G, S>(
    config: &CloudLocateConfig,
    gnss: &mut G,
    mqtt: &mut S,
    request: &CloudLocateRequest<'_>,
    keep_going: &mut Option<KeepGoing<'_>>,
) -> Result<(), Error>
where
    G: GnssBackend + ?Sized,
    S: MqttSession + ?Sized,
{
    // Lives only until the publish returns.
    let mut rrlp = [0u8; RRLP_MAX_LENGTH_BYTES];
    let len = gnss.get_rrlp(
        request.gnss_device,
        &mut rrlp,
        &request.thresholds,
        backend::reborrow(keep_going),
    )?;
    let len = len.min(rrlp.len());
    info!("cloud locate: publishing {} byte(s) of RRLP data", len);
    mqtt.publish(config.publish_topic, &rrlp[..len], QoS::AtMostOnce, false)?;
    Ok(())
}

fn wait_for_answer<S, D>(
    config: &CloudLocateConfig,
    mqtt: &mut S,
    delay: &mut D,
    device: DeviceHandle,
    topic: &str,
    keep_going: &mut Option<KeepGoing<'_>>,
) -> Result<Location, Error>
where
    S: MqttSession + ?Sized,
    D: DelayNs + ?Sized,
{
    let timeout_ms = config.timeout_seconds.saturating_mul(1000);
    let mut waited_ms: u32 = 0;
    let mut topic_buf = [0u8; TOPIC_MAX_LENGTH];
    let mut payload_buf = [0u8; RESPONSE_MAX_LENGTH_BYTES];

    loop {
        let carry_on = match keep_going {
            Some(keep_going) => keep_going(device),
            None => waited_ms < timeout_ms,
        };
        if !carry_on {
            warn!("cloud locate: no answer on {} after {} ms", topic, waited_ms);
            return Err(Error::Timeout);
        }

        if mqtt.unread() > 0 {
            match mqtt.read_message(&mut topic_buf, &mut payload_buf) {
                Ok(message) if &topic_buf[..message.topic_len.min(TOPIC_MAX_LENGTH)] == topic.as_bytes() => {
                    let payload = &payload_buf[..message.payload_len.min(RESPONSE_MAX_LENGTH_BYTES)];
                    let text = core::str::from_utf8(payload).map_err(|_| Error::Unknown)?;
                    debug!("cloud locate: answer {}", text);
                    return parse::parse_location(text);
                }
                Ok(message) => {
                    debug!(
                        "cloud locate: ignoring {} byte(s) on another topic",
                        message.payload_len
                    );
                }
                Err(e) => warn!("cloud locate: reading message failed: {}", e),
            }
        }

        delay.delay_ms(config.poll_interval_ms);
        waited_ms = waited_ms.saturating_add(config.poll_interval_ms);
    }
}

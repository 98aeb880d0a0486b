//! MQTT plumbing for the bridge binary.
//!
//! Broker address parsing, the loopback safety check and topic naming.
//! Connections are plain TCP; brokers needing TLS sit behind a local
//! forwarding proxy.

mod endpoint;
mod topics;

pub use endpoint::{parse_mqtt_endpoint, validate_loopback_addr, MqttEndpoint};
pub use topics::{output_topic, sanitize_topic_segment, source_key};

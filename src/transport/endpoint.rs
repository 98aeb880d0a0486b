use anyhow::{anyhow, Context, Result};

/// Broker host and port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttEndpoint {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for MqttEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Split a broker address into host and port.
///
/// The port is mandatory. An optional `mqtt://` or `tcp://` prefix is
/// stripped, and IPv6 hosts go in brackets (`[::1]:1883`). Encrypted
/// schemes such as `mqtts://` and `ssl://` are refused because the bridge
/// only speaks plain TCP.
pub fn parse_mqtt_endpoint(addr: &str) -> Result<MqttEndpoint> {
    let mut remainder = addr.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            "mqtts" | "ssl" => {
                return Err(anyhow!(
                    "TLS MQTT endpoints are not supported: {} (use a local TLS proxy)",
                    addr
                ))
            }
            other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
        }
        remainder = rest;
    }

    let (host, port) = split_host_port(remainder)?;
    if host.is_empty() {
        return Err(anyhow!("missing MQTT host in {}", addr));
    }
    Ok(MqttEndpoint { host, port })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    // [::1]:1883
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid MQTT port in {}", addr))?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid MQTT port in {}", addr))?;
    Ok((host.to_string(), port))
}

/// Refuse non-loopback brokers unless the operator opted in.
pub fn validate_loopback_addr(endpoint: &MqttEndpoint, original: &str) -> Result<()> {
    let host = endpoint.host.as_str();
    if host == "localhost" {
        return Ok(());
    }
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        if ip.is_loopback() {
            return Ok(());
        }
    }
    Err(anyhow!(
        "MQTT broker must be loopback: {} (use --allow-remote-mqtt to override)",
        original
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_endpoint_plain() {
        let ep = parse_mqtt_endpoint("127.0.0.1:1883").unwrap();
        assert_eq!(ep.host, "127.0.0.1");
        assert_eq!(ep.port, 1883);
        assert_eq!(ep.to_string(), "127.0.0.1:1883");
    }

    #[test]
    fn parse_endpoint_with_scheme() {
        let ep = parse_mqtt_endpoint("mqtt://broker.local:1884").unwrap();
        assert_eq!(ep.host, "broker.local");
        assert_eq!(ep.port, 1884);
        assert!(parse_mqtt_endpoint("tcp://broker.local:1883").is_ok());
    }

    #[test]
    fn parse_endpoint_rejects_tls_and_unknown_schemes() {
        let err = parse_mqtt_endpoint("mqtts://broker:8883").unwrap_err();
        assert!(err.to_string().contains("not supported"));
        assert!(parse_mqtt_endpoint("ws://broker:80").is_err());
    }

    #[test]
    fn parse_endpoint_ipv6() {
        let ep = parse_mqtt_endpoint("[::1]:1883").unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, 1883);
        assert_eq!(ep.to_string(), "[::1]:1883");
    }

    #[test]
    fn parse_endpoint_requires_port() {
        assert!(parse_mqtt_endpoint("localhost").is_err());
        assert!(parse_mqtt_endpoint("localhost:abc").is_err());
        assert!(parse_mqtt_endpoint(":1883").is_err());
    }

    #[test]
    fn validate_loopback_accepts_local() {
        for addr in ["localhost:1883", "127.0.0.1:1883", "[::1]:1883"] {
            let ep = parse_mqtt_endpoint(addr).unwrap();
            assert!(validate_loopback_addr(&ep, addr).is_ok(), "{}", addr);
        }
    }

    #[test]
    fn validate_loopback_rejects_remote() {
        let ep = parse_mqtt_endpoint("192.168.1.10:1883").unwrap();
        assert!(validate_loopback_addr(&ep, "192.168.1.10:1883").is_err());
    }
}

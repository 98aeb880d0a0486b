//! cluster_bridge - Subscribe to detection frames over MQTT and publish clusters.
//!
//! The bridge:
//! 1. Subscribes to the detector's frame topic (wildcards allowed)
//! 2. Routes each frame to the engine for its source (camera/stream)
//! 3. Runs the proximity clustering pipeline on that engine
//! 4. Publishes the resulting records with QoS 1 under `<output topic>/<source>`
//!
//! Hotspot mode publishes one message per active hotspot and nothing when
//! there are none; crowd mode publishes one summary per frame.

use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::v5::{mqttbytes::QoS, Client, Connection, Event, Incoming, MqttOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use proximity_cluster::router::DEFAULT_MAX_SOURCES;
use proximity_cluster::transport::{
    output_topic, parse_mqtt_endpoint, validate_loopback_addr, MqttEndpoint,
};
use proximity_cluster::{parse_frame, ClusterMode, EngineConfig, EngineRouter};

const BRIDGE_NAME: &str = "cluster_bridge";
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Cluster detections from MQTT into crowds or parked-vehicle hotspots"
)]
struct Args {
    /// MQTT broker address (host:port or mqtt://host:port).
    /// By default, only loopback addresses are allowed.
    #[arg(long, env = "MQTT_BROKER_ADDR", default_value = "127.0.0.1:1883")]
    mqtt_broker_addr: String,

    /// Allow non-loopback MQTT connections.
    #[arg(long, env = "ALLOW_REMOTE_MQTT")]
    allow_remote_mqtt: bool,

    /// MQTT username for authentication.
    #[arg(long, env = "MQTT_USERNAME")]
    mqtt_username: Option<String>,

    /// MQTT password for authentication.
    #[arg(long, env = "MQTT_PASSWORD")]
    mqtt_password: Option<String>,

    /// MQTT client identifier.
    #[arg(long, env = "MQTT_CLIENT_ID", default_value = BRIDGE_NAME)]
    mqtt_client_id: String,

    /// Topic filter carrying detection frames.
    #[arg(long, env = "CLUSTER_INPUT_TOPIC", default_value = "vision/detections/#")]
    input_topic: String,

    /// Topic prefix for published records.
    /// Defaults to vision/crowds or vision/hotspots depending on the mode.
    #[arg(long, env = "CLUSTER_OUTPUT_TOPIC")]
    output_topic: Option<String>,

    /// Engine config file (JSON, or TOML with a .toml extension).
    /// CLUSTER_* environment variables override values from the file.
    #[arg(long, env = "CLUSTER_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum number of distinct sources tracked at once.
    #[arg(long, env = "CLUSTER_MAX_SOURCES", default_value_t = DEFAULT_MAX_SOURCES)]
    max_sources: usize,

    /// Seconds between health log lines (0 disables them).
    #[arg(long, env = "CLUSTER_STATS_INTERVAL", default_value_t = 60)]
    stats_interval_secs: u64,
}

/// What the connection thread hands to the processing thread.
enum Inbound {
    Publish { topic: String, payload: Vec<u8> },
    Closed(String),
}

#[derive(Default)]
struct BridgeCounters {
    malformed: u64,
    published: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let endpoint = parse_mqtt_endpoint(&args.mqtt_broker_addr)?;
    if !args.allow_remote_mqtt {
        validate_loopback_addr(&endpoint, &args.mqtt_broker_addr)?;
    } else {
        log::warn!("Remote MQTT enabled - ensure broker is in a trusted network");
    }

    let config = EngineConfig::load_with(args.config.as_deref())?;
    let output_prefix = args
        .output_topic
        .clone()
        .unwrap_or_else(|| default_output_prefix(config.mode).to_string());
    let mut router = EngineRouter::new(config, args.max_sources)?;

    log_startup(&args, &endpoint, router.template(), &output_prefix);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let mut counters = BridgeCounters::default();
    let mut last_stats = Instant::now();

    while running.load(Ordering::SeqCst) {
        let (client, connection) = connect_mqtt(
            &endpoint,
            &args.mqtt_client_id,
            args.mqtt_username.as_deref(),
            args.mqtt_password.as_deref(),
        );
        client.subscribe(args.input_topic.clone(), QoS::AtMostOnce)?;
        log::info!("Subscribed to {}", args.input_topic);

        let (tx, rx) = mpsc::channel();
        spawn_connection_pump(connection, tx);

        while running.load(Ordering::SeqCst) {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(Inbound::Publish { topic, payload }) => {
                    match handle_frame(&client, &mut router, &output_prefix, &topic, &payload) {
                        Ok(n) => counters.published += n,
                        Err(e) => {
                            counters.malformed += 1;
                            log::warn!("Skipping frame from {}: {:#}", topic, e);
                        }
                    }
                }
                Ok(Inbound::Closed(reason)) => {
                    log::error!("MQTT connection error: {}. Reconnecting...", reason);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("MQTT connection closed. Reconnecting...");
                    break;
                }
            }

            if args.stats_interval_secs > 0
                && last_stats.elapsed() >= Duration::from_secs(args.stats_interval_secs)
            {
                log_stats(&router, &counters);
                last_stats = Instant::now();
            }
        }

        if let Err(e) = client.disconnect() {
            log::debug!("MQTT disconnect failed: {}", e);
        }
        // The pump exits on its next event once the receiver is gone.
        drop(rx);

        if running.load(Ordering::SeqCst) {
            std::thread::sleep(RECONNECT_DELAY);
        }
    }

    log::info!("shutdown signal received");
    log_stats(&router, &counters);
    Ok(())
}

fn default_output_prefix(mode: ClusterMode) -> &'static str {
    match mode {
        ClusterMode::Crowd => "vision/crowds",
        ClusterMode::Hotspot => "vision/hotspots",
    }
}

/// Parse, cluster and publish one frame. Returns the number of records sent.
fn handle_frame(
    client: &Client,
    router: &mut EngineRouter,
    output_prefix: &str,
    topic: &str,
    payload: &[u8],
) -> Result<u64> {
    let frame = parse_frame(payload)?;
    let Some((source, report)) = router.process(topic, &frame)? else {
        return Ok(0);
    };

    let out_topic = output_topic(output_prefix, &source);
    let mut published = 0;
    for record in report.records() {
        let body = record.to_json().context("serialize output record")?;
        client.publish(out_topic.clone(), QoS::AtLeastOnce, false, body)?;
        published += 1;
    }
    if published > 0 {
        log::debug!("published {} record(s) to {}", published, out_topic);
    }
    Ok(published)
}

fn spawn_connection_pump(mut connection: Connection, tx: mpsc::Sender<Inbound>) {
    std::thread::spawn(move || {
        for event in connection.iter() {
            let inbound = match event {
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    let topic = match std::str::from_utf8(&publish.topic) {
                        Ok(topic) => topic.to_string(),
                        Err(e) => {
                            log::warn!("Skipping publish with invalid topic: {}", e);
                            continue;
                        }
                    };
                    Inbound::Publish {
                        topic,
                        payload: publish.payload.to_vec(),
                    }
                }
                Ok(_) => continue,
                Err(e) => Inbound::Closed(e.to_string()),
            };
            let closed = matches!(inbound, Inbound::Closed(_));
            if tx.send(inbound).is_err() || closed {
                break;
            }
        }
    });
}

fn connect_mqtt(
    endpoint: &MqttEndpoint,
    client_id: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> (Client, Connection) {
    let mut options = MqttOptions::new(client_id, &endpoint.host, endpoint.port);
    options.set_keep_alive(Duration::from_secs(60));
    options.set_clean_start(true);
    if let Some(user) = username {
        options.set_credentials(user, password.unwrap_or_default());
    }

    let (client, connection) = Client::new(options, 64);
    log::info!(
        "Connecting to MQTT broker {} (auth: {})",
        endpoint,
        username.is_some()
    );
    (client, connection)
}

fn log_startup(args: &Args, endpoint: &MqttEndpoint, config: &EngineConfig, output_prefix: &str) {
    log::info!("Cluster bridge starting");
    log::info!("  MQTT broker: {}", endpoint);
    log::info!("  Input topic: {}", args.input_topic);
    log::info!("  Output topic: {}/<source>", output_prefix);
    log::info!("  Mode: {}", config.mode);
    log::info!(
        "  Distance threshold: {}px, min cluster size: {}, overlap cutoff: {}",
        config.clustering.distance_threshold,
        config.clustering.min_cluster_size,
        config.clustering.overlap_suppression_threshold
    );
    if config.mode == ClusterMode::Hotspot {
        log::info!(
            "  Parked after {} frames within {}px, history timeout {}ms",
            config.tracking.required_stationary_frames,
            config.tracking.stationary_movement_threshold,
            config.tracking.history_timeout.as_millis()
        );
    }
    let labels = config.labels.labels();
    log::info!(
        "  Labels: {}",
        if labels.is_empty() {
            "all".to_string()
        } else {
            labels.join(", ")
        }
    );
}

fn log_stats(router: &EngineRouter, counters: &BridgeCounters) {
    let totals = router.totals();
    log::info!(
        "sources={} frames={} dropped={} malformed={} rejected={} clusters={} published={}",
        router.source_count(),
        totals.frames_processed,
        totals.frames_dropped,
        counters.malformed,
        router.rejected_frames(),
        totals.clusters_found,
        counters.published
    );
}

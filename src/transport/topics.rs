/// Make a string safe to use as a single MQTT topic level.
///
/// - Converts to lowercase
/// - Replaces anything but alphanumerics, '_' and '-' with '_'
/// - Limits length to 64 characters
pub fn sanitize_topic_segment(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect()
}

/// Key that selects the engine instance for a frame: the frame's own
/// source name when present, otherwise the topic it arrived on.
pub fn source_key(frame_source: Option<&str>, topic: &str) -> String {
    match frame_source.map(str::trim) {
        Some(source) if !source.is_empty() => source.to_string(),
        _ => topic.to_string(),
    }
}

/// Topic for records derived from `source`: `<prefix>/<source>`.
pub fn output_topic(prefix: &str, source: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let segment = sanitize_topic_segment(source);
    if segment.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, segment)
    }
}

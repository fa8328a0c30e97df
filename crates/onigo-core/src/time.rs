/// Current Unix time in milliseconds — the timestamp unit of every shared
/// store record (`updated_at`, `capturedAt`, `startTime`, …).
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

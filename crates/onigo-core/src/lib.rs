pub mod events;
pub mod geo;
pub mod player;
pub mod rules;
pub mod schedule;
pub mod status;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{PlayerId, PlayerMap, PlayerRecord, Role};
    use crate::status::GameStatusRecord;

    /// Create a runner record with a fresh id.
    pub fn make_runner(username: &str) -> (PlayerId, PlayerRecord) {
        (PlayerId::generate(), PlayerRecord::new(username, Role::Runner, 0))
    }

    /// Create an oni record with a fresh id.
    pub fn make_oni(username: &str) -> (PlayerId, PlayerRecord) {
        (PlayerId::generate(), PlayerRecord::new(username, Role::Oni, 0))
    }

    /// Mark a record as captured by the named oni at t=1.
    pub fn captured_by(mut record: PlayerRecord, by: &str) -> PlayerRecord {
        record.captured = true;
        record.captured_by = Some(by.to_string());
        record.captured_at = Some(1);
        record
    }

    /// Mark a record as disqualified for leaving the area at t=1.
    pub fn disqualified(mut record: PlayerRecord) -> PlayerRecord {
        record.disqualified = true;
        record.disqualified_reason = Some(crate::player::DisqualifyReason::OutOfArea);
        record.disqualified_at = Some(1);
        record
    }

    /// Rewrite a record the way the onification event does.
    pub fn onified(mut record: PlayerRecord) -> PlayerRecord {
        record.role = Role::Oni;
        record.captured = false;
        record.captured_by = None;
        record.captured_at = None;
        record.disqualified = false;
        record.disqualified_reason = None;
        record.disqualified_at = None;
        record.onified = true;
        record.onified_at = Some(2);
        record
    }

    /// Collect (id, record) pairs into a player map.
    pub fn map_of(players: Vec<(PlayerId, PlayerRecord)>) -> PlayerMap {
        players.into_iter().collect()
    }

    /// An active-status record starting at `start_ms` for `duration_ms`.
    pub fn active_status(start_ms: u64, duration_ms: u64) -> GameStatusRecord {
        GameStatusRecord::active(start_ms, duration_ms)
    }
}

//! Game rules every client re-derives from the shared player map.

use crate::player::{PlayerId, PlayerMap, PlayerRecord, Role};
use crate::status::Winner;

/// Capture eligibility by distance. The boundary is inclusive: a target at
/// exactly the capture radius can be taken.
pub fn capture_in_range(distance_m: f64, capture_radius_m: f64) -> bool {
    distance_m <= capture_radius_m
}

/// Whether any runner ever existed in this game. Onified players count: they
/// started as runners even though their current role is oni.
pub fn ever_had_runners(players: &PlayerMap) -> bool {
    players.values().any(|p| p.role == Role::Runner || p.onified)
}

/// The oni side wins once no original runner remains free. Onified players
/// are out of the denominator — their record already carries `role: oni`.
pub fn evaluate_win(players: &PlayerMap) -> Option<Winner> {
    if !ever_had_runners(players) {
        return None;
    }
    let free_runners = players.values().filter(|p| p.is_active_runner()).count();
    (free_runners == 0).then_some(Winner::Oni)
}

/// End-screen result lists, by username.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalResults {
    /// Runners neither captured nor disqualified at game end.
    pub winners: Vec<String>,
    pub captured: Vec<String>,
    pub disqualified: Vec<String>,
}

pub fn final_results(players: &PlayerMap) -> FinalResults {
    let mut results = FinalResults::default();
    for record in players.values() {
        if record.captured {
            results.captured.push(record.username.clone());
        } else if record.disqualified {
            results.disqualified.push(record.username.clone());
        } else if record.role == Role::Runner {
            results.winners.push(record.username.clone());
        }
    }
    results.winners.sort();
    results.captured.sort();
    results.disqualified.sort();
    results
}

/// The player view a client may render. Excludes self, hides neutralized
/// players, and hides oni positions from runners. A spectator (`viewer_role`
/// = None) sees every live player. Credential digests are stripped.
pub fn visible_players(
    players: &PlayerMap,
    self_id: &PlayerId,
    viewer_role: Option<Role>,
) -> Vec<(PlayerId, PlayerRecord)> {
    let mut view: Vec<(PlayerId, PlayerRecord)> = players
        .iter()
        .filter(|(id, _)| *id != self_id)
        .filter(|(_, p)| !p.is_neutralized())
        .filter(|(_, p)| !(viewer_role == Some(Role::Runner) && p.role == Role::Oni))
        .map(|(id, p)| {
            let mut p = p.clone();
            p.password = None;
            (id.clone(), p)
        })
        .collect();
    view.sort_by(|(a, _), (b, _)| a.cmp(b));
    view
}

/// Onification applies to everyone currently captured or disqualified;
/// untouched players are left alone.
pub fn onifiable(record: &PlayerRecord) -> bool {
    record.is_neutralized()
}

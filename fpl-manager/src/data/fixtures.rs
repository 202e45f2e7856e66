// Fixture difficulty over a short forward window.
//
// For each team, averages the difficulty ratings of its fixtures in the
// next few gameweeks. LOWER mean difficulty means an EASIER schedule;
// consumers rank teams ascending.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::fpl::types::{Event, Fixture};

/// Number of gameweeks (starting at the next one) included in the summary.
pub const DEFAULT_FIXTURE_WINDOW: u32 = 5;

/// The id of the first gameweek flagged as next, if any.
pub fn next_gameweek(events: &[Event]) -> Option<u32> {
    events.iter().find(|e| e.is_next).map(|e| e.id)
}

/// Team short name -> mean difficulty of its fixtures in gameweeks
/// `[next, next + window)`, rounded to two decimals.
///
/// Returns an empty map when no gameweek is flagged as next (end of season).
/// Teams without a rated fixture in the window, or missing from `teams`,
/// are omitted.
pub fn summarize_fixture_difficulty(
    events: &[Event],
    fixtures: &[Fixture],
    teams: &HashMap<u32, String>,
    window: u32,
) -> BTreeMap<String, f64> {
    let Some(next) = next_gameweek(events) else {
        return BTreeMap::new();
    };
    let end = next.saturating_add(window);

    let mut ratings: BTreeMap<u32, Vec<u8>> = BTreeMap::new();
    for fixture in fixtures {
        let Some(gw) = fixture.event else {
            continue;
        };
        if gw < next || gw >= end {
            continue;
        }
        let sides = [
            (fixture.team_h, fixture.team_h_difficulty),
            (fixture.team_a, fixture.team_a_difficulty),
        ];
        for (team, difficulty) in sides {
            if let (Some(team), Some(difficulty)) = (team, difficulty) {
                ratings.entry(team).or_default().push(difficulty);
            }
        }
    }

    ratings
        .into_iter()
        .filter(|(_, r)| !r.is_empty())
        .filter_map(|(team_id, r)| {
            let Some(name) = teams.get(&team_id) else {
                debug!(team_id, "fixture team not in team table");
                return None;
            };
            let mean = r.iter().map(|&d| f64::from(d)).sum::<f64>() / r.len() as f64;
            Some((name.clone(), round2(mean)))
        })
        .collect()
}

/// Team names ordered from easiest to hardest schedule.
pub fn easiest_first(summary: &BTreeMap<String, f64>) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = summary.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u32, is_next: bool) -> Event {
        Event {
            id,
            is_previous: false,
            is_current: false,
            is_next,
            finished: false,
        }
    }

    fn fixture(gw: Option<u32>, home: u32, away: u32, hd: u8, ad: u8) -> Fixture {
        Fixture {
            event: gw,
            team_h: Some(home),
            team_a: Some(away),
            team_h_difficulty: Some(hd),
            team_a_difficulty: Some(ad),
        }
    }

    fn teams() -> HashMap<u32, String> {
        [(1, "ARS"), (2, "LIV"), (3, "MCI"), (4, "BUR")]
            .into_iter()
            .map(|(id, n)| (id, n.to_string()))
            .collect()
    }

    #[test]
    fn no_next_gameweek_yields_empty_summary() {
        let events = vec![event(37, false), event(38, false)];
        let fixtures = vec![fixture(Some(38), 1, 2, 3, 3)];
        let summary = summarize_fixture_difficulty(&events, &fixtures, &teams(), 5);
        assert!(summary.is_empty());
    }

    #[test]
    fn averages_within_window_only() {
        let events = vec![event(9, false), event(10, true), event(11, false)];
        let fixtures = vec![
            fixture(Some(9), 1, 2, 5, 5),   // before window
            fixture(Some(10), 1, 2, 2, 4),
            fixture(Some(12), 2, 1, 3, 3),
            fixture(Some(14), 3, 1, 4, 2),
            fixture(Some(15), 1, 3, 5, 5),  // window end is exclusive
            fixture(None, 1, 4, 1, 1),      // unscheduled
        ];
        let summary = summarize_fixture_difficulty(&events, &fixtures, &teams(), 5);

        // ARS: 2, 3, 2 -> 2.33
        assert_eq!(summary.get("ARS"), Some(&2.33));
        // LIV: 4, 3 -> 3.5
        assert_eq!(summary.get("LIV"), Some(&3.5));
        // MCI: 4
        assert_eq!(summary.get("MCI"), Some(&4.0));
        // BUR has no qualifying fixture.
        assert!(!summary.contains_key("BUR"));
    }

    #[test]
    fn unrated_sides_and_unknown_teams_are_left_out() {
        let events = vec![event(10, true)];
        let mut unrated = fixture(Some(10), 1, 2, 0, 5);
        unrated.team_h_difficulty = None;
        let fixtures = vec![
            unrated,
            fixture(Some(11), 1, 3, 4, 2),
            // Teams 8 and 9 are not in the team table.
            fixture(Some(10), 8, 9, 1, 5),
        ];
        let summary = summarize_fixture_difficulty(&events, &fixtures, &teams(), 5);

        // ARS keeps only its rated fixture.
        assert_eq!(summary.get("ARS"), Some(&4.0));
        assert_eq!(summary.get("LIV"), Some(&5.0));
        assert_eq!(summary.get("MCI"), Some(&2.0));
        assert!(!summary.contains_key("N/A"));
        assert_eq!(summary.len(), 3);
    }

    #[test]
    fn easiest_first_sorts_ascending() {
        let mut summary = BTreeMap::new();
        summary.insert("MCI".to_string(), 4.0);
        summary.insert("ARS".to_string(), 2.33);
        summary.insert("LIV".to_string(), 3.5);
        let ranked = easiest_first(&summary);
        assert_eq!(ranked[0], ("ARS", 2.33));
        assert_eq!(ranked[2], ("MCI", 4.0));
    }

    #[test]
    fn next_gameweek_is_first_flagged() {
        assert_eq!(next_gameweek(&[event(1, false), event(2, true)]), Some(2));
        assert_eq!(next_gameweek(&[]), None);
    }
}

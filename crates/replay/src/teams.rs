//! Team aggregation over assembled player records.

use std::collections::BTreeMap;

use hashbrown::HashSet;
use stormline_model::{ChannelId, PlayerRecord, TeamRecord};

use crate::merge::set_once;

/// Group players by team index, ordered by team index.
///
/// Pure: rebuilt from scratch on every call. Placement and team kills keep the
/// first value seen; the party owner is the last party leader seen. Players
/// without a team index are skipped.
///
/// Each member with an id is listed once, keyed by its state channel, and
/// `player_ids[i]` and `player_names[i]` always describe the same member. A
/// member without a display name gets an empty name.
pub fn aggregate_teams<'a>(players: impl IntoIterator<Item = &'a PlayerRecord>) -> Vec<TeamRecord> {
    let mut teams: BTreeMap<i32, TeamRecord> = BTreeMap::new();
    let mut members: HashSet<ChannelId> = HashSet::new();

    for player in players {
        let Some(team_index) = player.team_index else {
            continue;
        };
        let team = teams.entry(team_index).or_insert_with(|| TeamRecord {
            team_index,
            ..Default::default()
        });

        set_once(&mut team.placement, player.placement);
        set_once(&mut team.team_kills, player.team_kills);

        if let Some(id) = player.id
            && members.insert(player.channel)
        {
            team.player_ids.push(id);
            team.player_names.push(player.player_name().unwrap_or_default().to_string());
        }
        if player.is_party_leader {
            team.party_owner_id = player.id;
        }
    }

    teams.into_values().collect()
}

//! Legal-action enumeration for automated players.
//!
//! [`legal_actions`] never mutates the game. Every action it returns passes
//! the engine's validation when applied to the same state, so a decision
//! client can pick any of them blindly.

use crate::actions::Action;
use crate::board::{PlayerId, Resource};
use crate::game::{GameState, TurnPhase};
use crate::player::{DevCardKind, Player};

/// Candidates offered per action kind once the dice are rolled
pub const MAX_CANDIDATES_PER_KIND: usize = 5;

/// Candidates offered per action kind during setup
pub const MAX_SETUP_CANDIDATES: usize = 2;

/// Actions `player` may take right now, in a stable order with `endTurn` last
/// whenever it is allowed.
pub fn legal_actions(state: &GameState, player: PlayerId) -> Vec<Action> {
    if state.is_finished() || player != state.current_player {
        return Vec::new();
    }
    let Some(me) = state.player(player) else {
        return Vec::new();
    };

    match state.phase {
        TurnPhase::Setup => setup_actions(state, me),
        TurnPhase::NotRolled => vec![Action::RollDice],
        TurnPhase::RobberPending { .. } => {
            let mut actions: Vec<Action> = state
                .board
                .land_tiles()
                .filter(|(_, t)| !t.has_robber)
                .map(|(id, _)| Action::MoveRobber { hex_id: id })
                .collect();
            actions.push(Action::EndTurn);
            actions
        }
        TurnPhase::Rolled => main_actions(state, me),
    }
}

fn setup_actions(state: &GameState, me: &Player) -> Vec<Action> {
    let mut actions = Vec::new();

    if state.owes_setup_town() {
        actions.extend(
            state
                .board
                .valid_town_sites(me.id, true)
                .into_iter()
                .take(MAX_SETUP_CANDIDATES)
                .map(|node_id| Action::BuildTown {
                    node_id,
                    player_id: me.id,
                }),
        );
    }

    if let Some(anchor) = state.setup_anchor() {
        if me.free_roads > 0 {
            actions.extend(
                state
                    .board
                    .edges_at(anchor)
                    .filter(|e| e.owner.is_none())
                    .take(MAX_SETUP_CANDIDATES)
                    .map(|e| Action::BuildRoad {
                        edge_id: e.id,
                        player_id: me.id,
                        free: true,
                    }),
            );
        }
    }

    if state.setup_turn_done() {
        actions.push(Action::EndTurn);
    }
    actions
}

fn main_actions(state: &GameState, me: &Player) -> Vec<Action> {
    let board = &state.board;
    let player_id = me.id;
    let mut actions = Vec::new();

    if me.can_afford_town() {
        actions.extend(
            board
                .valid_town_sites(player_id, false)
                .into_iter()
                .take(MAX_CANDIDATES_PER_KIND)
                .map(|node_id| Action::BuildTown { node_id, player_id }),
        );
    }

    let road_sites = board.valid_road_sites(player_id);
    if me.can_afford_road() {
        actions.extend(
            road_sites
                .iter()
                .take(MAX_CANDIDATES_PER_KIND)
                .map(|&edge_id| Action::BuildRoad {
                    edge_id,
                    player_id,
                    free: false,
                }),
        );
    }
    if me.free_roads > 0 {
        actions.extend(
            road_sites
                .iter()
                .take(MAX_CANDIDATES_PER_KIND)
                .map(|&edge_id| Action::BuildRoad {
                    edge_id,
                    player_id,
                    free: true,
                }),
        );
    }

    if me.can_afford_city() {
        actions.extend(
            board
                .valid_city_sites(player_id)
                .into_iter()
                .take(MAX_CANDIDATES_PER_KIND)
                .map(|node_id| Action::BuildCity { node_id, player_id }),
        );
    }

    for give in Resource::ALL {
        if me.resources.get(give) >= state.trade_ratio(player_id, give) {
            actions.push(Action::HarborTrade {
                player_id,
                give,
                receive: scarcest_other(me, give),
            });
        }
    }

    if me.can_afford_dev_card() && state.dev_cards_remaining() > 0 {
        actions.push(Action::BuyDevCard { player_id });
    }

    actions.extend(card_plays(state, me));

    actions.push(Action::EndTurn);
    actions
}

/// One play per playable card kind, with the choice filled in
fn card_plays(state: &GameState, me: &Player) -> Vec<Action> {
    if state.config.rules.one_dev_card_per_turn && me.played_dev_card_this_turn {
        return Vec::new();
    }
    let player_id = me.id;

    DevCardKind::ALL
        .iter()
        .filter(|&&kind| me.has_playable_dev_card(kind))
        .filter_map(|&kind| match kind {
            DevCardKind::Knight => Some(Action::PlayKnight { player_id }),
            DevCardKind::RoadBuilding => Some(Action::PlayRoadBuilding { player_id }),
            DevCardKind::YearOfPlenty => {
                let first = scarcest(me, None);
                Some(Action::PlayYearOfPlenty {
                    player_id,
                    resources: [first, scarcest(me, Some(first))],
                })
            }
            DevCardKind::Monopoly => Some(Action::PlayMonopoly {
                player_id,
                resource: richest_among_opponents(state, player_id),
            }),
            DevCardKind::VictoryPoint => None,
        })
        .collect()
}

/// Resource the player holds least of, excluding `give`; ties go to the
/// earlier resource in [`Resource::ALL`]
fn scarcest_other(me: &Player, give: Resource) -> Resource {
    scarcest(me, Some(give))
}

fn scarcest(me: &Player, except: Option<Resource>) -> Resource {
    Resource::ALL
        .iter()
        .copied()
        .filter(|&r| Some(r) != except)
        .min_by_key(|&r| me.resources.get(r))
        .unwrap_or(Resource::Wood)
}

/// Resource opponents hold the most of in total
fn richest_among_opponents(state: &GameState, player: PlayerId) -> Resource {
    Resource::ALL
        .iter()
        .copied()
        .rev()
        .max_by_key(|&r| {
            state
                .players
                .iter()
                .filter(|p| p.id != player)
                .map(|p| p.resources.get(r))
                .sum::<u32>()
        })
        .unwrap_or(Resource::Wood)
}

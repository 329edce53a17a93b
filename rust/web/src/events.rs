use crate::hub::Payload;
use chrono::{DateTime, Utc};
use gemstone_engine::cards::{CardId, Tier};
use gemstone_engine::engine::{ActionDetail, ActionOutcome, ReserveTarget};
use gemstone_engine::state::{Game, GameId, GamePlayer, PlayerId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Connected,
    PlayerJoined,
    PlayerLeft,
    GameStarted,
    GemsTaken,
    CardPurchased,
    CardReserved,
    GameCompleted,
}

/// Envelope pushed to every connection in a game's room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub game_id: GameId,
    pub actor_id: Option<PlayerId>,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

impl GameEvent {
    pub fn new(kind: EventType, game_id: GameId, actor_id: Option<PlayerId>, details: Value) -> Self {
        Self {
            kind,
            game_id,
            actor_id,
            details,
            timestamp: Utc::now(),
        }
    }

    /// Welcome sent to a freshly subscribed connection only.
    pub fn connected(game: &Game, player: Option<PlayerId>, room_size: usize) -> Self {
        Self::new(
            EventType::Connected,
            game.id,
            player,
            json!({
                "status": game.status,
                "current_turn": game.current_turn,
                "turn_number": game.turn_number,
                "room_size": room_size,
            }),
        )
    }

    pub fn player_joined(game: &Game, seat: &GamePlayer) -> Self {
        Self::new(
            EventType::PlayerJoined,
            game.id,
            Some(seat.player_id),
            json!({ "seat": seat.seat, "player_count": game.player_count }),
        )
    }

    pub fn player_left(game: &Game, player: PlayerId) -> Self {
        Self::new(EventType::PlayerLeft, game.id, Some(player), json!({}))
    }

    pub fn game_started(game: &Game, roster: &[GamePlayer]) -> Self {
        let players: Vec<PlayerId> = roster.iter().map(|seat| seat.player_id).collect();
        Self::new(
            EventType::GameStarted,
            game.id,
            Some(game.created_by),
            json!({
                "players": players,
                "current_turn": game.current_turn,
            }),
        )
    }

    /// Events announcing a committed action: the action itself, followed by
    /// `game_completed` when it ended the game.
    pub fn from_outcome(outcome: &ActionOutcome) -> Vec<Self> {
        let game = &outcome.game;
        let (kind, mut details) = match &outcome.detail {
            ActionDetail::GemsTaken { gems } => (EventType::GemsTaken, json!({ "gems": gems })),
            ActionDetail::CardPurchased {
                card,
                source,
                paid,
                replacement,
            } => (
                EventType::CardPurchased,
                json!({
                    "card_id": card.id,
                    "tier": card.tier,
                    "source": source,
                    "paid": paid,
                    "replacement": replacement,
                }),
            ),
            ActionDetail::CardReserved {
                card,
                target,
                replacement,
                gold_granted,
            } => (
                EventType::CardReserved,
                reservation_details(card.id, card.tier, target, *replacement, *gold_granted),
            ),
        };

        if let Value::Object(fields) = &mut details {
            fields.insert("noble".into(), json!(outcome.noble));
            fields.insert("victory_points".into(), json!(outcome.points));
            fields.insert("next_turn".into(), json!(game.current_turn));
            fields.insert("turn_number".into(), json!(game.turn_number));
        }

        let mut events = vec![Self::new(kind, game.id, Some(outcome.actor), details)];
        if outcome.ended_game() {
            events.push(Self::new(
                EventType::GameCompleted,
                game.id,
                Some(outcome.actor),
                json!({ "winner": game.winner, "turn_number": game.turn_number }),
            ));
        }
        events
    }

    pub fn to_payload(&self) -> Result<Payload, serde_json::Error> {
        serde_json::to_string(self).map(Payload::from)
    }
}

/// A blind draw only reveals its tier to the room.
fn reservation_details(
    card_id: CardId,
    tier: Tier,
    target: &ReserveTarget,
    replacement: Option<CardId>,
    gold_granted: bool,
) -> Value {
    match target {
        ReserveTarget::Visible(_) => json!({
            "source": "visible",
            "card_id": card_id,
            "tier": tier,
            "replacement": replacement,
            "gold_granted": gold_granted,
        }),
        ReserveTarget::Deck(_) => json!({
            "source": "deck",
            "tier": tier,
            "gold_granted": gold_granted,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemstone_engine::cards::DevelopmentCard;
    use gemstone_engine::gems::{GemKind, GemSet};
    use gemstone_engine::state::GameStatus;

    fn game(status: GameStatus) -> Game {
        Game {
            id: 4,
            room_code: "a1b2c3".into(),
            status,
            created_by: 1,
            current_turn: (status == GameStatus::InProgress).then_some(2),
            turn_number: 6,
            winner: (status == GameStatus::Completed).then_some(1),
            player_count: 2,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
            version: 9,
        }
    }

    fn card() -> DevelopmentCard {
        DevelopmentCard {
            id: 31,
            tier: Tier::Two,
            gem: GemKind::Emerald,
            points: 2,
            cost: GemSet::from_counts([(GemKind::Ruby, 5)]),
        }
    }

    #[test]
    fn envelope_uses_type_field() {
        let event = GameEvent::player_left(&game(GameStatus::Waiting), 3);
        let json: Value = serde_json::from_str(&event.to_payload().unwrap()).unwrap();
        assert_eq!(json["type"], "player_left");
        assert_eq!(json["game_id"], 4);
        assert_eq!(json["actor_id"], 3);
    }

    #[test]
    fn blind_reservation_hides_the_card() {
        let outcome = ActionOutcome {
            game: game(GameStatus::InProgress),
            actor: 1,
            detail: ActionDetail::CardReserved {
                card: card(),
                target: ReserveTarget::Deck(Tier::Two),
                replacement: None,
                gold_granted: true,
            },
            noble: None,
            points: 0,
        };
        let events = GameEvent::from_outcome(&outcome);
        assert_eq!(events.len(), 1);
        let details = &events[0].details;
        assert_eq!(details["source"], "deck");
        assert_eq!(details["tier"], 2);
        assert!(details.get("card_id").is_none());
        assert_eq!(details["next_turn"], 2);
    }

    #[test]
    fn winning_purchase_adds_completion_event() {
        let outcome = ActionOutcome {
            game: game(GameStatus::Completed),
            actor: 1,
            detail: ActionDetail::CardPurchased {
                card: card(),
                source: gemstone_engine::engine::PurchaseSource::Board,
                paid: GemSet::from_counts([(GemKind::Ruby, 5)]),
                replacement: Some(44),
            },
            noble: None,
            points: 15,
        };
        let events = GameEvent::from_outcome(&outcome);
        let kinds: Vec<EventType> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventType::CardPurchased, EventType::GameCompleted]);
        assert_eq!(events[0].details["card_id"], 31);
        assert_eq!(events[0].details["paid"]["ruby"], 5);
        assert_eq!(events[0].details["next_turn"], Value::Null);
        assert_eq!(events[1].details["winner"], 1);
    }
}

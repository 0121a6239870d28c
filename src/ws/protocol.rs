//! Wire format spoken over the WebSocket, shared by every client.

use serde::{Deserialize, Serialize};

use crate::game::{Board, Mark, Winner};

/// Messages a client may send.
///
/// The `move` payload carries the full proposed grid plus the sender's idea
/// of whose turn it is and who won. The server treats everything except the
/// grid diff as a claim to verify, never as truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Join {
        room: String,
        username: String,
    },
    Move {
        room: String,
        board: Board,
        #[serde(rename = "currentPlayer")]
        current_player: Mark,
        winner: Option<Winner>,
        username: String,
    },
    PlayAgain {
        room: String,
        username: String,
    },
}

/// Messages the server pushes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Join succeeded; tells the client which mark it plays.
    Joined { player: Mark },
    /// Join refused, both slots taken.
    Full,
    Error {
        message: String,
    },
    /// Authoritative room state. `player` is only present on the updates
    /// that conclude a rematch, carrying each recipient's new mark.
    Update {
        board: Board,
        #[serde(rename = "currentPlayer")]
        current_player: Mark,
        winner: Option<Winner>,
        #[serde(skip_serializing_if = "Option::is_none")]
        player: Option<Mark>,
    },
}

impl ServerMessage {
    pub fn update(board: Board, current_player: Mark, winner: Option<Winner>) -> ServerMessage {
        ServerMessage::Update {
            board,
            current_player,
            winner,
            player: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn join_parses() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join","room":"lobby","username":"alice"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                room: "lobby".into(),
                username: "alice".into(),
            }
        );
    }

    #[test]
    fn move_parses_with_camel_case_turn_field() {
        let raw = json!({
            "type": "move",
            "room": "lobby",
            "board": [["X", null, null], [null, null, null], [null, null, null]],
            "currentPlayer": "O",
            "winner": null,
            "username": "alice",
        });
        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        match msg {
            ClientMessage::Move { current_player, winner, .. } => {
                assert_eq!(current_player, Mark::O);
                assert_eq!(winner, None);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn play_again_uses_kebab_case_tag() {
        let msg = ClientMessage::PlayAgain {
            room: "lobby".into(),
            username: "bob".into(),
        };
        assert_eq!(
            to_value(&msg).unwrap(),
            json!({"type": "play-again", "room": "lobby", "username": "bob"})
        );
    }

    #[test]
    fn joined_and_full_serialize_exactly() {
        assert_eq!(
            to_value(ServerMessage::Joined { player: Mark::X }).unwrap(),
            json!({"type": "joined", "player": "X"})
        );
        assert_eq!(to_value(ServerMessage::Full).unwrap(), json!({"type": "full"}));
    }

    #[test]
    fn update_omits_player_unless_set() {
        let plain = ServerMessage::update(Board::empty(3), Mark::X, None);
        assert_eq!(
            to_value(&plain).unwrap(),
            json!({
                "type": "update",
                "board": [[null, null, null], [null, null, null], [null, null, null]],
                "currentPlayer": "X",
                "winner": null,
            })
        );

        let rematch = ServerMessage::Update {
            board: Board::empty(3),
            current_player: Mark::X,
            winner: None,
            player: Some(Mark::O),
        };
        assert_eq!(to_value(&rematch).unwrap()["player"], json!("O"));
    }

    #[test]
    fn winner_field_spells_draw() {
        let msg = ServerMessage::update(Board::empty(3), Mark::X, Some(Winner::Draw));
        assert_eq!(to_value(&msg).unwrap()["winner"], json!("Draw"));
    }
}

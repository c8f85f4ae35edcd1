use actix::Message;
use serde::{Deserialize, Serialize};

/// Message sent from the browser to the server.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClientMessage {
    pub action: String,
    pub notation: Option<String>,
    pub ply: Option<usize>,
    pub color_preference: Option<String>,
    pub square: Option<String>,
    pub game_id: Option<String>,
}

/// Message pushed from the server to the browser.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ServerMessage {
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ply: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ply_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_move: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_move: Option<LastMove>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_square: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_moves: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServerMessage {
    pub fn new(message_type: &str) -> ServerMessage {
        ServerMessage {
            message_type: message_type.to_string(),
            ..ServerMessage::default()
        }
    }
}

/// Last move information.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LastMove {
    pub from: String,
    pub to: String,
    pub san: String,
}

/// Raw text frame pushed to a websocket session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct ChessSocketMessage(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_omits_empty_fields() {
        let message = ServerMessage::new("move_request");
        let text = serde_json::to_string(&message).unwrap();
        assert_eq!(text, r#"{"message_type":"move_request"}"#);
    }

    #[test]
    fn client_message_tolerates_missing_fields() {
        let message: ClientMessage = serde_json::from_str(r#"{"action":"flip"}"#).unwrap();
        assert_eq!(message.action, "flip");
        assert!(message.notation.is_none());
        assert!(message.ply.is_none());
    }
}

//! Wire protocol between the engine and connected clients.
//!
//! Messages are JSON with a `t` tag, mirroring what the frontend consumes.
//! Server pushes are fanned out through the client registry; the only
//! inbound game message is an answer submission.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One judged guess, keyed by nickname in the results map. Nicknames are
/// untrusted free text and not unique-enforced; a later submission from the
/// same nickname overwrites the earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub answer: String,
    pub correct: bool,
    /// Milliseconds since the round started.
    pub time: u64,
}

/// Immutable copy of the round's answers taken at the results transition.
pub type ResultsSnapshot = HashMap<String, AnswerRecord>;

/// What a newly-polling or newly-connecting consumer should render next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseSignal {
    Image,
    Results,
    Reset,
    Message,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A new round is starting; clients clear their round-local state.
    Reset { server_now: String },
    /// Current composited hint image.
    HintImage {
        jpeg_b64: String,
        server_now: String,
    },
    /// Judged answers for the round that just ended.
    Results {
        answers: ResultsSnapshot,
        server_now: String,
    },
    /// Error or announcement text, always user-safe.
    Message { text: String },
    /// Autocomplete corpus for the current collection.
    Completions { choices: Vec<String> },
    /// Phase projection for polling clients.
    Phase { signal: PhaseSignal },
    Error { code: String, msg: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    SubmitAnswer { nickname: String, answer: String },
    /// Explicit re-request of the autocomplete corpus.
    Completions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_messages_are_tagged() {
        let msg = ServerMessage::Message {
            text: "hello".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""t":"message""#));
    }

    #[test]
    fn submit_answer_parses() {
        let json = r#"{"t":"submit_answer","nickname":"rin","answer":"FMA"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::SubmitAnswer { nickname, answer } => {
                assert_eq!(nickname, "rin");
                assert_eq!(answer, "FMA");
            }
            _ => panic!("expected submit_answer"),
        }
    }
}

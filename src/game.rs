//! The round/phase engine.
//!
//! One perpetual task drives the game: every tick runs exactly one phase
//! handler, broadcasts whatever that transition produces, and reports how
//! long to wait before the next tick. Answer submissions and
//! reconfiguration arrive concurrently from the transport layer; round
//! state is guarded so they can never interleave with a phase handler.
//!
//! Failures inside a handler never kill the loop. They are caught at the
//! single supervisory point in [`Game::tick`], turned into a Message-phase
//! broadcast (domain errors verbatim, everything else collapsed to a
//! generic text) and the game restarts from Reset.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, Notify, RwLock};

use crate::clients::{ClientId, Clients};
use crate::config::{ConfigPatch, GameConfig};
use crate::filters::{FilterChain, FilterError};
use crate::matching::array_almost_has;
use crate::media::{MediaCollection, MediaItem, MediaRecord, SelectionError};
use crate::protocol::{AnswerRecord, PhaseSignal, ResultsSnapshot, ServerMessage};
use crate::reveal::{HintImage, RevealError};

/// Reserved results key carrying the correct answer. Visible in results,
/// not a player score.
pub const ANSWER_NICKNAME: &str = "*** answer ***";

const GENERIC_ERROR_TEXT: &str = "Something unexpected happened. Restarting the game.";

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Reveal(#[from] RevealError),
    #[error("could not fetch poster: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("could not read poster: {0}")]
    Io(#[from] std::io::Error),
    #[error("no active round")]
    NoRound,
}

impl GameError {
    /// Text that is safe to show players. Domain errors surface their own
    /// message; anything else must not leak internals.
    pub fn player_message(&self) -> String {
        match self {
            GameError::Selection(e) => e.to_string(),
            _ => GENERIC_ERROR_TEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reset,
    Guessing,
    Revealed,
    Results,
    Message,
}

/// Per-round state. Built fresh at every Reset, destroyed wholesale at the
/// next one; nothing here survives across rounds.
struct Round {
    item: MediaItem,
    hint: HintImage,
    started: Instant,
    answers: HashMap<String, AnswerRecord>,
}

impl Round {
    fn new(item: MediaItem, hint: HintImage) -> Self {
        let mut answers = HashMap::new();
        answers.insert(
            ANSWER_NICKNAME.to_string(),
            AnswerRecord {
                answer: item.display.clone(),
                correct: true,
                time: 0,
            },
        );
        Self {
            item,
            hint,
            started: Instant::now(),
            answers,
        }
    }
}

/// The game engine. Constructed once, shared by handle with the transport
/// layer; no ambient singletons.
pub struct Game {
    config: RwLock<GameConfig>,
    pending: Mutex<Option<ConfigPatch>>,
    records: RwLock<Vec<MediaRecord>>,
    collection: RwLock<MediaCollection>,
    round: Mutex<Option<Round>>,
    last_results: RwLock<ResultsSnapshot>,
    last_message: RwLock<Option<String>>,
    phase: RwLock<Phase>,
    clients: Clients,
    kick: Notify,
}

impl Game {
    /// Build the engine, applying the configured filter chain to the raw
    /// records. Fails only on an invalid initial filter string.
    pub fn new(config: GameConfig, records: Vec<MediaRecord>) -> Result<Self, GameError> {
        let chain = FilterChain::parse(&config.filters)?;
        let collection = MediaCollection::from_records(&chain.apply(&records));
        Ok(Self {
            config: RwLock::new(config),
            pending: Mutex::new(None),
            records: RwLock::new(records),
            collection: RwLock::new(collection),
            round: Mutex::new(None),
            last_results: RwLock::new(ResultsSnapshot::new()),
            last_message: RwLock::new(None),
            phase: RwLock::new(Phase::Reset),
            clients: Clients::new(),
            kick: Notify::new(),
        })
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub async fn configuration(&self) -> GameConfig {
        self.config.read().await.clone()
    }

    pub async fn completions(&self) -> Vec<String> {
        self.collection.read().await.completions()
    }

    /// Cheap projection telling a polling client what to render next.
    pub async fn phase_signal(&self) -> PhaseSignal {
        match *self.phase.read().await {
            Phase::Guessing | Phase::Revealed => PhaseSignal::Image,
            Phase::Results => PhaseSignal::Results,
            Phase::Reset => PhaseSignal::Reset,
            Phase::Message => PhaseSignal::Message,
        }
    }

    /// Register a subscriber and immediately synchronize it: the current
    /// autocomplete corpus plus whatever the current phase would have
    /// pushed. No history is replayed.
    pub async fn add_client(&self, sender: mpsc::UnboundedSender<ServerMessage>) -> ClientId {
        let id = self.clients.register(sender).await;

        let choices = self.completions().await;
        self.clients
            .send_to(&id, ServerMessage::Completions { choices })
            .await;

        let catch_up = match self.phase_signal().await {
            PhaseSignal::Image => {
                let round = self.round.lock().await;
                match round.as_ref() {
                    Some(r) => ServerMessage::HintImage {
                        jpeg_b64: encode_b64(r.hint.jpeg()),
                        server_now: now(),
                    },
                    None => ServerMessage::Reset { server_now: now() },
                }
            }
            PhaseSignal::Results => ServerMessage::Results {
                answers: self.last_results.read().await.clone(),
                server_now: now(),
            },
            PhaseSignal::Reset => ServerMessage::Reset { server_now: now() },
            PhaseSignal::Message => ServerMessage::Message {
                text: self
                    .last_message
                    .read()
                    .await
                    .clone()
                    .unwrap_or_else(|| GENERIC_ERROR_TEXT.to_string()),
            },
        };
        self.clients.send_to(&id, catch_up).await;
        id
    }

    /// Record a guess for the current round. Outside Guessing/Revealed this
    /// is silently ignored. A later submission from the same nickname
    /// overwrites the earlier one.
    pub async fn submit_answer(&self, nickname: &str, answer: &str) {
        let phase = *self.phase.read().await;
        if !matches!(phase, Phase::Guessing | Phase::Revealed) {
            tracing::trace!(nickname, ?phase, "answer outside guessing window, ignored");
            return;
        }
        let mut round = self.round.lock().await;
        let Some(round) = round.as_mut() else {
            return;
        };
        let correct = array_almost_has(&round.item.aliases, answer);
        let time = round.started.elapsed().as_millis() as u64;
        tracing::debug!(nickname, answer, correct, time, "answer received");
        round.answers.insert(
            nickname.to_string(),
            AnswerRecord {
                answer: answer.to_string(),
                correct,
                time,
            },
        );
    }

    /// Stage a configuration change. It takes effect at the next Reset
    /// boundary; with `immediate` the engine is fast-forwarded so the very
    /// next tick is that boundary. Validation failures go back to the
    /// caller only, never to players.
    pub async fn configure(&self, patch: ConfigPatch, immediate: bool) -> Result<(), GameError> {
        if let Some(ref filters) = patch.filters {
            FilterChain::parse(filters)?;
        }
        *self.pending.lock().await = Some(patch);
        tracing::info!(immediate, "configuration staged");
        if immediate {
            *self.phase.write().await = Phase::Reset;
            self.kick.notify_one();
        }
        Ok(())
    }

    /// Run the engine forever: tick, then wait the returned duration. An
    /// `immediate` reconfiguration cuts the wait short and forces the next
    /// tick to the Reset boundary.
    pub async fn run(self: Arc<Self>) {
        loop {
            let wait = self.tick().await;
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                () = self.kick.notified() => {
                    *self.phase.write().await = Phase::Reset;
                }
            }
        }
    }

    /// Advance the machine by exactly one phase step and return the wait
    /// before the next one. This is the single supervisory point: a failing
    /// handler becomes a Message-phase broadcast, never a crash.
    pub async fn tick(&self) -> Duration {
        let phase = *self.phase.read().await;
        let outcome = match phase {
            // Message behaves like an ordinary Reset entry once its wait
            // has elapsed, pending configuration included.
            Phase::Reset | Phase::Message => self.handle_reset().await,
            Phase::Guessing => self.handle_guessing().await,
            Phase::Revealed => self.handle_revealed().await,
            Phase::Results => self.handle_results().await,
        };

        match outcome {
            Ok(wait) => wait,
            Err(e) => {
                tracing::error!(error = %e, ?phase, "phase handler failed");
                let text = e.player_message();
                *self.last_message.write().await = Some(text.clone());
                self.clients
                    .broadcast(ServerMessage::Message { text })
                    .await;
                *self.phase.write().await = Phase::Message;
                self.config.read().await.message_wait()
            }
        }
    }

    /// Reset boundary: apply staged configuration if present, otherwise
    /// start a fresh round.
    async fn handle_reset(&self) -> Result<Duration, GameError> {
        if let Some(patch) = self.pending.lock().await.take() {
            return self.apply_configuration(patch).await;
        }

        let item = self.collection.read().await.random()?.clone();
        tracing::info!(display = %item.display, "starting round");

        let bytes = fetch_image(&item.image_url).await?;
        let hint = HintImage::new(&bytes)?;

        *self.round.lock().await = Some(Round::new(item, hint));
        *self.last_message.write().await = None;

        self.clients
            .broadcast(ServerMessage::Reset { server_now: now() })
            .await;
        *self.phase.write().await = Phase::Guessing;
        Ok(self.config.read().await.short_wait())
    }

    /// Swap live configuration and rebuild the collection, then re-enter
    /// Reset on the next tick instead of starting a round.
    async fn apply_configuration(&self, patch: ConfigPatch) -> Result<Duration, GameError> {
        let merged = self.config.read().await.patched(&patch);
        let chain = FilterChain::parse(&merged.filters)?;

        let records = self.records.read().await;
        let collection = MediaCollection::from_records(&chain.apply(&records));
        drop(records);
        tracing::info!(items = collection.len(), "configuration applied");

        let choices = collection.completions();
        *self.collection.write().await = collection;
        *self.config.write().await = merged;

        self.clients
            .broadcast(ServerMessage::Completions { choices })
            .await;
        *self.phase.write().await = Phase::Reset;
        Ok(self.config.read().await.short_wait())
    }

    async fn handle_guessing(&self) -> Result<Duration, GameError> {
        let config = self.config.read().await.clone();
        let msg = {
            let mut guard = self.round.lock().await;
            let round = guard.as_mut().ok_or(GameError::NoRound)?;

            if round.hint.circle_count() < config.max_circles {
                round
                    .hint
                    .reveal_more(config.circle_size_min, config.circle_size_max)?;
                tracing::debug!(circles = round.hint.circle_count(), "revealing more");
            } else {
                tracing::debug!("revealing all");
                round.hint.reveal_all()?;
                *self.phase.write().await = Phase::Revealed;
            }

            ServerMessage::HintImage {
                jpeg_b64: encode_b64(round.hint.jpeg()),
                server_now: now(),
            }
        };
        self.clients.broadcast(msg).await;
        Ok(config.reveal_wait())
    }

    async fn handle_revealed(&self) -> Result<Duration, GameError> {
        let snapshot: ResultsSnapshot = {
            let round = self.round.lock().await;
            round
                .as_ref()
                .map(|r| r.answers.clone())
                .ok_or(GameError::NoRound)?
        };
        *self.last_results.write().await = snapshot.clone();

        tracing::info!(answers = snapshot.len(), "showing results");
        self.clients
            .broadcast(ServerMessage::Results {
                answers: snapshot,
                server_now: now(),
            })
            .await;
        *self.phase.write().await = Phase::Results;
        Ok(self.config.read().await.result_wait())
    }

    async fn handle_results(&self) -> Result<Duration, GameError> {
        // No broadcast here; the next tick's Reset handling does it.
        *self.phase.write().await = Phase::Reset;
        Ok(self.config.read().await.reset_wait())
    }
}

/// Fetch poster bytes from an http(s) URL or a local path.
async fn fetch_image(location: &str) -> Result<Vec<u8>, GameError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let response = reqwest::get(location).await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    } else {
        Ok(tokio::fs::read(location).await?)
    }
}

fn encode_b64(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

//! Dramatic match recaps.
//!
//! The confirmation workflow only depends on [`RecapGenerator`]; the
//! production implementation is [`OpenAiRecapGenerator`], which sends a
//! single chat-completion request to an OpenAI-compatible endpoint. When no
//! API key is configured the server runs with [`UnavailableRecapGenerator`]
//! and matches are confirmed without a recap.

pub mod error;
pub mod openai;

pub use error::{RecapError, Result};
pub use openai::{OpenAiRecapGenerator, RecapConfig};

use async_trait::async_trait;

/// Inputs for one recap, in reporter/opponent seat order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecapRequest {
    pub player1_name: String,
    pub player2_name: String,
    pub player1_score: u32,
    pub player2_score: u32,
}

impl RecapRequest {
    /// Prompt sent as the user message.
    pub fn prompt(&self) -> String {
        format!(
            "Eres un comentarista deportivo de la NBA muy dramático y estás relatando un partido \
             de baloncesto 1 contra 1 entre amigos. Genera un resumen dramático en español del \
             siguiente partido:\n\n\
             Jugador 1: {}\n\
             Puntuación del jugador 1: {}\n\
             Jugador 2: {}\n\
             Puntuación del jugador 2: {}",
            self.player1_name, self.player1_score, self.player2_name, self.player2_score
        )
    }
}

/// Single-shot text generation for a confirmed match. Callers treat every
/// error as non-fatal; nothing here retries.
#[async_trait]
pub trait RecapGenerator: Send + Sync {
    async fn generate(&self, request: &RecapRequest) -> Result<String>;
}

/// Stand-in used when the server has no text-generation credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRecapGenerator;

#[async_trait]
impl RecapGenerator for UnavailableRecapGenerator {
    async fn generate(&self, _request: &RecapRequest) -> Result<String> {
        Err(RecapError::Config("recap generation is not configured".into()))
    }
}

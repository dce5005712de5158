//! Out-of-scope collaborators (§6 "Collaborators (used, not specified)"):
//! the auth provider, card catalogue, and situation generator. Each is a
//! narrow async trait with a stand-in implementation, the same seam shape as
//! [`crate::database::GameDatabase`] — a production deployment swaps in a
//! real client without touching the components that consume the trait.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use crate::config::ExternalConfig;
use crate::domain::error::{GameError, GameResult};
use crate::domain::{CardRef, CardType, Demographic, GameId, RoundId, UserId};

/// Validates a bearer credential and returns the user identity it names.
/// Unknown or malformed credentials yield `AuthenticationFailed` (§7).
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credential: &str) -> GameResult<UserId>;
}

/// HMAC-signed opaque bearer tokens (`{user_id}.{hex(hmac)}`), the
/// bundled stand-in named in `security.auth_secret` (§9 Open Question:
/// a real deployment delegates to whatever identity provider issues
/// end-user sessions; this keeps the seam testable without one).
pub struct HmacAuthProvider {
    key: Vec<u8>,
}

impl HmacAuthProvider {
    pub fn new(hmac_key: &str) -> Self {
        Self {
            key: hmac_key.as_bytes().to_vec(),
        }
    }

    /// Mints a credential for `user_id`, for use by tests and the stand-in login flow.
    pub fn issue(&self, user_id: UserId) -> String {
        let payload = user_id.to_string();
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();
        format!("{payload}.{}", hex_encode(&signature))
    }
}

#[async_trait]
impl AuthProvider for HmacAuthProvider {
    async fn authenticate(&self, credential: &str) -> GameResult<UserId> {
        let (payload, signature_hex) = credential
            .split_once('.')
            .ok_or_else(|| GameError::authentication_failed("malformed credential"))?;

        let user_id: UserId = payload
            .parse()
            .map_err(|_| GameError::authentication_failed("malformed credential"))?;

        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        let expected = mac.finalize().into_bytes();
        let expected_hex = hex_encode(&expected);

        let signatures_match: bool = expected_hex.as_bytes().ct_eq(signature_hex.as_bytes()).into();
        if !signatures_match {
            return Err(GameError::authentication_failed("invalid credential signature"));
        }

        Ok(user_id)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// For a (type, number) pair, returns a public URL; for a folder, lists the
/// ordered card numbers it contains (§6 "Card catalogue").
#[async_trait]
pub trait CardCatalogue: Send + Sync {
    async fn card_url(&self, card: CardRef) -> GameResult<String>;
    async fn list_folder(&self, card_type: CardType) -> GameResult<Vec<u32>>;
}

/// Stand-in catalogue serving deterministic placeholder URLs; the standard
/// folder is backed by [`crate::database::GameDatabase::standard_card_catalogue`]
/// rather than a static list, since the database already owns that table (§3).
pub struct StaticCardCatalogue {
    database: Arc<dyn crate::database::GameDatabase>,
}

impl StaticCardCatalogue {
    pub fn new(database: Arc<dyn crate::database::GameDatabase>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl CardCatalogue for StaticCardCatalogue {
    async fn card_url(&self, card: CardRef) -> GameResult<String> {
        let folder = match card.card_type {
            CardType::Starter => "starter",
            CardType::Standard => "standard",
            CardType::Unique => "unique",
        };
        Ok(format!("https://cards.meme-arena.invalid/{folder}/{}.png", card.card_number))
    }

    async fn list_folder(&self, card_type: CardType) -> GameResult<Vec<u32>> {
        match card_type {
            CardType::Standard => self
                .database
                .standard_card_catalogue()
                .await
                .map_err(GameError::Internal),
            CardType::Starter => Ok((1..=10).collect()),
            CardType::Unique => Ok(Vec::new()),
        }
    }
}

/// Outcome of an asynchronous situation-generation request (§4.5 step 3).
#[derive(Debug, Clone)]
pub enum SituationOutcome {
    Generated(String),
    Failed(String),
}

/// Accepts (game, round, demographic, language); eventually produces a
/// situation text or a failure reason. Asynchronous by contract — callers
/// must not block on it past their configured budget and should proceed with
/// a fallback text instead (§7 "ExternalUnavailable... recovered locally").
#[async_trait]
pub trait SituationGenerator: Send + Sync {
    async fn generate(
        &self,
        game_id: GameId,
        round_id: RoundId,
        demographic: Demographic,
        language: &str,
    ) -> Result<SituationOutcome>;
}

/// Stand-in generator: draws from the configured fallback rotation instead of
/// calling out to a real AI backend. Always "succeeds" from the caller's
/// perspective, since the rotation never runs out (it cycles).
pub struct FallbackSituationGenerator {
    fallback_situations: Vec<String>,
    cursor: RwLock<usize>,
}

impl FallbackSituationGenerator {
    pub fn new(config: &ExternalConfig) -> Self {
        Self {
            fallback_situations: config.fallback_situations.clone(),
            cursor: RwLock::new(0),
        }
    }

    /// The next fallback text in rotation, used directly by `start_round`
    /// when it cannot wait on the asynchronous job (§4.5 step 3).
    pub async fn next_fallback(&self) -> String {
        if self.fallback_situations.is_empty() {
            return "The situation generator is unavailable. Caption this blank moment.".to_string();
        }
        let mut cursor = self.cursor.write().await;
        let text = self.fallback_situations[*cursor % self.fallback_situations.len()].clone();
        *cursor = cursor.wrapping_add(1);
        text
    }
}

#[async_trait]
impl SituationGenerator for FallbackSituationGenerator {
    async fn generate(
        &self,
        _game_id: GameId,
        _round_id: RoundId,
        _demographic: Demographic,
        _language: &str,
    ) -> Result<SituationOutcome> {
        Ok(SituationOutcome::Generated(self.next_fallback().await))
    }
}

/// Picks a standard card the user does not already own, for the end-of-game
/// prize (§4.6 `end`). Returns `None` if the user already owns every
/// catalogued standard card.
pub async fn draw_unowned_standard_card(
    database: &dyn crate::database::GameDatabase,
    user_id: UserId,
) -> Result<Option<CardRef>> {
    let catalogue = database.standard_card_catalogue().await?;
    let owned = database.list_owned_cards(user_id).await?;
    let owned_numbers: std::collections::HashSet<u32> = owned
        .into_iter()
        .filter(|c| c.card.card_type == CardType::Standard)
        .map(|c| c.card.card_number)
        .collect();

    let available: Vec<u32> = catalogue
        .into_iter()
        .filter(|n| !owned_numbers.contains(n))
        .collect();

    if available.is_empty() {
        return Ok(None);
    }

    let mut rng = rand::rng();
    let idx = rng.random_range(0..available.len());
    Ok(Some(CardRef {
        card_type: CardType::Standard,
        card_number: available[idx],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hmac_auth_round_trips_a_minted_credential() {
        let provider = HmacAuthProvider::new("test-secret");
        let user_id = UserId::new_v4();
        let credential = provider.issue(user_id);
        let resolved = provider.authenticate(&credential).await.unwrap();
        assert_eq!(resolved, user_id);
    }

    #[tokio::test]
    async fn hmac_auth_rejects_tampered_credential() {
        let provider = HmacAuthProvider::new("test-secret");
        let user_id = UserId::new_v4();
        let mut credential = provider.issue(user_id);
        credential.push('f');
        assert!(provider.authenticate(&credential).await.is_err());
    }

    #[tokio::test]
    async fn fallback_generator_rotates_through_configured_texts() {
        let config = ExternalConfig {
            fallback_situations: vec!["a".to_string(), "b".to_string()],
            ..ExternalConfig::default()
        };
        let generator = FallbackSituationGenerator::new(&config);
        let first = generator.next_fallback().await;
        let second = generator.next_fallback().await;
        let third = generator.next_fallback().await;
        assert_eq!(first, "a");
        assert_eq!(second, "b");
        assert_eq!(third, "a");
    }
}

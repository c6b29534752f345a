//! Cancellation registry for on-screen provider cards.
//!
//! Each displayed card owns a pending distance estimate; when the card is
//! torn down, its estimate must stop without touching shared state again.
//! RAII-based automatic cleanup via `CardGuard`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// RAII guard tying a card's lifetime to its pending estimate.
/// Dropping the guard cancels the estimate and removes the card
/// from the registry.
pub struct CardGuard {
    card_id: Uuid,
    token: CancellationToken,
    registry: CancellationRegistry,
}

impl CardGuard {
    pub fn card_id(&self) -> Uuid {
        self.card_id
    }

    /// Token to pass to `ProximityEstimator::estimate_cancellable`.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for CardGuard {
    fn drop(&mut self) {
        self.token.cancel();
        self.registry.remove(&self.card_id);
    }
}

/// Thread-safe registry of live cards and their cancellation tokens.
/// All operations are O(1) HashMap lookups.
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    cards: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl CancellationRegistry {
    /// Register a card. The returned `CardGuard` must be held in scope while
    /// the card is displayed; dropping it cancels and unregisters the card.
    pub fn register(&self, card_id: Uuid) -> CardGuard {
        let token = CancellationToken::new();
        self.cards.lock().insert(card_id, token.clone());
        CardGuard {
            card_id,
            token,
            registry: self.clone(),
        }
    }

    /// Cancel one card's pending work.
    /// Returns `false` if the card is no longer registered.
    pub fn cancel(&self, card_id: &Uuid) -> bool {
        match self.cards.lock().get(card_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered card — used on shutdown.
    pub fn cancel_all(&self) {
        for token in self.cards.lock().values() {
            token.cancel();
        }
    }

    pub fn is_cancelled(&self, card_id: &Uuid) -> bool {
        self.cards
            .lock()
            .get(card_id)
            .map_or(false, |t| t.is_cancelled())
    }

    fn remove(&self, card_id: &Uuid) {
        self.cards.lock().remove(card_id);
    }

    #[cfg(test)]
    fn contains(&self, card_id: &Uuid) -> bool {
        self.cards.lock().contains_key(card_id)
    }
}

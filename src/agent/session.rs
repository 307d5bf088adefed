use std::collections::HashMap;

use tokio::sync::RwLock;

/// What the next plain message from a user means.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UserMode {
    #[default]
    Idle,
    /// Next message is forwarded to the consultant
    WritingToConsultant,
    /// Admin is composing a broadcast
    AwaitingBroadcast,
    /// Admin has a broadcast draft waiting for confirmation
    ConfirmBroadcast { from_chat: i64, message_id: i32 },
    /// Admin's next message goes straight to this user
    ReplyingTo { user_id: i64 },
}

/// Relayed questions kept for admin replies; the oldest are dropped first.
const MAX_RELAYS: usize = 1000;

#[derive(Default)]
struct Relays {
    /// (admin chat, relayed message id) -> (user who wrote it, insertion order)
    targets: HashMap<(i64, i32), (i64, u64)>,
    next_seq: u64,
}

/// Short-lived dialog state plus the consultant relay map.
#[derive(Default)]
pub struct SessionStore {
    modes: RwLock<HashMap<i64, UserMode>>,
    relays: RwLock<Relays>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mode(&self, user_id: i64) -> UserMode {
        self.modes
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set_mode(&self, user_id: i64, mode: UserMode) {
        let mut modes = self.modes.write().await;
        if mode == UserMode::Idle {
            modes.remove(&user_id);
        } else {
            modes.insert(user_id, mode);
        }
    }

    /// Reset to idle and return the previous mode.
    pub async fn take_mode(&self, user_id: i64) -> UserMode {
        self.modes
            .write()
            .await
            .remove(&user_id)
            .unwrap_or_default()
    }

    pub async fn remember_relay(&self, admin_chat: i64, message_id: i32, user_id: i64) {
        let mut relays = self.relays.write().await;
        let seq = relays.next_seq;
        relays.next_seq += 1;
        relays.targets.insert((admin_chat, message_id), (user_id, seq));

        if relays.targets.len() > MAX_RELAYS {
            let oldest = relays
                .targets
                .iter()
                .min_by_key(|(_, (_, seq))| *seq)
                .map(|(key, _)| *key);
            if let Some(key) = oldest {
                relays.targets.remove(&key);
            }
        }
    }

    pub async fn relay_target(&self, admin_chat: i64, message_id: i32) -> Option<i64> {
        self.relays
            .read()
            .await
            .targets
            .get(&(admin_chat, message_id))
            .map(|(user_id, _)| *user_id)
    }

    /// Drop every admin copy of this user's relayed questions.
    pub async fn forget_relays_for(&self, user_id: i64) {
        self.relays
            .write()
            .await
            .targets
            .retain(|_, (target, _)| *target != user_id);
    }

    pub async fn relay_count(&self) -> usize {
        self.relays.read().await.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn modes_default_to_idle() {
        let store = SessionStore::new();
        assert_eq!(store.mode(5).await, UserMode::Idle);

        store.set_mode(5, UserMode::ReplyingTo { user_id: 9 }).await;
        assert_eq!(store.take_mode(5).await, UserMode::ReplyingTo { user_id: 9 });
        assert_eq!(store.mode(5).await, UserMode::Idle);
    }

    #[tokio::test]
    async fn relay_is_per_admin_chat() {
        let store = SessionStore::new();
        store.remember_relay(1, 100, 42).await;
        assert_eq!(store.relay_target(1, 100).await, Some(42));
        assert_eq!(store.relay_target(2, 100).await, None);

        store.forget_relays_for(42).await;
        assert_eq!(store.relay_target(1, 100).await, None);
    }

    #[tokio::test]
    async fn answering_clears_copies_held_by_every_admin() {
        let store = SessionStore::new();
        store.remember_relay(1, 100, 42).await;
        store.remember_relay(2, 300, 42).await;
        store.remember_relay(1, 101, 77).await;

        store.forget_relays_for(42).await;
        assert_eq!(store.relay_target(2, 300).await, None);
        assert_eq!(store.relay_target(1, 101).await, Some(77));
        assert_eq!(store.relay_count().await, 1);
    }

    #[tokio::test]
    async fn relay_map_is_bounded() {
        let store = SessionStore::new();
        for i in 0..(MAX_RELAYS as i32 + 5) {
            store.remember_relay(1, i, i as i64).await;
        }
        assert_eq!(store.relay_count().await, MAX_RELAYS);
        assert_eq!(store.relay_target(1, 0).await, None);
        assert_eq!(store.relay_target(1, MAX_RELAYS as i32 + 4).await, Some(MAX_RELAYS as i64 + 4));
    }
}

//! # Live Channels
//!
//! Per-user broadcast channels behind `/ws/leaderboard`.
//!
//! Every WebSocket connection of a user subscribes to that user's channel.
//! The engine delivers through [`UpdateChannel`]; a user without an open
//! connection yields `LeagueError::Delivery`, which the notifier logs and
//! swallows.

use crate::api::LiveUpdate;
use league_core::{LeaderboardUpdate, LeagueError, UpdateChannel, UserId};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Messages buffered per user before a slow connection starts lagging.
const LIVE_BUFFER: usize = 16;

/// Registry of live connections, keyed by user.
#[derive(Debug, Default)]
pub struct LiveChannels {
    senders: Mutex<BTreeMap<UserId, broadcast::Sender<String>>>,
}

impl LiveChannels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn senders(&self) -> MutexGuard<'_, BTreeMap<UserId, broadcast::Sender<String>>> {
        self.senders.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a receiver for `user`, creating the channel on first use.
    pub fn subscribe(&self, user: UserId) -> broadcast::Receiver<String> {
        self.senders()
            .entry(user)
            .or_insert_with(|| broadcast::channel(LIVE_BUFFER).0)
            .subscribe()
    }

    /// Drop the channel of `user` once no receiver is left.
    pub fn release(&self, user: UserId) {
        let mut senders = self.senders();
        if senders
            .get(&user)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            senders.remove(&user);
            tracing::debug!(user_id = user.0, "Live channel closed");
        }
    }

    /// Number of users with at least one open connection.
    pub fn connected_users(&self) -> usize {
        self.senders()
            .values()
            .filter(|tx| tx.receiver_count() > 0)
            .count()
    }
}

impl UpdateChannel for LiveChannels {
    fn deliver(&self, user: UserId, update: &LeaderboardUpdate) -> Result<(), LeagueError> {
        let payload = serde_json::to_string(&LiveUpdate::from(update))
            .map_err(|e| LeagueError::SerializationError(e.to_string()))?;

        let senders = self.senders();
        let tx = senders
            .get(&user)
            .ok_or_else(|| LeagueError::Delivery(format!("no live connection for user {user}")))?;
        let receivers = tx
            .send(payload)
            .map_err(|_| LeagueError::Delivery(format!("live connection of user {user} closed")))?;
        tracing::debug!(user_id = user.0, receivers, "Leaderboard update sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use league_core::LeaderboardEntry;

    fn update() -> LeaderboardUpdate {
        LeaderboardUpdate {
            leaderboard: vec![LeaderboardEntry {
                user: UserId(1),
                username: "ada".to_string(),
                experience: 12,
                rank: 1,
            }],
            current_tier: "Bronze".to_string(),
        }
    }

    #[test]
    fn delivery_without_connection_fails() {
        let live = LiveChannels::new();
        let err = live.deliver(UserId(1), &update()).expect_err("no receiver");
        assert!(matches!(err, LeagueError::Delivery(_)));
    }

    #[test]
    fn subscriber_receives_wire_payload() {
        let live = LiveChannels::new();
        let mut rx = live.subscribe(UserId(1));
        live.deliver(UserId(1), &update()).expect("deliver");

        let message = rx.try_recv().expect("message");
        let value: serde_json::Value = serde_json::from_str(&message).expect("json");
        assert_eq!(value["currentLeague"], "Bronze");
        assert_eq!(value["leaderboard"][0]["exp_earned"], 12);
        assert_eq!(value["leaderboard"][0]["user_id"], 1);
    }

    #[test]
    fn release_drops_idle_channel() {
        let live = LiveChannels::new();
        let rx = live.subscribe(UserId(7));
        assert_eq!(live.connected_users(), 1);

        live.release(UserId(7));
        assert_eq!(live.connected_users(), 1);

        drop(rx);
        live.release(UserId(7));
        assert_eq!(live.connected_users(), 0);
        assert!(live.deliver(UserId(7), &update()).is_err());
    }
}

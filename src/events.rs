use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

// Control message telling connected clients to acknowledge the end of
// their order; anything else on a channel is a generic invalidation.
pub const END_ORDER_SIGNAL: &str = "endOrder";

const CHANNEL_CAPACITY: usize = 32;

pub fn table_channel(table_id: Uuid) -> String {
    format!("/table/{}", table_id)
}

// A bare timestamp, the generic "re-fetch your view" message
pub fn invalidation_message() -> String {
    Utc::now().timestamp_millis().to_string()
}

// Process-wide publish/subscribe registry keyed by channel path. One
// broadcast channel per table keeps every connected diner session at that
// table in sync. Injected through web::Data, created once at startup.
pub struct EventBroker {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl EventBroker {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    // Subscribe to a channel path, creating the channel on first use.
    // Dropping the returned receiver is the unsubscription path.
    pub fn subscribe(&self, path: &str) -> broadcast::Receiver<String> {
        let mut channels = self.channels.lock().expect("event registry lock poisoned");

        match channels.get(path) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
                channels.insert(path.to_string(), sender);
                receiver
            }
        }
    }

    // Send a message to every open subscription on the path. Channels whose
    // subscribers all disconnected are dropped here, so the registry stays
    // bounded by the number of paths with live listeners.
    pub fn publish(&self, path: &str, message: String) -> usize {
        let mut channels = self.channels.lock().expect("event registry lock poisoned");

        let Some(sender) = channels.get(path) else {
            return 0;
        };

        if sender.receiver_count() == 0 {
            channels.remove(path);
            return 0;
        }

        match sender.send(message) {
            Ok(delivered) => delivered,
            Err(_) => 0,
        }
    }

    #[cfg(test)]
    fn channel_count(&self) -> usize {
        self.channels.lock().expect("event registry lock poisoned").len()
    }
}

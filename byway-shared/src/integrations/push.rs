/// In-process fan-out of new notifications to live admin dashboards
///
/// Publishing never blocks and never fails when nobody listens. Slow
/// subscribers that fall more than the channel capacity behind lose the
/// oldest events.

use tokio::sync::broadcast;

use crate::models::notification::Notification;

/// Events buffered per subscriber
pub const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Pushes a notification to every subscriber
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, notification: Notification) -> usize {
        self.sender.send(notification).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::NotificationStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn notification(title: &str) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            title: title.to_string(),
            message: "message".to_string(),
            status: NotificationStatus::Unread,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = NotificationHub::new();
        assert_eq!(hub.publish(notification("New Order")), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe();

        hub.publish(notification("first"));
        hub.publish(notification("second"));

        assert_eq!(rx.recv().await.unwrap().title, "first");
        assert_eq!(rx.recv().await.unwrap().title, "second");
        assert_eq!(hub.subscriber_count(), 1);
    }
}

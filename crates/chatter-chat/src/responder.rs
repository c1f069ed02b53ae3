//! Assistant replies.

use std::time::Duration;

use async_trait::async_trait;

use chatter_core::config::AssistantConfig;
use chatter_core::types::Message;

use crate::composer::MessageComposer;

/// Produces the assistant's answer to a user message.
#[async_trait]
pub trait ResponseService: Send + Sync {
    async fn respond(&self, user_message: &Message) -> Message;
}

/// Answers every message with the same text after a fixed delay.
#[derive(Debug, Clone)]
pub struct ResponseSimulator {
    composer: MessageComposer,
    reply: String,
    delay: Duration,
}

impl ResponseSimulator {
    pub fn new(composer: MessageComposer, reply: impl Into<String>, delay: Duration) -> Self {
        Self {
            composer,
            reply: reply.into(),
            delay,
        }
    }

    pub fn from_config(composer: MessageComposer, config: &AssistantConfig) -> Self {
        Self::new(composer, config.reply.clone(), config.response_delay())
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl ResponseService for ResponseSimulator {
    async fn respond(&self, user_message: &Message) -> Message {
        tracing::debug!(
            in_reply_to = %user_message.id,
            delay_ms = self.delay.as_millis() as u64,
            "Simulating assistant reply"
        );
        tokio::time::sleep(self.delay).await;
        // Id is taken after the delay so it sorts after anything sent meanwhile.
        self.composer.assistant_reply(&self.reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_core::ids::IdGenerator;
    use chatter_core::types::Role;

    use crate::blob::BlobStore;

    fn composer() -> MessageComposer {
        MessageComposer::new(IdGenerator::new(), BlobStore::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_after_delay() {
        let composer = composer();
        let simulator = ResponseSimulator::new(composer.clone(), "Sure.", Duration::from_secs(1));
        let question = composer.from_text("hello").unwrap();

        let started = tokio::time::Instant::now();
        let answer = simulator.respond(&question).await;

        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(answer.role, Role::Assistant);
        assert_eq!(answer.content, "Sure.");
        assert!(answer.id > question.id);
        assert!(answer.media_url().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_config_uses_defaults() {
        let simulator = ResponseSimulator::from_config(composer(), &AssistantConfig::default());
        assert_eq!(simulator.delay(), Duration::from_millis(1000));
        assert_eq!(
            simulator.reply(),
            chatter_core::config::DEFAULT_ASSISTANT_REPLY
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_replies_to_overlapping_messages_are_distinct() {
        let composer = composer();
        let simulator = ResponseSimulator::new(composer.clone(), "ok", Duration::from_millis(50));
        let first = composer.from_text("one").unwrap();
        let second = composer.from_text("two").unwrap();

        let (a, b) = tokio::join!(simulator.respond(&first), simulator.respond(&second));
        assert_ne!(a.id, b.id);
        assert!(a.id > second.id && b.id > second.id);
    }
}

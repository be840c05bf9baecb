//! Token accounting for a single chat session.
//!
//! A `Ledger` owns the conversation history for one session and keeps
//! a running total of the tokens in it. It only observes usage: going
//! over the context window is reported, never refused. Whoever sends
//! the history to the model decides what to do about it.
use anyhow::Result;
use uuid::Uuid;

use crate::chat::models::{ContextWarning, Exchange, Message, Role, UsageRecord};
use crate::core::LedgerConfig;
use crate::tokenizer::{SharedTokenizer, count_messages};

pub struct Ledger {
    session_id: Uuid,
    tokenizer: SharedTokenizer,
    config: LedgerConfig,
    system_prompt: Option<Message>,
    messages: Vec<Message>,
    history_tokens: usize,
    session_tokens_used: usize,
}

impl Ledger {
    /// Creates an empty ledger. Fails if the config is unusable so
    /// that bad limits are caught before the first message.
    pub fn new(tokenizer: SharedTokenizer, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let session_id = Uuid::new_v4();
        tracing::debug!(
            "Starting ledger for session {} using tokenizer {}",
            session_id,
            tokenizer.name()
        );

        Ok(Self {
            session_id,
            tokenizer,
            config,
            system_prompt: None,
            messages: Vec::new(),
            history_tokens: 0,
            session_tokens_used: 0,
        })
    }

    /// Creates a ledger whose history starts with a system prompt.
    /// The prompt is retained by `clear(true)`.
    pub fn with_system_prompt(
        tokenizer: SharedTokenizer,
        config: LedgerConfig,
        system_prompt: &str,
    ) -> Result<Self> {
        let mut ledger = Self::new(tokenizer, config)?;
        let msg = ledger.append(Role::System, system_prompt);
        ledger.system_prompt = Some(msg);
        Ok(ledger)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn system_prompt(&self) -> Option<&Message> {
        self.system_prompt.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn record_user_message(&mut self, text: &str) -> Message {
        self.append(Role::User, text)
    }

    pub fn record_assistant_message(&mut self, text: &str) -> Message {
        self.append(Role::Assistant, text)
    }

    /// Sum of the token counts of every message in the history.
    pub fn current_history_tokens(&self) -> usize {
        self.history_tokens
    }

    /// Tokens billed over the life of the session: every exchange adds
    /// the history as sent to the model, framing included, plus the
    /// reply. Unlike the history total this is not reset by `clear`.
    pub fn session_tokens_used(&self) -> usize {
        self.session_tokens_used
    }

    /// Tokens the history takes up when sent to the chat endpoint,
    /// including per-message framing.
    pub fn wire_tokens(&self) -> usize {
        count_messages(&self.messages)
    }

    /// Builds the usage record for an exchange. The history figure is
    /// the context the prompt consumed, so if the response has already
    /// been appended its tokens are left out.
    pub fn usage_for_exchange(&self, prompt: &Message, response: &Message) -> UsageRecord {
        let response_appended = self.messages.last() == Some(response);
        let history_tokens = if response_appended {
            self.history_tokens - response.token_count()
        } else {
            self.history_tokens
        };

        UsageRecord {
            prompt_tokens: prompt.token_count(),
            history_tokens,
            response_tokens: response.token_count(),
        }
    }

    pub fn exceeds_threshold(&self, limit: usize, warning_fraction: f64) -> bool {
        self.history_tokens as f64 >= limit as f64 * warning_fraction
    }

    /// Checks the history against the configured limits. Recomputed
    /// on every call.
    pub fn warning(&self) -> Option<ContextWarning> {
        if !self.exceeds_threshold(self.config.context_window, self.config.warning_fraction) {
            return None;
        }
        Some(ContextWarning {
            token_count: self.history_tokens,
            context_window: self.config.context_window,
            percent: self.percent_used(),
        })
    }

    /// Share of the context window used by the history, rounded down.
    /// Goes past 100 once the history is larger than the window.
    pub fn percent_used(&self) -> u32 {
        let pct = self.history_tokens as u128 * 100 / self.config.context_window as u128;
        u32::try_from(pct).unwrap_or(u32::MAX)
    }

    /// Runs one round trip: records the prompt, hands the history to
    /// `respond` and records whatever it returns. If `respond` fails
    /// the prompt is taken back out of the history.
    pub fn exchange<F>(&mut self, user_text: &str, respond: F) -> Result<Exchange>
    where
        F: FnOnce(&[Message]) -> Result<String>,
    {
        let prompt = self.record_user_message(user_text);

        let reply = match respond(&self.messages) {
            Ok(reply) => reply,
            Err(err) => {
                self.pop_last();
                return Err(err);
            }
        };

        let request_tokens = self.wire_tokens();
        let response = self.record_assistant_message(&reply);
        self.session_tokens_used += request_tokens + response.token_count();
        let usage = self.usage_for_exchange(&prompt, &response);

        if let Some(warning) = self.warning() {
            tracing::warn!(
                "Session {} at {}/{} tokens ({}%)",
                self.session_id,
                warning.token_count,
                warning.context_window,
                warning.percent
            );
        }

        Ok(Exchange {
            prompt,
            response,
            usage,
        })
    }

    /// Drops the history. With `keep_system_prompt` the system prompt
    /// the session started with stays.
    pub fn clear(&mut self, keep_system_prompt: bool) {
        self.messages.clear();
        self.history_tokens = 0;

        if keep_system_prompt {
            if let Some(msg) = &self.system_prompt {
                self.history_tokens = msg.token_count();
                self.messages.push(msg.clone());
            }
        }

        tracing::info!(
            "Cleared history for session {} ({} messages kept)",
            self.session_id,
            self.messages.len()
        );
    }

    fn append(&mut self, role: Role, text: &str) -> Message {
        let token_count = self.tokenizer.count_tokens(text);
        let msg = Message::new(role, text, token_count);
        self.messages.push(msg.clone());
        self.history_tokens += token_count;

        tracing::debug!(
            "Recorded {:?} message with {} tokens, history at {}",
            role,
            token_count,
            self.history_tokens
        );
        msg
    }

    fn pop_last(&mut self) {
        if let Some(msg) = self.messages.pop() {
            self.history_tokens -= msg.token_count();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::anyhow;

    use super::*;
    use crate::tokenizer::Tokenizer;

    /// One token per whitespace separated word.
    struct WordTokenizer;

    impl Tokenizer for WordTokenizer {
        fn count_tokens(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }

        fn name(&self) -> &str {
            "words"
        }
    }

    fn empty_ledger() -> Ledger {
        Ledger::new(Arc::new(WordTokenizer), LedgerConfig::default()).unwrap()
    }

    fn ledger_with_prompt(prompt: &str) -> Ledger {
        Ledger::with_system_prompt(Arc::new(WordTokenizer), LedgerConfig::default(), prompt)
            .unwrap()
    }

    #[test]
    fn test_new_ledger_is_empty() {
        let ledger = empty_ledger();
        assert!(ledger.is_empty());
        assert_eq!(ledger.current_history_tokens(), 0);
        assert_eq!(ledger.session_tokens_used(), 0);
        assert!(ledger.system_prompt().is_none());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = LedgerConfig {
            context_window: 0,
            warning_fraction: 0.8,
        };
        assert!(Ledger::new(Arc::new(WordTokenizer), config).is_err());

        let config = LedgerConfig {
            context_window: 8192,
            warning_fraction: 2.0,
        };
        assert!(Ledger::with_system_prompt(Arc::new(WordTokenizer), config, "hi").is_err());
    }

    #[test]
    fn test_record_messages() {
        let mut ledger = ledger_with_prompt("be brief");
        let user = ledger.record_user_message("one two three");
        let assistant = ledger.record_assistant_message("four five");

        assert_eq!(user.role(), Role::User);
        assert_eq!(user.token_count(), 3);
        assert_eq!(assistant.role(), Role::Assistant);
        assert_eq!(assistant.token_count(), 2);
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.current_history_tokens(), 7);
        assert_eq!(ledger.messages()[0].role(), Role::System);
        assert_eq!(ledger.messages()[2], assistant);
    }

    #[test]
    fn test_empty_message_is_still_a_turn() {
        let mut ledger = empty_ledger();
        let msg = ledger.record_user_message("");
        assert_eq!(msg.token_count(), 0);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.current_history_tokens(), 0);
    }

    #[test]
    fn test_history_matches_sum_of_messages() {
        let mut ledger = ledger_with_prompt("system words here");
        for i in 0..25 {
            let text = "w ".repeat(i);
            if i % 2 == 0 {
                ledger.record_user_message(&text);
            } else {
                ledger.record_assistant_message(&text);
            }
            let sum: usize = ledger.messages().iter().map(Message::token_count).sum();
            assert_eq!(ledger.current_history_tokens(), sum);
        }
    }

    #[test]
    fn test_usage_before_and_after_response_is_appended() {
        let mut ledger = ledger_with_prompt("a b c");
        let prompt = ledger.record_user_message("d e");
        let response = ledger.record_assistant_message("f g h i");

        let usage = ledger.usage_for_exchange(&prompt, &response);
        assert_eq!(
            usage,
            UsageRecord {
                prompt_tokens: 2,
                history_tokens: 5,
                response_tokens: 4,
            }
        );
    }

    #[test]
    fn test_usage_when_response_not_recorded() {
        let mut ledger = empty_ledger();
        let prompt = ledger.record_user_message("d e");
        let response = Message::new(Role::Assistant, "f g h i", 4);

        let usage = ledger.usage_for_exchange(&prompt, &response);
        assert_eq!(usage.history_tokens, 2);
        assert_eq!(usage.response_tokens, 4);
    }

    #[test]
    fn test_clear_without_system_prompt() {
        let mut ledger = ledger_with_prompt("a b c");
        ledger.record_user_message("d e");
        ledger.clear(false);
        assert!(ledger.is_empty());
        assert_eq!(ledger.current_history_tokens(), 0);
    }

    #[test]
    fn test_clear_keeps_system_prompt() {
        let mut ledger = ledger_with_prompt("a b c");
        ledger.record_user_message("d e");
        ledger.record_assistant_message("f");
        ledger.clear(true);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.messages()[0].role(), Role::System);
        assert_eq!(ledger.current_history_tokens(), 3);

        // Nothing to keep when the session never had a prompt
        let mut ledger = empty_ledger();
        ledger.record_user_message("d e");
        ledger.clear(true);
        assert_eq!(ledger.current_history_tokens(), 0);
    }

    #[test]
    fn test_session_total_survives_clear() {
        let mut ledger = ledger_with_prompt("a b c");
        // Request is 3 + 2 content tokens, 2 messages of framing and the
        // list overhead: 15, plus a 1 token reply
        ledger.exchange("d e", |_| Ok(String::from("f"))).unwrap();
        assert_eq!(ledger.session_tokens_used(), 16);

        ledger.clear(true);
        assert_eq!(ledger.session_tokens_used(), 16);

        // 3 + 1 + 8 + 2 sent, 2 back
        ledger.exchange("g", |_| Ok(String::from("h i"))).unwrap();
        assert_eq!(ledger.current_history_tokens(), 6);
        assert_eq!(ledger.session_tokens_used(), 32);
    }

    #[test]
    fn test_session_total_only_counts_exchanges() {
        let mut ledger = ledger_with_prompt("a b c");
        ledger.record_user_message("d e");
        ledger.record_assistant_message("f");
        assert_eq!(ledger.session_tokens_used(), 0);
        assert_eq!(ledger.wire_tokens(), 6 + 3 * 4 + 2);
    }

    #[test]
    fn test_threshold_is_monotonic() {
        let mut ledger = empty_ledger();
        let mut crossed = false;
        for _ in 0..20 {
            ledger.record_user_message("a b c");
            let exceeds = ledger.exceeds_threshold(40, 0.5);
            if crossed {
                assert!(exceeds);
            }
            crossed = exceeds;
        }
        assert!(crossed);
    }

    #[test]
    fn test_threshold_boundary() {
        let mut ledger = empty_ledger();
        ledger.record_user_message(&"w ".repeat(19));
        assert!(!ledger.exceeds_threshold(40, 0.5));
        ledger.record_user_message("w");
        assert!(ledger.exceeds_threshold(40, 0.5));
    }

    #[test]
    fn test_warning_uses_configured_limits() {
        let config = LedgerConfig::new(10, 0.5).unwrap();
        let mut ledger = Ledger::new(Arc::new(WordTokenizer), config).unwrap();
        ledger.record_user_message("a b c d");
        assert_eq!(ledger.warning(), None);
        assert_eq!(ledger.percent_used(), 40);

        ledger.record_assistant_message("e");
        assert_eq!(
            ledger.warning(),
            Some(ContextWarning {
                token_count: 5,
                context_window: 10,
                percent: 50,
            })
        );

        ledger.record_user_message(&"w ".repeat(10));
        assert_eq!(ledger.percent_used(), 150);

        ledger.clear(false);
        assert_eq!(ledger.warning(), None);
    }

    #[test]
    fn test_wire_tokens() {
        let mut ledger = ledger_with_prompt("a b c");
        ledger.record_user_message("d e");
        assert_eq!(ledger.wire_tokens(), 5 + 2 * 4 + 2);
    }

    #[test]
    fn test_exchange() {
        let mut ledger = ledger_with_prompt("a b c");
        let exchange = ledger
            .exchange("d e", |history| {
                assert_eq!(history.len(), 2);
                assert_eq!(history[1].content(), "d e");
                Ok(String::from("f g h"))
            })
            .unwrap();

        assert_eq!(exchange.prompt.content(), "d e");
        assert_eq!(exchange.response.content(), "f g h");
        assert_eq!(exchange.usage.prompt_tokens, 2);
        assert_eq!(exchange.usage.history_tokens, 5);
        assert_eq!(exchange.usage.response_tokens, 3);
        assert_eq!(ledger.current_history_tokens(), 8);
        assert_eq!(ledger.session_tokens_used(), 15 + 3);
    }

    #[test]
    fn test_failed_exchange_restores_history() {
        let mut ledger = ledger_with_prompt("a b c");
        let result = ledger.exchange("d e", |_| Err(anyhow!("Generation cancelled")));

        assert!(result.is_err());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.current_history_tokens(), 3);
        assert_eq!(ledger.session_tokens_used(), 0);
    }

    #[test]
    fn test_sessions_are_independent() {
        let tokenizer: SharedTokenizer = Arc::new(WordTokenizer);
        let mut a = Ledger::new(tokenizer.clone(), LedgerConfig::default()).unwrap();
        let b = Ledger::new(tokenizer, LedgerConfig::default()).unwrap();
        a.record_user_message("a b c");
        assert_eq!(a.current_history_tokens(), 3);
        assert_eq!(b.current_history_tokens(), 0);
        assert_ne!(a.session_id(), b.session_id());
    }
}

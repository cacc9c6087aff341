//! Conversation driver.
//!
//! Drives one send/observe cycle against the chat tab:
//! `Idle → Resolving → Submitting → Sending → Polling` and then exactly
//! one of `Stable`, `TimedOut`, or `Failed`. States only advance; a new
//! send starts over from `Idle`, and `send` taking `&mut self` keeps a
//! second send from starting while one is in flight.
//!
//! Every failure comes back as a [`ChatResult`] value. A timed-out send
//! still carries whatever reply content was last observed.

use std::time::Duration;

use async_trait::async_trait;
use chatpilot_core::{ChatConfig, Config, Error, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cdp::{Channel, TransportSettings};
use crate::convert;
use crate::script;
use crate::stabilize::{ImageRef, ObservedSample, StabilizeState, Verdict};
use crate::tabs::{find_chat_tab, TabDescriptor, TabRegistry};

/// Transport seam between the driver and the browser: resolve the chat
/// tab, evaluate script against it. Production uses [`CdpTransport`];
/// tests script the replies.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn resolve(&self) -> Result<TabDescriptor>;
    async fn evaluate(&self, tab: &TabDescriptor, expression: &str) -> Result<Option<Value>>;
}

/// Directory lookup plus one evaluate channel per call.
pub struct CdpTransport {
    registry: TabRegistry,
    settings: TransportSettings,
    base_url: String,
    conversation_marker: String,
}

impl CdpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            registry: TabRegistry::new(&config.browser)?,
            settings: TransportSettings::from_config(&config.browser),
            base_url: config.chat.base_url.clone(),
            conversation_marker: config.chat.conversation_marker.clone(),
        })
    }
}

#[async_trait]
impl ChatTransport for CdpTransport {
    async fn resolve(&self) -> Result<TabDescriptor> {
        let tabs = self.registry.list().await?;
        let tab = find_chat_tab(&tabs, &self.base_url, &self.conversation_marker).ok_or_else(
            || {
                Error::TargetNotFound(format!(
                    "no open tab matching '{}'; open the chat page first",
                    self.base_url
                ))
            },
        )?;
        if tab.ws_url.is_none() {
            return Err(Error::TargetNotFound(format!(
                "tab '{}' exposes no debugger address",
                tab.url
            )));
        }
        Ok(tab.clone())
    }

    async fn evaluate(&self, tab: &TabDescriptor, expression: &str) -> Result<Option<Value>> {
        let ws_url = tab
            .ws_url
            .as_deref()
            .ok_or_else(|| Error::TargetNotFound("tab lost its debugger address".to_string()))?;
        let channel = Channel::open(ws_url, &self.settings).await?;
        channel.evaluate(expression).await
    }
}

/// Injected timer so the polling cadence is testable without real delays.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    Idle,
    Resolving,
    Submitting,
    Sending,
    Polling,
    Stable,
    TimedOut,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    Success,
    Timeout,
    Failure,
}

/// Terminal value of one send.
#[derive(Debug, Clone)]
pub struct ChatResult {
    pub outcome: ChatOutcome,
    pub text: String,
    pub images: Vec<ImageRef>,
    pub error: Option<String>,
}

impl ChatResult {
    fn success(text: String, images: Vec<ImageRef>) -> Self {
        Self {
            outcome: ChatOutcome::Success,
            text,
            images,
            error: None,
        }
    }

    fn timeout(text: String, images: Vec<ImageRef>) -> Self {
        Self {
            outcome: ChatOutcome::Timeout,
            text,
            images,
            error: Some("timed out waiting for the reply to stabilize".to_string()),
        }
    }

    fn failure(error: Error) -> Self {
        Self {
            outcome: ChatOutcome::Failure,
            text: String::new(),
            images: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ChatOutcome::Success
    }
}

/// Snapshot of the whole conversation, both roles, no waiting.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatMessages {
    #[serde(default)]
    pub user: Vec<String>,
    #[serde(default)]
    pub assistant: Vec<String>,
}

/// Wire shape of the observe script's return value.
#[derive(Debug, Deserialize)]
struct RawObservation {
    #[serde(default)]
    count: usize,
    #[serde(default)]
    html: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    images: Vec<ImageRef>,
}

impl RawObservation {
    /// The rendered body ships as HTML and is converted here; the page's
    /// plain innerText is only a fallback for bodies with no container.
    fn into_sample(self) -> ObservedSample {
        let text = if self.html.is_empty() {
            self.text
        } else {
            convert::html_to_markdown(&self.html)
        };
        ObservedSample {
            count: self.count,
            text,
            images: self.images,
        }
    }
}

/// Wire shape of the inject/click acknowledgements.
#[derive(Debug, Deserialize)]
struct SubmitAck {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct ChatDriver<T: ChatTransport, C: Clock> {
    transport: T,
    clock: C,
    chat: ChatConfig,
    state: DriveState,
}

impl ChatDriver<CdpTransport, TokioClock> {
    pub fn connect(config: &Config) -> Result<Self> {
        Ok(Self::with_parts(
            CdpTransport::new(config)?,
            TokioClock,
            config.chat.clone(),
        ))
    }
}

impl<T: ChatTransport, C: Clock> ChatDriver<T, C> {
    pub fn with_parts(transport: T, clock: C, chat: ChatConfig) -> Self {
        Self {
            transport,
            clock,
            chat,
            state: DriveState::Idle,
        }
    }

    pub fn state(&self) -> DriveState {
        self.state
    }

    fn advance(&mut self, next: DriveState) {
        debug!(from = ?self.state, to = ?next, "drive state");
        self.state = next;
    }

    /// Send a message and, unless `wait_for_reply` is off, block until the
    /// reply stabilizes, the tick budget runs out, or the send fails.
    pub async fn send(&mut self, text: &str, wait_for_reply: bool, timeout_secs: u64) -> ChatResult {
        self.state = DriveState::Idle;
        match self.drive(text, wait_for_reply, timeout_secs).await {
            Ok(result) => result,
            Err(e) => {
                self.advance(DriveState::Failed);
                warn!(error = %e, "send failed");
                ChatResult::failure(e)
            }
        }
    }

    async fn drive(
        &mut self,
        text: &str,
        wait_for_reply: bool,
        timeout_secs: u64,
    ) -> Result<ChatResult> {
        self.advance(DriveState::Resolving);
        let tab = self.transport.resolve().await?;
        info!(url = %tab.url, title = %tab.title, "resolved chat tab");

        // Assistant count before the send; only messages beyond it count
        // as the reply. A failed probe degrades to zero rather than
        // aborting the send.
        let baseline = match self
            .transport
            .evaluate(&tab, &script::count_assistant(&self.chat))
            .await
        {
            Ok(Some(v)) => v.as_u64().unwrap_or(0) as usize,
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, "baseline count failed, assuming 0");
                0
            }
        };

        self.advance(DriveState::Submitting);
        self.submit_step(&tab, &script::inject_input(&self.chat, text), "input field")
            .await?;
        self.clock
            .sleep(Duration::from_millis(self.chat.input_settle_ms))
            .await;

        self.advance(DriveState::Sending);
        self.submit_step(&tab, &script::click_send(&self.chat), "send control")
            .await?;

        if !wait_for_reply {
            self.advance(DriveState::Stable);
            return Ok(ChatResult::success(String::new(), Vec::new()));
        }

        self.advance(DriveState::Polling);
        let interval_ms = self.chat.poll_interval_ms.max(1);
        let interval = Duration::from_millis(interval_ms);
        let budget = (timeout_secs.max(1) * 1000 / interval_ms).max(1);
        let mut stabilize = StabilizeState::new(baseline, self.chat.stable_threshold);
        let observe = script::observe(&self.chat);

        for tick in 0..budget {
            self.clock.sleep(interval).await;
            let value = match self.transport.evaluate(&tab, &observe).await {
                Ok(Some(v)) => v,
                // No value is no information, not an empty reply.
                Ok(None) => continue,
                // One bad tick never aborts the loop.
                Err(e) => {
                    warn!(tick, error = %e, "poll tick failed, retrying next tick");
                    continue;
                }
            };
            let raw: RawObservation = match serde_json::from_value(value) {
                Ok(r) => r,
                Err(e) => {
                    warn!(tick, error = %e, "unexpected observation shape, skipping tick");
                    continue;
                }
            };
            let sample = raw.into_sample();
            if stabilize.observe(&sample) == Verdict::Stable {
                self.advance(DriveState::Stable);
                info!(ticks = tick + 1, chars = sample.text.len(), "reply stabilized");
                return Ok(ChatResult::success(sample.text, sample.images));
            }
        }

        self.advance(DriveState::TimedOut);
        let (text, images) = stabilize.partial();
        info!(chars = text.len(), "reply did not stabilize within the tick budget");
        Ok(ChatResult::timeout(text, images))
    }

    async fn submit_step(
        &self,
        tab: &TabDescriptor,
        expression: &str,
        what: &str,
    ) -> Result<()> {
        let value = self
            .transport
            .evaluate(tab, expression)
            .await?
            .ok_or_else(|| Error::ElementNotFound(format!("{} script returned nothing", what)))?;
        let ack: SubmitAck = serde_json::from_value(value)
            .map_err(|e| Error::Unknown(format!("unexpected {} acknowledgement: {}", what, e)))?;
        if let Some(err) = ack.error {
            return Err(Error::ElementNotFound(err));
        }
        if !ack.success {
            return Err(Error::ElementNotFound(format!("{} not activated", what)));
        }
        Ok(())
    }

    /// Conversation snapshot without sending anything.
    pub async fn messages(&self) -> Result<ChatMessages> {
        let tab = self.transport.resolve().await?;
        match self
            .transport
            .evaluate(&tab, &script::messages(&self.chat))
            .await?
        {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::Unknown(format!("unexpected messages shape: {}", e))),
            None => Ok(ChatMessages::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct InstantClock;

    #[async_trait]
    impl Clock for InstantClock {
        async fn sleep(&self, _duration: Duration) {}
    }

    struct ScriptedTransport {
        fail_resolve: bool,
        replies: Mutex<VecDeque<Result<Option<Value>>>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<Option<Value>>>) -> Self {
            Self {
                fail_resolve: false,
                replies: Mutex::new(replies.into()),
            }
        }

        fn unresolvable() -> Self {
            Self {
                fail_resolve: true,
                replies: Mutex::new(VecDeque::new()),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn resolve(&self) -> Result<TabDescriptor> {
            if self.fail_resolve {
                return Err(Error::TargetNotFound("no chat tab open".to_string()));
            }
            Ok(TabDescriptor {
                id: "T1".to_string(),
                kind: "page".to_string(),
                url: "https://chatgpt.com/c/test".to_string(),
                title: "chat".to_string(),
                ws_url: Some("ws://127.0.0.1:9222/devtools/page/T1".to_string()),
            })
        }

        async fn evaluate(&self, _tab: &TabDescriptor, _expr: &str) -> Result<Option<Value>> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }
    }

    fn driver(replies: Vec<Result<Option<Value>>>) -> ChatDriver<ScriptedTransport, InstantClock> {
        ChatDriver::with_parts(
            ScriptedTransport::new(replies),
            InstantClock,
            ChatConfig::default(),
        )
    }

    fn ok_ack() -> Result<Option<Value>> {
        Ok(Some(json!({"success": true})))
    }

    fn observation(count: usize, html: &str, text: &str) -> Result<Option<Value>> {
        Ok(Some(json!({
            "count": count,
            "html": html,
            "text": text,
            "images": [],
        })))
    }

    #[tokio::test]
    async fn test_send_succeeds_and_converts_html() {
        let body = "<p>Hello <strong>world</strong></p>";
        let mut replies = vec![Ok(Some(json!(1))), ok_ack(), ok_ack()];
        // First observation records, three repeats stabilize.
        for _ in 0..4 {
            replies.push(observation(2, body, ""));
        }
        let mut driver = driver(replies);

        let result = driver.send("hi", true, 60).await;
        assert_eq!(result.outcome, ChatOutcome::Success);
        assert_eq!(result.text, "Hello **world**");
        assert!(result.images.is_empty());
        assert_eq!(driver.state(), DriveState::Stable);
    }

    #[tokio::test]
    async fn test_poll_tick_failure_does_not_abort_polling() {
        let mut replies = vec![
            Ok(Some(json!(0))),
            ok_ack(),
            ok_ack(),
            Err(Error::Transport("socket reset".to_string())),
        ];
        for _ in 0..4 {
            replies.push(observation(1, "", "done"));
        }
        let mut driver = driver(replies);

        let result = driver.send("hi", true, 60).await;
        assert_eq!(result.outcome, ChatOutcome::Success);
        assert_eq!(result.text, "done");
    }

    #[tokio::test]
    async fn test_resolve_failure_is_terminal() {
        let mut driver = ChatDriver::with_parts(
            ScriptedTransport::unresolvable(),
            InstantClock,
            ChatConfig::default(),
        );
        let result = driver.send("hi", true, 60).await;
        assert_eq!(result.outcome, ChatOutcome::Failure);
        assert!(result.error.unwrap().contains("no chat tab open"));
        assert!(result.text.is_empty());
        assert_eq!(driver.state(), DriveState::Failed);
    }

    #[tokio::test]
    async fn test_missing_input_field_is_terminal() {
        let replies = vec![
            Ok(Some(json!(0))),
            Ok(Some(json!({"error": "input field not found"}))),
        ];
        let mut driver = driver(replies);
        let result = driver.send("hi", true, 60).await;
        assert_eq!(result.outcome, ChatOutcome::Failure);
        assert!(result.error.unwrap().contains("input field not found"));
        assert_eq!(driver.state(), DriveState::Failed);
    }

    #[tokio::test]
    async fn test_timeout_carries_partial_text() {
        let mut replies = vec![Ok(Some(json!(0))), ok_ack(), ok_ack()];
        // 2s budget at 500ms = 4 ticks, text still changing on every one.
        for text in ["a", "ab", "abc", "abcd"] {
            replies.push(observation(1, "", text));
        }
        let mut driver = driver(replies);

        let result = driver.send("hi", true, 2).await;
        assert_eq!(result.outcome, ChatOutcome::Timeout);
        assert_eq!(result.text, "abcd");
        assert!(result.error.is_some());
        assert_eq!(driver.state(), DriveState::TimedOut);
    }

    #[tokio::test]
    async fn test_no_new_reply_times_out_with_empty_partial() {
        let mut replies = vec![Ok(Some(json!(2))), ok_ack(), ok_ack()];
        for _ in 0..4 {
            replies.push(observation(2, "", "stale reply"));
        }
        let mut driver = driver(replies);

        let result = driver.send("hi", true, 2).await;
        assert_eq!(result.outcome, ChatOutcome::Timeout);
        assert_eq!(result.text, "");
        assert!(result.images.is_empty());
    }

    #[tokio::test]
    async fn test_fire_and_forget_skips_polling() {
        let replies = vec![Ok(Some(json!(0))), ok_ack(), ok_ack()];
        let mut driver = driver(replies);
        let result = driver.send("hi", false, 60).await;
        assert_eq!(result.outcome, ChatOutcome::Success);
        assert!(result.text.is_empty());
    }

    #[tokio::test]
    async fn test_baseline_count_failure_degrades_to_zero() {
        let mut replies = vec![
            Err(Error::Transport("count failed".to_string())),
            ok_ack(),
            ok_ack(),
        ];
        for _ in 0..4 {
            replies.push(observation(1, "", "answer"));
        }
        let mut driver = driver(replies);
        let result = driver.send("hi", true, 60).await;
        assert_eq!(result.outcome, ChatOutcome::Success);
        assert_eq!(result.text, "answer");
    }

    #[tokio::test]
    async fn test_messages_snapshot() {
        let replies = vec![Ok(Some(json!({
            "user": ["hi there"],
            "assistant": ["hello back"],
        })))];
        let driver = driver(replies);
        let messages = driver.messages().await.unwrap();
        assert_eq!(messages.user, vec!["hi there"]);
        assert_eq!(messages.assistant, vec!["hello back"]);
    }

    #[tokio::test]
    async fn test_messages_missing_value_is_empty_snapshot() {
        let driver = driver(vec![Ok(None)]);
        let messages = driver.messages().await.unwrap();
        assert!(messages.user.is_empty());
        assert!(messages.assistant.is_empty());
    }
}

//! Dispatcher-level tests: frame flow, command routing and validation
//! boundaries, driven through a stub gateway.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use vigil::broker::{BrokerError, MarketGateway};
use vigil::config::Config;
use vigil::engine::AutoOrderRegistry;
use vigil::services::{
    DisabledChatBackend, InMemoryMessageStore, MessageStore, Notifier, NotifyError,
};
use vigil::session::{Dispatcher, Outbox};
use vigil::types::{
    Candle, ClientFrame, Interval, OrderAck, OrderStatusSnapshot, Quote, Role, ServerFrame,
    SmartOrderRequest,
};

// =========================================================================
// Stub collaborators
// =========================================================================

struct StubGateway {
    closes: Mutex<Vec<f64>>,
    quote: Mutex<Option<Quote>>,
    place_results: Mutex<VecDeque<Result<&'static str, &'static str>>>,
    place_requests: Mutex<Vec<SmartOrderRequest>>,
}

impl StubGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            closes: Mutex::new(Vec::new()),
            quote: Mutex::new(None),
            place_results: Mutex::new(VecDeque::new()),
            place_requests: Mutex::new(Vec::new()),
        })
    }

    fn set_closes(&self, closes: Vec<f64>) {
        *self.closes.lock().unwrap() = closes;
    }

    fn set_quote(&self, quote: Quote) {
        *self.quote.lock().unwrap() = Some(quote);
    }

    fn push_place_ok(&self, order_id: &'static str) {
        self.place_results.lock().unwrap().push_back(Ok(order_id));
    }

    fn push_place_reject(&self, msg: &'static str) {
        self.place_results.lock().unwrap().push_back(Err(msg));
    }
}

#[async_trait]
impl MarketGateway for StubGateway {
    async fn fetch_quote(&self, _symbol: &str, _exchange: &str) -> Result<Quote, BrokerError> {
        let quote = *self.quote.lock().unwrap();
        quote.ok_or_else(|| BrokerError::Api("no data found".to_string()))
    }

    async fn fetch_history(
        &self,
        _symbol: &str,
        _exchange: &str,
        _interval: Interval,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Vec<Candle>, BrokerError> {
        let closes = self.closes.lock().unwrap().clone();
        Ok(closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                timestamp: 1_700_000_000 + i as i64 * 300,
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: 100,
                open_interest: 0,
            })
            .collect())
    }

    async fn place_smart_order(&self, req: &SmartOrderRequest) -> Result<OrderAck, BrokerError> {
        self.place_requests.lock().unwrap().push(req.clone());
        match self.place_results.lock().unwrap().pop_front() {
            Some(Ok(order_id)) => Ok(OrderAck {
                order_id: order_id.to_string(),
                status: "success".to_string(),
            }),
            Some(Err(msg)) => Err(BrokerError::RejectedByBroker(msg.to_string())),
            None => Err(BrokerError::Transport("not scripted".to_string())),
        }
    }

    async fn fetch_order_status(
        &self,
        order_id: &str,
    ) -> Result<OrderStatusSnapshot, BrokerError> {
        Ok(OrderStatusSnapshot {
            order_id: order_id.to_string(),
            order_status: "complete".to_string(),
            average_price: 100.0,
            quantity: 1,
            timestamp: String::new(),
        })
    }
}

struct SilentNotifier;

#[async_trait]
impl Notifier for SilentNotifier {
    async fn send(&self, _r: &str, _s: &str, _b: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

// =========================================================================
// Harness
// =========================================================================

fn test_config() -> Arc<Config> {
    Arc::new(Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        broker_url: "http://127.0.0.1:0".to_string(),
        broker_api_key: Some("test-key".to_string()),
        strategy_tag: "test".to_string(),
        alert_email: None,
        alert_webhook_url: None,
    })
}

struct Harness {
    dispatcher: Dispatcher,
    gateway: Arc<StubGateway>,
    store: Arc<InMemoryMessageStore>,
    frames: UnboundedReceiver<ServerFrame>,
}

fn harness() -> Harness {
    let gateway = StubGateway::new();
    let store = Arc::new(InMemoryMessageStore::new());
    let (outbox, frames) = Outbox::channel();

    let dispatcher = Dispatcher::new(
        "u1".to_string(),
        test_config(),
        Arc::new(AutoOrderRegistry::new()),
        gateway.clone(),
        Arc::new(SilentNotifier),
        Arc::new(DisabledChatBackend),
        store.clone(),
        outbox,
    );

    Harness {
        dispatcher,
        gateway,
        store,
        frames,
    }
}

fn chat(content: &str) -> ClientFrame {
    serde_json::from_str(&format!(
        r#"{{"type":"chat","content":{}}}"#,
        serde_json::to_string(content).unwrap()
    ))
    .unwrap()
}

fn frame_text(frame: &ServerFrame) -> String {
    match frame {
        ServerFrame::Chat { content, .. } => content.clone(),
        ServerFrame::Error { data } => data.message.clone(),
        _ => String::new(),
    }
}

async fn next_frame(frames: &mut UnboundedReceiver<ServerFrame>) -> ServerFrame {
    timeout(Duration::from_secs(2), frames.recv())
        .await
        .expect("frame within deadline")
        .expect("outbox open")
}

/// Collect the echo/typing/response/typing-off sequence of one command.
async fn command_frames(h: &mut Harness, line: &str) -> Vec<ServerFrame> {
    h.dispatcher.handle_frame(chat(line)).await;
    let mut frames = Vec::new();
    for _ in 0..4 {
        frames.push(next_frame(&mut h.frames).await);
    }
    frames
}

fn downtrend(count: usize) -> Vec<f64> {
    (0..count).map(|i| 300.0 - i as f64 * 1.5).collect()
}

// =========================================================================
// Frame flow
// =========================================================================

#[tokio::test]
async fn test_command_frame_ordering() {
    let mut h = harness();
    let frames = command_frames(&mut h, "/status_orders").await;

    // Echo, typing on, response, typing off.
    assert!(matches!(
        &frames[0],
        ServerFrame::Chat { data, .. } if data.role == Role::User
    ));
    assert!(matches!(
        &frames[1],
        ServerFrame::Typing { data } if data.is_typing
    ));
    assert!(matches!(
        &frames[2],
        ServerFrame::Chat { data, .. } if data.role == Role::Assistant
    ));
    assert!(matches!(
        &frames[3],
        ServerFrame::Typing { data } if !data.is_typing
    ));
}

#[tokio::test]
async fn test_ping_gets_pong() {
    let mut h = harness();
    let frame: ClientFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
    h.dispatcher.handle_frame(frame).await;
    assert!(matches!(next_frame(&mut h.frames).await, ServerFrame::Pong));
}

#[tokio::test]
async fn test_freeform_chat_uses_backend() {
    let mut h = harness();
    h.dispatcher
        .handle_frame(chat("what should I buy today?"))
        .await;

    // Echo, typing on, then the backend's guidance, typing off.
    let mut texts = Vec::new();
    for _ in 0..4 {
        texts.push(frame_text(&next_frame(&mut h.frames).await));
    }
    assert!(texts.iter().any(|t| t.contains("/status_orders")));
}

#[tokio::test]
async fn test_messages_are_persisted() {
    let mut h = harness();
    let _ = command_frames(&mut h, "/status_orders").await;

    let stored = h.store.recent("u1", 10).await;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].role, Role::User);
    assert_eq!(stored[0].content, "/status_orders");
    assert_eq!(stored[1].role, Role::Assistant);
}

// =========================================================================
// Commands
// =========================================================================

#[tokio::test]
async fn test_price_command() {
    let mut h = harness();
    h.gateway.set_quote(Quote {
        ltp: 2450.5,
        change: 12.3,
        change_percent: 0.5,
        high: 2460.0,
        low: 2431.0,
        open: 2440.0,
        previous_close: 2438.2,
    });

    let frames = command_frames(&mut h, "/price RELIANCE").await;
    let reply = frame_text(&frames[2]);
    assert!(reply.contains("RELIANCE (NSE)"));
    assert!(reply.contains("2450.50"));
    assert!(reply.contains("+0.50%"));
}

#[tokio::test]
async fn test_signal_met() {
    let mut h = harness();
    h.gateway.set_closes(downtrend(50));

    let frames = command_frames(&mut h, r#"/signal RELIANCE 5m "RSI14 < 30" NSE"#).await;
    let reply = frame_text(&frames[2]);
    assert!(reply.contains("Signal Met"));
    assert!(reply.contains("true"));
    assert!(reply.contains("RSI14="));

    // The verdict also rides as structured data on the frame.
    match &frames[2] {
        ServerFrame::Chat { data, .. } => {
            assert_eq!(data.signal_met, Some(true));
            let values = data.indicator_values.as_ref().expect("values attached");
            assert!(values["RSI14"] < 30.0);
        }
        other => panic!("expected chat frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_signal_not_met() {
    let mut h = harness();
    h.gateway.set_closes((0..50).map(|i| 100.0 + i as f64).collect());

    let frames = command_frames(&mut h, r#"/signal RELIANCE 5m "RSI14 < 30""#).await;
    let reply = frame_text(&frames[2]);
    assert!(reply.contains("Signal Not Met"));
}

#[tokio::test]
async fn test_signal_empty_history() {
    let mut h = harness();

    h.dispatcher
        .handle_frame(chat(r#"/signal GHOST 5m "RSI14 < 30""#))
        .await;

    let mut saw_error = false;
    for _ in 0..4 {
        if let ServerFrame::Error { data } = next_frame(&mut h.frames).await {
            assert!(data.message.contains("No history"));
            saw_error = true;
        }
    }
    assert!(saw_error);
}

#[tokio::test]
async fn test_buy_smart_places_immediately() {
    let mut h = harness();
    h.gateway.push_place_ok("240719000042");

    let frames = command_frames(&mut h, "/buy_smart TCS 5").await;
    let reply = frame_text(&frames[2]);
    assert!(reply.contains("Order placed"));
    assert!(reply.contains("240719000042"));

    let requests = h.gateway.place_requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].quantity, 5);
    assert_eq!(requests[0].exchange, "NSE");
}

#[tokio::test]
async fn test_sell_smart_rejection_surfaces_message() {
    let mut h = harness();
    h.gateway.push_place_reject("insufficient margin");

    h.dispatcher.handle_frame(chat("/sell_smart TCS 5")).await;
    let mut saw_error = false;
    for _ in 0..4 {
        if let ServerFrame::Error { data } = next_frame(&mut h.frames).await {
            assert!(data.message.contains("insufficient margin"));
            saw_error = true;
        }
    }
    assert!(saw_error);
}

#[tokio::test]
async fn test_smart_auto_registers_monitor() {
    let mut h = harness();
    h.gateway.set_closes(downtrend(50));

    let frames =
        command_frames(&mut h, r#"/buy_smart_auto TCS 10 NSE NRML 5m 2h "RSI14 < 99""#).await;
    let reply = frame_text(&frames[2]);
    assert!(reply.contains("armed"));
    assert!(reply.contains("AO-"));
    assert!(reply.contains("RSI14"));

    let monitors = h.dispatcher.registry().list("u1");
    assert_eq!(monitors.len(), 1);
    assert_eq!(monitors[0].symbol, "TCS");
    assert_eq!(monitors[0].quantity, 10);

    h.dispatcher.teardown();
}

#[tokio::test]
async fn test_smart_auto_rejects_bad_predicate_without_registering() {
    let mut h = harness();

    h.dispatcher
        .handle_frame(chat(r#"/buy_smart_auto TCS 10 NSE NRML 5m 2h "RSI < 30""#))
        .await;

    let mut saw_error = false;
    for _ in 0..4 {
        if let ServerFrame::Error { data } = next_frame(&mut h.frames).await {
            assert!(data.message.contains("requires a period"));
            saw_error = true;
        }
    }
    assert!(saw_error);
    assert!(h.dispatcher.registry().list("u1").is_empty());
}

#[tokio::test]
async fn test_smart_auto_validation_boundaries() {
    let mut h = harness();

    for bad in [
        r#"/buy_smart_auto TCS 10 NSE NRML 2m 2h "RSI14 < 30""#,
        r#"/buy_smart_auto TCS 0 NSE NRML 5m 2h "RSI14 < 30""#,
        r#"/buy_smart_auto TCS 10 NSE NRML 5m 31d "RSI14 < 30""#,
        r#"/buy_smart_auto TCS 10 NSE BO 5m 2h "RSI14 < 30""#,
    ] {
        h.dispatcher.handle_frame(chat(bad)).await;
        let mut saw_error = false;
        for _ in 0..4 {
            if matches!(next_frame(&mut h.frames).await, ServerFrame::Error { .. }) {
                saw_error = true;
            }
        }
        assert!(saw_error, "'{}' should be rejected", bad);
    }

    assert!(h.dispatcher.registry().list("u1").is_empty());
}

#[tokio::test]
async fn test_status_orders_lists_monitors() {
    let mut h = harness();
    h.gateway.set_closes(downtrend(50));

    let _ = command_frames(&mut h, r#"/buy_smart_auto TCS 10 NSE NRML 5m 2h "RSI14 < 1""#).await;
    let frames = command_frames(&mut h, "/status_orders").await;
    let reply = frame_text(&frames[2]);
    assert!(reply.contains("Active auto-orders (1)"));
    assert!(reply.contains("TCS"));
    assert!(reply.contains("running"));

    h.dispatcher.teardown();
}

#[tokio::test]
async fn test_cancel_order_unknown_id() {
    let mut h = harness();

    h.dispatcher
        .handle_frame(chat("/cancel_order AO-doesnotexist"))
        .await;

    let mut saw_not_found = false;
    for _ in 0..4 {
        if let ServerFrame::Error { data } = next_frame(&mut h.frames).await {
            assert!(data.message.contains("not found"));
            saw_not_found = true;
        }
    }
    assert!(saw_not_found);
}

#[tokio::test]
async fn test_cancel_order_hides_other_users_monitors() {
    let mut h = harness();

    // A monitor owned by someone else in the same registry must look
    // exactly like a missing one.
    let order = vigil::types::AutoOrder {
        id: String::new(),
        user_id: "u2".to_string(),
        symbol: "INFY".to_string(),
        exchange: "NSE".to_string(),
        product: vigil::types::Product::Mis,
        action: vigil::types::OrderAction::Sell,
        quantity: 1,
        interval: Interval::FiveMinute,
        predicate: "CLOSE > 1".to_string(),
        status: vigil::types::MonitorStatus::Running,
        created_at: chrono::Utc::now(),
        expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
    };
    let (other, _rx) = h.dispatcher.registry().add(order);

    h.dispatcher
        .handle_frame(chat(&format!("/cancel_order {}", other.id)))
        .await;

    let mut saw_not_found = false;
    for _ in 0..4 {
        if let ServerFrame::Error { data } = next_frame(&mut h.frames).await {
            assert!(data.message.contains("not found"));
            saw_not_found = true;
        }
    }
    assert!(saw_not_found);
    assert!(h.dispatcher.registry().get(&other.id).is_some());
}

#[tokio::test]
async fn test_cancel_all_orders() {
    let mut h = harness();
    h.gateway.set_closes(downtrend(50));

    let _ = command_frames(&mut h, r#"/buy_smart_auto TCS 10 NSE NRML 5m 2h "RSI14 < 1""#).await;
    let _ = command_frames(&mut h, r#"/sell_smart_auto INFY 1 NSE MIS 15m 2h "RSI14 < 1""#).await;
    assert_eq!(h.dispatcher.registry().list("u1").len(), 2);

    let frames = command_frames(&mut h, "/cancel_all_orders").await;
    let reply = frame_text(&frames[2]);
    assert!(reply.contains("Cancelling 2"));
    assert!(h.dispatcher.registry().list("u1").is_empty());
}

#[tokio::test]
async fn test_unknown_command_is_an_error_frame() {
    let mut h = harness();

    h.dispatcher.handle_frame(chat("/portfolio")).await;
    let mut saw_error = false;
    for _ in 0..4 {
        if let ServerFrame::Error { data } = next_frame(&mut h.frames).await {
            assert!(data.message.contains("unknown command"));
            saw_error = true;
        }
    }
    assert!(saw_error);
}

#[tokio::test]
async fn test_help_lists_commands() {
    let mut h = harness();
    let frames = command_frames(&mut h, "/help").await;
    let reply = frame_text(&frames[2]);
    for command in [
        "/price",
        "/signal",
        "/buy_smart_auto",
        "/status_orders",
        "/cancel_order",
        "/cancel_all_orders",
    ] {
        assert!(reply.contains(command), "help should list {}", command);
    }
}

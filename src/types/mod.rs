//! Shared domain types.

pub mod market;
pub mod order;
pub mod ws;

pub use market::{Candle, Interval, Quote};
pub use order::{
    AutoOrder, MonitorStatus, OrderAck, OrderAction, OrderStatusSnapshot, PriceType, Product,
    SmartOrderRequest,
};
pub use ws::{ChatData, ClientFrame, ErrorData, Role, ServerFrame, TypingData};

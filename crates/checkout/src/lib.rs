//! Multi-tenant checkout.
//!
//! [`CheckoutPipeline::place_order`] takes a storefront checkout request
//! through validation, pricing, stock reservation, block-list screening,
//! and affiliate attribution, persists the order, and hands it to the
//! [`FanoutDispatcher`] for notifications, emails, commission bookkeeping,
//! conversion tracking, and fraud enrichment on a background [`TaskQueue`].

pub mod attribution;
pub mod config;
pub mod error;
pub mod fanout;
pub mod intake;
pub mod pipeline;
pub mod screening;
pub mod services;
pub mod stock;
pub mod tasks;

pub use attribution::{Attribution, AttributionToken, decode_token};
pub use config::{CheckoutConfig, RetryPolicy};
pub use error::CheckoutError;
pub use fanout::{FanoutDispatcher, FanoutServices, record_commission};
pub use intake::{CartItemRequest, CheckoutRequest, CustomerRequest};
pub use pipeline::CheckoutPipeline;
pub use services::{
    BroadcastRealtimeChannel, ConversionEvent, ConversionTracker, FraudScoreService,
    HttpConversionTracker, HttpFraudScoreService, InMemoryConversionTracker,
    InMemoryFraudScoreService, InMemoryRealtimeChannel, RealtimeChannel, RealtimeMessage,
};
pub use tasks::TaskQueue;

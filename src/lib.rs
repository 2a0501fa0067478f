//! POS Rewards
//!
//! Promotion and coupon reward engine for a point of sale. It decides which
//! programs apply to an order, synthesizes their reward lines, tracks the
//! promo codes and coupons activated on the order and settles coupons once the
//! order is finalized.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod ids;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod order;
pub mod prelude;
pub mod prices;
pub mod products;
pub mod programs;
pub mod quantity;
pub mod reasons;
pub mod rewards;
pub mod rules;
pub mod service;
pub mod sync;

//! Turnstile - Sliding-Window Request Admission Control
//!
//! This crate implements an in-memory sliding-window rate limiter meant to
//! sit in front of sensitive, low-traffic endpoints such as an admin login.
//! Requests are admitted per key (one global key, or one per caller address)
//! and idle keys are swept in the background.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;

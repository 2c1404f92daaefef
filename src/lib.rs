#![allow(clippy::doc_lazy_continuation)]
#![allow(clippy::needless_range_loop)]
// src/lib.rs

pub mod api;
pub mod core;
pub mod storage;

// Anomaly detection module
pub mod anomaly_detection;

// Rotating verification codes
pub mod verification;

pub mod service;

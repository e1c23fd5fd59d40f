#![forbid(unsafe_code)]

pub mod graham_scan;

pub use graham_scan::{graham_scan, graham_scan_indices};

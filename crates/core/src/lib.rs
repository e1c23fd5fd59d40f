#![forbid(unsafe_code)]

pub mod cloud;
pub mod geometry;

pub use cloud::{Colors, PointCloud};
pub use geometry::{Vec2, Vec3};

// Domain layer - Plain data shared by every other layer
pub mod anomaly;
pub mod entity;
pub mod error;
pub mod series;
pub mod time_range;

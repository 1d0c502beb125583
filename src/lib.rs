pub mod config;
pub mod features;
pub mod inference;
pub mod model;
pub mod roster;
pub mod scaler;
pub mod stats;
pub mod xgboost;

//! Resolver, update coordinator and scheduler over the shared storage

pub mod rates;
pub mod resolver;
pub mod scheduler;
pub mod updater;

pub use rates::RateService;

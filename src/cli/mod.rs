pub mod history;
pub mod rate;
pub mod rates;
pub mod scheduler;
pub mod setup;
pub mod ui;
pub mod update;

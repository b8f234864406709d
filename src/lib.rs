pub mod aggregate;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod menu;
pub mod output;
pub mod resolve;
pub mod router;
pub mod schedule;
pub mod service;
pub mod store;
pub mod wait;

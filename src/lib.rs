pub mod config;
pub mod db;
pub mod digest;
pub mod dispatch;
pub mod error;
pub mod jobs;
pub mod model;
pub mod notify;
pub mod schedule;
pub mod subscriptions;

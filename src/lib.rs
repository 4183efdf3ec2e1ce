//! relays load balancer health check webhooks into a matrix room
//!
//! Features:
//! - authenticates webhooks by the shared secret the vendor sends in a header
//! - normalizes the differently shaped payload families into one field set
//! - posts an event message and, if health is known, a colored health message
//! - records every delivered message together with its event id in sqlite

pub mod alert_renderer;
pub mod auth;
pub mod chat;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod fields;
pub mod log;
pub mod matrix;
pub mod metrics;
pub mod rendered_alert;
pub mod settings;
pub mod sink;
pub mod store;
pub mod telemetry_endpoint;
pub mod timestamp;
pub mod webhook_receiver;

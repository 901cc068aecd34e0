//! Outbound services used by the handlers.

pub mod notifier;

pub use notifier::{HttpNotifier, NotifyError, UpstreamNotifier};

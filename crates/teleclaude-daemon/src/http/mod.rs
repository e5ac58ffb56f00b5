pub mod agents;
pub mod computers;
pub mod health;
pub mod notifications;
pub mod projects;
pub mod sessions;
pub mod webhooks;

pub mod api;
pub mod captcha;
pub mod client;
pub mod config;
pub mod humanize;
pub mod ledger;
pub mod mailer;
pub mod observability;

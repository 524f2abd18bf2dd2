pub mod auth;
pub mod features;
pub mod history;
pub mod languages;
pub mod providers;
pub mod store;

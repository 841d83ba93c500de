pub mod audit;
pub mod auth;
pub mod care;
pub mod cqc;
pub mod dashboard;
pub mod documents;
pub mod email;
pub mod encryption;
pub mod medication;
pub mod metrics;
pub mod notifications;
pub mod photos;
pub mod records;
pub mod reports;
pub mod residents;
pub mod security;
pub mod settings;
pub mod staff;
pub mod workflow;

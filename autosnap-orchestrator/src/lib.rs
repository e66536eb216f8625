pub mod exit_policy;
pub mod logger;
pub mod provider_manager;
pub mod settings;
pub mod snapshot_job;

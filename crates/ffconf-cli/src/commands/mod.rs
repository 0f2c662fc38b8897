pub mod resolve;
pub mod trex_config;

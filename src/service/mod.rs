pub mod broker_service;
pub mod database_service;
pub mod lease_service;
pub mod queue_service;

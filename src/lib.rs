// Library for tests to access modules

pub mod aggregate;
pub mod alert;
pub mod config;
pub mod models;
pub mod probe;
pub mod registry;
pub mod routes;
pub mod scheduler;
pub mod store;
pub mod version;

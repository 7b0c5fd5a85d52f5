pub mod agent;
pub mod conversation;
pub mod schema;
pub mod tooling;
pub mod transcript;

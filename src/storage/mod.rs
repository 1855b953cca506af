pub mod duck;
pub mod schema;
pub mod store;

pub mod chunk;
pub mod extract;
pub mod store;
pub mod types;

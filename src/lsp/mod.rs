pub mod backend;
pub mod copybook;
pub mod document;
pub mod features;
pub mod global_cache;
pub mod models;

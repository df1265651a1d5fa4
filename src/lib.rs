pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod geo;
pub mod loader;
pub mod manager;
pub mod modifiers;
pub mod output;
pub mod record;
pub mod rgi;
pub mod selection;
pub mod snapshot;
pub mod store;
pub mod table;
pub mod taxonomy;

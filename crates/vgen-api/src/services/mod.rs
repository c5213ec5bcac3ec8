//! Background services.

pub mod insert_listener;

pub use insert_listener::InsertListener;

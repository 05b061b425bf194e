// openHAB REST client modules
//
// Hand-written client for the item catalog, item state, and icon endpoints.

pub mod client;
pub mod items;
pub mod models;

pub use client::RestClient;

//! Drone inventory service
//!
//! Administrative HTTP surface for listing, adding and removing drone
//! records. Independent of the control protocol: claims are never checked
//! against the inventory.

mod routes;
mod store;

pub use routes::router;
pub use store::InventoryStore;

pub mod bridge;
pub mod downloads;
pub mod handlers;
pub mod middleware;
pub mod preferences;
pub mod routes;
pub mod searches;

pub use bridge::{BridgeHub, BridgeMessage};
pub use routes::create_router;

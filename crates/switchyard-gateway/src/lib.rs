pub mod routes;
pub mod server;
pub mod state;

pub use server::{router, GatewayServer};
pub use state::AppState;

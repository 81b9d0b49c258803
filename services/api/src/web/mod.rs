pub mod chat_ws;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the handlers the binary wires into the router.
pub use chat_ws::chat_ws_handler;
pub use middleware::require_admin_token;

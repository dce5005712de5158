// Transport: WebSocket duplex protocol and the REST request-response
// surface (§6), both layered directly over `crate::engine::GameEngine`.
//
// - handler: WebSocket upgrade entry point (authenticates before upgrading)
// - connection: the duplex connection's read/write loop
// - rest: the "clients that are not yet socket-connected, and tests"
//   request-response surface, one endpoint per action routed by the gateway
// - routes: HTTP route registration (CORS, /ws, /health, REST, metrics)
// - metrics: metrics endpoint authentication and JSON rendering
// - prometheus: Prometheus text-exposition rendering

mod connection;
mod handler;
mod metrics;
mod prometheus;
mod rest;
mod routes;

pub use handler::websocket_handler;
pub use metrics::{metrics_handler, prometheus_metrics_handler};
pub use routes::create_router;

//! HTTP surface: admission middleware, routes and server.

mod layer;
mod routes;
mod server;

pub use layer::{AdmissionLayer, AdmissionService, REJECTION_BODY, UNKNOWN_CALLER};
pub use routes::router;
pub use server::HttpServer;

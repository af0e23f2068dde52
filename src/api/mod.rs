//! API Module
//!
//! HTTP handlers and routing for the operator-facing cache API.
//!
//! # Endpoints
//! - `PUT /set`, `GET /get/:key`, `DELETE /del/:key`
//! - `DELETE /groups/:group`, `POST /flush`, `POST /maintenance`
//! - `GET /stats`, `GET /health`

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

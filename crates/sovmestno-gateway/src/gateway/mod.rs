//! Request dispatch to the platform's downstream services.
//!
//! Each downstream service (user, event, application) is mounted under a
//! path prefix. Admitted requests are forwarded with the caller's verified
//! identity injected as headers; documentation routes proxy each service's
//! generated API docs; `/health` fans out to every service's probe.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Request   │
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌──────────────────────────┐
//! │ origin_filter            │  (CORS headers, OPTIONS -> 204)
//! ├──────────────────────────┤
//! │ auth_gate                │  (PublicRoutes + TokenVerifier)
//! └──────┬───────────────────┘
//!        │
//!        ▼
//! ┌─────────────────┐
//! │ GatewayRouter   │  (mount prefix -> ServiceConfig)
//! └──────┬──────────┘
//!        │
//!        ├─▶ Proxy Handler   (identity headers, streamed response)
//!        ├─▶ Docs Handler    (OpenAPI rewrite, asset relay)
//!        └─▶ HealthAggregator (concurrent probes)
//! ```

pub mod docs;
pub mod error;
pub mod health;
pub mod proxy;
pub mod router;
pub mod routes;

pub use docs::{gateway_index, rewrite_openapi};
pub use error::GatewayError;
pub use health::{HealthAggregator, HealthResponse, OverallStatus, ServiceHealth, ServiceStatus};
pub use router::GatewayRouter;
pub use routes::{PublicRoutes, RouteRule, has_dot_segment};

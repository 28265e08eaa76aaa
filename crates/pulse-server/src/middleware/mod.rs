//! Middleware aplicado a todas las requests.
//!
//! Orden de ejecucion (de afuera hacia adentro):
//! - `RequestIdLayer`: asigna o propaga `x-request-id`
//! - `LoggingLayer`: span `http_request` y log de finalizacion
//! - `track_performance`: registra el `RequestSample` y las metricas HTTP
//!
//! `cors_layer` se aplica aparte, con los origenes de la configuracion.

mod cors;
mod logging;
mod performance;
mod request_id;

pub use cors::cors_layer;
pub use logging::{LoggingLayer, LoggingMiddleware};
pub use performance::{UserId, register_http_metrics, track_performance};
pub use request_id::{REQUEST_ID_HEADER, RequestId, RequestIdLayer, RequestIdMiddleware};

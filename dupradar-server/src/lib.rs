pub mod dispatch;
pub mod http;
pub mod pipeline;
pub mod subsystems;
pub mod telemetry;

pub mod config;
pub mod ocsp;
pub mod pki;
pub mod telemetry;
pub mod tls;

//! Liveness check.

pub const BANNER: &str = "RDFSub Hub";

pub async fn handler() -> &'static str { BANNER }

#[cfg(test)]
pub mod common;
pub mod worker_lifecycle;

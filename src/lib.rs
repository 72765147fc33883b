pub mod aggregate;
pub mod app;
pub mod client;
pub mod conf;
pub mod error;
pub mod queue;
pub mod storage;
pub mod trigger;
pub mod vision;

#[cfg(test)]
mod testing;

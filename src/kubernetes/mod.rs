mod client;
pub mod discovery;

pub use client::K8sStore;

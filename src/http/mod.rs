mod client;

pub use client::{Identity, Overrides, ProbeClient, ProbeResponse};

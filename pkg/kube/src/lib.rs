pub mod client;

pub use client::{HttpKubeClient, KubeClient};

mod client;
mod provision;

pub use client::CseHttpClient;
pub use provision::{load_plan, Provisioner, ProvisionSummary};

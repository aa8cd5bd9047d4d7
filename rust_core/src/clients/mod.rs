pub mod espn;
pub mod kasa;

// Re-export commonly used types
pub use espn::{EspnClient, EspnEvent, EspnSummary};
pub use kasa::KasaClient;

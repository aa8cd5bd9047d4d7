//! Light device abstraction
//!
//! Implementations talk to one physical light. They hold no cached state:
//! every `get_state` goes to the device, and callers own any snapshot they
//! want to restore later.

use crate::error::DeviceError;
use crate::models::LightState;
use async_trait::async_trait;

pub mod kasa;

pub use kasa::KasaBulb;

#[async_trait]
pub trait LightDevice: Send + Sync {
    async fn get_state(&self) -> Result<LightState, DeviceError>;

    async fn set_state(&self, state: &LightState) -> Result<(), DeviceError>;

    /// Address or name for logging
    fn address(&self) -> &str;
}

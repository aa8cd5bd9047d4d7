use super::LightDevice;
use crate::clients::kasa::KasaClient;
use crate::error::DeviceError;
use crate::models::LightState;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const LIGHTING_SERVICE: &str = "smartlife.iot.lightingservice";

/// Kasa color bulb (KL130/LB130 family)
#[derive(Debug, Clone)]
pub struct KasaBulb {
    client: KasaClient,
}

impl KasaBulb {
    pub fn new(host: &str, io_timeout: Duration) -> Self {
        Self {
            client: KasaClient::new(host, io_timeout),
        }
    }
}

#[async_trait]
impl LightDevice for KasaBulb {
    async fn get_state(&self) -> Result<LightState, DeviceError> {
        let response = self
            .client
            .request(&json!({ "system": { "get_sysinfo": {} } }))
            .await?;
        parse_sysinfo(self.client.host(), &response["system"]["get_sysinfo"])
    }

    async fn set_state(&self, state: &LightState) -> Result<(), DeviceError> {
        let response = self.client.request(&transition_request(state)).await?;
        check_err_code(
            self.client.host(),
            &response[LIGHTING_SERVICE]["transition_light_state"],
        )
    }

    fn address(&self) -> &str {
        self.client.host()
    }
}

fn transition_request(state: &LightState) -> Value {
    json!({
        LIGHTING_SERVICE: {
            "transition_light_state": {
                "on_off": u8::from(state.on),
                "hue": state.hue,
                "saturation": state.saturation,
                "brightness": state.brightness,
                "color_temp": state.color_temp,
                "ignore_default": 1,
                "transition_period": 0,
            }
        }
    })
}

/// Read a `LightState` out of `get_sysinfo`. A powered-off bulb reports its
/// color under `dft_on_state`.
fn parse_sysinfo(host: &str, sysinfo: &Value) -> Result<LightState, DeviceError> {
    check_err_code(host, sysinfo)?;

    let light = &sysinfo["light_state"];
    if !light.is_object() {
        return Err(DeviceError::NotALight(host.to_string()));
    }

    let on = light["on_off"].as_u64().unwrap_or(0) == 1;
    let values = if on { light } else { &light["dft_on_state"] };

    let field = |name: &str| -> Result<u64, DeviceError> {
        values[name].as_u64().ok_or_else(|| DeviceError::Protocol {
            host: host.to_string(),
            reason: format!("light_state missing {}", name),
        })
    };

    Ok(LightState {
        on,
        hue: field("hue")? as u16,
        saturation: field("saturation")? as u8,
        brightness: field("brightness")? as u8,
        color_temp: field("color_temp")? as u16,
    })
}

fn check_err_code(host: &str, section: &Value) -> Result<(), DeviceError> {
    if section.is_null() {
        return Err(DeviceError::Protocol {
            host: host.to_string(),
            reason: "missing response section".to_string(),
        });
    }

    match section["err_code"].as_i64().unwrap_or(0) {
        0 => Ok(()),
        code => Err(DeviceError::Rejected {
            host: host.to_string(),
            code,
            message: section["err_msg"].as_str().unwrap_or("unknown").to_string(),
        }),
    }
}

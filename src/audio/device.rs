//! Output device enumeration and lookup

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::DeviceError;
use crate::protocol::AudioDeviceInfo;

/// Rates worth advertising; RTP audio mostly lives at the low end
const PROBE_SAMPLE_RATES: [u32; 7] = [8000, 16000, 22050, 32000, 44100, 48000, 96000];

/// List all output devices of the default host
pub fn list_output_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = match host.output_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("Failed to enumerate output devices: {}", e);
            return Vec::new();
        }
    };

    devices
        .filter_map(|device| {
            let name = device.name().ok()?;
            let (sample_rates, channels) = output_capabilities(&device);
            Some(AudioDeviceInfo {
                id: format!("output:{}", name),
                is_default: default_name.as_ref() == Some(&name),
                name,
                sample_rates,
                channels,
            })
        })
        .collect()
}

fn output_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    if let Ok(configs) = device.supported_output_configs() {
        for config in configs {
            for rate in PROBE_SAMPLE_RATES {
                let probe = cpal::SampleRate(rate);
                if probe >= config.min_sample_rate()
                    && probe <= config.max_sample_rate()
                    && !sample_rates.contains(&rate)
                {
                    sample_rates.push(rate);
                }
            }
            if !channels.contains(&config.channels()) {
                channels.push(config.channels());
            }
        }
    }

    sample_rates.sort_unstable();
    channels.sort_unstable();
    (sample_rates, channels)
}

/// Find an output device by name or `output:<name>` id.
/// `None` picks the host default.
pub fn output_device(name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();

    let Some(name) = name else {
        return host
            .default_output_device()
            .ok_or_else(|| DeviceError::DeviceNotFound("No default output device".to_string()));
    };
    let name = name.strip_prefix("output:").unwrap_or(name);

    let devices = host
        .output_devices()
        .map_err(|e| DeviceError::CpalError(e.to_string()))?;
    for device in devices {
        if device.name().map_or(false, |n| n == name) {
            return Ok(device);
        }
    }

    Err(DeviceError::DeviceNotFound(name.to_string()))
}

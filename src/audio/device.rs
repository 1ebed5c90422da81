//! Audio device enumeration and stream format negotiation

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};

use crate::audio::AudioSpec;
use crate::error::AudioError;

/// An enumerated input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Position in the enumeration order
    pub index: usize,
    pub name: String,
}

/// List input devices of the default host, in enumeration order
pub fn list_input_devices() -> Result<Vec<DeviceDescriptor>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::HostUnavailable(e.to_string()))?;

    Ok(devices
        .filter_map(|device| device.name().ok())
        .enumerate()
        .map(|(index, name)| DeviceDescriptor { index, name })
        .collect())
}

/// Position of `descriptor` among the enumerated input `names`.
///
/// The recorded index wins when the name there still matches. Otherwise
/// the last device with that name is taken, so a newly attached device
/// is preferred over an older one sharing its name.
pub fn resolve_input_position(names: &[String], descriptor: &DeviceDescriptor) -> Option<usize> {
    if names.get(descriptor.index) == Some(&descriptor.name) {
        return Some(descriptor.index);
    }
    names.iter().rposition(|name| *name == descriptor.name)
}

/// Open the cpal input device an enumerated descriptor refers to
pub fn get_input_device(descriptor: &DeviceDescriptor) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    let mut devices: Vec<(String, cpal::Device)> = host
        .input_devices()
        .map_err(|e| AudioError::HostUnavailable(e.to_string()))?
        .filter_map(|device| device.name().ok().map(|name| (name, device)))
        .collect();

    let names: Vec<String> = devices.iter().map(|(name, _)| name.clone()).collect();
    let position = resolve_input_position(&names, descriptor)
        .ok_or_else(|| AudioError::DeviceNotFound(descriptor.name.clone()))?;
    Ok(devices.swap_remove(position).1)
}

/// Get the default output device
pub fn get_default_output_device() -> Result<cpal::Device, AudioError> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()))
}

/// Build the cpal stream config for a spec
pub fn stream_config(spec: &AudioSpec) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: spec.channels,
        sample_rate: cpal::SampleRate(spec.sample_rate),
        buffer_size: cpal::BufferSize::Fixed(spec.buffer_frames),
    }
}

/// A supported channel count, rate range and sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRange {
    pub channels: u16,
    pub min_rate: u32,
    pub max_rate: u32,
    pub format: SampleFormat,
}

impl From<SupportedStreamConfigRange> for FormatRange {
    fn from(range: SupportedStreamConfigRange) -> Self {
        Self {
            channels: range.channels(),
            min_rate: range.min_sample_rate().0,
            max_rate: range.max_sample_rate().0,
            format: range.sample_format(),
        }
    }
}

/// Pick the sample format to open a stream with.
///
/// Only I16, F32 and U16 are handled; I16 is preferred since it needs no
/// conversion.
pub fn negotiate_sample_format(
    ranges: impl IntoIterator<Item = FormatRange>,
    spec: &AudioSpec,
) -> Result<SampleFormat, AudioError> {
    let formats: Vec<SampleFormat> = ranges
        .into_iter()
        .filter(|r| r.channels == spec.channels)
        .filter(|r| (r.min_rate..=r.max_rate).contains(&spec.sample_rate))
        .map(|r| r.format)
        .collect();

    [SampleFormat::I16, SampleFormat::F32, SampleFormat::U16]
        .into_iter()
        .find(|f| formats.contains(f))
        .ok_or_else(|| {
            AudioError::UnsupportedFormat(format!(
                "{}Hz, {} channels (available: {:?})",
                spec.sample_rate, spec.channels, formats
            ))
        })
}

/// Sample format for an input stream on `device`
pub fn input_sample_format(
    device: &cpal::Device,
    spec: &AudioSpec,
) -> Result<SampleFormat, AudioError> {
    let configs = device
        .supported_input_configs()
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;
    negotiate_sample_format(configs.map(FormatRange::from), spec)
}

/// Sample format for an output stream on `device`
pub fn output_sample_format(
    device: &cpal::Device,
    spec: &AudioSpec,
) -> Result<SampleFormat, AudioError> {
    let configs = device
        .supported_output_configs()
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;
    negotiate_sample_format(configs.map(FormatRange::from), spec)
}

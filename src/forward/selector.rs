//! Accessory input device selection

use crate::audio::{AudioSpec, AudioSubsystem, DeviceDescriptor, DeviceId};
use crate::error::ForwardError;
use crate::forward::bridge::StreamBridge;

/// The device the heuristic picks: the last one enumerated.
///
/// The accessory input has just been added when the device switched to
/// accessory audio mode, so it should sort last. Another input device
/// attaching at the same time defeats this.
// TODO: compare the device name with the device model once the transport reports it
pub fn pick_accessory_input(devices: &[DeviceDescriptor]) -> Option<&DeviceDescriptor> {
    devices.last()
}

/// Select and open the accessory input, feeding captured samples to `bridge`
pub fn select_accessory_input(
    audio: &dyn AudioSubsystem,
    spec: &AudioSpec,
    bridge: StreamBridge,
) -> Result<DeviceId, ForwardError> {
    let devices = audio
        .input_devices()
        .map_err(ForwardError::DeviceOpenFailed)?;

    let selected = match pick_accessory_input(&devices) {
        Some(device) => device,
        None => {
            tracing::error!("No input audio source found");
            return Err(ForwardError::DeviceNotFound);
        }
    };
    tracing::info!("Selecting input audio source: {}", selected.name);

    audio
        .open_input(selected, spec, bridge.into_callback())
        .map_err(ForwardError::DeviceOpenFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::player::PlayGate;
    use crate::mock::{Call, CallLog, MockAudio};
    use std::sync::Arc;

    fn descriptors(names: &[&str]) -> Vec<DeviceDescriptor> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| DeviceDescriptor {
                index,
                name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_picks_last_device() {
        let devices = descriptors(&["Built-in Microphone", "Webcam", "Android Accessory"]);
        assert_eq!(
            pick_accessory_input(&devices).unwrap().name,
            "Android Accessory"
        );
        assert!(pick_accessory_input(&[]).is_none());
    }

    #[test]
    fn test_opens_last_device() {
        let log = CallLog::new();
        let mock = Arc::new(
            MockAudio::new(log.clone()).with_input_devices(&["Built-in Microphone", "Accessory"]),
        );
        mock.init().unwrap();
        let output = mock.open_output(&AudioSpec::default()).unwrap();
        let bridge = StreamBridge::new(mock.clone(), output, Arc::new(PlayGate::new()));

        let input = select_accessory_input(&*mock, &AudioSpec::default(), bridge).unwrap();

        assert!(log.contains(&Call::OpenInput("Accessory".to_string())));
        assert!(mock.is_open(input));
        assert_eq!(mock.is_paused(input), Some(true));
    }

    #[test]
    fn test_open_failure() {
        let log = CallLog::new();
        let mock = Arc::new(
            MockAudio::new(log)
                .with_input_devices(&["Accessory"])
                .fail_open_input(),
        );
        mock.init().unwrap();
        let output = mock.open_output(&AudioSpec::default()).unwrap();
        let bridge = StreamBridge::new(mock.clone(), output, Arc::new(PlayGate::new()));

        let err = select_accessory_input(&*mock, &AudioSpec::default(), bridge).unwrap_err();
        assert!(matches!(err, ForwardError::DeviceOpenFailed(_)));
    }
}

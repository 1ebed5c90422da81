//! Forwarding lifecycle tests against mock collaborators

use std::sync::Arc;
use std::time::{Duration, Instant};

use usbaudio_forward::mock::{Call, CallLog, MockAccessory, MockAudio, MockTransport};
use usbaudio_forward::{AudioForwarder, DeviceId, ForwardError, ForwarderConfig, Stage};

struct Harness {
    log: CallLog,
    audio: Arc<MockAudio>,
    forwarder: AudioForwarder,
}

impl Harness {
    fn new(
        log: &CallLog,
        audio: MockAudio,
        accessory: MockAccessory,
        transport: MockTransport,
    ) -> Self {
        Self::with_config(log, audio, accessory, transport, quick_config())
    }

    fn with_config(
        log: &CallLog,
        audio: MockAudio,
        accessory: MockAccessory,
        transport: MockTransport,
        config: ForwarderConfig,
    ) -> Self {
        let audio = Arc::new(audio);
        let forwarder =
            AudioForwarder::new(audio.clone(), Box::new(accessory), Box::new(transport), config);
        Self {
            log: log.clone(),
            audio,
            forwarder,
        }
    }

    fn devices(&self) -> (DeviceId, DeviceId) {
        let player = self.forwarder.player().unwrap();
        (
            player.input_device().unwrap(),
            player.output_device().unwrap(),
        )
    }

    /// Nothing survives a failed start
    fn assert_clean_failure(&self) {
        assert!(!self.forwarder.is_running());
        assert!(self.forwarder.player().is_none());
        assert_eq!(self.audio.open_count(), 0);
        assert!(!self.log.accessory_audio_enabled());
    }
}

fn quick_config() -> ForwarderConfig {
    ForwarderConfig {
        usb_settle_ms: 0,
        ..Default::default()
    }
}

fn default_harness() -> Harness {
    let log = CallLog::new();
    Harness::new(
        &log,
        MockAudio::new(log.clone()).with_input_devices(&["Built-in Microphone", "Accessory"]),
        MockAccessory::new(log.clone()),
        MockTransport::with_serial(log.clone(), "XYZ789"),
    )
}

#[test]
fn test_start_with_supplied_serial() {
    let mut h = default_harness();

    h.forwarder.start(Some("ABC123")).unwrap();

    assert!(h.forwarder.is_running());
    assert_eq!(h.forwarder.stage(), Stage::Running);
    assert_eq!(h.forwarder.serial(), Some("ABC123"));
    assert!(!h.log.contains(&Call::ReadSerial));

    let (input, output) = h.devices();
    assert_eq!(h.audio.is_paused(output), Some(true));
    assert_eq!(h.audio.is_paused(input), Some(false));
    assert!(h.log.contains(&Call::OpenInput("Accessory".to_string())));
    assert!(h.log.accessory_audio_enabled());
}

#[test]
fn test_start_order() {
    let mut h = default_harness();
    h.forwarder.start(Some("ABC123")).unwrap();
    let (input, _output) = h.devices();

    let expected = vec![
        Call::ProtocolInit,
        Call::EnableAudio("ABC123".to_string()),
        Call::AudioInit,
        Call::OpenOutput,
        Call::ListInputs,
        Call::OpenInput("Accessory".to_string()),
        Call::Pause(input, false),
    ];
    assert_eq!(h.log.calls(), expected);
}

#[test]
fn test_start_resolves_serial() {
    let mut h = default_harness();

    h.forwarder.start(None).unwrap();

    assert_eq!(h.forwarder.serial(), Some("XYZ789"));
    let read = h.log.position(|c| *c == Call::ReadSerial).unwrap();
    let enable = h
        .log
        .position(|c| *c == Call::EnableAudio("XYZ789".to_string()))
        .unwrap();
    assert!(read < enable);
}

#[test]
fn test_settle_delay_precedes_device_open() {
    let log = CallLog::new();
    let mut h = Harness::with_config(
        &log,
        MockAudio::new(log.clone()),
        MockAccessory::new(log.clone()),
        MockTransport::with_serial(log.clone(), "XYZ789"),
        ForwarderConfig {
            usb_settle_ms: 50,
            ..Default::default()
        },
    );

    let started = Instant::now();
    h.forwarder.start(Some("ABC123")).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(50));

    let enable = h.log.position(|c| matches!(c, Call::EnableAudio(_))).unwrap();
    let open = h.log.position(|c| *c == Call::OpenOutput).unwrap();
    assert!(enable < open);
}

#[test]
fn test_protocol_init_failure_has_no_rollback() {
    let log = CallLog::new();
    let mut h = Harness::new(
        &log,
        MockAudio::new(log.clone()),
        MockAccessory::new(log.clone()).fail_init(),
        MockTransport::with_serial(log.clone(), "XYZ789"),
    );

    let err = h.forwarder.start(Some("ABC123")).unwrap_err();

    assert!(matches!(err, ForwardError::ResourceInitFailed(_)));
    assert_eq!(h.log.calls(), vec![Call::ProtocolInit]);
    h.assert_clean_failure();
}

#[test]
fn test_serial_failure_exits_protocol() {
    let log = CallLog::new();
    let mut h = Harness::new(
        &log,
        MockAudio::new(log.clone()),
        MockAccessory::new(log.clone()),
        MockTransport::failing(log.clone()),
    );

    let err = h.forwarder.start(None).unwrap_err();

    assert!(matches!(err, ForwardError::SerialResolutionFailed(_)));
    assert_eq!(h.forwarder.stage(), Stage::Serial);
    assert_eq!(
        h.log.calls(),
        vec![Call::ProtocolInit, Call::ReadSerial, Call::ProtocolExit]
    );
    h.assert_clean_failure();
}

#[test]
fn test_player_init_failure_exits_protocol() {
    let mut h = default_harness();

    let err = h.forwarder.start(Some("")).unwrap_err();

    assert!(matches!(err, ForwardError::SerialResolutionFailed(_)));
    assert_eq!(h.forwarder.stage(), Stage::PlayerInit);
    assert_eq!(h.log.calls(), vec![Call::ProtocolInit, Call::ProtocolExit]);
    h.assert_clean_failure();
}

#[test]
fn test_enable_failure_destroys_player() {
    let log = CallLog::new();
    let mut h = Harness::new(
        &log,
        MockAudio::new(log.clone()),
        MockAccessory::new(log.clone()).fail_enable(),
        MockTransport::with_serial(log.clone(), "XYZ789"),
    );

    let err = h.forwarder.start(Some("ABC123")).unwrap_err();

    assert!(matches!(err, ForwardError::RemoteProtocolFailed(_)));
    assert_eq!(h.forwarder.stage(), Stage::ForwardEnabled);
    assert!(!h.log.contains(&Call::OpenOutput));
    assert!(!h.log.contains(&Call::AudioInit));
    assert_eq!(h.log.calls().last(), Some(&Call::ProtocolExit));
    h.assert_clean_failure();
}

#[test]
fn test_audio_init_failure_disables_forwarding() {
    let log = CallLog::new();
    let mut h = Harness::new(
        &log,
        MockAudio::new(log.clone()).fail_init(),
        MockAccessory::new(log.clone()),
        MockTransport::with_serial(log.clone(), "XYZ789"),
    );

    let err = h.forwarder.start(Some("ABC123")).unwrap_err();

    assert!(matches!(err, ForwardError::ResourceInitFailed(_)));
    assert_eq!(
        h.log.calls(),
        vec![
            Call::ProtocolInit,
            Call::EnableAudio("ABC123".to_string()),
            Call::AudioInit,
            Call::DisableAudio("ABC123".to_string()),
            Call::ProtocolExit,
        ]
    );
    h.assert_clean_failure();
}

#[test]
fn test_no_input_device() {
    let log = CallLog::new();
    let mut h = Harness::new(
        &log,
        MockAudio::new(log.clone()).with_input_devices(&[]),
        MockAccessory::new(log.clone()),
        MockTransport::with_serial(log.clone(), "XYZ789"),
    );

    let err = h.forwarder.start(Some("ABC123")).unwrap_err();

    assert!(matches!(err, ForwardError::DeviceNotFound));
    assert_eq!(h.forwarder.stage(), Stage::DevicesOpen);
    assert!(h.log.contains(&Call::DisableAudio("ABC123".to_string())));
    assert_eq!(h.log.calls().last(), Some(&Call::ProtocolExit));
    h.assert_clean_failure();
}

#[test]
fn test_input_open_failure_closes_output() {
    let log = CallLog::new();
    let mut h = Harness::new(
        &log,
        MockAudio::new(log.clone()).fail_open_input(),
        MockAccessory::new(log.clone()),
        MockTransport::with_serial(log.clone(), "XYZ789"),
    );

    let err = h.forwarder.start(Some("ABC123")).unwrap_err();

    assert!(matches!(err, ForwardError::DeviceOpenFailed(_)));
    let close = h.log.position(|c| matches!(c, Call::Close(_))).unwrap();
    let disable = h.log.position(|c| matches!(c, Call::DisableAudio(_))).unwrap();
    assert!(close < disable);
    h.assert_clean_failure();
}

#[test]
fn test_output_open_failure() {
    let log = CallLog::new();
    let mut h = Harness::new(
        &log,
        MockAudio::new(log.clone()).fail_open_output(),
        MockAccessory::new(log.clone()),
        MockTransport::with_serial(log.clone(), "XYZ789"),
    );

    let err = h.forwarder.start(Some("ABC123")).unwrap_err();

    assert!(matches!(err, ForwardError::DeviceOpenFailed(_)));
    assert!(!h.log.contains(&Call::ListInputs));
    h.assert_clean_failure();
}

#[test]
fn test_rollback_continues_when_disable_fails() {
    let failures: [fn(MockAudio) -> MockAudio; 2] =
        [MockAudio::fail_init, MockAudio::fail_open_input];
    for audio_failure in failures {
        let log = CallLog::new();
        let mut h = Harness::new(
            &log,
            audio_failure(MockAudio::new(log.clone())),
            MockAccessory::new(log.clone()).fail_disable(),
            MockTransport::with_serial(log.clone(), "XYZ789"),
        );

        h.forwarder.start(Some("ABC123")).unwrap_err();

        assert!(!h.forwarder.is_running());
        assert!(h.forwarder.player().is_none());
        assert_eq!(h.audio.open_count(), 0);
        assert_eq!(h.log.calls().last(), Some(&Call::ProtocolExit));
    }
}

#[test]
fn test_restart_after_failure() {
    let log = CallLog::new();
    let mut h = Harness::new(
        &log,
        MockAudio::new(log.clone()),
        MockAccessory::new(log.clone()),
        MockTransport::failing(log.clone()),
    );

    h.forwarder.start(None).unwrap_err();
    h.forwarder.start(Some("ABC123")).unwrap();
    assert!(h.forwarder.is_running());
}

#[test]
fn test_stop_releases_everything() {
    let mut h = default_harness();
    h.forwarder.start(Some("ABC123")).unwrap();
    let (input, output) = h.devices();

    h.forwarder.stop();

    assert!(!h.forwarder.is_running());
    assert_eq!(h.forwarder.stage(), Stage::Idle);
    assert_eq!(h.audio.open_count(), 0);
    assert!(h.log.contains(&Call::Close(input)));
    assert!(h.log.contains(&Call::Close(output)));

    let close = h.log.position(|c| *c == Call::Close(output)).unwrap();
    let disable = h
        .log
        .position(|c| *c == Call::DisableAudio("ABC123".to_string()))
        .unwrap();
    assert!(close < disable);
    assert_eq!(h.log.calls().last(), Some(&Call::ProtocolExit));
}

#[test]
fn test_stop_continues_when_disable_fails() {
    let log = CallLog::new();
    let mut h = Harness::new(
        &log,
        MockAudio::new(log.clone()),
        MockAccessory::new(log.clone()).fail_disable(),
        MockTransport::with_serial(log.clone(), "XYZ789"),
    );
    h.forwarder.start(Some("ABC123")).unwrap();
    let (input, output) = h.devices();

    h.forwarder.stop();

    assert!(!h.forwarder.is_running());
    assert!(h.log.contains(&Call::Close(input)));
    assert!(h.log.contains(&Call::Close(output)));
    assert_eq!(h.log.calls().last(), Some(&Call::ProtocolExit));
}

#[test]
fn test_output_starts_on_first_queued_samples() {
    let log = CallLog::new();
    let mut h = Harness::new(
        &log,
        MockAudio::new(log.clone()).with_enqueue_script(vec![false, true, true]),
        MockAccessory::new(log.clone()),
        MockTransport::with_serial(log.clone(), "XYZ789"),
    );
    h.forwarder.start(Some("ABC123")).unwrap();
    let (input, output) = h.devices();
    let playing = || h.forwarder.player().unwrap().is_playing();

    assert!(h.audio.capture(input, &[0; 16]));
    assert!(!playing());
    assert_eq!(h.audio.is_paused(output), Some(true));

    assert!(h.audio.capture(input, &[0; 16]));
    assert!(playing());
    assert_eq!(h.audio.is_paused(output), Some(false));

    assert!(h.audio.capture(input, &[0; 16]));
    assert_eq!(h.audio.resume_count(output), 1);
    assert_eq!(h.audio.queued_bytes(output), 32);
}

#[test]
fn test_no_samples_after_stop() {
    let mut h = default_harness();
    h.forwarder.start(Some("ABC123")).unwrap();
    let (input, _output) = h.devices();

    h.forwarder.stop();
    assert!(!h.audio.capture(input, &[0; 4]));
}

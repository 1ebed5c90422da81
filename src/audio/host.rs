//! cpal implementation of [`AudioSubsystem`]
//!
//! Every open device runs on a dedicated thread that owns its cpal stream
//! (streams are not `Send` on every platform). The thread obeys pause and
//! close commands sent over a channel; dropping the stream on close stops
//! the device.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, unbounded, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::buffer::{QueueReader, SampleQueue, SharedSampleQueue};
use crate::audio::device::{
    get_default_output_device, get_input_device, input_sample_format, list_input_devices,
    output_sample_format, stream_config,
};
use crate::audio::{AudioSpec, AudioSubsystem, DeviceDescriptor, DeviceId, InputCallback};
use crate::constants::DEFAULT_OUTPUT_QUEUE_CHUNKS;
use crate::error::AudioError;

enum DeviceCommand {
    Pause(bool),
    Close,
}

struct DeviceSlot {
    commands: Sender<DeviceCommand>,
    thread: JoinHandle<()>,
    /// Playback queue, output devices only
    queue: Option<SharedSampleQueue>,
}

/// cpal-backed audio subsystem on the default host
pub struct CpalSubsystem {
    initialized: AtomicBool,
    next_id: AtomicU32,
    devices: Mutex<HashMap<DeviceId, DeviceSlot>>,
    queue_capacity: usize,
}

impl CpalSubsystem {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_OUTPUT_QUEUE_CHUNKS)
    }

    /// Create a subsystem whose output queues hold `chunks` input buffers
    pub fn with_queue_capacity(chunks: usize) -> Self {
        Self {
            initialized: AtomicBool::new(false),
            next_id: AtomicU32::new(1),
            devices: Mutex::new(HashMap::new()),
            queue_capacity: chunks.max(1),
        }
    }

    /// Number of devices currently open
    pub fn open_devices(&self) -> usize {
        self.devices.lock().len()
    }

    fn ensure_initialized(&self) -> Result<(), AudioError> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AudioError::NotInitialized)
        }
    }

    /// Start a device thread running the stream produced by `build`, and
    /// wait until the stream is built and paused.
    fn spawn_device<F>(
        &self,
        kind: &str,
        build: F,
        queue: Option<SharedSampleQueue>,
    ) -> Result<DeviceId, AudioError>
    where
        F: FnOnce() -> Result<cpal::Stream, AudioError> + Send + 'static,
    {
        let id = DeviceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (command_tx, command_rx) = unbounded::<DeviceCommand>();
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let thread = thread::Builder::new()
            .name(format!("audio-{}-{}", kind, id.0))
            .spawn(move || {
                let stream = match build() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Some backends start streams on creation
                if let Err(e) = stream.pause() {
                    tracing::debug!("Cannot pause new stream {}: {}", id, e);
                }
                let _ = ready_tx.send(Ok(()));

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DeviceCommand::Pause(true) => {
                            if let Err(e) = stream.pause() {
                                tracing::error!("Cannot pause audio device {}: {}", id, e);
                            }
                        }
                        DeviceCommand::Pause(false) => {
                            if let Err(e) = stream.play() {
                                tracing::error!("Cannot resume audio device {}: {}", id, e);
                            }
                        }
                        DeviceCommand::Close => break,
                    }
                }
                // Stream is dropped here, stopping the device
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(AudioError::StreamError(
                    "device thread exited before the stream was ready".to_string(),
                ));
            }
        }

        self.devices.lock().insert(
            id,
            DeviceSlot {
                commands: command_tx,
                thread,
                queue,
            },
        );
        Ok(id)
    }
}

impl Default for CpalSubsystem {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSubsystem for CpalSubsystem {
    fn init(&self) -> Result<(), AudioError> {
        let host = cpal::default_host();
        host.devices()
            .map_err(|e| AudioError::HostUnavailable(e.to_string()))?;
        tracing::debug!("Using audio host {:?}", host.id());
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn input_devices(&self) -> Result<Vec<DeviceDescriptor>, AudioError> {
        self.ensure_initialized()?;
        list_input_devices()
    }

    fn open_input(
        &self,
        device: &DeviceDescriptor,
        spec: &AudioSpec,
        callback: InputCallback,
    ) -> Result<DeviceId, AudioError> {
        self.ensure_initialized()?;
        let descriptor = device.clone();
        let spec = *spec;

        self.spawn_device(
            "in",
            move || {
                let device = get_input_device(&descriptor)?;
                let format = input_sample_format(&device, &spec)?;
                let config = stream_config(&spec);
                match format {
                    SampleFormat::I16 => build_input_stream::<i16>(&device, &config, callback),
                    SampleFormat::F32 => build_input_stream::<f32>(&device, &config, callback),
                    SampleFormat::U16 => build_input_stream::<u16>(&device, &config, callback),
                    other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
                }
            },
            None,
        )
    }

    fn open_output(&self, spec: &AudioSpec) -> Result<DeviceId, AudioError> {
        self.ensure_initialized()?;
        let spec = *spec;
        let queue = Arc::new(SampleQueue::new(self.queue_capacity));
        let reader = QueueReader::new(queue.clone());

        self.spawn_device(
            "out",
            move || {
                let device = get_default_output_device()?;
                let format = output_sample_format(&device, &spec)?;
                let config = stream_config(&spec);
                match format {
                    SampleFormat::I16 => build_output_stream::<i16>(&device, &config, reader),
                    SampleFormat::F32 => build_output_stream::<f32>(&device, &config, reader),
                    SampleFormat::U16 => build_output_stream::<u16>(&device, &config, reader),
                    other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
                }
            },
            Some(queue),
        )
    }

    fn close(&self, device: DeviceId) {
        // The lock must not be held while joining
        let slot = self.devices.lock().remove(&device);
        if let Some(slot) = slot {
            let _ = slot.commands.send(DeviceCommand::Close);
            if slot.thread.join().is_err() {
                tracing::error!("Audio device thread {} panicked", device);
            }
        }
    }

    fn pause(&self, device: DeviceId, paused: bool) {
        if let Some(slot) = self.devices.lock().get(&device) {
            let _ = slot.commands.send(DeviceCommand::Pause(paused));
        }
    }

    fn enqueue(&self, device: DeviceId, data: &[u8]) -> Result<(), AudioError> {
        // Table lock held only to clone the queue handle
        let queue = match self.devices.lock().get(&device) {
            Some(DeviceSlot {
                queue: Some(queue), ..
            }) => queue.clone(),
            Some(_) => {
                return Err(AudioError::StreamError(format!(
                    "{} is not an output device",
                    device
                )))
            }
            None => return Err(AudioError::UnknownDevice(device.0)),
        };
        queue.push_bytes(data)
    }
}

impl Drop for CpalSubsystem {
    fn drop(&mut self) {
        let ids: Vec<DeviceId> = self.devices.lock().keys().copied().collect();
        for id in ids {
            self.close(id);
        }
    }
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut callback: InputCallback,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let mut bytes: Vec<u8> = Vec::new();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                bytes.clear();
                bytes.extend(
                    data.iter()
                        .flat_map(|&s| <i16 as Sample>::from_sample(s).to_le_bytes()),
                );
                callback(&bytes);
            },
            |err| tracing::error!("Audio input error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut reader: QueueReader,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<i16>,
{
    let mut scratch: Vec<i16> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0);
                reader.fill(&mut scratch);
                for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(sample);
                }
            },
            |err| tracing::error!("Audio output error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_init() {
        let audio = CpalSubsystem::new();
        assert!(matches!(
            audio.input_devices(),
            Err(AudioError::NotInitialized)
        ));
        assert!(matches!(
            audio.open_output(&AudioSpec::default()),
            Err(AudioError::NotInitialized)
        ));
    }

    #[test]
    fn test_unknown_handles() {
        let audio = CpalSubsystem::new();
        let err = audio.enqueue(DeviceId(42), &[0, 0]).unwrap_err();
        assert!(matches!(err, AudioError::UnknownDevice(42)));

        // Both are no-ops on a handle that was never opened
        audio.pause(DeviceId(42), false);
        audio.close(DeviceId(42));
        assert_eq!(audio.open_devices(), 0);
    }
}

//! Capture from the default input device into a WAV file.
//!
//! Wav ~ 467KiB every 5 seconds at 48kHz stereo f32. Memos are short enough
//! that this has not been worth a lossy encoder.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Host, Sample};
use hound::WavWriter;
use parking_lot::Mutex;
use tracing::{error, info};

use crate::{AudioError, FinishedRecording, RecordingHandle, Result, file_uri};

type WavWriterHandle = Arc<Mutex<Option<WavWriter<BufWriter<File>>>>>;

/// Handle to a recording in progress. Dropping it finalizes the file.
pub(crate) struct CpalRecording {
    stream: cpal::Stream,
    // Presence of the writer indicates the recording has not been finalized.
    writer: WavWriterHandle,
    frames: Arc<AtomicU64>,
    sample_rate: u32,
    path: PathBuf,
}

impl CpalRecording {
    pub(crate) fn start(host: &Host, path: PathBuf) -> Result<Self> {
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;
        let config = device
            .default_input_config()
            .map_err(|_| AudioError::NoInputDevice)?;

        info!(
            device_name = %device.name().unwrap_or_default(),
            path = ?path,
            "Recording from device"
        );

        let spec = wav_spec_from_config(&config);
        let channels = u64::from(config.channels());
        let sample_rate = config.sample_rate().0;

        let writer = create_wav_writer(&path, spec)?;
        let writer: WavWriterHandle = Arc::new(Mutex::new(Some(writer)));
        let frames = Arc::new(AtomicU64::new(0));

        // The input callback runs on the device thread.
        let writer_2 = writer.clone();
        let frames_2 = frames.clone();

        let err_fn = move |err| {
            error!("an error occurred on stream: {}", err);
        };

        let stream = match config.sample_format() {
            cpal::SampleFormat::I8 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<i8, i8>(data, &writer_2, &frames_2, channels)
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<i16, i16>(data, &writer_2, &frames_2, channels)
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I32 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<i32, i32>(data, &writer_2, &frames_2, channels)
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<f32, f32>(data, &writer_2, &frames_2, channels)
                },
                err_fn,
                None,
            )?,
            sample_format => {
                return Err(AudioError::SampleFormatNotSupported(format!(
                    "{:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| anyhow!("failed to play stream: {}", e))?;

        Ok(Self {
            stream,
            writer,
            frames,
            sample_rate,
            path,
        })
    }

    fn finish(&mut self) -> Result<FinishedRecording> {
        let Some(writer) = self.writer.lock().take() else {
            return Err(AudioError::Released);
        };
        info!(path = ?self.path, "Ending recording.");
        // Pause and ignore errors, the stream is dropped with the handle.
        self.stream.pause().ok();
        // Finalize the writer so it writes the proper framing information.
        writer.finalize()?;

        let frames = self.frames.load(Ordering::Relaxed);
        let duration_millis = frames * 1000 / u64::from(self.sample_rate.max(1));
        Ok(FinishedRecording {
            uri: file_uri(&self.path),
            duration_millis,
        })
    }
}

#[async_trait(?Send)]
impl RecordingHandle for CpalRecording {
    async fn stop_and_finalize(&mut self) -> Result<FinishedRecording> {
        self.finish()
    }
}

impl Drop for CpalRecording {
    fn drop(&mut self) {
        if self.writer.lock().is_some() {
            if let Err(e) = self.finish() {
                error!("failed to finalize recording: {}", e);
            }
        }
    }
}

/// Create the WAV file at `path`. Fails if the file already exists, an
/// existing recording is never overwritten.
fn create_wav_writer(path: &Path, spec: hound::WavSpec) -> Result<WavWriter<BufWriter<File>>> {
    let file = File::create_new(path)?;
    Ok(WavWriter::new(BufWriter::new(file), spec)?)
}

fn wav_spec_from_config(config: &cpal::SupportedStreamConfig) -> hound::WavSpec {
    hound::WavSpec {
        channels: config.channels(),
        sample_rate: config.sample_rate().0,
        bits_per_sample: (config.sample_format().sample_size() * 8) as _,
        sample_format: sample_format(config.sample_format()),
    }
}

fn sample_format(format: cpal::SampleFormat) -> hound::SampleFormat {
    if format.is_float() {
        hound::SampleFormat::Float
    } else {
        hound::SampleFormat::Int
    }
}

fn write_input_data<T, U>(input: &[T], writer: &WavWriterHandle, frames: &AtomicU64, channels: u64)
where
    T: Sample,
    U: Sample + hound::Sample + FromSample<T>,
{
    if let Some(mut guard) = writer.try_lock() {
        if let Some(writer) = guard.as_mut() {
            for &sample in input.iter() {
                let sample: U = U::from_sample(sample);
                writer.write_sample(sample).ok();
            }
            frames.fetch_add(input.len() as u64 / channels.max(1), Ordering::Relaxed);
        }
    }
}

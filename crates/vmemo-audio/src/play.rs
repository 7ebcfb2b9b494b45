//! Play a WAV clip through the default output device.

use std::path::Path;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Host, SizedSample, StreamConfig, SupportedStreamConfig};
use hound::WavReader;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{AudioError, PlaybackHandle, PlaybackStatus, Result, StatusReceiver, path_from_uri};

/// How often the output callback reports its position.
const REPORT_INTERVAL_MS: u64 = 250;

/// A fully decoded clip, interleaved f32 samples in `[-1, 1]`.
#[derive(Debug)]
pub(crate) struct DecodedClip {
    pub(crate) samples: Vec<f32>,
    pub(crate) channels: u16,
    pub(crate) sample_rate: u32,
}

impl DecodedClip {
    fn channel_count(&self) -> usize {
        usize::from(self.channels.max(1))
    }

    pub(crate) fn frames(&self) -> usize {
        self.samples.len() / self.channel_count()
    }

    pub(crate) fn duration_millis(&self) -> u64 {
        self.frames() as u64 * 1000 / u64::from(self.sample_rate.max(1))
    }
}

/// Decode a WAV file written by the recorder (or any PCM/float WAV).
pub(crate) fn decode_wav(path: &Path) -> std::result::Result<DecodedClip, hound::Error> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(DecodedClip {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

/// Reads a clip out at the device's channel count and sample rate.
///
/// Channels are mapped one to one, a mono clip is copied to every output
/// channel and a mono output gets the average of the clip's channels. Rate
/// conversion is linear interpolation.
pub(crate) struct ClipCursor {
    clip: Arc<DecodedClip>,
    out_channels: usize,
    // Clip frames advanced per output frame.
    step: f64,
    // Position in clip frames.
    position: f64,
    last_report: u64,
    finished: bool,
}

impl ClipCursor {
    pub(crate) fn new(clip: Arc<DecodedClip>, out_channels: u16, out_rate: u32) -> Self {
        let step = f64::from(clip.sample_rate.max(1)) / f64::from(out_rate.max(1));
        Self {
            clip,
            out_channels: usize::from(out_channels.max(1)),
            step,
            position: 0.0,
            last_report: 0,
            finished: false,
        }
    }

    /// Fill `data` with the next interleaved output frames, zero past the end
    /// of the clip. Returns the status updates due after this buffer.
    pub(crate) fn fill(&mut self, data: &mut [f32]) -> Vec<PlaybackStatus> {
        let frames = self.clip.frames();
        for frame in data.chunks_mut(self.out_channels) {
            let index = self.position as usize;
            if index >= frames {
                frame.fill(0.0);
                continue;
            }

            let next = (index + 1).min(frames - 1);
            let frac = (self.position - index as f64) as f32;
            for (channel, out) in frame.iter_mut().enumerate() {
                let a = self.sample(index, channel);
                let b = self.sample(next, channel);
                *out = a + (b - a) * frac;
            }
            self.position += self.step;
        }

        let mut updates = Vec::new();
        let position_millis = self.position_millis();
        if position_millis >= self.last_report + REPORT_INTERVAL_MS {
            self.last_report = position_millis;
            updates.push(PlaybackStatus::Position { position_millis });
        }
        if !self.finished && self.position as usize >= frames {
            self.finished = true;
            updates.push(PlaybackStatus::Finished);
        }
        updates
    }

    pub(crate) fn position_millis(&self) -> u64 {
        let frames = (self.position as usize).min(self.clip.frames()) as u64;
        frames * 1000 / u64::from(self.clip.sample_rate.max(1))
    }

    fn sample(&self, frame: usize, out_channel: usize) -> f32 {
        let channels = self.clip.channel_count();
        let samples = &self.clip.samples[frame * channels..(frame + 1) * channels];
        if self.out_channels == 1 {
            samples.iter().sum::<f32>() / channels as f32
        } else if out_channel < channels {
            samples[out_channel]
        } else if channels == 1 {
            samples[0]
        } else {
            0.0
        }
    }
}

fn is_playable_format(format: cpal::SampleFormat) -> bool {
    matches!(
        format,
        cpal::SampleFormat::I8
            | cpal::SampleFormat::I16
            | cpal::SampleFormat::I32
            | cpal::SampleFormat::F32
    )
}

/// Pick a supported config that plays the clip as is, preferring f32.
fn matching_config(
    ranges: impl Iterator<Item = cpal::SupportedStreamConfigRange>,
    channels: u16,
    sample_rate: u32,
) -> Option<SupportedStreamConfig> {
    let rate = cpal::SampleRate(sample_rate);
    ranges
        .filter(|range| {
            range.channels() == channels
                && range.min_sample_rate() <= rate
                && rate <= range.max_sample_rate()
                && is_playable_format(range.sample_format())
        })
        .max_by_key(|range| range.sample_format() == cpal::SampleFormat::F32)
        .map(|range| range.with_sample_rate(rate))
}

fn output_config(device: &Device, clip: &DecodedClip) -> Result<SupportedStreamConfig> {
    let ranges = match device.supported_output_configs() {
        Ok(ranges) => Some(ranges),
        Err(e) => {
            warn!(error = %e, "Failed to query output configs");
            None
        }
    };
    if let Some(config) = matching_config(
        ranges.into_iter().flatten(),
        clip.channels,
        clip.sample_rate,
    ) {
        return Ok(config);
    }

    let config = device
        .default_output_config()
        .map_err(|_| AudioError::NoOutputDevice)?;
    debug!(
        clip_channels = clip.channels,
        clip_rate = clip.sample_rate,
        device_channels = config.channels(),
        device_rate = config.sample_rate().0,
        "Converting clip to the default output config"
    );
    Ok(config)
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut cursor: ClipCursor,
    status: Option<mpsc::UnboundedSender<PlaybackStatus>>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let mut scratch = Vec::new();
    let err_fn = move |err| {
        error!("an error occurred on output stream: {}", err);
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            let updates = cursor.fill(&mut scratch);
            for (out, &sample) in data.iter_mut().zip(&scratch) {
                *out = T::from_sample(sample);
            }
            if let Some(status) = &status {
                for update in updates {
                    status.send(update).ok();
                }
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

/// A loaded clip. The output stream only exists while playing.
pub(crate) struct CpalPlayback {
    uri: String,
    device: Device,
    clip: Arc<DecodedClip>,
    stream: Option<cpal::Stream>,
    status: Option<mpsc::UnboundedSender<PlaybackStatus>>,
}

impl CpalPlayback {
    pub(crate) fn load(host: &Host, uri: &str) -> Result<Self> {
        let path =
            path_from_uri(uri).ok_or_else(|| AudioError::resource_load(uri, "not a file uri"))?;
        let clip = decode_wav(&path).map_err(|e| AudioError::resource_load(uri, e))?;
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        info!(
            uri,
            device_name = %device.name().unwrap_or_default(),
            duration_ms = clip.duration_millis(),
            "Loaded clip"
        );

        Ok(Self {
            uri: uri.to_string(),
            device,
            clip: Arc::new(clip),
            stream: None,
            status: None,
        })
    }
}

impl PlaybackHandle for CpalPlayback {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn duration_millis(&self) -> u64 {
        self.clip.duration_millis()
    }

    fn play(&mut self) -> Result<()> {
        if let Some(stream) = &self.stream {
            stream.play()?;
            return Ok(());
        }

        let supported = output_config(&self.device, &self.clip)?;
        let config: StreamConfig = supported.config();
        let cursor = ClipCursor::new(self.clip.clone(), config.channels, config.sample_rate.0);
        let status = self.status.clone();

        let stream = match supported.sample_format() {
            cpal::SampleFormat::I8 => build_stream::<i8>(&self.device, &config, cursor, status)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&self.device, &config, cursor, status)?,
            cpal::SampleFormat::I32 => build_stream::<i32>(&self.device, &config, cursor, status)?,
            cpal::SampleFormat::F32 => build_stream::<f32>(&self.device, &config, cursor, status)?,
            sample_format => {
                return Err(AudioError::SampleFormatNotSupported(format!(
                    "{:?}",
                    sample_format
                )));
            }
        };
        stream.play()?;

        debug!(
            uri = %self.uri,
            channels = config.channels,
            sample_rate = config.sample_rate.0,
            "Started output stream"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            // Pause and ignore errors, dropping the stream releases the device.
            stream.pause().ok();
            debug!(uri = %self.uri, "Stopped output stream");
        }
        Ok(())
    }

    fn subscribe_status(&mut self) -> StatusReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.status = Some(tx);
        rx
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.stop().ok();
    }
}

#[cfg(test)]
mod tests {
    use cpal::{SampleFormat, SampleRate, SupportedBufferSize, SupportedStreamConfigRange};
    use tempfile::tempdir;

    use super::*;

    fn clip(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Arc<DecodedClip> {
        Arc::new(DecodedClip {
            samples,
            channels,
            sample_rate,
        })
    }

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn test_decode_int_wav() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("clip.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        // 1.5 seconds of stereo frames
        for i in 0..(8000 * 3) {
            let sample = if i % 2 == 0 { i16::MAX } else { i16::MIN };
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let clip = decode_wav(&path).unwrap();
        assert_eq!(clip.channels, 2);
        assert_eq!(clip.sample_rate, 8000);
        assert_eq!(clip.duration_millis(), 1500);
        assert!(clip.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_decode_float_wav() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("clip.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..16000 {
            writer.write_sample(0.25f32).unwrap();
        }
        writer.finalize().unwrap();

        let clip = decode_wav(&path).unwrap();
        assert_eq!(clip.duration_millis(), 1000);
        assert_eq!(clip.samples[0], 0.25);
    }

    #[test]
    fn test_decode_missing_file_fails() {
        let temp = tempdir().expect("Failed to create temp dir");
        assert!(decode_wav(&temp.path().join("missing.wav")).is_err());
    }

    #[test]
    fn test_cursor_finishes_once() {
        // 1000 mono frames at 1 kHz, one second
        let mut cursor = ClipCursor::new(clip(vec![0.5; 1000], 1, 1000), 1, 1000);
        let mut buffer = vec![0.0; 400];

        let mut finished = 0;
        for _ in 0..5 {
            finished += cursor
                .fill(&mut buffer)
                .iter()
                .filter(|s| **s == PlaybackStatus::Finished)
                .count();
        }
        assert_eq!(finished, 1);
        assert_eq!(cursor.position_millis(), 1000);
    }

    #[test]
    fn test_cursor_reports_are_spaced() {
        let mut cursor = ClipCursor::new(clip(vec![0.0; 1000], 1, 1000), 1, 1000);
        let mut buffer = vec![0.0; 100];

        let mut positions = Vec::new();
        for _ in 0..10 {
            for status in cursor.fill(&mut buffer) {
                if let PlaybackStatus::Position { position_millis } = status {
                    positions.push(position_millis);
                }
            }
        }
        assert_eq!(positions, [300, 600, 900]);
        assert!(
            positions
                .windows(2)
                .all(|pair| pair[1] - pair[0] >= REPORT_INTERVAL_MS)
        );
    }

    #[test]
    fn test_cursor_empty_clip() {
        let mut cursor = ClipCursor::new(clip(Vec::new(), 2, 48000), 2, 48000);
        let mut buffer = vec![1.0; 64];

        assert_eq!(cursor.fill(&mut buffer), [PlaybackStatus::Finished]);
        assert!(buffer.iter().all(|s| *s == 0.0));
        assert!(cursor.fill(&mut buffer).is_empty());
    }

    #[test]
    fn test_cursor_zero_fills_last_buffer() {
        let mut cursor = ClipCursor::new(clip(vec![0.5; 3], 1, 1000), 1, 1000);
        let mut buffer = vec![1.0; 8];

        cursor.fill(&mut buffer);
        assert_eq!(buffer, [0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cursor_maps_mono_to_stereo() {
        let mut cursor = ClipCursor::new(clip(vec![0.1, 0.2], 1, 1000), 2, 1000);
        let mut buffer = vec![0.0; 6];

        cursor.fill(&mut buffer);
        assert_eq!(buffer, [0.1, 0.1, 0.2, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_cursor_downmixes_to_mono() {
        let mut cursor = ClipCursor::new(clip(vec![0.2, 0.4, -0.5, 0.5], 2, 1000), 1, 1000);
        let mut buffer = vec![1.0; 2];

        cursor.fill(&mut buffer);
        assert!((buffer[0] - 0.3).abs() < 1e-6);
        assert!(buffer[1].abs() < 1e-6);
    }

    #[test]
    fn test_cursor_converts_rate() {
        // 8 kHz clip on a 16 kHz device: every clip frame lasts two output frames.
        let mut cursor = ClipCursor::new(clip(vec![0.0, 1.0, 1.0], 1, 8000), 1, 16000);
        let mut buffer = vec![9.0; 8];

        let updates = cursor.fill(&mut buffer);
        assert_eq!(buffer, [0.0, 0.5, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(updates, [PlaybackStatus::Finished]);
    }

    #[test]
    fn test_matching_config_prefers_f32() {
        let ranges = vec![
            range(2, 44100, 48000, SampleFormat::I16),
            range(2, 44100, 48000, SampleFormat::F32),
            range(1, 8000, 96000, SampleFormat::F32),
        ];
        let config = matching_config(ranges.into_iter(), 2, 48000).unwrap();
        assert_eq!(config.channels(), 2);
        assert_eq!(config.sample_rate(), SampleRate(48000));
        assert_eq!(config.sample_format(), SampleFormat::F32);
    }

    #[test]
    fn test_matching_config_accepts_integer_output() {
        let ranges = vec![range(2, 48000, 48000, SampleFormat::I16)];
        let config = matching_config(ranges.into_iter(), 2, 48000).unwrap();
        assert_eq!(config.sample_format(), SampleFormat::I16);
    }

    #[test]
    fn test_matching_config_none_when_rate_unsupported() {
        let ranges = vec![
            range(2, 44100, 44100, SampleFormat::F32),
            range(2, 48000, 48000, SampleFormat::U16),
        ];
        assert!(matching_config(ranges.into_iter(), 2, 48000).is_none());
    }
}

//! Synthesized audio assets.
//!
//! The cloud synthesizer hands back an opaque encoded clip. [`AudioAsset`]
//! keeps the encoded bytes (system players take them verbatim) and can
//! decode them to mono f32 samples with symphonia for device playback.

use crate::error::{Result, SessionError};
use bytes::Bytes;
use std::time::Duration;

/// Container format of an encoded clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    /// Parse a provider output-format name (`mp3`, `wav`, `pcm_wav`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mp3" | "audio/mpeg" => Some(Self::Mp3),
            "wav" | "wave" | "pcm_wav" | "audio/wav" => Some(Self::Wav),
            _ => None,
        }
    }

    /// Detect the format from the leading bytes of a clip.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return Some(Self::Wav);
        }
        if bytes.starts_with(b"ID3") {
            return Some(Self::Mp3);
        }
        // MPEG audio frame sync: 11 set bits.
        if bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
            return Some(Self::Mp3);
        }
        None
    }

    /// File extension used for scratch files and the symphonia probe hint.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

/// Decoded mono PCM.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// An encoded clip ready for playback.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    bytes: Bytes,
    format: AudioFormat,
}

impl AudioAsset {
    /// Wrap encoded bytes. The format is sniffed from the payload, falling
    /// back to `hint` when the header is not recognisable.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SynthesisFailed`] for an empty payload or an
    /// unknown format.
    pub fn new(bytes: Bytes, hint: Option<AudioFormat>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(SessionError::SynthesisFailed("audio payload is empty".into()));
        }
        let format = AudioFormat::sniff(&bytes)
            .or(hint)
            .ok_or_else(|| SessionError::SynthesisFailed("unrecognised audio format".into()))?;
        Ok(Self { bytes, format })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Check that symphonia can open the clip and find a playable track,
    /// without decoding it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SynthesisFailed`] if the clip is not playable.
    pub fn probe(&self) -> Result<u32> {
        let format = self.open()?;
        let track = format
            .default_track()
            .ok_or_else(|| SessionError::SynthesisFailed("no default audio track".into()))?;
        track
            .codec_params
            .sample_rate
            .ok_or_else(|| SessionError::SynthesisFailed("unknown sample rate".into()))
    }

    /// Decode the whole clip to mono f32 samples.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SynthesisFailed`] if the clip cannot be decoded.
    pub fn decode(&self) -> Result<DecodedAudio> {
        use symphonia::core::audio::SampleBuffer;
        use symphonia::core::codecs::DecoderOptions;
        use symphonia::core::errors::Error as SymphError;

        let mut format = self.open()?;
        let track = format
            .default_track()
            .ok_or_else(|| SessionError::SynthesisFailed("no default audio track".into()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| SessionError::SynthesisFailed("unknown sample rate".into()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| SessionError::SynthesisFailed(format!("failed to create decoder: {e}")))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => {
                    return Err(SessionError::SynthesisFailed(format!("audio read error: {e}")));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphError::DecodeError(_)) => continue,
                Err(e) => {
                    return Err(SessionError::SynthesisFailed(format!("audio decode error: {e}")));
                }
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            let frames = decoded.frames() as u64;
            let required = usize::try_from(frames)
                .unwrap_or(usize::MAX)
                .saturating_mul(channels);

            let needs_new = sample_buf
                .as_ref()
                .is_none_or(|b| b.capacity() < required);
            if needs_new {
                sample_buf = Some(SampleBuffer::<f32>::new(frames, spec));
            } else if let Some(b) = sample_buf.as_mut() {
                b.clear();
            }

            let Some(buf) = sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);
            downmix_into(&mut samples, buf.samples(), channels);
        }

        Ok(DecodedAudio {
            samples,
            sample_rate,
        })
    }

    fn open(&self) -> Result<Box<dyn symphonia::core::formats::FormatReader>> {
        use symphonia::core::formats::FormatOptions;
        use symphonia::core::io::MediaSourceStream;
        use symphonia::core::meta::MetadataOptions;
        use symphonia::core::probe::Hint;

        let cursor = std::io::Cursor::new(self.bytes.clone());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(self.format.extension());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| SessionError::SynthesisFailed(format!("failed to probe audio: {e}")))?;

        Ok(probed.format)
    }
}

fn downmix_into(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    for frame in interleaved.chunks_exact(channels) {
        let sum: f32 = frame.iter().sum();
        out.push(sum / channels as f32);
    }
}

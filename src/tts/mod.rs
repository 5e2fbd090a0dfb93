//! Speech output: a cloud synthesizer with a local fallback, behind one
//! engine that voices at most one utterance at a time.

pub mod cloud;
pub mod engine;
pub mod local;
pub mod voices;

pub use cloud::{CloudSynthesizer, HttpSynthesizer, SynthesisRequest};
pub use engine::{
    OutputSettings, SpeechBackends, SpeechFinished, SpeechOutcome, SpeechOutput, SpeechPath,
    UtteranceId,
};
pub use local::{LocalSynthesizer, LocalUtterance, SystemSpeech};
pub use voices::{VoiceSelection, default_voice, resolve_voice};

//! Speech capture: the recognizer seam and the capture engine.

pub mod engine;
pub mod recognizer;

pub use engine::{CaptureEvent, CaptureFailure, CaptureId, SpeechCapture};
pub use recognizer::{
    ChannelRecognizer, RecognitionErrorKind, RecognitionEvent, RecognitionFeed,
    RecognitionOptions, RecognitionStream, SpeechRecognizer, UnsupportedRecognizer,
};

//! Service modules for the video ingest pipeline
//!
//! Media adapters (yt-dlp, ffmpeg, tesseract, Whisper) wrap external tools
//! behind traits so the pipeline and tests can swap implementations.
//! The analyzer modules are pure logic over the adapters' outputs.

pub mod audio_extractor;
pub mod extraction_gate;
pub mod frame_sampler;
pub mod llm;
pub mod ocr_engine;
pub mod pipeline;
pub mod quality_analyzer;
pub mod refiner;
pub mod sufficiency_analyzer;
pub mod title_resolver;
pub mod transcriber;
pub mod video_fetcher;

pub use audio_extractor::{AudioError, AudioExtractor, FfmpegAudioExtractor};
pub use extraction_gate::{GateDecision, should_skip_ocr};
pub use frame_sampler::{FfmpegFrameSampler, FrameSampler, SampleError, SampledFrame, SamplingMethod};
pub use llm::{create_provider, LlmError, LlmProvider};
pub use ocr_engine::{FrameOcr, OcrError, OcrLine, TesseractOcr, TextRecognizer};
pub use pipeline::IngestPipeline;
pub use quality_analyzer::{FallbackDecision, QualityAnalyzer, QualityResult};
pub use refiner::{RefineOutcome, Refiner};
pub use sufficiency_analyzer::SufficiencyAnalyzer;
pub use title_resolver::TitleResolver;
pub use transcriber::{Transcriber, TranscribeError, WhisperTranscriber};
pub use video_fetcher::{FetchError, FetchedVideo, VideoFetcher, YtDlpFetcher};

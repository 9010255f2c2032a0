//! Shared helpers for ladle-vi integration tests

pub mod fakes;
pub mod ingest_env;

pub use fakes::{
    FakeAudioExtractor, FakeFetcher, FakeFrameSampler, FakeTextRecognizer, FakeTranscriber,
};
pub use ingest_env::{
    build_pipeline, register_job, test_adapters, test_app, test_env, TestAdapters, TestEnv,
};

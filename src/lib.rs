//! # stem-master-core
//!
//! Splits an audio file into a vocal and an instrumental stem with an
//! external two-stem separator, masters both stems with a fixed chain
//! (high-pass, low-pass, static compressor, loudness normalizer) and tracks
//! the work as a job record.

pub mod config;
pub mod core;
pub mod error;
pub mod job;
pub mod separation;
pub mod types;

pub use crate::{
    config::{MasteringConfig, ProcessorConfig, SeparatorConfig},
    core::{
        audio::{read_audio, to_stereo_buffer, write_audio},
        chain::MasteringChain,
    },
    error::{MasterError, Result},
    job::{FsJobStore, InMemoryJobStore, Job, JobProcessor, JobStatus, JobStore},
    separation::{DemucsSeparator, Separator},
    types::{AudioBuffer, AudioData, SampleEncoding, SeparatedStems, StemTag},
};

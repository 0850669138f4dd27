pub mod audio;
pub mod chain;
pub mod dsp;

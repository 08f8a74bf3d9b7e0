//! Core of the AXI display controller driver
//!
//! Pixel-clock synthesis, strided scanout DMA, display power sequencing and
//! frame capture, independent of any particular kernel or HAL. The register
//! block and the DMA channel are consumed through the [`RegisterIo`] and
//! [`DmaEngine`] traits, so everything here runs against mocks on a desktop.
//!
//! # Layers
//!
//! ```text
//! Mode-setting layer (modes, framebuffers, enable/disable)
//!         ↓
//! DisplayPipeline (crtc)          CaptureDevice (capture)
//!         ↓                               ↓
//! clock + registers + dma         dma + completion
//!         ↓                               ↓
//! RegisterIo                      DmaEngine (+ TransferCallback)
//! ```
//!
//! # Features
//!
//! - `std`: Enable standard library support and the [`mocks`] module
//! - `tracing`: Log through `tracing` (implies `std`)
//! - `defmt`: Log through `defmt` and derive `defmt::Format`
//!
//! # Example
//!
//! ```no_run
//! use dispctrl::{
//!     DisplayPipeline, DisplayPowerState, DmaEngine, FramebufferView, RegisterIo, TimingMode,
//! };
//!
//! fn enable<R: RegisterIo, E: DmaEngine>(
//!     pipeline: &mut DisplayPipeline<R, E>,
//!     mode: TimingMode,
//!     fb: FramebufferView,
//! ) -> dispctrl::Result<()> {
//!     pipeline.set_mode(mode, fb)?;
//!     pipeline.set_power(DisplayPowerState::On)
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)]
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this driver crate:
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // error sections live on the public entry points
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

// Must come first so the logging macros are visible in every module.
#[macro_use]
mod fmt;

pub mod capture;
pub mod clock;
pub mod completion;
pub mod config;
pub mod crtc;
pub mod dma;
pub mod error;
pub mod lock_tables;
pub mod mocks;
pub mod registers;
pub mod timing;

pub use capture::{CaptureBuffer, CaptureConfig, CaptureDevice, CaptureSession, CaptureStream};
pub use capture::{FrameGeometry, ReadChunk};
pub use clock::{
    build_registers, encode_count, encode_divider, find_clock_params, synthesize,
    ClockRegisterSet, ClockSearchResult,
};
pub use completion::{Completion, TransferCallback};
pub use config::{LinkKind, PipelineConfig};
pub use crtc::{DisplayPipeline, DisplayPowerState};
pub use dma::{
    Cookie, DataChunk, DescriptorBuilder, DmaEngine, FramebufferView, PrepareFlags,
    StridedTransferDescriptor, TransferDirection,
};
pub use error::{Result, VideoError};
pub use registers::{MmioBlock, RegisterIo};
pub use timing::{validate_mode, AxisTiming, ModeStatus, SyncPolarity, TimingMode};

//! Display power state machine.
//!
//! Owns the register block and the scanout DMA channel of one display
//! controller and sequences them on mode-set, enable, disable and pan.
//!
//! # Ordering
//!
//! Every transition that touches the hardware starts by terminating the
//! scanout channel, so no register is written while a transfer is in
//! flight. Enabling then writes, strictly in this order: control (stop),
//! timing words, clock words, DMA submission, control (start). The timing
//! generator latches geometry before the clock is enabled.
//!
//! Register writes are fire-and-forget. A write that does not land shows up
//! as a wrong or blank picture; it is never reported as an error.

use crate::clock::{self, ClockRegisterSet};
use crate::config::PipelineConfig;
use crate::dma::{
    DescriptorBuilder, DmaEngine, FramebufferView, PrepareFlags, StridedTransferDescriptor,
    TransferDirection,
};
use crate::error::{Result, VideoError};
use crate::registers::{self, RegisterIo, OFST_DISPLAY_CTRL};
use crate::timing::{validate_mode, ModeStatus, TimingMode};

/// Power state of the display output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayPowerState {
    /// Display stopped, no scanout transfer queued.
    #[default]
    Off,
    /// Timing and clock programmed, scanout running.
    On,
}

impl DisplayPowerState {
    /// Lower-case name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
        }
    }
}

/// Everything an enable needs, computed before the first side effect.
struct ScanoutPlan {
    mode: TimingMode,
    clock: ClockRegisterSet,
    descriptor: StridedTransferDescriptor,
}

/// One display controller: register block `R` plus scanout channel `E`.
pub struct DisplayPipeline<R: RegisterIo, E: DmaEngine> {
    config: PipelineConfig,
    builder: DescriptorBuilder,
    io: R,
    engine: E,
    state: DisplayPowerState,
    mode: Option<TimingMode>,
    framebuffer: Option<FramebufferView>,
}

impl<R: RegisterIo, E: DmaEngine> DisplayPipeline<R, E> {
    /// New pipeline, `Off`, with no mode selected. Touches no hardware.
    pub fn new(config: PipelineConfig, io: R, engine: E) -> Self {
        Self {
            config,
            builder: DescriptorBuilder::from_config(&config),
            io,
            engine,
            state: DisplayPowerState::Off,
            mode: None,
            framebuffer: None,
        }
    }

    /// Current power state.
    pub fn state(&self) -> DisplayPowerState {
        self.state
    }

    /// Selected mode, if any.
    pub fn mode(&self) -> Option<&TimingMode> {
        self.mode.as_ref()
    }

    /// Framebuffer currently scanned out (or to be, once enabled).
    pub fn framebuffer(&self) -> Option<&FramebufferView> {
        self.framebuffer.as_ref()
    }

    /// Pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Register block.
    pub fn io(&self) -> &R {
        &self.io
    }

    /// Scanout DMA channel.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Give back the register block and DMA channel.
    pub fn release(self) -> (R, E) {
        (self.io, self.engine)
    }

    /// Select `mode` scanning out of `framebuffer`.
    ///
    /// While `On`, the hardware is reprogrammed immediately; while `Off`,
    /// the mode is only recorded.
    ///
    /// # Errors
    ///
    /// - [`VideoError::InvalidParameter`] if the controller cannot drive
    ///   the mode (see [`validate_mode`])
    /// - [`VideoError::InvalidGeometry`] if the framebuffer cannot hold the
    ///   visible area
    /// - [`VideoError::ClockUnsynthesizable`] (only while `On`)
    /// - DMA errors from re-arming scanout (only while `On`)
    ///
    /// On a validation error the previous mode stays selected and running.
    pub fn set_mode(&mut self, mode: TimingMode, framebuffer: FramebufferView) -> Result<()> {
        let status = validate_mode(&mode, &self.config);
        if status != ModeStatus::Ok {
            warn!(
                "mode {}x{} @ {} kHz rejected",
                mode.hdisplay(),
                mode.vdisplay(),
                mode.pixel_clock_khz
            );
            return Err(VideoError::InvalidParameter);
        }

        if self.state == DisplayPowerState::On {
            let plan = self.plan(&mode, &framebuffer)?;
            self.mode = Some(mode);
            self.framebuffer = Some(framebuffer);
            self.apply(&plan)
        } else {
            self.builder
                .build(&framebuffer, &mode, TransferDirection::MemToDev)?;
            self.mode = Some(mode);
            self.framebuffer = Some(framebuffer);
            Ok(())
        }
    }

    /// Move the pipeline to `target`.
    ///
    /// `On` while already `On` terminates the running transfer and
    /// resubmits; nothing is ever double-submitted. `Off` while `Off` still
    /// terminates and stops the display.
    ///
    /// # Errors
    ///
    /// - [`VideoError::InvalidState`] when enabling without a mode
    /// - [`VideoError::ClockUnsynthesizable`] when the mode's clock cannot
    ///   be produced within tolerance; no hardware is touched
    /// - [`VideoError::InvalidGeometry`] from descriptor construction; no
    ///   hardware is touched
    /// - [`VideoError::EngineExhausted`] / [`VideoError::SubmitRejected`]
    ///   from the DMA engine; the pipeline is left `Off`
    pub fn set_power(&mut self, target: DisplayPowerState) -> Result<()> {
        match target {
            DisplayPowerState::On => {
                let (Some(mode), Some(framebuffer)) = (self.mode, self.framebuffer) else {
                    return Err(VideoError::InvalidState);
                };
                let plan = self.plan(&mode, &framebuffer)?;
                self.apply(&plan)
            }
            DisplayPowerState::Off => {
                self.engine.terminate_all();
                self.io.write(OFST_DISPLAY_CTRL, registers::control_word(false, false));
                self.transition(DisplayPowerState::Off);
                Ok(())
            }
        }
    }

    /// Scan out `framebuffer` (typically a new window offset) without
    /// touching timing or clock registers.
    ///
    /// # Errors
    ///
    /// - [`VideoError::InvalidState`] without a selected mode
    /// - [`VideoError::InvalidGeometry`] if the new window does not fit;
    ///   the previous view keeps scanning
    /// - DMA errors from resubmission; the pipeline is left `Off`
    pub fn pan(&mut self, framebuffer: FramebufferView) -> Result<()> {
        let mode = self.mode.ok_or(VideoError::InvalidState)?;
        let descriptor = self
            .builder
            .build(&framebuffer, &mode, TransferDirection::MemToDev)?;
        self.framebuffer = Some(framebuffer);

        if self.state == DisplayPowerState::On {
            debug!("pan to ({}, {})", framebuffer.offset.x, framebuffer.offset.y);
            self.engine.terminate_all();
            if let Err(e) = self.start_scanout(&descriptor) {
                self.io.write(OFST_DISPLAY_CTRL, registers::control_word(false, false));
                self.transition(DisplayPowerState::Off);
                return Err(e);
            }
        }
        Ok(())
    }

    fn plan(&self, mode: &TimingMode, framebuffer: &FramebufferView) -> Result<ScanoutPlan> {
        let target_hz = mode.pll_target_hz(self.config.link);
        let search = clock::synthesize(
            self.config.input_clock_hz,
            target_hz,
            self.config.clock_tolerance_ppm,
        )?;
        let clock = search
            .registers()
            .map_err(|_| VideoError::ClockUnsynthesizable)?;
        let descriptor = self
            .builder
            .build(framebuffer, mode, TransferDirection::MemToDev)?;
        Ok(ScanoutPlan {
            mode: *mode,
            clock,
            descriptor,
        })
    }

    fn apply(&mut self, plan: &ScanoutPlan) -> Result<()> {
        self.engine.terminate_all();
        self.io.write(OFST_DISPLAY_CTRL, registers::control_word(false, false));

        registers::write_timing(&mut self.io, &plan.mode);
        registers::write_clock(&mut self.io, &plan.clock);

        if let Err(e) = self.start_scanout(&plan.descriptor) {
            self.transition(DisplayPowerState::Off);
            return Err(e);
        }

        self.io.write(
            OFST_DISPLAY_CTRL,
            registers::control_word(true, self.config.invert_pixel_clock),
        );
        info!(
            "display on: {}x{} @ {} kHz",
            plan.mode.hdisplay(),
            plan.mode.vdisplay(),
            plan.mode.pixel_clock_khz
        );
        self.transition(DisplayPowerState::On);
        Ok(())
    }

    fn start_scanout(&mut self, descriptor: &StridedTransferDescriptor) -> Result<()> {
        let Some(transfer) = self
            .engine
            .prepare_interleaved(descriptor, PrepareFlags::INTERRUPT | PrepareFlags::CTRL_ACK)
        else {
            error!("scanout: failed to prepare DMA descriptor");
            return Err(VideoError::EngineExhausted);
        };
        self.engine
            .submit(transfer)
            .map_err(|_| VideoError::SubmitRejected)?;
        self.engine.issue_pending();
        Ok(())
    }

    fn transition(&mut self, next: DisplayPowerState) {
        if self.state != next {
            info!("display power {} -> {}", self.state.as_str(), next.as_str());
        }
        self.state = next;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::mocks::{MockDmaEngine, MockRegisters};
    use crate::timing::AxisTiming;

    fn svga() -> TimingMode {
        TimingMode::new(
            40_000,
            AxisTiming::new(800, 840, 968, 1056),
            AxisTiming::new(600, 601, 605, 628),
        )
    }

    fn fb() -> FramebufferView {
        FramebufferView::new(0x2000_0000, 3200, 32)
    }

    fn pipeline() -> DisplayPipeline<MockRegisters, MockDmaEngine> {
        DisplayPipeline::new(
            PipelineConfig::default(),
            MockRegisters::new(),
            MockDmaEngine::new(),
        )
    }

    #[test]
    fn enabling_without_mode_is_invalid_state() {
        let mut p = pipeline();
        assert_eq!(
            p.set_power(DisplayPowerState::On),
            Err(VideoError::InvalidState)
        );
        assert!(p.io().writes().is_empty());
    }

    #[test]
    fn set_mode_while_off_touches_no_hardware() {
        let mut p = pipeline();
        p.set_mode(svga(), fb()).unwrap();
        assert!(p.io().writes().is_empty());
        assert_eq!(p.engine().submit_count(), 0);
        assert_eq!(p.state(), DisplayPowerState::Off);
    }

    #[test]
    fn enable_then_disable() {
        let mut p = pipeline();
        p.set_mode(svga(), fb()).unwrap();
        p.set_power(DisplayPowerState::On).unwrap();
        assert_eq!(p.state(), DisplayPowerState::On);
        assert_eq!(p.engine().submit_count(), 1);
        assert_eq!(p.io().last_write(), Some((OFST_DISPLAY_CTRL, 1)));

        p.set_power(DisplayPowerState::Off).unwrap();
        assert_eq!(p.state(), DisplayPowerState::Off);
        assert_eq!(p.io().last_write(), Some((OFST_DISPLAY_CTRL, 0)));
        assert_eq!(p.engine().active_transfers(), 0);
    }

    #[test]
    fn inverted_pixel_clock_sets_control_bit() {
        let cfg = PipelineConfig::default().with_inverted_pixel_clock(true);
        let mut p = DisplayPipeline::new(cfg, MockRegisters::new(), MockDmaEngine::new());
        p.set_mode(svga(), fb()).unwrap();
        p.set_power(DisplayPowerState::On).unwrap();
        assert_eq!(p.io().last_write(), Some((OFST_DISPLAY_CTRL, 0b11)));
    }

    #[test]
    fn exhausted_engine_leaves_pipeline_off() {
        let mut p = pipeline();
        p.set_mode(svga(), fb()).unwrap();
        p.engine.set_exhausted(true);
        assert_eq!(
            p.set_power(DisplayPowerState::On),
            Err(VideoError::EngineExhausted)
        );
        assert_eq!(p.state(), DisplayPowerState::Off);
        // Display was stopped and never restarted.
        assert!(p
            .io()
            .writes()
            .iter()
            .filter(|(offset, _)| *offset == OFST_DISPLAY_CTRL)
            .all(|(_, value)| *value == 0));
    }

    #[test]
    fn rejected_mode_keeps_previous_one() {
        let mut p = pipeline();
        p.set_mode(svga(), fb()).unwrap();
        let interlaced = svga().with_interlace(true);
        assert_eq!(
            p.set_mode(interlaced, fb()),
            Err(VideoError::InvalidParameter)
        );
        assert_eq!(p.mode(), Some(&svga()));
    }

    #[test]
    fn pan_resubmits_without_register_writes() {
        let mut p = pipeline();
        let surface = FramebufferView::new(0x2000_0000, 4096, 32);
        p.set_mode(svga(), surface).unwrap();
        p.set_power(DisplayPowerState::On).unwrap();
        let writes_before = p.io().writes().len();

        let panned = surface.with_offset(embedded_graphics::geometry::Point::new(16, 8));
        p.pan(panned).unwrap();

        assert_eq!(p.io().writes().len(), writes_before);
        assert_eq!(p.engine().submit_count(), 2);
        assert_eq!(p.engine().active_transfers(), 1);
        let d = p.engine().last_descriptor().unwrap();
        assert_eq!(d.src_start, 0x2000_0000 + 8 * 4096 + 16 * 4);
    }

    #[test]
    fn pan_out_of_bounds_keeps_old_view() {
        let mut p = pipeline();
        p.set_mode(svga(), fb()).unwrap();
        let bad = fb().with_offset(embedded_graphics::geometry::Point::new(1, 0));
        assert_eq!(p.pan(bad), Err(VideoError::InvalidGeometry));
        assert_eq!(p.framebuffer(), Some(&fb()));
    }
}

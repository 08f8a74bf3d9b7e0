//! Mock hardware for testing
//!
//! Recording doubles for the register block and the DMA engine. Both can
//! share one [`HardwareJournal`] so tests can assert the relative order of
//! register writes and DMA calls.

#![cfg(any(test, feature = "std"))]

use core::cell::RefCell;
use std::rc::Rc;

use crate::completion::TransferCallback;
use crate::dma::{Cookie, DmaEngine, PrepareFlags, StridedTransferDescriptor};
use crate::registers::RegisterIo;

/// Journal capacity; later events are dropped.
pub const JOURNAL_CAPACITY: usize = 256;

/// One observed hardware interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwEvent {
    /// Register write.
    Write {
        /// Byte offset.
        offset: u32,
        /// Value written.
        value: u32,
    },
    /// `terminate_all`.
    TerminateAll,
    /// Successful `prepare_interleaved`.
    Prepare,
    /// Accepted `submit`.
    Submit(Cookie),
    /// `issue_pending`.
    IssuePending,
}

/// Ordered log of hardware interactions.
#[derive(Debug, Default)]
pub struct HardwareJournal {
    events: RefCell<heapless::Vec<HwEvent, JOURNAL_CAPACITY>>,
}

impl HardwareJournal {
    /// Empty journal, ready to share.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn record(&self, event: HwEvent) {
        let mut events = self.events.borrow_mut();
        if events.len() < events.capacity() {
            let _ = events.push(event);
        }
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> heapless::Vec<HwEvent, JOURNAL_CAPACITY> {
        self.events.borrow().clone()
    }

    /// Index of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&HwEvent) -> bool) -> Option<usize> {
        self.events.borrow().iter().position(pred)
    }

    /// Index of the last event matching `pred`.
    pub fn last_position(&self, pred: impl Fn(&HwEvent) -> bool) -> Option<usize> {
        self.events.borrow().iter().rposition(pred)
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

/// Mock register block
pub struct MockRegisters {
    journal: Rc<HardwareJournal>,
}

impl MockRegisters {
    /// Create a mock with its own journal
    pub fn new() -> Self {
        Self::with_journal(HardwareJournal::new())
    }

    /// Create a mock recording into `journal`
    pub fn with_journal(journal: Rc<HardwareJournal>) -> Self {
        Self { journal }
    }

    /// All register writes, in order
    pub fn writes(&self) -> heapless::Vec<(u32, u32), JOURNAL_CAPACITY> {
        self.journal
            .events()
            .iter()
            .filter_map(|e| match *e {
                HwEvent::Write { offset, value } => Some((offset, value)),
                _ => None,
            })
            .collect()
    }

    /// Most recent write
    pub fn last_write(&self) -> Option<(u32, u32)> {
        self.writes().last().copied()
    }

    /// Most recent value written at `offset`
    pub fn value_at(&self, offset: u32) -> Option<u32> {
        self.writes()
            .iter()
            .rev()
            .find(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
    }
}

impl Default for MockRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterIo for MockRegisters {
    fn write(&mut self, offset: u32, value: u32) {
        self.journal.record(HwEvent::Write { offset, value });
    }
}

/// Transfer prepared by [`MockDmaEngine`].
pub struct MockTransfer {
    descriptor: StridedTransferDescriptor,
    flags: PrepareFlags,
    callback: Option<&'static dyn TransferCallback>,
}

impl MockTransfer {
    /// Descriptor this transfer was prepared from.
    pub fn descriptor(&self) -> &StridedTransferDescriptor {
        &self.descriptor
    }

    /// Prepare flags.
    pub fn flags(&self) -> PrepareFlags {
        self.flags
    }
}

/// Submission refused by [`MockDmaEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSubmitError;

/// Mock DMA channel
///
/// Issued transfers complete immediately (their callback runs inside
/// `issue_pending`) unless auto-completion is disabled, which models a
/// hung capture source.
pub struct MockDmaEngine {
    journal: Rc<HardwareJournal>,
    descriptors: heapless::Vec<StridedTransferDescriptor, 16>,
    last_flags: Option<PrepareFlags>,
    pending: heapless::Vec<MockTransfer, 8>,
    next_cookie: u32,
    exhausted: bool,
    reject_submit: bool,
    auto_complete: bool,
    active: usize,
    max_active: usize,
    prepare_count: usize,
    submit_count: usize,
    terminate_count: usize,
    issue_count: usize,
    completions: usize,
}

impl MockDmaEngine {
    /// Create a mock with its own journal
    pub fn new() -> Self {
        Self::with_journal(HardwareJournal::new())
    }

    /// Create a mock recording into `journal`
    pub fn with_journal(journal: Rc<HardwareJournal>) -> Self {
        Self {
            journal,
            descriptors: heapless::Vec::new(),
            last_flags: None,
            pending: heapless::Vec::new(),
            next_cookie: 1,
            exhausted: false,
            reject_submit: false,
            auto_complete: true,
            active: 0,
            max_active: 0,
            prepare_count: 0,
            submit_count: 0,
            terminate_count: 0,
            issue_count: 0,
            completions: 0,
        }
    }

    /// Make `prepare_interleaved` return `None`
    pub fn set_exhausted(&mut self, exhausted: bool) {
        self.exhausted = exhausted;
    }

    /// Make `submit` fail
    pub fn set_reject_submit(&mut self, reject: bool) {
        self.reject_submit = reject;
    }

    /// Complete issued transfers immediately (default) or never
    pub fn set_auto_complete(&mut self, auto_complete: bool) {
        self.auto_complete = auto_complete;
    }

    /// Successful `prepare_interleaved` calls
    pub fn prepare_count(&self) -> usize {
        self.prepare_count
    }

    /// Accepted submissions
    pub fn submit_count(&self) -> usize {
        self.submit_count
    }

    /// `terminate_all` calls
    pub fn terminate_count(&self) -> usize {
        self.terminate_count
    }

    /// `issue_pending` calls
    pub fn issue_count(&self) -> usize {
        self.issue_count
    }

    /// Completion callbacks fired
    pub fn completion_count(&self) -> usize {
        self.completions
    }

    /// Transfers submitted since the last `terminate_all`
    pub fn active_transfers(&self) -> usize {
        self.active
    }

    /// Highest `active_transfers` ever observed
    pub fn max_active_transfers(&self) -> usize {
        self.max_active
    }

    /// Descriptors passed to successful `prepare_interleaved` calls
    pub fn descriptors(&self) -> &[StridedTransferDescriptor] {
        &self.descriptors
    }

    /// Most recently prepared descriptor
    pub fn last_descriptor(&self) -> Option<StridedTransferDescriptor> {
        self.descriptors.last().copied()
    }

    /// Flags of the most recent preparation
    pub fn last_flags(&self) -> Option<PrepareFlags> {
        self.last_flags
    }
}

impl Default for MockDmaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaEngine for MockDmaEngine {
    type Transfer = MockTransfer;
    type Error = MockSubmitError;

    fn terminate_all(&mut self) {
        self.terminate_count = self.terminate_count.saturating_add(1);
        self.pending.clear();
        self.active = 0;
        self.journal.record(HwEvent::TerminateAll);
    }

    fn prepare_interleaved(
        &mut self,
        descriptor: &StridedTransferDescriptor,
        flags: PrepareFlags,
    ) -> Option<MockTransfer> {
        if self.exhausted {
            return None;
        }
        self.prepare_count = self.prepare_count.saturating_add(1);
        if self.descriptors.len() < self.descriptors.capacity() {
            let _ = self.descriptors.push(*descriptor);
        }
        self.last_flags = Some(flags);
        self.journal.record(HwEvent::Prepare);
        Some(MockTransfer {
            descriptor: *descriptor,
            flags,
            callback: None,
        })
    }

    fn set_callback(&mut self, transfer: &mut MockTransfer, callback: &'static dyn TransferCallback) {
        transfer.callback = Some(callback);
    }

    fn submit(&mut self, transfer: MockTransfer) -> Result<Cookie, MockSubmitError> {
        if self.reject_submit || self.pending.push(transfer).is_err() {
            return Err(MockSubmitError);
        }
        let cookie = Cookie(self.next_cookie);
        self.next_cookie = self.next_cookie.wrapping_add(1);
        self.submit_count = self.submit_count.saturating_add(1);
        self.active = self.active.saturating_add(1);
        self.max_active = self.max_active.max(self.active);
        self.journal.record(HwEvent::Submit(cookie));
        Ok(cookie)
    }

    fn issue_pending(&mut self) {
        self.issue_count = self.issue_count.saturating_add(1);
        self.journal.record(HwEvent::IssuePending);
        if !self.auto_complete {
            return;
        }
        for transfer in self.pending.iter() {
            if let Some(callback) = transfer.callback {
                if transfer.flags.contains(PrepareFlags::INTERRUPT) {
                    callback.transfer_complete();
                    self.completions = self.completions.saturating_add(1);
                }
            }
        }
        self.pending.clear();
    }
}

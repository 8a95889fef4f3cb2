//! Common test utilities and mock collaborators

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use usbdisp::error::{HdmiError, I2cError, RegisterError, TransportError};
use usbdisp::regs;
use usbdisp::{
    Adapter, AdapterIo, BulkTransport, ChipRevision, Clock, ColorFormat, CompletionStatus,
    DisplayMode, DisplayParams, EndOfFrame, Frame, HdmiChip, I2cBus, LinkSpeed, Pipeline,
    PipelineConfig, Presence, Rejected, RegisterIo, Transfer,
};

// ═══════════════════════════════════════════════════════════════════════════
// REGISTERS
// ═══════════════════════════════════════════════════════════════════════════

/// In-memory register file.
///
/// Writes are logged. A "stuck" register always reads a fixed value; a
/// "failing" one errors on every access. The soft-reset bit self-clears.
#[derive(Default)]
pub struct MockRegisters {
    values: Mutex<HashMap<u32, u32>>,
    writes: Mutex<Vec<(u32, u32)>>,
    stuck: Mutex<HashMap<u32, u32>>,
    failing: Mutex<HashSet<u32>>,
    gone: AtomicBool,
}

impl MockRegisters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn preset(&self, offset: u32, value: u32) {
        self.values.lock().unwrap().insert(offset, value);
    }

    pub fn value(&self, offset: u32) -> u32 {
        self.values.lock().unwrap().get(&offset).copied().unwrap_or(0)
    }

    pub fn stick(&self, offset: u32, value: u32) {
        self.stuck.lock().unwrap().insert(offset, value);
    }

    pub fn fail(&self, offset: u32) {
        self.failing.lock().unwrap().insert(offset);
    }

    pub fn unplug(&self) {
        self.gone.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_to(&self, offset: u32) -> Vec<u32> {
        self.writes()
            .into_iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn clear_log(&self) {
        self.writes.lock().unwrap().clear();
    }

    fn check(&self, offset: u32) -> Result<(), RegisterError> {
        if self.gone.load(Ordering::SeqCst) {
            return Err(RegisterError::NoDevice);
        }
        if self.failing.lock().unwrap().contains(&offset) {
            return Err(RegisterError::Io(-5));
        }
        Ok(())
    }
}

impl RegisterIo for MockRegisters {
    fn read(&self, offset: u32) -> Result<u32, RegisterError> {
        self.check(offset)?;
        if let Some(value) = self.stuck.lock().unwrap().get(&offset) {
            return Ok(*value);
        }
        Ok(self.value(offset))
    }

    fn write(&self, offset: u32, value: u32) -> Result<(), RegisterError> {
        self.check(offset)?;
        self.writes.lock().unwrap().push((offset, value));
        let stored = if offset == regs::APP_RESET {
            value & !(1 << regs::APP_RESET_BIT)
        } else {
            value
        };
        self.values.lock().unwrap().insert(offset, stored);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TRANSPORT
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Completed with `Ok` inside `submit`.
    Inline,
    /// Held until the test completes them.
    Deferred,
    /// Completed with `Ok` from a worker thread after a delay.
    Worker(Duration),
}

#[derive(Default)]
pub struct TransportState {
    held: Mutex<VecDeque<Transfer>>,
    in_flight: Mutex<HashSet<u16>>,
    lengths: Mutex<Vec<usize>>,
    submitted: AtomicUsize,
    double_submits: AtomicUsize,
}

impl TransportState {
    fn landed(&self, transfer: &Transfer) {
        if let Some(index) = transfer.buffer_index() {
            self.in_flight.lock().unwrap().remove(&index);
        }
    }
}

pub struct MockTransport {
    mode: CompletionMode,
    state: Arc<TransportState>,
    worker: Mutex<Option<mpsc::Sender<Transfer>>>,
    reject: Mutex<Option<TransportError>>,
    speed: Mutex<LinkSpeed>,
    select_error: Mutex<Option<TransportError>>,
    interface_selects: AtomicUsize,
}

impl MockTransport {
    pub fn new(mode: CompletionMode) -> Arc<Self> {
        let state = Arc::new(TransportState::default());

        let worker = match mode {
            CompletionMode::Worker(delay) => {
                let (tx, rx) = mpsc::channel::<Transfer>();
                let state = state.clone();
                thread::spawn(move || {
                    while let Ok(transfer) = rx.recv() {
                        thread::sleep(delay);
                        state.landed(&transfer);
                        transfer.complete(CompletionStatus::Ok);
                    }
                });
                Some(tx)
            }
            _ => None,
        };

        Arc::new(Self {
            mode,
            state,
            worker: Mutex::new(worker),
            reject: Mutex::new(None),
            speed: Mutex::new(LinkSpeed::SuperSpeed),
            select_error: Mutex::new(None),
            interface_selects: AtomicUsize::new(0),
        })
    }

    pub fn set_reject(&self, error: Option<TransportError>) {
        *self.reject.lock().unwrap() = error;
    }

    pub fn set_speed(&self, speed: LinkSpeed) {
        *self.speed.lock().unwrap() = speed;
    }

    pub fn fail_select(&self, error: Option<TransportError>) {
        *self.select_error.lock().unwrap() = error;
    }

    pub fn interface_selects(&self) -> usize {
        self.interface_selects.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> usize {
        self.state.submitted.load(Ordering::SeqCst)
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.state.lengths.lock().unwrap().clone()
    }

    pub fn held(&self) -> usize {
        self.state.held.lock().unwrap().len()
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.lock().unwrap().len()
    }

    /// Buffers seen in flight twice at once.
    pub fn double_submits(&self) -> usize {
        self.state.double_submits.load(Ordering::SeqCst)
    }

    /// Complete every held transfer with `status`. Returns how many.
    pub fn complete_all(&self, status: CompletionStatus) -> usize {
        let held: Vec<Transfer> = self.state.held.lock().unwrap().drain(..).collect();
        let count = held.len();
        for transfer in held {
            self.state.landed(&transfer);
            transfer.complete(status);
        }
        count
    }

    /// Complete the oldest held transfer.
    pub fn complete_one(&self, status: CompletionStatus) -> bool {
        let next = self.state.held.lock().unwrap().pop_front();
        match next {
            Some(transfer) => {
                self.state.landed(&transfer);
                transfer.complete(status);
                true
            }
            None => false,
        }
    }
}

impl BulkTransport for MockTransport {
    fn submit(&self, transfer: Transfer) -> Result<(), Rejected> {
        if let Some(error) = *self.reject.lock().unwrap() {
            return Err(Rejected { transfer, error });
        }

        self.state.submitted.fetch_add(1, Ordering::SeqCst);
        self.state.lengths.lock().unwrap().push(transfer.len());
        if let Some(index) = transfer.buffer_index() {
            if !self.state.in_flight.lock().unwrap().insert(index) {
                self.state.double_submits.fetch_add(1, Ordering::SeqCst);
            }
        }

        match self.mode {
            CompletionMode::Inline => {
                self.state.landed(&transfer);
                transfer.complete(CompletionStatus::Ok);
            }
            CompletionMode::Deferred => self.state.held.lock().unwrap().push_back(transfer),
            CompletionMode::Worker(_) => {
                let worker = self.worker.lock().unwrap();
                if let Some(tx) = worker.as_ref() {
                    if let Err(mpsc::SendError(transfer)) = tx.send(transfer) {
                        self.state.landed(&transfer);
                        transfer.complete(CompletionStatus::Shutdown);
                    }
                }
            }
        }
        Ok(())
    }

    fn select_interface(&self) -> Result<(), TransportError> {
        self.interface_selects.fetch_add(1, Ordering::SeqCst);
        match *self.select_error.lock().unwrap() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn link_speed(&self) -> LinkSpeed {
        *self.speed.lock().unwrap()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CLOCK, I2C, HDMI
// ═══════════════════════════════════════════════════════════════════════════

pub struct StdClock {
    start: Instant,
}

impl StdClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { start: Instant::now() })
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn delay_ms(&self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

/// DDC slave serving a fixed 128-byte block.
pub struct MockI2c {
    pub block: [u8; 128],
    pub reads: AtomicUsize,
}

impl MockI2c {
    pub fn new() -> Arc<Self> {
        let mut block = [0u8; 128];
        for (i, b) in block.iter_mut().enumerate() {
            *b = i as u8;
        }
        // no extensions
        block[126] = 0;
        Arc::new(Self {
            block,
            reads: AtomicUsize::new(0),
        })
    }
}

impl I2cBus for MockI2c {
    fn read_dword(&self, addr: u8, offset: u8) -> Result<u32, I2cError> {
        if addr != 0x50 {
            return Err(I2cError::Nak);
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        let o = offset as usize;
        Ok(u32::from_le_bytes([
            self.block[o],
            self.block[o + 1],
            self.block[o + 2],
            self.block[o + 3],
        ]))
    }
}

#[derive(Default)]
pub struct MockHdmi {
    pub powered: AtomicBool,
    pub resets: AtomicUsize,
    pub power_ups: AtomicUsize,
    pub fail_init: AtomicBool,
    /// `resolution_changed` of every init call.
    pub inits: Mutex<Vec<bool>>,
    pub edid_reads: AtomicUsize,
}

impl MockHdmi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inits(&self) -> Vec<bool> {
        self.inits.lock().unwrap().clone()
    }
}

impl HdmiChip for MockHdmi {
    fn reset(&self) -> Result<(), HdmiError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_powered_up(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }

    fn power_up(&self) -> Result<(), HdmiError> {
        self.power_ups.fetch_add(1, Ordering::SeqCst);
        self.powered.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn init(&self, _params: &DisplayParams, resolution_changed: bool) -> Result<(), HdmiError> {
        self.inits.lock().unwrap().push(resolution_changed);
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(HdmiError::NotResponding);
        }
        Ok(())
    }

    fn read_edid_block(&self, block: u8, out: &mut [u8; 128]) -> Result<(), HdmiError> {
        self.edid_reads.fetch_add(1, Ordering::SeqCst);
        out.fill(0xA0 + block);
        if block == 0 {
            out[126] = 1;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PIPELINE HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Small pipeline with short waits.
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        render_contexts: 4,
        transfer_buffers: 4,
        buffer_capacity: 64,
        busy_cap: 1,
        acquire_timeout_ms: 20,
        enqueue_retries: 2,
        enqueue_backoff_ms: 1,
        stop_poll_ms: 1,
        end_of_frame: EndOfFrame::None,
        i2c_delay_ms: 0,
    }
}

pub struct Fixture {
    pub pipeline: Arc<Pipeline>,
    pub transport: Arc<MockTransport>,
    pub presence: Arc<Presence>,
}

pub fn pipeline(config: PipelineConfig, mode: CompletionMode) -> Fixture {
    let transport = MockTransport::new(mode);
    let presence = Arc::new(Presence::new());
    let pipeline = Pipeline::new(config, transport.clone(), StdClock::new(), presence.clone())
        .expect("valid config");
    Fixture {
        pipeline,
        transport,
        presence,
    }
}

impl Fixture {
    /// Negotiate a 24-bit mode, mark a monitor present and turn the green light on.
    pub fn stream(&self, width: u32, height: u32) {
        let mode = DisplayMode::rgb24(width, height, 60);
        self.pipeline
            .set_params(Some(DisplayParams::negotiate(&mode, LinkSpeed::SuperSpeed)));
        self.presence.mark(true);
        assert!(self.pipeline.start());
    }
}

/// Tightly packed 24-bit frame with a byte ramp.
pub fn frame(width: u32, height: u32, frame_num: u64) -> Frame {
    let len = (width * height * 3) as usize;
    let pixels: Vec<u8> = (0..len).map(|i| i as u8).collect();
    Frame::new(pixels.into(), width, height, ColorFormat::Rgb24, frame_num)
}

// ═══════════════════════════════════════════════════════════════════════════
// ADAPTER HELPERS
// ═══════════════════════════════════════════════════════════════════════════

pub struct AdapterFixture {
    pub adapter: Adapter,
    pub regs: Arc<MockRegisters>,
    pub transport: Arc<MockTransport>,
    pub hdmi: Option<Arc<MockHdmi>>,
    pub i2c: Option<Arc<MockI2c>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Wiring {
    pub hdmi: bool,
    pub i2c: bool,
}

pub fn adapter(revision: ChipRevision, wiring: Wiring) -> AdapterFixture {
    let regs = MockRegisters::new();
    let transport = MockTransport::new(CompletionMode::Inline);
    let hdmi = wiring.hdmi.then(MockHdmi::new);
    let i2c = wiring.i2c.then(MockI2c::new);

    let io = AdapterIo {
        regs: regs.clone(),
        transport: transport.clone(),
        clock: StdClock::new(),
        i2c: i2c.clone().map(|bus| bus as Arc<dyn I2cBus>),
        hdmi: hdmi.clone().map(|chip| chip as Arc<dyn HdmiChip>),
    };
    let adapter = Adapter::new(io, test_config(), revision).expect("valid config");

    AdapterFixture {
        adapter,
        regs,
        transport,
        hdmi,
        i2c,
    }
}

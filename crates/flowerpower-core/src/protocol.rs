//! The history download state machine.
//!
//! [`StateMachine`] is a sans-IO automaton: it never talks to the device
//! itself. Each call to [`StateMachine::handle_event`] consumes one
//! [`Event`] and returns the [`Command`]s the caller must execute, in order.
//! Completions of those commands (and device notifications) are turned back
//! into events with [`Completion::into_event`].
//!
//! Transitions live in a static table keyed by `(State, EventKind)`. The
//! action of a transition is an ordered list of [`Step`]s. Steps that inspect
//! a status byte may raise a derived event (for example
//! [`Event::TxStatusIdle`]), which is dispatched from the new state before
//! `handle_event` returns.
//!
//! ```text
//! Standby -> WaitingLedOn -> ReadingTxStatus -> CheckingTxStatusDuringInit
//!   -> [CancellingTransfer] -> InitializingTime -> ... -> InitializingNumberOfEntries
//!   -> InitializingTxBuffer -> InitializingTxStatus -> InitializingTransferIndex
//!   -> SettingRxStatusToReceiving -> ReceivingFirstBuffer
//!   -> ReceivingBuffers <-> CheckingTxStatusDuringTransfer <-> SettingRxStatusToAck
//!   -> WaitingLedOff -> Finished
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use flowerpower_types::{Characteristic, HistoryLog, RxControl, TxStatus};

use crate::error::{Error, Result};
use crate::session::Session;

/// Source of the host's wall clock, in Unix seconds.
pub type HostClock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// The system clock.
#[must_use]
pub fn system_clock() -> HostClock {
    Arc::new(|| OffsetDateTime::now_utc().unix_timestamp())
}

/// States of the download automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Standby,
    WaitingLedOn,
    ReadingTxStatus,
    CheckingTxStatusDuringInit,
    CancellingTransfer,
    InitializingTime,
    InitializingSessionId,
    InitializingMeasurementPeriod,
    InitializingSessionStartIndex,
    InitializingLastEntryIndex,
    InitializingNumberOfEntries,
    InitializingTxBuffer,
    InitializingTxStatus,
    InitializingTransferIndex,
    SettingRxStatusToReceiving,
    ReceivingFirstBuffer,
    ReceivingBuffers,
    CheckingTxStatusDuringTransfer,
    SettingRxStatusToAck,
    WaitingLedOff,
    Finished,
}

impl State {
    /// Kebab-case name, as used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            State::Standby => "standby",
            State::WaitingLedOn => "waiting-led-on",
            State::ReadingTxStatus => "reading-tx-status",
            State::CheckingTxStatusDuringInit => "checking-tx-status-during-init",
            State::CancellingTransfer => "cancelling-transfer",
            State::InitializingTime => "initializing-time",
            State::InitializingSessionId => "initializing-session-id",
            State::InitializingMeasurementPeriod => "initializing-measurement-period",
            State::InitializingSessionStartIndex => "initializing-session-start-index",
            State::InitializingLastEntryIndex => "initializing-last-entry-index",
            State::InitializingNumberOfEntries => "initializing-number-of-entries",
            State::InitializingTxBuffer => "initializing-tx-buffer",
            State::InitializingTxStatus => "initializing-tx-status",
            State::InitializingTransferIndex => "initializing-transfer-index",
            State::SettingRxStatusToReceiving => "setting-rx-status-to-receiving",
            State::ReceivingFirstBuffer => "receiving-first-buffer",
            State::ReceivingBuffers => "receiving-buffers",
            State::CheckingTxStatusDuringTransfer => "checking-tx-status-during-transfer",
            State::SettingRxStatusToAck => "setting-rx-status-to-ack",
            State::WaitingLedOff => "waiting-led-off",
            State::Finished => "finished",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Protocol events. Value-carrying events hold the raw characteristic bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Begin a download.
    Start,
    /// The LED write completed.
    LedOk,
    /// A tx_status value was read or notified.
    TxStatus(Bytes),
    /// Derived: the transfer status is idle.
    TxStatusIdle,
    /// Derived: the transfer status is not idle during initialization.
    TxStatusNotIdle,
    /// Derived: the device waits for an acknowledgement.
    TxStatusAwaitingAck,
    /// Derived: the device is sending fragments.
    TxStatusTransferring,
    /// The rx_status write completed.
    RxStatusReady,
    Time(Bytes),
    SessionId(Bytes),
    MeasurementPeriod(Bytes),
    SessionStartIndex(Bytes),
    LastEntryIndex(Bytes),
    NumberOfEntries(Bytes),
    /// tx_buffer notifications are enabled.
    BufferNotifyReady,
    /// tx_status notifications are enabled.
    StatusNotifyReady,
    /// The transfer_start_index write completed.
    TransferIndexReady,
    /// A tx_buffer fragment was notified.
    BufferData(Bytes),
}

/// Payload-free discriminant of an [`Event`], used as the transition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    LedOk,
    TxStatus,
    TxStatusIdle,
    TxStatusNotIdle,
    TxStatusAwaitingAck,
    TxStatusTransferring,
    RxStatusReady,
    Time,
    SessionId,
    MeasurementPeriod,
    SessionStartIndex,
    LastEntryIndex,
    NumberOfEntries,
    BufferNotifyReady,
    StatusNotifyReady,
    TransferIndexReady,
    BufferData,
}

impl EventKind {
    /// Kebab-case name, as used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::LedOk => "led-ok",
            EventKind::TxStatus => "tx-status",
            EventKind::TxStatusIdle => "tx-status-idle",
            EventKind::TxStatusNotIdle => "tx-status-not-idle",
            EventKind::TxStatusAwaitingAck => "tx-status-awaiting-ack",
            EventKind::TxStatusTransferring => "tx-status-transferring",
            EventKind::RxStatusReady => "rx-status-ready",
            EventKind::Time => "time",
            EventKind::SessionId => "session-id",
            EventKind::MeasurementPeriod => "measurement-period",
            EventKind::SessionStartIndex => "session-start-index",
            EventKind::LastEntryIndex => "last-entry-index",
            EventKind::NumberOfEntries => "number-of-entries",
            EventKind::BufferNotifyReady => "buffer-notify-ready",
            EventKind::StatusNotifyReady => "status-notify-ready",
            EventKind::TransferIndexReady => "transfer-index-ready",
            EventKind::BufferData => "buffer-data",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Event {
    /// The event's discriminant.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Start => EventKind::Start,
            Event::LedOk => EventKind::LedOk,
            Event::TxStatus(_) => EventKind::TxStatus,
            Event::TxStatusIdle => EventKind::TxStatusIdle,
            Event::TxStatusNotIdle => EventKind::TxStatusNotIdle,
            Event::TxStatusAwaitingAck => EventKind::TxStatusAwaitingAck,
            Event::TxStatusTransferring => EventKind::TxStatusTransferring,
            Event::RxStatusReady => EventKind::RxStatusReady,
            Event::Time(_) => EventKind::Time,
            Event::SessionId(_) => EventKind::SessionId,
            Event::MeasurementPeriod(_) => EventKind::MeasurementPeriod,
            Event::SessionStartIndex(_) => EventKind::SessionStartIndex,
            Event::LastEntryIndex(_) => EventKind::LastEntryIndex,
            Event::NumberOfEntries(_) => EventKind::NumberOfEntries,
            Event::BufferNotifyReady => EventKind::BufferNotifyReady,
            Event::StatusNotifyReady => EventKind::StatusNotifyReady,
            Event::TransferIndexReady => EventKind::TransferIndexReady,
            Event::BufferData(_) => EventKind::BufferData,
        }
    }

    fn into_payload(self) -> Bytes {
        match self {
            Event::TxStatus(data)
            | Event::Time(data)
            | Event::SessionId(data)
            | Event::MeasurementPeriod(data)
            | Event::SessionStartIndex(data)
            | Event::LastEntryIndex(data)
            | Event::NumberOfEntries(data)
            | Event::BufferData(data) => data,
            _ => Bytes::new(),
        }
    }
}

/// A device request issued by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Read a characteristic; completes with [`Completion::Value`].
    Read(Characteristic),
    /// Write one byte; completes with [`Completion::WriteComplete`].
    WriteByte(Characteristic, u8),
    /// Write a little-endian u32; completes with [`Completion::WriteComplete`].
    WriteU32Le(Characteristic, u32),
    /// Enable notifications; completes with [`Completion::NotifyEnabled`].
    RegisterNotifications(Characteristic),
    /// The history is complete: persist this log. Has no completion.
    Store(HistoryLog),
}

/// Something the device reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A read returned or a notification arrived.
    Value {
        characteristic: Characteristic,
        data: Bytes,
    },
    /// A write was acknowledged.
    WriteComplete(Characteristic),
    /// Notifications were enabled.
    NotifyEnabled(Characteristic),
}

impl Completion {
    /// Map a completion to the protocol event it stands for.
    ///
    /// Returns `None` for completions the protocol does not react to.
    #[must_use]
    pub fn into_event(self) -> Option<Event> {
        match self {
            Completion::NotifyEnabled(Characteristic::TxBuffer) => Some(Event::BufferNotifyReady),
            Completion::NotifyEnabled(Characteristic::TxStatus) => Some(Event::StatusNotifyReady),
            Completion::NotifyEnabled(_) => None,

            Completion::WriteComplete(Characteristic::RxStatus) => Some(Event::RxStatusReady),
            Completion::WriteComplete(Characteristic::TransferStartIndex) => {
                Some(Event::TransferIndexReady)
            }
            Completion::WriteComplete(Characteristic::Led) => Some(Event::LedOk),
            Completion::WriteComplete(_) => None,

            Completion::Value {
                characteristic,
                data,
            } => match characteristic {
                Characteristic::TxStatus => Some(Event::TxStatus(data)),
                Characteristic::TxBuffer => Some(Event::BufferData(data)),
                Characteristic::Clock => Some(Event::Time(data)),
                Characteristic::SessionId => Some(Event::SessionId(data)),
                Characteristic::MeasurementPeriod => Some(Event::MeasurementPeriod(data)),
                Characteristic::SessionStartIndex => Some(Event::SessionStartIndex(data)),
                Characteristic::LastEntryIndex => Some(Event::LastEntryIndex(data)),
                Characteristic::NumberEntries => Some(Event::NumberOfEntries(data)),
                Characteristic::TransferStartIndex
                | Characteristic::RxStatus
                | Characteristic::Led => None,
            },
        }
    }
}

/// One primitive action of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Led(bool),
    Read(Characteristic),
    WriteRx(RxControl),
    Subscribe(Characteristic),
    StoreTime,
    StoreSessionId,
    StorePeriod,
    StoreSessionStartIndex,
    StoreLastEntryIndex,
    StoreNumberEntries,
    WriteTransferStartIndex,
    CheckStatusDuringInit,
    CheckStatusDuringTransfer,
    FirstBuffer,
    NextBuffer,
    StoreLog,
}

/// What the dispatcher does after a step.
enum StepOutcome {
    Continue,
    /// Commit the transition, then dispatch this event from the new state.
    Raise(Event),
    /// Abandon the transition and stay in the current state.
    Stay,
}

struct Transition {
    from: State,
    event: EventKind,
    to: State,
    steps: &'static [Step],
}

const fn t(from: State, event: EventKind, to: State, steps: &'static [Step]) -> Transition {
    Transition {
        from,
        event,
        to,
        steps,
    }
}

use Characteristic as C;
use EventKind as E;
use State as S;

static TRANSITIONS: &[Transition] = &[
    t(S::Standby, E::Start, S::WaitingLedOn, &[Step::Led(true)]),
    t(S::WaitingLedOn, E::LedOk, S::ReadingTxStatus, &[Step::Read(C::TxStatus)]),
    t(
        S::ReadingTxStatus,
        E::TxStatus,
        S::CheckingTxStatusDuringInit,
        &[Step::CheckStatusDuringInit],
    ),
    t(
        S::CheckingTxStatusDuringInit,
        E::TxStatusNotIdle,
        S::CancellingTransfer,
        &[Step::WriteRx(RxControl::Cancel)],
    ),
    t(
        S::CheckingTxStatusDuringInit,
        E::TxStatusIdle,
        S::InitializingTime,
        &[Step::Read(C::Clock)],
    ),
    t(
        S::CancellingTransfer,
        E::RxStatusReady,
        S::InitializingTime,
        &[Step::Read(C::Clock)],
    ),
    t(
        S::InitializingTime,
        E::Time,
        S::InitializingSessionId,
        &[Step::StoreTime, Step::Read(C::SessionId)],
    ),
    t(
        S::InitializingSessionId,
        E::SessionId,
        S::InitializingMeasurementPeriod,
        &[Step::StoreSessionId, Step::Read(C::MeasurementPeriod)],
    ),
    t(
        S::InitializingMeasurementPeriod,
        E::MeasurementPeriod,
        S::InitializingSessionStartIndex,
        &[Step::StorePeriod, Step::Read(C::SessionStartIndex)],
    ),
    t(
        S::InitializingSessionStartIndex,
        E::SessionStartIndex,
        S::InitializingLastEntryIndex,
        &[Step::StoreSessionStartIndex, Step::Read(C::LastEntryIndex)],
    ),
    t(
        S::InitializingLastEntryIndex,
        E::LastEntryIndex,
        S::InitializingNumberOfEntries,
        &[Step::StoreLastEntryIndex, Step::Read(C::NumberEntries)],
    ),
    t(
        S::InitializingNumberOfEntries,
        E::NumberOfEntries,
        S::InitializingTxBuffer,
        &[Step::StoreNumberEntries, Step::Subscribe(C::TxBuffer)],
    ),
    t(
        S::InitializingTxBuffer,
        E::BufferNotifyReady,
        S::InitializingTxStatus,
        &[Step::Subscribe(C::TxStatus)],
    ),
    t(
        S::InitializingTxStatus,
        E::StatusNotifyReady,
        S::InitializingTransferIndex,
        &[Step::WriteTransferStartIndex],
    ),
    t(
        S::InitializingTransferIndex,
        E::TransferIndexReady,
        S::SettingRxStatusToReceiving,
        &[Step::WriteRx(RxControl::Receiving)],
    ),
    t(
        S::SettingRxStatusToReceiving,
        E::RxStatusReady,
        S::ReceivingFirstBuffer,
        &[],
    ),
    t(S::ReceivingFirstBuffer, E::TxStatus, S::ReceivingFirstBuffer, &[]),
    t(
        S::ReceivingFirstBuffer,
        E::BufferData,
        S::ReceivingBuffers,
        &[Step::FirstBuffer],
    ),
    t(
        S::ReceivingBuffers,
        E::BufferData,
        S::ReceivingBuffers,
        &[Step::NextBuffer],
    ),
    t(
        S::ReceivingBuffers,
        E::TxStatus,
        S::CheckingTxStatusDuringTransfer,
        &[Step::CheckStatusDuringTransfer],
    ),
    t(
        S::CheckingTxStatusDuringTransfer,
        E::TxStatusAwaitingAck,
        S::SettingRxStatusToAck,
        &[Step::WriteRx(RxControl::Ack)],
    ),
    t(
        S::CheckingTxStatusDuringTransfer,
        E::TxStatusTransferring,
        S::ReceivingBuffers,
        &[],
    ),
    t(
        S::CheckingTxStatusDuringTransfer,
        E::TxStatusIdle,
        S::WaitingLedOff,
        &[Step::StoreLog, Step::Led(false)],
    ),
    t(
        S::SettingRxStatusToAck,
        E::RxStatusReady,
        S::ReceivingBuffers,
        &[],
    ),
    t(S::WaitingLedOff, E::LedOk, S::Finished, &[]),
];

fn find_transition(state: State, event: EventKind) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|tr| tr.from == state && tr.event == event)
}

/// Whether the table defines a transition for `(state, event)`.
#[must_use]
pub fn has_transition(state: State, event: EventKind) -> bool {
    find_transition(state, event).is_some()
}

/// Decode a little-endian unsigned integer of 1 to 8 bytes.
fn le_value(what: &str, data: &[u8]) -> Result<u64> {
    if data.is_empty() || data.len() > 8 {
        return Err(Error::invalid_data(format!(
            "{what}: expected 1 to 8 bytes, got {}",
            data.len()
        )));
    }
    Ok(data
        .iter()
        .rev()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte)))
}

fn le_u32(what: &str, data: &[u8]) -> Result<u32> {
    let value = le_value(what, data)?;
    u32::try_from(value)
        .map_err(|_| Error::invalid_data(format!("{what}: {value} does not fit in 32 bits")))
}

fn status_byte(data: &[u8]) -> Result<u8> {
    data.first()
        .copied()
        .ok_or_else(|| Error::invalid_data("empty tx_status value"))
}

/// The download automaton for one device.
pub struct StateMachine {
    address: String,
    state: State,
    session: Session,
    clock: HostClock,
    unexpected_status_count: u32,
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("session", &self.session)
            .field("unexpected_status_count", &self.unexpected_status_count)
            .finish_non_exhaustive()
    }
}

impl StateMachine {
    /// Create a machine in [`State::Standby`] for the device at `address`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_clock(address, system_clock())
    }

    /// Create a machine that reads the host time from `clock`.
    #[must_use]
    pub fn with_clock(address: impl Into<String>, clock: HostClock) -> Self {
        Self {
            address: address.into(),
            state: State::Standby,
            session: Session::new(),
            clock,
            unexpected_status_count: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the download reached [`State::Finished`].
    #[must_use]
    pub fn finished(&self) -> bool {
        self.state == State::Finished
    }

    /// The session accumulated so far.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Device address the log will be stored under.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// How many unrecognized tx_status bytes arrived during the transfer.
    #[must_use]
    pub fn unexpected_status_count(&self) -> u32 {
        self.unexpected_status_count
    }

    /// Process one event and return the commands to execute, in order.
    ///
    /// # Errors
    ///
    /// - [`Error::ProtocolViolation`] if the table has no transition for the
    ///   current state and `event`. Neither the state nor the session change.
    /// - [`Error::InvalidData`] if a characteristic value is malformed.
    /// - [`Error::MissingFragment`] or [`Error::Parse`] if the completed
    ///   history buffer cannot be reassembled or decoded.
    pub fn handle_event(&mut self, event: Event) -> Result<Vec<Command>> {
        let mut commands = Vec::new();
        self.dispatch(event, &mut commands)?;
        Ok(commands)
    }

    fn dispatch(&mut self, event: Event, commands: &mut Vec<Command>) -> Result<()> {
        let kind = event.kind();
        let transition = find_transition(self.state, kind).ok_or(Error::ProtocolViolation {
            state: self.state,
            event: kind,
        })?;

        let payload = event.into_payload();
        let mut raised = None;
        for step in transition.steps {
            match self.run_step(*step, &payload, commands)? {
                StepOutcome::Continue => {}
                StepOutcome::Raise(derived) => raised = Some(derived),
                StepOutcome::Stay => return Ok(()),
            }
        }

        debug!(from = %transition.from, event = %kind, to = %transition.to, "transition");
        self.state = transition.to;

        match raised {
            Some(derived) => self.dispatch(derived, commands),
            None => Ok(()),
        }
    }

    fn run_step(
        &mut self,
        step: Step,
        payload: &Bytes,
        commands: &mut Vec<Command>,
    ) -> Result<StepOutcome> {
        match step {
            Step::Led(on) => commands.push(Command::WriteByte(C::Led, u8::from(on))),
            Step::Read(characteristic) => commands.push(Command::Read(characteristic)),
            Step::WriteRx(control) => commands.push(Command::WriteByte(C::RxStatus, control as u8)),
            Step::Subscribe(characteristic) => {
                commands.push(Command::RegisterNotifications(characteristic));
            }
            Step::StoreTime => {
                let device_time = le_value("clock", payload)?;
                self.session.device_time = i64::try_from(device_time).map_err(|_| {
                    Error::invalid_data(format!("clock: {device_time} out of range"))
                })?;
                self.session.host_time = (self.clock)();
                debug!(
                    host_time = self.session.host_time,
                    device_time = self.session.device_time,
                    "clock offset captured"
                );
            }
            Step::StoreSessionId => self.session.session_id = le_u32("session_id", payload)?,
            Step::StorePeriod => {
                self.session.measurement_period = le_u32("measurement_period", payload)?;
            }
            Step::StoreSessionStartIndex => {
                self.session.session_start_index = le_u32("session_start_index", payload)?;
            }
            Step::StoreLastEntryIndex => {
                self.session.last_entry_index = le_u32("last_entry_index", payload)?;
            }
            Step::StoreNumberEntries => {
                self.session.number_entries = le_u32("number_entries", payload)?;
            }
            Step::WriteTransferStartIndex => {
                let first = self.session.compute_first_entry_index()?;
                info!(
                    last_entry_index = self.session.last_entry_index,
                    number_entries = self.session.number_entries,
                    first_entry_index = first,
                    "requesting history transfer"
                );
                commands.push(Command::WriteU32Le(C::TransferStartIndex, first));
            }
            Step::CheckStatusDuringInit => {
                let status = status_byte(payload)?;
                let derived = if status == TxStatus::Idle as u8 {
                    Event::TxStatusIdle
                } else {
                    debug!(status, "device is mid-transfer, cancelling");
                    Event::TxStatusNotIdle
                };
                return Ok(StepOutcome::Raise(derived));
            }
            Step::CheckStatusDuringTransfer => {
                let status = status_byte(payload)?;
                return Ok(match TxStatus::try_from(status) {
                    Ok(TxStatus::AwaitingAck) => StepOutcome::Raise(Event::TxStatusAwaitingAck),
                    Ok(TxStatus::Transferring) => StepOutcome::Raise(Event::TxStatusTransferring),
                    Ok(TxStatus::Idle) => StepOutcome::Raise(Event::TxStatusIdle),
                    Err(unknown) => {
                        self.unexpected_status_count += 1;
                        warn!(
                            status = unknown,
                            count = self.unexpected_status_count,
                            "unexpected tx_status during transfer, ignoring"
                        );
                        StepOutcome::Stay
                    }
                });
            }
            Step::FirstBuffer => {
                self.session.start_buffer(payload.clone())?;
            }
            Step::NextBuffer => {
                let sequence = self.session.store_fragment(payload.clone())?;
                if self.session.fragment_count % 64 == 0 {
                    debug!(
                        sequence,
                        fragments = self.session.fragment_count,
                        bytes = self.session.bytes_received,
                        expected = self.session.expected_length,
                        "transfer progress"
                    );
                }
            }
            Step::StoreLog => {
                self.session.decode()?;
                let log = self.session.to_log(&self.address);
                info!(
                    measurements = log.len(),
                    fragments = self.session.fragment_count,
                    "history complete"
                );
                commands.push(Command::Store(log));
            }
        }
        Ok(StepOutcome::Continue)
    }
}

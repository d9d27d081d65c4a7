//! Bluetooth UUIDs for Parrot Flower Power devices.
//!
//! This module contains the services and characteristics needed to pull the
//! measurement history out of a Flower Power over Bluetooth Low Energy, and
//! the [`Characteristic`] enum that names them logically.

use core::fmt;

use uuid::{Uuid, uuid};

// --- Services ---

/// Live service (real-time values, status LED).
pub const LIVE_SERVICE: Uuid = uuid!("39e1fa00-84a8-11e2-afba-0002a5d5c51b");

/// Upload service used to stream the history buffer to the host.
pub const UPLOAD_SERVICE: Uuid = uuid!("39e1fb00-84a8-11e2-afba-0002a5d5c51b");

/// History service describing the stored measurement session.
pub const HISTORY_SERVICE: Uuid = uuid!("39e1fc00-84a8-11e2-afba-0002a5d5c51b");

/// Clock service.
pub const CLOCK_SERVICE: Uuid = uuid!("39e1fd00-84a8-11e2-afba-0002a5d5c51b");

// --- Live service characteristics ---

/// Status LED (write 1 to turn on, 0 to turn off).
pub const LED: Uuid = uuid!("39e1fa07-84a8-11e2-afba-0002a5d5c51b");

// --- Upload service characteristics ---

/// Notifying characteristic carrying history buffer fragments.
pub const TX_BUFFER: Uuid = uuid!("39e1fb01-84a8-11e2-afba-0002a5d5c51b");

/// Device-side transfer status (idle, transferring, awaiting ack).
pub const TX_STATUS: Uuid = uuid!("39e1fb02-84a8-11e2-afba-0002a5d5c51b");

/// Host-side control byte (receiving, ack, cancel, ...).
pub const RX_STATUS: Uuid = uuid!("39e1fb03-84a8-11e2-afba-0002a5d5c51b");

// --- History service characteristics ---

/// Number of entries stored on the device.
pub const ENTRIES_NUMBER: Uuid = uuid!("39e1fc01-84a8-11e2-afba-0002a5d5c51b");

/// Absolute index of the most recent entry.
pub const LAST_ENTRY_INDEX: Uuid = uuid!("39e1fc02-84a8-11e2-afba-0002a5d5c51b");

/// Index of the first entry to transfer (written by the host).
pub const TRANSFER_START_INDEX: Uuid = uuid!("39e1fc03-84a8-11e2-afba-0002a5d5c51b");

/// Current session identifier.
pub const SESSION_ID: Uuid = uuid!("39e1fc04-84a8-11e2-afba-0002a5d5c51b");

/// Absolute index of the first entry of the current session.
pub const SESSION_START_INDEX: Uuid = uuid!("39e1fc05-84a8-11e2-afba-0002a5d5c51b");

/// Measurement period in seconds.
pub const SESSION_PERIOD: Uuid = uuid!("39e1fc06-84a8-11e2-afba-0002a5d5c51b");

// --- Clock service characteristics ---

/// Device clock, seconds since the device started.
pub const CLOCK_TIME: Uuid = uuid!("39e1fd01-84a8-11e2-afba-0002a5d5c51b");

/// Logical names of the characteristics the download protocol talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Characteristic {
    Clock,
    SessionId,
    MeasurementPeriod,
    SessionStartIndex,
    LastEntryIndex,
    NumberEntries,
    TransferStartIndex,
    TxBuffer,
    TxStatus,
    RxStatus,
    Led,
}

impl Characteristic {
    /// Every characteristic, in resolution order.
    pub const ALL: [Characteristic; 11] = [
        Characteristic::Clock,
        Characteristic::SessionId,
        Characteristic::MeasurementPeriod,
        Characteristic::SessionStartIndex,
        Characteristic::LastEntryIndex,
        Characteristic::NumberEntries,
        Characteristic::TransferStartIndex,
        Characteristic::TxBuffer,
        Characteristic::TxStatus,
        Characteristic::RxStatus,
        Characteristic::Led,
    ];

    /// The characteristic's UUID.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        match self {
            Characteristic::Clock => CLOCK_TIME,
            Characteristic::SessionId => SESSION_ID,
            Characteristic::MeasurementPeriod => SESSION_PERIOD,
            Characteristic::SessionStartIndex => SESSION_START_INDEX,
            Characteristic::LastEntryIndex => LAST_ENTRY_INDEX,
            Characteristic::NumberEntries => ENTRIES_NUMBER,
            Characteristic::TransferStartIndex => TRANSFER_START_INDEX,
            Characteristic::TxBuffer => TX_BUFFER,
            Characteristic::TxStatus => TX_STATUS,
            Characteristic::RxStatus => RX_STATUS,
            Characteristic::Led => LED,
        }
    }

    /// The UUID of the service that owns this characteristic.
    #[must_use]
    pub const fn service(self) -> Uuid {
        match self {
            Characteristic::Clock => CLOCK_SERVICE,
            Characteristic::SessionId
            | Characteristic::MeasurementPeriod
            | Characteristic::SessionStartIndex
            | Characteristic::LastEntryIndex
            | Characteristic::NumberEntries
            | Characteristic::TransferStartIndex => HISTORY_SERVICE,
            Characteristic::TxBuffer | Characteristic::TxStatus | Characteristic::RxStatus => {
                UPLOAD_SERVICE
            }
            Characteristic::Led => LIVE_SERVICE,
        }
    }

    /// Look up the logical name for a UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.uuid() == uuid)
    }

    /// Short snake_case name, as used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Characteristic::Clock => "clock",
            Characteristic::SessionId => "session_id",
            Characteristic::MeasurementPeriod => "measurement_period",
            Characteristic::SessionStartIndex => "session_start_index",
            Characteristic::LastEntryIndex => "last_entry_index",
            Characteristic::NumberEntries => "number_entries",
            Characteristic::TransferStartIndex => "transfer_start_index",
            Characteristic::TxBuffer => "tx_buffer",
            Characteristic::TxStatus => "tx_status",
            Characteristic::RxStatus => "rx_status",
            Characteristic::Led => "led",
        }
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

use core::fmt;

/// Why a single packet exchange did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    /// The device had nothing to send or could not accept data yet.
    Nak,
    /// The endpoint rejected the request.
    Stall,
    /// Bus error, babble, CRC or toggle mismatch, or the channel halted
    /// without telling us why.
    Error,
    /// The channel neither completed nor failed in time.
    Timeout,
}

impl TransferError {
    /// Only a NAK is worth trying again.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Nak)
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nak => "NAK",
            Self::Stall => "STALL",
            Self::Error => "transaction error",
            Self::Timeout => "timeout",
        })
    }
}

/// Bytes moved by a successful packet exchange, or why it failed.
pub type TransferResult = core::result::Result<usize, TransferError>;

/// The part of a transfer that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Data,
    Status,
    /// A poll of the HID interrupt-IN endpoint.
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbError {
    /// The power controller refused to switch the USB block on.
    PowerOnFailed,
    /// The identity register did not carry the DWC2 signature.
    UnknownController(u32),
    NoDevice,
    PortEnableTimeout,
    Transfer { stage: Stage, cause: TransferError },
    /// The configuration has no interrupt-IN endpoint.
    NoInterruptEndpoint,
    NotEnumerated,
}

impl UsbError {
    /// The packet-level failure behind this error, if there is one.
    pub fn transfer_cause(&self) -> Option<TransferError> {
        match self {
            Self::Transfer { cause, .. } => Some(*cause),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.transfer_cause().map_or(false, TransferError::is_retryable)
    }
}

impl From<UsbError> for &'static str {
    fn from(value: UsbError) -> Self {
        match value {
            UsbError::PowerOnFailed => "USB block power-on was refused",
            UsbError::UnknownController(_) => "not a DWC2 USB controller",
            UsbError::NoDevice => "no USB device connected",
            UsbError::PortEnableTimeout => "USB port did not enable after reset",
            UsbError::Transfer { stage: Stage::Setup, .. } => "USB control transfer failed in SETUP stage",
            UsbError::Transfer { stage: Stage::Data, .. } => "USB control transfer failed in DATA stage",
            UsbError::Transfer { stage: Stage::Status, .. } => "USB control transfer failed in STATUS stage",
            UsbError::Transfer { stage: Stage::Interrupt, .. } => "USB interrupt transfer failed",
            UsbError::NoInterruptEndpoint => "USB device has no interrupt-IN endpoint",
            UsbError::NotEnumerated => "USB device is not enumerated",
        }
    }
}

impl fmt::Display for UsbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownController(id) => write!(f, "not a DWC2 USB controller (id {:#010x})", id),
            Self::Transfer { stage, cause } => write!(f, "{:?} stage: {}", stage, cause),
            other => f.write_str((*other).into()),
        }
    }
}

pub type Result<T> = core::result::Result<T, UsbError>;

//! Synchronous serial peripheral boundary

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiRole {
    Master,
    Slave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockPolarity {
    IdleLow,
    IdleHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockPhase {
    /// Sample on the leading edge
    Leading,
    /// Sample on the trailing edge
    Trailing,
}

/// SCK divider applied to the peripheral clock
///
/// `Div2`, `Div8` and `Div32` need the double-speed bit on parts that
/// encode the divider as a 2-bit prescaler plus a doubler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockDivider {
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl ClockDivider {
    pub const fn divisor(self) -> u32 {
        match self {
            Self::Div2 => 2,
            Self::Div4 => 4,
            Self::Div8 => 8,
            Self::Div16 => 16,
            Self::Div32 => 32,
            Self::Div64 => 64,
            Self::Div128 => 128,
        }
    }

    /// Resulting SCK frequency for a given peripheral clock
    pub const fn frequency(self, clock_hz: u32) -> u32 {
        clock_hz / self.divisor()
    }
}

/// Control register contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiControl {
    pub role: SpiRole,
    pub bit_order: BitOrder,
    pub polarity: ClockPolarity,
    pub phase: ClockPhase,
    pub divider: ClockDivider,
    /// Transfer-complete interrupt enable
    pub interrupt: bool,
}

/// Status register snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiStatus {
    pub transfer_complete: bool,
    pub write_collision: bool,
}

/// Register-level access to one SPI peripheral
///
/// Reading the data register after a completed transfer clears the
/// completion and collision flags, as on most 8-bit parts.
pub trait SpiRegisters {
    /// Set bus line directions for the given role
    fn configure_pins(&self, role: SpiRole);

    /// Write the control register and enable the peripheral
    fn configure(&self, control: SpiControl);

    fn write_data(&self, byte: u8);

    fn read_data(&self) -> u8;

    fn status(&self) -> SpiStatus;
}

impl<T: SpiRegisters + ?Sized> SpiRegisters for &T {
    fn configure_pins(&self, role: SpiRole) {
        T::configure_pins(self, role)
    }

    fn configure(&self, control: SpiControl) {
        T::configure(self, control)
    }

    fn write_data(&self, byte: u8) {
        T::write_data(self, byte)
    }

    fn read_data(&self) -> u8 {
        T::read_data(self)
    }

    fn status(&self) -> SpiStatus {
        T::status(self)
    }
}

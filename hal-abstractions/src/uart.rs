//! Asynchronous serial peripheral boundary

/// USART operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommunicationMode {
    Asynchronous,
    Synchronous,
    MasterSpi,
}

/// Receiver oversampling in asynchronous mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AsynchronousMode {
    /// 16 samples per bit
    Normal,
    /// 8 samples per bit, doubles the reachable baud rate
    DoubleSpeed,
}

impl AsynchronousMode {
    /// Clock cycles per bit used by the baud divisor formula
    pub const fn samples_per_bit(self) -> u32 {
        match self {
            Self::Normal => 16,
            Self::DoubleSpeed => 8,
        }
    }
}

/// Supported line rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Baudrate {
    Baud2400,
    Baud4800,
    Baud9600,
    Baud14400,
    Baud19200,
    Baud38400,
    Baud57600,
    Baud76900,
    Baud115200,
}

impl Baudrate {
    pub const fn bits_per_second(self) -> u32 {
        match self {
            Self::Baud2400 => 2_400,
            Self::Baud4800 => 4_800,
            Self::Baud9600 => 9_600,
            Self::Baud14400 => 14_400,
            Self::Baud19200 => 19_200,
            Self::Baud38400 => 38_400,
            Self::Baud57600 => 57_600,
            Self::Baud76900 => 76_900,
            Self::Baud115200 => 115_200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    pub const fn count(self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Everything the frame-format register needs in one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameFormat {
    pub mode: CommunicationMode,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

/// Receiver/transmitter enables and their interrupt enables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartControl {
    pub receiver: bool,
    pub transmitter: bool,
    pub rx_complete_interrupt: bool,
    pub tx_complete_interrupt: bool,
}

/// Register-level access to one USART peripheral
///
/// Methods take `&self` because peripheral registers are shared between the
/// main-loop driver and the interrupt handlers; implementations perform
/// volatile accesses.
pub trait UartRegisters {
    /// Program the 12-bit baud rate divisor
    fn set_baud_divisor(&self, divisor: u16);

    /// Select 8x (double speed) or 16x oversampling
    fn set_double_speed(&self, enabled: bool);

    fn set_frame_format(&self, format: FrameFormat);

    fn enable(&self, control: UartControl);

    /// Enable or disable the data-register-empty interrupt
    fn set_data_register_empty_interrupt(&self, enabled: bool);

    fn read_data(&self) -> u8;

    fn write_data(&self, byte: u8);
}

impl<T: UartRegisters + ?Sized> UartRegisters for &T {
    fn set_baud_divisor(&self, divisor: u16) {
        T::set_baud_divisor(self, divisor)
    }

    fn set_double_speed(&self, enabled: bool) {
        T::set_double_speed(self, enabled)
    }

    fn set_frame_format(&self, format: FrameFormat) {
        T::set_frame_format(self, format)
    }

    fn enable(&self, control: UartControl) {
        T::enable(self, control)
    }

    fn set_data_register_empty_interrupt(&self, enabled: bool) {
        T::set_data_register_empty_interrupt(self, enabled)
    }

    fn read_data(&self) -> u8 {
        T::read_data(self)
    }

    fn write_data(&self, byte: u8) {
        T::write_data(self, byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baudrate_values() {
        assert_eq!(Baudrate::Baud2400.bits_per_second(), 2_400);
        assert_eq!(Baudrate::Baud76900.bits_per_second(), 76_900);
        assert_eq!(Baudrate::Baud115200.bits_per_second(), 115_200);
    }

    #[test]
    fn test_oversampling() {
        assert_eq!(AsynchronousMode::Normal.samples_per_bit(), 16);
        assert_eq!(AsynchronousMode::DoubleSpeed.samples_per_bit(), 8);
    }
}

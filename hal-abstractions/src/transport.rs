//! Byte-stream transport capability

/// A serial byte-stream transport (UART or SPI)
///
/// Consumers such as the network chip driver depend on this trait only, never
/// on the concrete peripheral driver behind it.
pub trait Transport {
    /// Queue one byte for transmission
    fn send(&mut self, byte: u8);

    /// Queue a block of bytes for transmission
    fn send_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.send(byte);
        }
    }

    /// Send a string, stopping at the first NUL byte if there is one
    fn send_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.send_bytes(&bytes[..end]);
    }

    /// Number of received bytes waiting to be read
    fn is_read_data_available(&self) -> usize;

    /// Take the oldest received byte, `None` when nothing has arrived
    fn read_byte(&mut self) -> Option<u8>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, byte: u8) {
        T::send(self, byte)
    }

    fn send_bytes(&mut self, bytes: &[u8]) {
        T::send_bytes(self, bytes)
    }

    fn send_string(&mut self, s: &str) {
        T::send_string(self, s)
    }

    fn is_read_data_available(&self) -> usize {
        T::is_read_data_available(self)
    }

    fn read_byte(&mut self) -> Option<u8> {
        T::read_byte(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        sent: [u8; 16],
        len: usize,
    }

    impl Transport for Recorder {
        fn send(&mut self, byte: u8) {
            self.sent[self.len] = byte;
            self.len += 1;
        }

        fn is_read_data_available(&self) -> usize {
            0
        }

        fn read_byte(&mut self) -> Option<u8> {
            None
        }
    }

    #[test]
    fn test_send_string_stops_at_nul() {
        let mut rec = Recorder {
            sent: [0; 16],
            len: 0,
        };
        rec.send_string("ab\0cd");
        assert_eq!(&rec.sent[..rec.len], b"ab");
    }

    #[test]
    fn test_send_string_without_nul() {
        let mut rec = Recorder {
            sent: [0; 16],
            len: 0,
        };
        (&mut rec).send_string("ring");
        assert_eq!(&rec.sent[..rec.len], b"ring");
    }
}

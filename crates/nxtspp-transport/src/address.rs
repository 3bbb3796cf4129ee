use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::TransportError;

/// A 48-bit Bluetooth device address (BD_ADDR).
///
/// Bytes are stored most-significant first, in the order they are written:
/// `00:16:53:0A:0B:0C` is `[0x00, 0x16, 0x53, 0x0A, 0x0B, 0x0C]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// Address bytes, most-significant first.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for DeviceAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidAddress {
            input: s.to_string(),
        };

        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split(':');
        for byte in &mut bytes {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// A 128-bit service class UUID used to select the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceUuid(Uuid);

impl ServiceUuid {
    /// Serial Port Profile: `00001101-0000-1000-8000-00805F9B34FB`.
    pub const SERIAL_PORT: ServiceUuid =
        ServiceUuid(Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB));

    /// Create a UUID from its 128-bit value.
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for ServiceUuid {
    fn default() -> Self {
        Self::SERIAL_PORT
    }
}

impl FromStr for ServiceUuid {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidUuid {
            input: s.to_string(),
        };

        // Only the hyphenated 8-4-4-4-12 form is 36 characters long.
        let trimmed = s.trim();
        if trimmed.len() != 36 {
            return Err(invalid());
        }
        Uuid::parse_str(trimmed).map(Self).map_err(|_| invalid())
    }
}

impl fmt::Display for ServiceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0.as_hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_address() {
        let addr: DeviceAddress = "00:16:53:0a:0B:0c".parse().unwrap();
        assert_eq!(addr.octets(), [0x00, 0x16, 0x53, 0x0A, 0x0B, 0x0C]);
        assert_eq!(addr.to_string(), "00:16:53:0A:0B:0C");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for input in [
            "",
            "00:16:53:0A:0B",
            "00:16:53:0A:0B:0C:0D",
            "00-16-53-0A-0B-0C",
            "0:16:53:0A:0B:0C",
            "ZZ:16:53:0A:0B:0C",
            "+1:+2:53:0A:0B:0C",
            "00:16:53:0A:0B:-1",
            "0x:16:53:0A:0B:0C",
        ] {
            let result = input.parse::<DeviceAddress>();
            assert!(
                matches!(result, Err(TransportError::InvalidAddress { .. })),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn serial_port_uuid_roundtrips_through_text() {
        let parsed: ServiceUuid = "00001101-0000-1000-8000-00805f9b34fb".parse().unwrap();
        assert_eq!(parsed, ServiceUuid::SERIAL_PORT);
        assert_eq!(
            ServiceUuid::SERIAL_PORT.to_string(),
            "00001101-0000-1000-8000-00805F9B34FB"
        );
        assert_eq!(ServiceUuid::default(), ServiceUuid::SERIAL_PORT);
    }

    #[test]
    fn custom_uuid_displays_upper_case() {
        let uuid = ServiceUuid::from_u128(0x1234_abcd);
        assert_eq!(uuid.to_string(), "00000000-0000-0000-0000-00001234ABCD");
        assert_eq!(uuid.to_string().parse::<ServiceUuid>().unwrap(), uuid);
    }

    #[test]
    fn rejects_malformed_uuids() {
        for input in [
            "0000110100001000800000805F9B34FB",
            "00001101-0000-1000-8000-00805F9B34F",
            "0000110-10000-1000-8000-00805F9B34FB",
            "0000110G-0000-1000-8000-00805F9B34FB",
            "+0001101-0000-1000-8000-00805F9B34FB",
            "{00001101-0000-1000-8000-00805F9B34F}",
            "urn:uuid:00001101-0000-1000-8000-00805F9B34FB",
        ] {
            let result = input.parse::<ServiceUuid>();
            assert!(
                matches!(result, Err(TransportError::InvalidUuid { .. })),
                "{input:?} should be rejected"
            );
        }
    }
}

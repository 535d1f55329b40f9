//! CRC-CCITT (Kermit) as computed by the IMU firmware.

/// Reflected form of the CCITT polynomial, pre-shifted for nibble steps.
pub const POLYNOMIAL: u16 = 0x1081;

/// Table-free, nibble-at-a-time CRC-CCITT (Kermit).
///
/// The result is the running register with its two bytes swapped. The
/// firmware sends it big-endian, so the wire order is the Kermit register
/// low byte first.
pub fn crc16_kermit(buf: &[u8]) -> u16 {
    let mut crc: u16 = 0;

    for &byte in buf {
        let byte = u16::from(byte);
        let q = (crc ^ byte) & 0x0f;
        crc = (crc >> 4) ^ q.wrapping_mul(POLYNOMIAL);
        let q = (crc ^ (byte >> 4)) & 0x0f;
        crc = (crc >> 4) ^ q.wrapping_mul(POLYNOMIAL);
    }

    (crc >> 8) ^ (crc << 8)
}

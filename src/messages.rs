use crate::color::Color;

/// Offset of the first color byte in a beacon advertisement payload.
///
/// Beacons send a 3-byte flags AD structure followed by a manufacturer
/// specific AD structure (length, type, 2-byte company id, data).
pub const COLOR_OFFSET: usize = 7;

/// Shortest payload that still carries a full color.
pub const MIN_PAYLOAD_LEN: usize = COLOR_OFFSET + 3;

const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;
/// LE General Discoverable, BR/EDR not supported.
const AD_FLAGS: u8 = 0x06;

/// One received advertisement, as delivered by the scanner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvertisementReport {
    pub sender: u16,
    pub payload: Vec<u8>,
    pub rssi: i8,
}

impl AdvertisementReport {
    /// Reads the advertised color. Bytes are sent green, red, blue.
    pub fn color(&self) -> Option<Color> {
        match self.payload.get(COLOR_OFFSET..MIN_PAYLOAD_LEN)? {
            &[green, red, blue] => Some(Color::new(red, green, blue)),
            _ => None,
        }
    }
}

/// Identifier of a beacon: the two lowest octets of its address.
///
/// `address` is in display order, so `c0:98:e5:4e:aa:bb` yields `0xAABB`.
pub fn sender_id(address: [u8; 6]) -> u16 {
    u16::from_be_bytes([address[4], address[5]])
}

/// Rebuilds the raw advertisement layout for stacks that only hand out the
/// parsed manufacturer data.
pub fn manufacturer_payload(company_id: u16, data: &[u8]) -> Vec<u8> {
    let [company_lo, company_hi] = company_id.to_le_bytes();
    let mut payload = Vec::with_capacity(data.len() + COLOR_OFFSET);
    payload.extend_from_slice(&[2, AD_TYPE_FLAGS, AD_FLAGS]);
    // AD length covers the type byte, company id and data.
    payload.push((data.len() + 3).min(u8::MAX as usize) as u8);
    payload.extend_from_slice(&[AD_TYPE_MANUFACTURER_DATA, company_lo, company_hi]);
    payload.extend_from_slice(data);
    payload
}

/// Rounds a host-reported RSSI into the `i8` range used by the radio.
pub fn clamp_rssi(rssi: i16) -> i8 {
    rssi.clamp(i16::from(i8::MIN), i16::from(i8::MAX)) as i8
}

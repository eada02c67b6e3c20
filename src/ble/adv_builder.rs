//! Legacy advertising payload builder.
//!
//! Produces the AD structures the node advertises with:
//! ```text
//! [len][0x01][flags]                  LE General Discoverable, BR/EDR unsupported
//! [len][0x19][appearance u16 LE]      Generic Heart Rate Sensor
//! [len][0x03][uuid16 LE ...]          Complete list of 16-bit service UUIDs
//! [len][0x09][name bytes ...]         Complete local name
//! ```

use heapless::Vec;

use crate::config;
use crate::error::Error;

/// Maximum legacy advertising payload size.
pub const LEGACY_ADV_MAX: usize = 31;

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_UUID16_INCOMPLETE: u8 = 0x02;
pub const AD_TYPE_UUID16_COMPLETE: u8 = 0x03;
pub const AD_TYPE_SHORT_NAME: u8 = 0x08;
pub const AD_TYPE_COMPLETE_NAME: u8 = 0x09;
pub const AD_TYPE_APPEARANCE: u8 = 0x19;

/// LE General Discoverable Mode | BR/EDR Not Supported.
pub const FLAGS_GENERAL_DISCOVERABLE_LE_ONLY: u8 = 0x06;

/// A built legacy advertising payload.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingData {
    bytes: Vec<u8, LEGACY_ADV_MAX>,
}

impl AdvertisingData {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Appends AD structures, failing once the 31-byte budget is exceeded.
#[derive(Default)]
pub struct AdvBuilder {
    buf: Vec<u8, LEGACY_ADV_MAX>,
}

impl AdvBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn flags(&mut self, flags: u8) -> Result<&mut Self, Error> {
        self.field(AD_TYPE_FLAGS, &[flags])
    }

    pub fn appearance(&mut self, appearance: u16) -> Result<&mut Self, Error> {
        self.field(AD_TYPE_APPEARANCE, &appearance.to_le_bytes())
    }

    pub fn services_16(&mut self, uuids: &[u16]) -> Result<&mut Self, Error> {
        let mut data: Vec<u8, LEGACY_ADV_MAX> = Vec::new();
        for uuid in uuids {
            data.extend_from_slice(&uuid.to_le_bytes())
                .map_err(|_| Error::BufferOverflow)?;
        }
        self.field(AD_TYPE_UUID16_COMPLETE, &data)
    }

    pub fn full_name(&mut self, name: &str) -> Result<&mut Self, Error> {
        self.field(AD_TYPE_COMPLETE_NAME, name.as_bytes())
    }

    pub fn build(&self) -> AdvertisingData {
        AdvertisingData {
            bytes: self.buf.clone(),
        }
    }

    fn field(&mut self, ad_type: u8, data: &[u8]) -> Result<&mut Self, Error> {
        let total = 2 + data.len();
        if self.buf.len() + total > LEGACY_ADV_MAX {
            return Err(Error::BufferOverflow);
        }
        // Capacity was checked above, so these pushes cannot fail.
        let _ = self.buf.push((data.len() + 1) as u8);
        let _ = self.buf.push(ad_type);
        let _ = self.buf.extend_from_slice(data);
        Ok(self)
    }
}

/// Payload advertised by the node: flags, appearance, the Heart Rate
/// service and the device name.
pub fn node_advertising_data() -> Result<AdvertisingData, Error> {
    let mut builder = AdvBuilder::new();
    builder
        .flags(FLAGS_GENERAL_DISCOVERABLE_LE_ONLY)?
        .appearance(config::APPEARANCE_HEART_RATE_SENSOR)?
        .services_16(&[config::HEART_RATE_SERVICE_UUID])?
        .full_name(config::DEVICE_NAME)?;
    Ok(builder.build())
}

/// Find the payload of the first AD structure of `ad_type`.
pub fn find_field(data: &[u8], ad_type: u8) -> Option<&[u8]> {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        if data[i + 1] == ad_type {
            return Some(&data[i + 2..i + 1 + len]);
        }
        i += len + 1;
    }
    None
}

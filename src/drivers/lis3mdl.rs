//! LIS3MDL 3-axis magnetometer over I²C.
//!
//! Register-level driver on the blocking `embedded-hal` 1.0 `I2c` trait.
//! Configured for ±4 gauss, 40 Hz, continuous conversion with block data
//! update; axes are reported in milligauss.

use defmt::info;
use embedded_hal::i2c::I2c;
use iot32_node::{Magnetometer, SensorError};

const REG_WHO_AM_I: u8 = 0x0F;
const REG_CTRL_REG1: u8 = 0x20;
const REG_CTRL_REG2: u8 = 0x21;
const REG_CTRL_REG3: u8 = 0x22;
const REG_CTRL_REG4: u8 = 0x23;
const REG_CTRL_REG5: u8 = 0x24;
const REG_STATUS: u8 = 0x27;
const REG_OUT_X_L: u8 = 0x28;
const WHO_AM_I_EXPECTED: u8 = 0x3D;

/// Sub-address auto-increment for burst reads.
const AUTO_INCREMENT: u8 = 0x80;

/// XY high-performance mode, 40 Hz.
const CTRL1_OM_XY_HIGH_40HZ: u8 = 0x58;
/// ±4 gauss full scale.
const CTRL2_FS_4GA: u8 = 0x00;
/// Continuous conversion.
const CTRL3_CONTINUOUS: u8 = 0x00;
/// Z high-performance mode.
const CTRL4_OM_Z_HIGH: u8 = 0x08;
/// Block data update.
const CTRL5_BDU: u8 = 0x40;

const STATUS_ZYXDA: u8 = 0x08;

/// Sensitivity at ±4 gauss: 0.146 mgauss/LSB, kept as 146/1000.
const SENSITIVITY_NUM: i32 = 146;
const SENSITIVITY_DEN: i32 = 1000;

pub struct Lis3mdl<I> {
    i2c: I,
    addr: u8,
}

impl<I: I2c> Lis3mdl<I> {
    pub fn new(i2c: I, addr: u8) -> Self {
        Self { i2c, addr }
    }

    /// Check the part identity and start continuous conversion.
    pub fn init(&mut self) -> Result<(), SensorError> {
        let id = self.read_reg(REG_WHO_AM_I)?;
        if id != WHO_AM_I_EXPECTED {
            return Err(SensorError::WrongDevice(id));
        }

        for (reg, value) in [
            (REG_CTRL_REG1, CTRL1_OM_XY_HIGH_40HZ),
            (REG_CTRL_REG2, CTRL2_FS_4GA),
            (REG_CTRL_REG4, CTRL4_OM_Z_HIGH),
            (REG_CTRL_REG5, CTRL5_BDU),
            (REG_CTRL_REG3, CTRL3_CONTINUOUS),
        ] {
            self.write_reg(reg, value)?;
        }

        info!("LIS3MDL initialised (±4 gauss, 40 Hz)");
        Ok(())
    }

    /// True when a fresh X/Y/Z set is waiting.
    fn data_ready(&mut self) -> Result<bool, SensorError> {
        Ok(self.read_reg(REG_STATUS)? & STATUS_ZYXDA != 0)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.addr, &[reg], &mut buf)
            .map_err(|_| SensorError::Bus)?;
        Ok(buf[0])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.addr, &[reg, value])
            .map_err(|_| SensorError::Bus)
    }
}

fn to_milligauss(lo: u8, hi: u8) -> i16 {
    let raw = i16::from_le_bytes([lo, hi]) as i32;
    (raw * SENSITIVITY_NUM / SENSITIVITY_DEN) as i16
}

impl<I: I2c> Magnetometer for Lis3mdl<I> {
    fn read_axes(&mut self) -> Result<[i16; 3], SensorError> {
        if !self.data_ready()? {
            return Err(SensorError::NotReady);
        }

        let mut raw = [0u8; 6];
        self.i2c
            .write_read(self.addr, &[REG_OUT_X_L | AUTO_INCREMENT], &mut raw)
            .map_err(|_| SensorError::Bus)?;

        Ok([
            to_milligauss(raw[0], raw[1]),
            to_milligauss(raw[2], raw[3]),
            to_milligauss(raw[4], raw[5]),
        ])
    }
}

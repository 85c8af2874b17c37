//! The `HardwareClock` trait abstracts the register-level HAT driver so the
//! rest of the daemon never has to care whether it's talking to real
//! silicon or a test double. This mirrors how the teacher crate's
//! `Battery`/`LightSensor` traits let a `Kobo...` and a `Fake...`
//! implementation stand in for each other.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

use nix::ioctl_write_int_bad;

use crate::action_reason::ActionReason;
use crate::alarm::AlarmFields;
use crate::error::HardwareError;

/// `I2C_SLAVE` ioctl request number from `<linux/i2c-dev.h>`.
const I2C_SLAVE: u64 = 0x0703;
/// `I2C_SLAVE_FORCE`: binds the slave address even if a kernel driver (e.g.
/// the `rtc-xxxx` module) already claims it. Needed when the HAT shares its
/// address with the kernel's own RTC driver.
const I2C_SLAVE_FORCE: u64 = 0x0706;
const EXPECTED_FIRMWARE_ID: u8 = 0x26;

// Register offsets, matching the HAT's documented map.
mod reg {
    pub const FIRMWARE_ID: u8 = 0x00;
    pub const VOLTAGE_IN_INTEGER: u8 = 0x01;
    pub const VOLTAGE_IN_DECIMAL: u8 = 0x02;
    pub const VOLTAGE_OUT_INTEGER: u8 = 0x03;
    pub const VOLTAGE_OUT_DECIMAL: u8 = 0x04;
    pub const TEMPERATURE_INTEGER: u8 = 0x05;
    pub const TEMPERATURE_DECIMAL: u8 = 0x06;
    pub const ACTION_REASON: u8 = 0x0B;
    pub const DEFAULT_ON: u8 = 0x11;
    pub const POWER_CUT_DELAY: u8 = 0x15;
    pub const ALARM1_SECOND: u8 = 0x1B;
    pub const ALARM1_MINUTE: u8 = 0x1C;
    pub const ALARM1_HOUR: u8 = 0x1D;
    pub const ALARM1_DAY: u8 = 0x1E;
    pub const ALARM1_WEEKDAY: u8 = 0x1F;
    pub const ALARM2_SECOND: u8 = 0x20;
    pub const ALARM2_MINUTE: u8 = 0x21;
    pub const ALARM2_HOUR: u8 = 0x22;
    pub const ALARM2_DAY: u8 = 0x23;
    pub const ALARM2_WEEKDAY: u8 = 0x24;
    pub const ALARM1_FLAG: u8 = 0x27;
    pub const ALARM2_FLAG: u8 = 0x28;
    pub const DEFAULT_ON_DELAY: u8 = 0x2F;
    pub const RTC_SECOND: u8 = 0x3A;
    pub const RTC_MINUTE: u8 = 0x3B;
    pub const RTC_HOUR: u8 = 0x3C;
    pub const RTC_DAY: u8 = 0x3D;
    pub const RTC_WEEKDAY: u8 = 0x3E;
    pub const RTC_MONTH: u8 = 0x3F;
    pub const RTC_YEAR: u8 = 0x40;
    pub const RTC_CTRL2: u8 = 0x37;
}

ioctl_write_int_bad!(set_i2c_slave_address, I2C_SLAVE);
ioctl_write_int_bad!(set_i2c_slave_address_forced, I2C_SLAVE_FORCE);

/// Everything the rest of the daemon reads from or writes to the HAT.
pub trait HardwareClock {
    fn firmware_id(&mut self) -> Result<u8, HardwareError>;
    fn action_reason(&mut self) -> Result<ActionReason, HardwareError>;
    fn rtc_datetime(&mut self) -> Result<chrono::DateTime<chrono::Utc>, HardwareError>;

    /// Input (supply-side) voltage, in volts.
    fn voltage_in(&mut self) -> Result<f32, HardwareError>;
    /// Output (battery-side) voltage, in volts.
    fn voltage_out(&mut self) -> Result<f32, HardwareError>;
    /// Board temperature, in degrees Celsius.
    fn temperature(&mut self) -> Result<f32, HardwareError>;

    fn alarm1(&mut self) -> Result<AlarmFields, HardwareError>;
    fn set_alarm1(&mut self, fields: AlarmFields) -> Result<(), HardwareError>;
    fn alarm2(&mut self) -> Result<AlarmFields, HardwareError>;
    fn set_alarm2(&mut self, fields: AlarmFields) -> Result<(), HardwareError>;

    fn set_default_on(&mut self, enabled: bool) -> Result<(), HardwareError>;
    fn set_default_on_delay(&mut self, seconds: u8) -> Result<(), HardwareError>;
    fn set_power_cut_delay(&mut self, tenths_of_second: u8) -> Result<(), HardwareError>;

    /// Clear both alarm-fired flags and the RTC's own CTRL2 alarm bit.
    fn clear_flags(&mut self) -> Result<(), HardwareError>;
}

/// Real I2C-backed implementation, talking to `/dev/i2c-<bus>`.
pub struct I2cHat {
    file: File,
}

impl I2cHat {
    /// Open `/dev/i2c-<bus>` and bind `address` as the slave. `force` binds
    /// via `I2C_SLAVE_FORCE` instead of `I2C_SLAVE`, which is required when
    /// a kernel RTC driver already has the address claimed.
    pub fn open(bus: u8, address: u16, force: bool) -> Result<Self, HardwareError> {
        let path = format!("/dev/i2c-{bus}");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| HardwareError::BusOpen(path.clone(), e))?;

        unsafe {
            if force {
                set_i2c_slave_address_forced(file.as_raw_fd(), address as i32)
                    .map_err(|e| HardwareError::SlaveBind(address, e))?;
            } else {
                set_i2c_slave_address(file.as_raw_fd(), address as i32)
                    .map_err(|e| HardwareError::SlaveBind(address, e))?;
            }
        }

        let mut hat = I2cHat { file };
        let firmware_id = hat.firmware_id()?;
        if firmware_id != EXPECTED_FIRMWARE_ID {
            return Err(HardwareError::UnexpectedFirmwareId {
                found: firmware_id,
                expected: EXPECTED_FIRMWARE_ID,
            });
        }
        Ok(hat)
    }

    fn read_register(&mut self, register: u8) -> Result<u8, HardwareError> {
        self.file
            .write_all(&[register])
            .map_err(|e| HardwareError::Write(register, e))?;
        let mut buf = [0u8; 1];
        self.file
            .read_exact(&mut buf)
            .map_err(|e| HardwareError::Read(register, e))?;
        Ok(buf[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), HardwareError> {
        self.file
            .write_all(&[register, value])
            .map_err(|e| HardwareError::Write(register, e))
    }

    /// Combine an integer-part register and a decimal-part register (both
    /// plain bytes, not BCD) into a single reading, as the original voltage
    /// and temperature registers are laid out.
    fn read_integer_decimal_pair(&mut self, integer: u8, decimal: u8) -> Result<f32, HardwareError> {
        let whole = self.read_register(integer)? as f32;
        let fraction = self.read_register(decimal)? as f32 / 100.0;
        Ok(whole + fraction)
    }

    fn read_alarm(&mut self, base: [u8; 5]) -> Result<AlarmFields, HardwareError> {
        Ok(AlarmFields {
            second: crate::bcd::decode(self.read_register(base[0])?),
            minute: crate::bcd::decode(self.read_register(base[1])?),
            hour: crate::bcd::decode(self.read_register(base[2])?),
            day: crate::bcd::decode(self.read_register(base[3])?),
            weekday: crate::bcd::decode(self.read_register(base[4])?),
        })
    }

    fn write_alarm(&mut self, base: [u8; 5], fields: AlarmFields) -> Result<(), HardwareError> {
        self.write_register(base[0], crate::bcd::encode(fields.second))?;
        self.write_register(base[1], crate::bcd::encode(fields.minute))?;
        self.write_register(base[2], crate::bcd::encode(fields.hour))?;
        self.write_register(base[3], crate::bcd::encode(fields.day))?;
        self.write_register(base[4], crate::bcd::encode(fields.weekday))
    }

    const ALARM1_REGS: [u8; 5] = [
        reg::ALARM1_SECOND,
        reg::ALARM1_MINUTE,
        reg::ALARM1_HOUR,
        reg::ALARM1_DAY,
        reg::ALARM1_WEEKDAY,
    ];
    const ALARM2_REGS: [u8; 5] = [
        reg::ALARM2_SECOND,
        reg::ALARM2_MINUTE,
        reg::ALARM2_HOUR,
        reg::ALARM2_DAY,
        reg::ALARM2_WEEKDAY,
    ];
}

impl HardwareClock for I2cHat {
    fn firmware_id(&mut self) -> Result<u8, HardwareError> {
        self.read_register(reg::FIRMWARE_ID)
    }

    fn action_reason(&mut self) -> Result<ActionReason, HardwareError> {
        Ok(ActionReason::from_byte(self.read_register(reg::ACTION_REASON)?))
    }

    fn rtc_datetime(&mut self) -> Result<chrono::DateTime<chrono::Utc>, HardwareError> {
        use chrono::{TimeZone, Utc};

        let second = crate::bcd::decode(self.read_register(reg::RTC_SECOND)?);
        let minute = crate::bcd::decode(self.read_register(reg::RTC_MINUTE)?);
        let hour = crate::bcd::decode(self.read_register(reg::RTC_HOUR)?);
        let day = crate::bcd::decode(self.read_register(reg::RTC_DAY)?);
        let _weekday = self.read_register(reg::RTC_WEEKDAY)?;
        let month = crate::bcd::decode(self.read_register(reg::RTC_MONTH)?);
        let year = 2000 + crate::bcd::decode(self.read_register(reg::RTC_YEAR)?) as i32;

        Utc.with_ymd_and_hms(year, month as u32, day as u32, hour as u32, minute as u32, second as u32)
            .single()
            .ok_or(HardwareError::Read(reg::RTC_YEAR, std::io::Error::new(std::io::ErrorKind::InvalidData, "rtc is unset")))
    }

    fn voltage_in(&mut self) -> Result<f32, HardwareError> {
        self.read_integer_decimal_pair(reg::VOLTAGE_IN_INTEGER, reg::VOLTAGE_IN_DECIMAL)
    }

    fn voltage_out(&mut self) -> Result<f32, HardwareError> {
        self.read_integer_decimal_pair(reg::VOLTAGE_OUT_INTEGER, reg::VOLTAGE_OUT_DECIMAL)
    }

    fn temperature(&mut self) -> Result<f32, HardwareError> {
        self.read_integer_decimal_pair(reg::TEMPERATURE_INTEGER, reg::TEMPERATURE_DECIMAL)
    }

    fn alarm1(&mut self) -> Result<AlarmFields, HardwareError> {
        self.read_alarm(Self::ALARM1_REGS)
    }

    fn set_alarm1(&mut self, fields: AlarmFields) -> Result<(), HardwareError> {
        self.write_alarm(Self::ALARM1_REGS, fields)
    }

    fn alarm2(&mut self) -> Result<AlarmFields, HardwareError> {
        self.read_alarm(Self::ALARM2_REGS)
    }

    fn set_alarm2(&mut self, fields: AlarmFields) -> Result<(), HardwareError> {
        self.write_alarm(Self::ALARM2_REGS, fields)
    }

    fn set_default_on(&mut self, enabled: bool) -> Result<(), HardwareError> {
        self.write_register(reg::DEFAULT_ON, enabled as u8)
    }

    fn set_default_on_delay(&mut self, seconds: u8) -> Result<(), HardwareError> {
        self.write_register(reg::DEFAULT_ON_DELAY, seconds)
    }

    fn set_power_cut_delay(&mut self, tenths_of_second: u8) -> Result<(), HardwareError> {
        self.write_register(reg::POWER_CUT_DELAY, tenths_of_second)
    }

    fn clear_flags(&mut self) -> Result<(), HardwareError> {
        self.write_register(reg::ALARM1_FLAG, 0)?;
        self.write_register(reg::ALARM2_FLAG, 0)?;
        let ctrl2 = self.read_register(reg::RTC_CTRL2)?;
        self.write_register(reg::RTC_CTRL2, ctrl2 & 0b1011_1111)
    }
}

/// In-memory stand-in used by the test suite. Every write is retained so
/// tests can assert on exactly what the control loop programmed.
#[derive(Debug, Clone)]
pub struct FakeHat {
    pub firmware_id: u8,
    pub action_reason: ActionReason,
    pub rtc_datetime: chrono::DateTime<chrono::Utc>,
    pub voltage_in: f32,
    pub voltage_out: f32,
    pub temperature: f32,
    pub alarm1: AlarmFields,
    pub alarm2: AlarmFields,
    pub default_on: bool,
    pub default_on_delay: u8,
    pub power_cut_delay: u8,
    pub flags_cleared: u32,
}

impl FakeHat {
    pub fn new(action_reason: ActionReason, rtc_datetime: chrono::DateTime<chrono::Utc>) -> Self {
        FakeHat {
            firmware_id: EXPECTED_FIRMWARE_ID,
            action_reason,
            rtc_datetime,
            voltage_in: 5.0,
            voltage_out: 4.2,
            temperature: 25.0,
            alarm1: AlarmFields::DISABLED,
            alarm2: AlarmFields::DISABLED,
            default_on: false,
            default_on_delay: 0,
            power_cut_delay: 0,
            flags_cleared: 0,
        }
    }
}

impl HardwareClock for FakeHat {
    fn firmware_id(&mut self) -> Result<u8, HardwareError> {
        Ok(self.firmware_id)
    }

    fn action_reason(&mut self) -> Result<ActionReason, HardwareError> {
        Ok(self.action_reason)
    }

    fn rtc_datetime(&mut self) -> Result<chrono::DateTime<chrono::Utc>, HardwareError> {
        Ok(self.rtc_datetime)
    }

    fn voltage_in(&mut self) -> Result<f32, HardwareError> {
        Ok(self.voltage_in)
    }

    fn voltage_out(&mut self) -> Result<f32, HardwareError> {
        Ok(self.voltage_out)
    }

    fn temperature(&mut self) -> Result<f32, HardwareError> {
        Ok(self.temperature)
    }

    fn alarm1(&mut self) -> Result<AlarmFields, HardwareError> {
        Ok(self.alarm1)
    }

    fn set_alarm1(&mut self, fields: AlarmFields) -> Result<(), HardwareError> {
        self.alarm1 = fields;
        Ok(())
    }

    fn alarm2(&mut self) -> Result<AlarmFields, HardwareError> {
        Ok(self.alarm2)
    }

    fn set_alarm2(&mut self, fields: AlarmFields) -> Result<(), HardwareError> {
        self.alarm2 = fields;
        Ok(())
    }

    fn set_default_on(&mut self, enabled: bool) -> Result<(), HardwareError> {
        self.default_on = enabled;
        Ok(())
    }

    fn set_default_on_delay(&mut self, seconds: u8) -> Result<(), HardwareError> {
        self.default_on_delay = seconds;
        Ok(())
    }

    fn set_power_cut_delay(&mut self, tenths_of_second: u8) -> Result<(), HardwareError> {
        self.power_cut_delay = tenths_of_second;
        Ok(())
    }

    fn clear_flags(&mut self) -> Result<(), HardwareError> {
        self.flags_cleared += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fake_hat_retains_alarm_writes() {
        let mut hat = FakeHat::new(ActionReason::AlarmStartup, sample_rtc_now());
        let fields = AlarmFields {
            second: 0,
            minute: 30,
            hour: 6,
            weekday: 80,
            day: 10,
        };
        hat.set_alarm1(fields).unwrap();
        assert_eq!(hat.alarm1().unwrap(), fields);
    }

    #[test]
    fn fake_hat_counts_flag_clears() {
        let mut hat = FakeHat::new(ActionReason::AlarmStartup, sample_rtc_now());
        hat.clear_flags().unwrap();
        hat.clear_flags().unwrap();
        assert_eq!(hat.flags_cleared, 2);
    }

    fn sample_rtc_now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }
}

//! HD44780 character LCD behind a PCF8574 I2C backpack
//!
//! The expander drives the controller in 4-bit mode:
//! P0 = RS, P1 = RW, P2 = EN, P3 = backlight, P4..P7 = D4..D7.

use crate::NodeError;
use crate::config::{LCD_COLUMNS, LCD_ROWS};
use crate::display::CharDisplay;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use log::{info, warn};

const RS: u8 = 0x01;
const EN: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

// Controller commands
const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_INCREMENT: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

/// DDRAM start address of each row on a 20x4 panel
const ROW_OFFSETS: [u8; LCD_ROWS] = [0x00, 0x40, 0x14, 0x54];

/// 20x4 LCD driver
pub struct Lcd<I, D> {
    i2c: I,
    delay: D,
    address: u8,
}

impl<I, D> Lcd<I, D>
where
    I: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    /// Power-on reset into 4-bit mode, display on, cursor off
    pub fn init(&mut self) -> Result<(), NodeError> {
        self.delay.delay_ms(50);
        self.write_expander(0)?;

        // Three 8-bit resets then switch to 4-bit
        for wait_us in [4_500, 150, 150] {
            self.write_nibble(0x30, 0)?;
            self.delay.delay_us(wait_us);
        }
        self.write_nibble(0x20, 0)?;

        for cmd in [CMD_FUNCTION_4BIT_2LINE, CMD_DISPLAY_ON, CMD_CLEAR, CMD_ENTRY_INCREMENT] {
            self.command(cmd)?;
        }
        self.delay.delay_ms(2);

        info!("[LCD] Initialized at 0x{:02X}", self.address);
        Ok(())
    }

    fn set_cursor(&mut self, column: u8, row: u8) -> Result<(), NodeError> {
        let offset = ROW_OFFSETS[(row as usize).min(LCD_ROWS - 1)];
        self.command(CMD_SET_DDRAM | (offset + column))
    }

    fn command(&mut self, cmd: u8) -> Result<(), NodeError> {
        self.send(cmd, 0)?;
        if cmd == CMD_CLEAR {
            self.delay.delay_ms(2);
        }
        Ok(())
    }

    fn send(&mut self, byte: u8, mode: u8) -> Result<(), NodeError> {
        self.write_nibble(byte & 0xF0, mode)?;
        self.write_nibble((byte << 4) & 0xF0, mode)
    }

    fn write_nibble(&mut self, nibble: u8, mode: u8) -> Result<(), NodeError> {
        self.write_expander(nibble | mode | EN)?;
        self.delay.delay_us(1);
        self.write_expander(nibble | mode)?;
        self.delay.delay_us(50);
        Ok(())
    }

    /// The backlight bit rides along with every write
    fn write_expander(&mut self, bits: u8) -> Result<(), NodeError> {
        self.i2c.write(self.address, &[bits | BACKLIGHT]).map_err(|e| {
            warn!("[LCD] I2C write failed: {:?}", e.kind());
            NodeError::DisplayError
        })
    }
}

impl<I, D> CharDisplay for Lcd<I, D>
where
    I: I2c,
    D: DelayNs,
{
    fn write_line(&mut self, row: u8, text: &str) -> Result<(), NodeError> {
        self.set_cursor(0, row)?;
        for c in text.chars().take(LCD_COLUMNS) {
            // Character ROM A00 is ASCII for the printable range
            let code = if c.is_ascii() && !c.is_ascii_control() {
                c as u8
            } else {
                b'?'
            };
            self.send(code, RS)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), NodeError> {
        self.command(CMD_CLEAR)
    }
}

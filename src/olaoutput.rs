use std::{
    net::{SocketAddr, UdpSocket},
    str::FromStr,
};

use rosc::{encoder, OscMessage, OscPacket, OscType};

use crate::color::{Color, DriverColor};
use crate::hardware::LedDriver;

const DMX_UNIVERSE_SIZE: usize = 512;
const CHANNELS_PER_LED: usize = 3;

/// LED strip behind an OLA DMX universe, fed over OSC.
///
/// Every LED occupies three consecutive channels starting at channel 0.
pub struct OlaOutput {
    sock: UdpSocket,
    target_addr: SocketAddr,
    address: String,
    buffer: Vec<u8>,
    led_count: usize,
}

impl OlaOutput {
    pub fn new(target_addr: SocketAddr, universe: u32, led_count: usize) -> Result<Self, String> {
        if led_count * CHANNELS_PER_LED > DMX_UNIVERSE_SIZE {
            return Err(format!(
                "{} LEDs do not fit into one DMX universe",
                led_count
            ));
        }

        let our_addr = SocketAddr::from_str("0.0.0.0:0").map_err(|e| e.to_string())?;
        let sock = match UdpSocket::bind(our_addr) {
            Ok(sock) => sock,
            Err(error) => return Err(error.to_string()),
        };

        Ok(OlaOutput {
            sock,
            target_addr,
            address: format!("/dmx/universe/{}", universe),
            buffer: vec![0; DMX_UNIVERSE_SIZE],
            led_count,
        })
    }

    fn set_rgb(&mut self, start_channel: usize, values: [u8; 3]) {
        self.buffer[start_channel..start_channel + CHANNELS_PER_LED].copy_from_slice(&values);
    }

    pub fn blackout(&mut self) {
        self.buffer.fill(0);
    }
}

impl LedDriver for OlaOutput {
    fn start(&mut self) {
        log::info!(
            "Driving {} LEDs through OLA at {} ({})",
            self.led_count,
            self.target_addr,
            self.address
        );
        self.blackout();
    }

    fn set_pixel(&mut self, index: usize, color: DriverColor) {
        if index >= self.led_count {
            log::warn!(
                "Ignoring LED {} beyond the strip end: {:?}",
                index,
                Color::from_driver_units(color)
            );
            return;
        }
        self.set_rgb(index * CHANNELS_PER_LED, color.to_rgb8());
    }

    fn show(&mut self) {
        let msg_buf = match encoder::encode(&OscPacket::Message(OscMessage {
            addr: self.address.clone(),
            args: vec![OscType::Blob(self.buffer.clone())],
        })) {
            Ok(msg_buf) => msg_buf,
            Err(err) => {
                log::warn!("Cannot encode DMX frame: {:?}", err);
                return;
            }
        };

        if let Err(err) = self.sock.send_to(&msg_buf, self.target_addr) {
            log::warn!("Cannot send DMX frame to {}: {}", self.target_addr, err);
        }
    }

    fn led_count(&self) -> usize {
        self.led_count
    }
}

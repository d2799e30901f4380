use std::{
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
    str::FromStr,
};

use rosc::{decoder, encoder, OscMessage, OscPacket, OscType};

use crate::color::DriverColor;
use crate::hardware::{Button, InputSource, StatusIndicator};

const BACKGROUND_ADDR: &str = "/cloud/background";
const LIGHTNING_ADDR: &str = "/cloud/lightning";
const INDICATOR_ADDR: &str = "/cloud/indicator";

/// Buttons emulated by OSC push buttons of a control surface. A float
/// argument of 0.5 or more means pressed.
pub struct OscInput {
    sock: UdpSocket,
    background: bool,
    lightning: bool,
}

/// Mirrors the status pixel onto the control surface
pub struct OscIndicator {
    sock: UdpSocket,
    dst_addr: SocketAddr,
}

impl OscInput {
    pub fn new(listen_addr: SocketAddr) -> Result<Self, String> {
        let sock = match UdpSocket::bind(listen_addr) {
            Ok(sock) => sock,
            Err(error) => return Err(error.to_string()),
        };
        if let Err(error) = sock.set_nonblocking(true) {
            return Err(error.to_string());
        }

        log::info!("Listening for OSC buttons on {}", listen_addr);
        Ok(OscInput {
            sock,
            background: false,
            lightning: false,
        })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.sock.local_addr().ok()
    }

    fn handle_packet(&mut self, packet: OscPacket) {
        match packet {
            OscPacket::Message(msg) => {
                if !self.handle_message(&msg) {
                    log::debug!("Unhandled OSC address {}: {:?}", msg.addr, msg.args);
                }
            }
            OscPacket::Bundle(bundle) => {
                for packet in bundle.content {
                    self.handle_packet(packet);
                }
            }
        }
    }

    fn handle_message(&mut self, msg: &OscMessage) -> bool {
        let target = match msg.addr.as_str() {
            BACKGROUND_ADDR => &mut self.background,
            LIGHTNING_ADDR => &mut self.lightning,
            _ => return false,
        };

        match handle_float_message(msg) {
            Ok(value) => *target = value >= 0.5,
            Err(msg) => log::warn!("{}", msg),
        }
        true
    }
}

fn handle_float_message(msg: &OscMessage) -> Result<f32, String> {
    match msg.args.first() {
        Some(OscType::Float(value)) => Ok(*value),
        Some(OscType::Double(value)) => Ok(*value as f32),
        Some(OscType::Int(value)) => Ok(*value as f32),
        Some(OscType::Bool(value)) => Ok(if *value { 1.0 } else { 0.0 }),
        Some(arg) => Err(format!(
            "{} Unexpected OSC parameter type: {:?}",
            msg.addr, arg
        )),
        None => Err(format!("{} Missing OSC parameter: float", msg.addr)),
    }
}

impl InputSource for OscInput {
    fn poll(&mut self) {
        let mut buf = [0u8; decoder::MTU];

        loop {
            match self.sock.recv_from(&mut buf) {
                Ok((size, addr)) => {
                    log::trace!("Received packet with size {} from: {}", size, addr);
                    match decoder::decode(&buf[..size]) {
                        Ok(packet) => self.handle_packet(packet),
                        Err(err) => log::warn!("Malformed OSC packet from {}: {:?}", addr, err),
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("Error receiving from socket: {}", e);
                    break;
                }
            }
        }
    }

    fn is_pressed(&self, button: Button) -> bool {
        match button {
            Button::Background => self.background,
            Button::Lightning => self.lightning,
        }
    }
}

impl OscIndicator {
    pub fn new(dst_addr: SocketAddr) -> Result<Self, String> {
        let src_addr = SocketAddr::from_str("0.0.0.0:0").map_err(|e| e.to_string())?;
        let sock = match UdpSocket::bind(src_addr) {
            Ok(sock) => sock,
            Err(error) => return Err(error.to_string()),
        };

        Ok(OscIndicator { sock, dst_addr })
    }
}

impl StatusIndicator for OscIndicator {
    fn set(&mut self, color: DriverColor) {
        let args = color.to_unit_rgb().map(OscType::Float).to_vec();
        let msg_buf = match encoder::encode(&OscPacket::Message(OscMessage {
            addr: INDICATOR_ADDR.to_string(),
            args,
        })) {
            Ok(msg_buf) => msg_buf,
            Err(err) => {
                log::warn!("Cannot encode indicator message: {:?}", err);
                return;
            }
        };

        if let Err(err) = self.sock.send_to(&msg_buf, self.dst_addr) {
            log::warn!("Cannot update indicator at {}: {}", self.dst_addr, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn send(to: SocketAddr, addr: &str, args: Vec<OscType>) {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let msg_buf = encoder::encode(&OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        }))
        .unwrap();
        sock.send_to(&msg_buf, to).unwrap();
    }

    fn poll_until(input: &mut OscInput, button: Button, pressed: bool) -> bool {
        for _ in 0..200 {
            input.poll();
            if input.is_pressed(button) == pressed {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn buttons_follow_osc_messages() {
        let mut input = OscInput::new(SocketAddr::from_str("127.0.0.1:0").unwrap()).unwrap();
        let addr = input.local_addr().unwrap();

        input.poll();
        assert!(!input.is_pressed(Button::Background));
        assert!(!input.is_pressed(Button::Lightning));

        send(addr, LIGHTNING_ADDR, vec![OscType::Float(1.0)]);
        assert!(poll_until(&mut input, Button::Lightning, true));
        assert!(!input.is_pressed(Button::Background));

        send(addr, LIGHTNING_ADDR, vec![OscType::Float(0.0)]);
        assert!(poll_until(&mut input, Button::Lightning, false));

        send(addr, BACKGROUND_ADDR, vec![OscType::Int(1)]);
        assert!(poll_until(&mut input, Button::Background, true));
    }

    #[test]
    fn malformed_arguments_are_ignored() {
        let msg = OscMessage {
            addr: BACKGROUND_ADDR.to_string(),
            args: vec![OscType::String("yes".to_string())],
        };
        assert!(handle_float_message(&msg).is_err());

        let empty = OscMessage {
            addr: BACKGROUND_ADDR.to_string(),
            args: vec![],
        };
        assert!(handle_float_message(&empty).is_err());
    }

    #[test]
    fn indicator_sends_unit_rgb() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        listener
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut indicator = OscIndicator::new(listener.local_addr().unwrap()).unwrap();
        indicator.set(DriverColor::Rgb([255, 0, 0]));

        let mut buf = [0u8; decoder::MTU];
        let (size, _) = listener.recv_from(&mut buf).unwrap();
        let OscPacket::Message(msg) = decoder::decode(&buf[..size]).unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(msg.addr, INDICATOR_ADDR);
        assert_eq!(
            msg.args,
            vec![OscType::Float(1.0), OscType::Float(0.0), OscType::Float(0.0)]
        );
    }
}

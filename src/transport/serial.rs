use anyhow::{bail, Context, Result};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::info;

use crate::core::config::{SerialParity, TransportConfig};

pub fn data_bits(bits: u8) -> Result<DataBits> {
    Ok(match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        other => bail!("Unsupported data bits: {}", other),
    })
}

pub fn stop_bits(bits: u8) -> Result<StopBits> {
    Ok(match bits {
        1 => StopBits::One,
        2 => StopBits::Two,
        other => bail!("Unsupported stop bits: {}", other),
    })
}

pub fn parity(parity: SerialParity) -> Parity {
    match parity {
        SerialParity::None => Parity::None,
        SerialParity::Odd => Parity::Odd,
        SerialParity::Even => Parity::Even,
    }
}

/// Open the token's serial port with the configured line settings
pub fn open_serial(config: &TransportConfig) -> Result<SerialStream> {
    let path = config.device.to_string_lossy();

    let stream = tokio_serial::new(path.clone(), config.baud_rate)
        .data_bits(data_bits(config.data_bits)?)
        .stop_bits(stop_bits(config.stop_bits)?)
        .parity(parity(config.parity))
        .flow_control(FlowControl::None)
        .open_native_async()
        .with_context(|| format!("Failed to open serial port {}", path))?;

    info!(
        device = %path,
        baud_rate = config.baud_rate,
        data_bits = config.data_bits,
        stop_bits = config.stop_bits,
        parity = ?config.parity,
        "Serial port opened"
    );

    Ok(stream)
}

use std::fs;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};
use xenowire_frame::{
    Dispatcher, Event, FrameHeader, MessageRegistry, RawEvent, SessionId, UNDEFINED,
};
use xenowire_session::{Delivery, Session};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{io_error, session_error, CliResult, FAULTY_INPUT, SUCCESS};
use crate::output::{print_rows, DeliveryRow, OutputFormat};
use crate::settings::Settings;

/// Message legend for decoding; unless strict, unlisted codes decode as raw bytes.
#[derive(Clone)]
struct Legend {
    registry: MessageRegistry,
    strict: bool,
}

impl Dispatcher for Legend {
    fn resolve(&self, message_code: u16) -> Option<Box<dyn Event>> {
        self.registry.resolve(message_code).or_else(|| {
            (!self.strict && message_code != UNDEFINED)
                .then(|| Box::new(RawEvent::new(message_code, Bytes::new())) as Box<dyn Event>)
        })
    }
}

pub fn run(args: DecodeArgs, settings: &Settings, format: OutputFormat) -> CliResult<i32> {
    let wire = match (&args.input, &args.file) {
        (Some(hex), _) => parse_hex(hex)?,
        (None, Some(path)) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        (None, None) => Vec::new(),
    };

    let legend = Legend {
        registry: settings.registry(),
        strict: args.strict,
    };
    let mut session = Session::new(SessionId(1), legend, &settings.protocol)
        .map_err(|err| session_error("session setup failed", err))?;

    let chunk = args
        .chunk
        .and_then(|chunk| usize::try_from(chunk).ok())
        .unwrap_or(wire.len())
        .max(1);
    let mut rows = Vec::new();
    for piece in wire.chunks(chunk) {
        let deliveries = session
            .receive(piece)
            .map_err(|err| session_error("decode failed", err))?;
        rows.extend(
            deliveries
                .into_iter()
                .map(|delivery| row_for(delivery, session.dispatcher())),
        );
    }

    if args.replies {
        while let Some(frame) = session.poll_transmit() {
            rows.push(reply_row(&frame, session.dispatcher()));
        }
    }

    let stats = session.stats();
    debug!(?stats, "decode finished");
    if stats.pool.in_use > 0 {
        warn!("input ended inside a message");
    }

    let faulty = rows.iter().any(|row| row.kind == "faulty");
    print_rows(&rows, format);
    Ok(if faulty { FAULTY_INPUT } else { SUCCESS })
}

fn row_for(delivery: Delivery, legend: &Legend) -> DeliveryRow {
    match delivery {
        Delivery::Message {
            unique_id,
            message_code,
            event,
        } => {
            let mut row = coded(DeliveryRow::new("message", unique_id), message_code, legend);
            let mut payload = BytesMut::new();
            match event.serialize(&mut payload) {
                Ok(()) => {
                    row.payload_hex = Some(hex::encode(&payload));
                    row.payload = payload.to_vec();
                }
                Err(err) => row.error = Some(err.to_string()),
            }
            row
        }
        Delivery::Faulty {
            unique_id,
            message_code,
            error,
        } => {
            let mut row = coded(DeliveryRow::new("faulty", unique_id), message_code, legend);
            row.error = Some(error.to_string());
            row
        }
        Delivery::Acked { unique_id } => DeliveryRow::new("acked", unique_id),
        Delivery::Failed { unique_id } => DeliveryRow::new("failed", unique_id),
        Delivery::RetryExhausted { unique_id } => DeliveryRow::new("retry_exhausted", unique_id),
    }
}

fn reply_row(frame: &[u8], legend: &Legend) -> DeliveryRow {
    let header = FrameHeader::decode(frame);
    let unique_id = header.map_or(0, |header| header.unique_id);
    let mut row = DeliveryRow::new("reply", unique_id);
    if let Some(header) = header {
        row = coded(row, header.message_code, legend);
    }
    row.payload_hex = Some(hex::encode(frame));
    row.payload = frame.to_vec();
    row
}

fn coded(mut row: DeliveryRow, message_code: u16, legend: &Legend) -> DeliveryRow {
    row.message_code = Some(message_code);
    row.code_name = Some(legend.registry.name_of(message_code).to_string());
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legend(strict: bool) -> Legend {
        Legend {
            registry: MessageRegistry::new().with(0x0100, "known", false),
            strict,
        }
    }

    #[test]
    fn lenient_legend_accepts_any_code() {
        assert!(legend(false).resolve(0x0BEE).is_some());
        assert!(legend(false).resolve(UNDEFINED).is_none());
    }

    #[test]
    fn strict_legend_only_knows_registered_codes() {
        assert!(legend(true).resolve(0x0100).is_some());
        assert!(legend(true).resolve(0x0BEE).is_none());
    }

    #[test]
    fn faulty_rows_carry_the_error() {
        let row = row_for(
            Delivery::Faulty {
                unique_id: 3,
                message_code: 0x0100,
                error: xenowire_frame::RecordError::UnknownCode(0x0100),
            },
            &legend(true),
        );
        assert_eq!(row.kind, "faulty");
        assert_eq!(row.code_name.as_deref(), Some("known"));
        assert!(row.error.unwrap().contains("0x0100"));
    }
}

use bytes::BytesMut;
use xenowire_frame::{MessageFramer, RawEvent};

use crate::cmd::{parse_hex, EncodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};
use crate::settings::Settings;

pub fn run(args: EncodeArgs, settings: &Settings, format: OutputFormat) -> CliResult<i32> {
    let payload = match (&args.data, &args.hex) {
        (Some(data), _) => data.as_bytes().to_vec(),
        (None, Some(hex)) => parse_hex(hex)?,
        (None, None) => Vec::new(),
    };

    let event = RawEvent::new(args.code, payload);
    let mut frame = BytesMut::new();
    MessageFramer::new(&settings.protocol)
        .serialize(&event, args.id, &mut frame)
        .map_err(|err| frame_error("encode failed", err))?;
    tracing::debug!(code = args.code, id = args.id, size = frame.len(), "encoded frame");

    print_frame(&frame, settings.registry().name_of(args.code), format);
    Ok(SUCCESS)
}

use xenowire_frame::MessageFramer;

use crate::cmd::SyncArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_hex, OutputFormat};
use crate::settings::Settings;

pub fn run(args: SyncArgs, settings: &Settings, format: OutputFormat) -> CliResult<i32> {
    let filler = MessageFramer::new(&settings.protocol).sync_packet(args.count);
    print_hex(&filler, format);
    Ok(SUCCESS)
}

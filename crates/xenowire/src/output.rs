use std::fmt::Write as _;
use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use xenowire_frame::FrameHeader;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One line of `decode` output.
#[derive(Debug, Serialize)]
pub struct DeliveryRow {
    pub kind: &'static str,
    pub unique_id: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub payload: Vec<u8>,
}

impl DeliveryRow {
    pub fn new(kind: &'static str, unique_id: u16) -> Self {
        Self {
            kind,
            unique_id,
            message_code: None,
            code_name: None,
            payload_hex: None,
            error: None,
            payload: Vec::new(),
        }
    }

    fn detail(&self) -> String {
        match (&self.error, self.payload_hex.is_some()) {
            (Some(error), _) => error.clone(),
            (None, true) => payload_preview(&self.payload),
            (None, false) => String::new(),
        }
    }
}

pub fn print_rows(rows: &[DeliveryRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "ID", "CODE", "NAME", "DETAIL"]);
            for row in rows {
                table.add_row(vec![
                    row.kind.to_string(),
                    format!("{:#06x}", row.unique_id),
                    row.message_code
                        .map(|code| format!("{code:#06x}"))
                        .unwrap_or_default(),
                    row.code_name.clone().unwrap_or_default(),
                    row.detail(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                let mut line = format!("{} id={:#06x}", row.kind, row.unique_id);
                if let Some(code) = row.message_code {
                    let _ = write!(
                        line,
                        " code={code:#06x} ({})",
                        row.code_name.as_deref().unwrap_or("?")
                    );
                }
                let detail = row.detail();
                if !detail.is_empty() {
                    let _ = write!(line, " {detail}");
                }
                println!("{line}");
            }
        }
        OutputFormat::Raw => {
            for row in rows {
                print_raw(&row.payload);
            }
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    bytes_total: u32,
    checksum: u8,
    unique_id: u16,
    message_code: u16,
    code_name: &'a str,
    frame: String,
}

/// Print one encoded frame.
pub fn print_frame(frame: &[u8], code_name: &str, format: OutputFormat) {
    let Some(header) = FrameHeader::decode(frame) else {
        print_hex(frame, format);
        return;
    };
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                bytes_total: header.bytes_total,
                checksum: header.checksum,
                unique_id: header.unique_id,
                message_code: header.message_code,
                code_name,
                frame: hex::encode(frame),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["LENGTH", "CHECKSUM", "ID", "CODE", "FRAME"])
                .add_row(vec![
                    header.bytes_total.to_string(),
                    format!("{:#04x}", header.checksum),
                    format!("{:#06x}", header.unique_id),
                    format!("{:#06x} ({code_name})", header.message_code),
                    hex::encode(frame),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => print_hex(frame, format),
    }
}

/// Print bytes as a hex string, or as-is for `raw`.
pub fn print_hex(data: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Raw => print_raw(data),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "frame": hex::encode(data), "size": data.len() })
        ),
        OutputFormat::Table | OutputFormat::Pretty => println!("{}", hex::encode(data)),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("<binary {} bytes: {}>", payload.len(), hex::encode(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_falls_back_to_hex() {
        assert_eq!(payload_preview(b"hello"), "hello");
        assert_eq!(payload_preview(&[0xFF, 0x00]), "<binary 2 bytes: ff00>");
    }

    #[test]
    fn error_detail_wins_over_payload() {
        let mut row = DeliveryRow::new("faulty", 1);
        row.error = Some("checksum mismatch".into());
        row.payload_hex = Some("00".into());
        assert_eq!(row.detail(), "checksum mismatch");
    }
}

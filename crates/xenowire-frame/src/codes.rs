//! Built-in message codes.
//!
//! Codes 0x0000-0x00FF are reserved for protocol use.
//! Codes 0x0100-0xFFFF are available for application-defined events.

/// Undefined event. Never resolves to a definition.
pub const UNDEFINED: u16 = 0x0000;

/// Acknowledgement of a prior message.
pub const REPLY: u16 = 0x0001;

/// Request that the counterparty retransmit a prior message.
pub const REPLY_RETRY: u16 = 0x0002;

/// The counterparty's message could not be handled.
pub const REPLY_FAIL: u16 = 0x0003;

/// First application-defined message code.
pub const USER_CODE_START: u16 = 0x0100;

/// Returns a human-readable name for a built-in message code.
pub fn code_name(code: u16) -> &'static str {
    match code {
        UNDEFINED => "UNDEFINED",
        REPLY => "REPLY",
        REPLY_RETRY => "REPLY_RETRY",
        REPLY_FAIL => "REPLY_FAIL",
        0x0004..=0x00FF => "RESERVED",
        _ => "USER",
    }
}

/// Returns true if the code is one of the three reply codes.
pub fn is_reply(code: u16) -> bool {
    matches!(code, REPLY | REPLY_RETRY | REPLY_FAIL)
}

/// Returns true if the code is in the reserved range.
pub fn is_reserved(code: u16) -> bool {
    code < USER_CODE_START
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cover_ranges() {
        assert_eq!(code_name(REPLY_RETRY), "REPLY_RETRY");
        assert_eq!(code_name(0x0042), "RESERVED");
        assert_eq!(code_name(0x0100), "USER");
    }

    #[test]
    fn reply_codes() {
        assert!(is_reply(REPLY));
        assert!(is_reply(REPLY_FAIL));
        assert!(!is_reply(UNDEFINED));
        assert!(!is_reply(USER_CODE_START));
        assert!(is_reserved(REPLY));
        assert!(!is_reserved(USER_CODE_START));
    }
}

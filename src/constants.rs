// Copyright (c) 2026 Arc Asumity
// Licensed under the GPLv3 or later License.
// See LICENSE file for details.
//
// src/constants.rs
// Constants during compilation.

pub const POPD_NAME: &str = "Arcpost POP3d";
pub const SMTPD_NAME: &str = "Arcpost SMTPd";

/// Longest protocol line either daemon accepts, CRLF included.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Recipients accepted per SMTP transaction.
pub const MAX_RECIPIENTS: usize = 30;

/// RFC 5321 section 4.5.3.1.7 floor for message content.
pub const DATA_BUFFER_INITIAL: usize = 64000;

/// Hard cap on a single message body. Exceeding it aborts the
/// transaction with 451 at end-of-data.
pub const DATA_BUFFER_MAX: usize = 8 * 1024 * 1024;

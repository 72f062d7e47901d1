//! Receipt number generation.
//!
//! Receipt numbers are human-decodable: `NM-<base36 unix seconds>-<last 4
//! chars of the payment id>`. The timestamp part sorts roughly
//! chronologically, the id suffix disambiguates same-second receipts.

use chrono::{DateTime, Utc};

use crate::domain::foundation::PaymentId;

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates the receipt number for a confirmed payment.
pub fn receipt_number(payment_id: PaymentId, paid_at: DateTime<Utc>) -> String {
    let id = payment_id.to_string();
    let suffix = &id[id.len() - 4..];
    format!("NM-{}-{}", to_base36(paid_at.timestamp() as u64), suffix)
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base36 alphabet is ASCII")
}

//! Gateway callback payloads.
//!
//! The gateway delivers two asynchronous callback families: STK push
//! results (nested under `Body.stkCallback` with a `{Name, Value}` metadata
//! item list) and C2B confirmations (a flat object). Payloads are parsed
//! into these types for field access but persisted verbatim — the audit
//! copy is always the raw JSON, never a re-serialization.

use crate::error::{ReconError, ReconResult};
use crate::types::Cents;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ── Money and timestamps ───────────────────────────────────────────

/// Parse a gateway amount ("1500", "1500.5", "1500.50") into cents.
/// Rejects sub-cent precision and anything non-numeric.
pub fn parse_amount(input: &str) -> ReconResult<Cents> {
    let malformed = || ReconError::MalformedAmount {
        input: input.to_string(),
    };

    let s = input.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(malformed());
    }
    if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let whole: Cents = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| malformed())?
    };
    let frac_cents: Cents = match frac.len() {
        0 => 0,
        1 => frac.parse::<Cents>().map_err(|_| malformed())? * 10,
        _ => frac.parse().map_err(|_| malformed())?,
    };

    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(frac_cents))
        .ok_or_else(malformed)?;
    Ok(if negative { -cents } else { cents })
}

/// Parse a gateway transaction timestamp: `YYYYMMDDHHMMSS`, or the
/// truncated `YYYYMMDDHHMM` some payloads carry.
pub fn parse_trans_time(raw: &str) -> ReconResult<NaiveDateTime> {
    let malformed = || ReconError::MalformedTimestamp {
        input: raw.to_string(),
    };
    let padded;
    let s = match raw.len() {
        14 => raw,
        12 => {
            padded = format!("{raw}00");
            &padded
        }
        _ => return Err(malformed()),
    };
    NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S").map_err(|_| malformed())
}

/// Human-facing timestamp form stored on payment records.
pub fn display_time(ts: &NaiveDateTime) -> String {
    ts.format("%d/%m/%Y %H:%M").to_string()
}

// ── STK push callbacks ─────────────────────────────────────────────

/// Metadata item values arrive as strings or numbers depending on the
/// field; both forms are accepted everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Number(serde_json::Number),
    Text(String),
}

impl MetadataValue {
    pub fn as_text(&self) -> String {
        match self {
            MetadataValue::Number(n) => n.to_string(),
            MetadataValue::Text(s) => s.clone(),
        }
    }

    pub fn to_cents(&self) -> ReconResult<Cents> {
        parse_amount(&self.as_text())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<MetadataValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkBody,
}

impl StkCallback {
    fn metadata(&self, name: &str) -> Option<&MetadataValue> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|i| i.name == name)?
            .value
            .as_ref()
    }

    pub fn amount(&self) -> Option<&MetadataValue> {
        self.metadata("Amount")
    }

    pub fn phone_number(&self) -> Option<String> {
        self.metadata("PhoneNumber").map(|v| v.as_text())
    }

    pub fn receipt(&self) -> Option<String> {
        self.metadata("MpesaReceiptNumber").map(|v| v.as_text())
    }

    pub fn transaction_date(&self) -> Option<String> {
        self.metadata("TransactionDate").map(|v| v.as_text())
    }

    /// The idempotency key: checkout request id, falling back to the
    /// merchant request id on older payloads.
    pub fn transaction_id(&self) -> &str {
        if self.checkout_request_id.is_empty() {
            &self.merchant_request_id
        } else {
            &self.checkout_request_id
        }
    }
}

// ── C2B confirmations ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct C2bConfirmation {
    #[serde(rename = "TransactionType", default)]
    pub transaction_type: Option<String>,
    #[serde(rename = "TransID")]
    pub trans_id: String,
    #[serde(rename = "TransTime")]
    pub trans_time: String,
    #[serde(rename = "TransAmount")]
    pub trans_amount: MetadataValue,
    #[serde(rename = "BusinessShortCode", default)]
    pub business_short_code: Option<MetadataValue>,
    #[serde(rename = "BillRefNumber", default)]
    pub bill_ref_number: Option<String>,
    #[serde(rename = "MSISDN")]
    pub msisdn: String,
    #[serde(rename = "FirstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "MiddleName", default)]
    pub middle_name: Option<String>,
    #[serde(rename = "LastName", default)]
    pub last_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_amount_handles_gateway_forms() {
        assert_eq!(parse_amount("1500").unwrap(), 150_000);
        assert_eq!(parse_amount("1500.5").unwrap(), 150_050);
        assert_eq!(parse_amount("1500.50").unwrap(), 150_050);
        assert_eq!(parse_amount(" 99.05 ").unwrap(), 9_905);
        assert_eq!(parse_amount("0").unwrap(), 0);
        assert_eq!(parse_amount("-20").unwrap(), -2_000);
    }

    #[test]
    fn parse_amount_rejects_garbage_and_sub_cent_precision() {
        for bad in ["", ".", "abc", "12.345", "1,500", "1.2.3"] {
            assert!(parse_amount(bad).is_err(), "expected failure for {bad:?}");
        }
    }

    #[test]
    fn parse_trans_time_accepts_both_gateway_lengths() {
        let full = parse_trans_time("20240315143022").unwrap();
        assert_eq!(display_time(&full), "15/03/2024 14:30");
        let short = parse_trans_time("202403151430").unwrap();
        assert_eq!(full.date(), short.date());
        assert!(parse_trans_time("2024-03-15").is_err());
        assert!(parse_trans_time("20241315143022").is_err());
    }

    #[test]
    fn stk_envelope_parses_and_extracts_metadata() {
        let payload = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            { "Name": "Amount", "Value": 1500.0 },
                            { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                            { "Name": "TransactionDate", "Value": 20240315143022u64 },
                            { "Name": "PhoneNumber", "Value": 254712345678u64 }
                        ]
                    }
                }
            }
        });
        let envelope: StkCallbackEnvelope = serde_json::from_value(payload).unwrap();
        let cb = &envelope.body.stk_callback;
        assert_eq!(cb.result_code, 0);
        assert_eq!(cb.transaction_id(), "ws_CO_191220191020363925");
        assert_eq!(cb.amount().unwrap().to_cents().unwrap(), 150_000);
        assert_eq!(cb.phone_number().as_deref(), Some("254712345678"));
        assert_eq!(cb.receipt().as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(cb.transaction_date().as_deref(), Some("20240315143022"));
    }

    #[test]
    fn stk_callback_without_metadata_has_no_phone() {
        let payload = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-2",
                    "CheckoutRequestID": "ws_CO_2611",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        });
        let envelope: StkCallbackEnvelope = serde_json::from_value(payload).unwrap();
        let cb = &envelope.body.stk_callback;
        assert_eq!(cb.result_code, 1032);
        assert!(cb.phone_number().is_none());
    }

    #[test]
    fn c2b_confirmation_parses() {
        let payload = json!({
            "TransactionType": "Pay Bill",
            "TransID": "RKTQDM7W6S",
            "TransTime": "20240315143022",
            "TransAmount": "1500.00",
            "BusinessShortCode": 600638,
            "BillRefNumber": "PLOT-7",
            "MSISDN": "254712345678",
            "FirstName": "JOHN"
        });
        let conf: C2bConfirmation = serde_json::from_value(payload).unwrap();
        assert_eq!(conf.trans_id, "RKTQDM7W6S");
        assert_eq!(conf.trans_amount.to_cents().unwrap(), 150_000);
        assert_eq!(conf.msisdn, "254712345678");
    }

    #[test]
    fn amount_parsing_is_exact_for_fractional_values() {
        // Values like 0.1 must not pick up float drift on the way to cents.
        let v: MetadataValue = serde_json::from_value(json!(0.1)).unwrap();
        assert_eq!(v.to_cents().unwrap(), 10);
    }
}

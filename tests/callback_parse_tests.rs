use bigdecimal::BigDecimal;
use serde_json::json;
use std::str::FromStr;

use subpay_backend::payments::providers::mobile_money::CallbackDocument;

fn success_payload() -> serde_json::Value {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        {"Name": "Amount", "Value": 300000.0},
                        {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                        {"Name": "TransactionDate", "Value": 20260807143000u64},
                        {"Name": "PhoneNumber", "Value": 254712345678u64}
                    ]
                }
            }
        }
    })
}

#[test]
fn success_callback_parses_and_extracts_charge() {
    let document: CallbackDocument =
        serde_json::from_value(success_payload()).expect("payload should parse");
    let callback = document.body.stk_callback;

    assert!(callback.is_success());
    assert_eq!(callback.checkout_request_id, "ws_CO_191220191020363925");

    let charge = callback.extract_charge().expect("charge should extract");
    assert_eq!(charge.transaction_id, "NLJ7RT61SV");
    assert_eq!(charge.amount, BigDecimal::from_str("300000.0").unwrap());
    assert_eq!(charge.msisdn.as_deref(), Some("254712345678"));
    assert!(charge.paid_at.is_some());
}

#[test]
fn failure_callback_parses_without_metadata() {
    let payload = json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-2",
                "CheckoutRequestID": "ws_CO_191220191020363926",
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user"
            }
        }
    });

    let document: CallbackDocument =
        serde_json::from_value(payload).expect("payload should parse");
    let callback = document.body.stk_callback;

    assert!(!callback.is_success());
    assert_eq!(callback.result_code, 1032);
    assert!(callback.callback_metadata.is_none());
    // A failure result carries nothing to charge against.
    assert!(callback.extract_charge().is_err());
}

#[test]
fn top_level_garbage_does_not_parse() {
    for raw in [
        "",
        "not json at all",
        r#"{"Body": {}}"#,
        r#"{"unexpected": true}"#,
        r#"{"Body": {"stkCallback": {"ResultCode": 0}}}"#,
    ] {
        assert!(
            serde_json::from_str::<CallbackDocument>(raw).is_err(),
            "payload unexpectedly parsed: {}",
            raw
        );
    }
}

#[test]
fn amount_reported_as_string_still_extracts() {
    let payload = json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "m-3",
                "CheckoutRequestID": "ws_CO_3",
                "ResultCode": 0,
                "ResultDesc": "ok",
                "CallbackMetadata": {
                    "Item": [
                        {"Name": "Amount", "Value": "150000"},
                        {"Name": "MpesaReceiptNumber", "Value": "QFX0023ABC"}
                    ]
                }
            }
        }
    });

    let document: CallbackDocument =
        serde_json::from_value(payload).expect("payload should parse");
    let charge = document
        .body
        .stk_callback
        .extract_charge()
        .expect("charge should extract");

    assert_eq!(charge.amount, BigDecimal::from(150_000));
    assert!(charge.paid_at.is_none());
    assert!(charge.msisdn.is_none());
}

#[test]
fn metadata_item_without_value_is_tolerated() {
    let payload = json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "m-4",
                "CheckoutRequestID": "ws_CO_4",
                "ResultCode": 0,
                "ResultDesc": "ok",
                "CallbackMetadata": {
                    "Item": [
                        {"Name": "Balance"},
                        {"Name": "Amount", "Value": 1000},
                        {"Name": "MpesaReceiptNumber", "Value": "QFX0023ABD"}
                    ]
                }
            }
        }
    });

    let document: CallbackDocument =
        serde_json::from_value(payload).expect("payload should parse");
    assert!(document.body.stk_callback.extract_charge().is_ok());
}

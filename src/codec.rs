use crate::models::DeliveryRequest;

// ============================================================================
// Delivery Event Codec
// ============================================================================
//
// Stateless JSON decode/encode for topic payloads. Every field of a
// DeliveryRequest is required; a missing or null field fails decoding.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Message has no payload")]
    EmptyPayload,

    #[error("Malformed delivery request: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn decode_delivery_request(payload: Option<&[u8]>) -> Result<DeliveryRequest, CodecError> {
    match payload {
        Some(bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(bytes)?),
        _ => Err(CodecError::EmptyPayload),
    }
}

#[cfg(test)]
pub fn encode_delivery_request(request: &DeliveryRequest) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(request)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_payload() {
        let payload = br#"{"orderId":42,"deliveryAddress":"1 Main St","deliveryDate":"2024-01-01"}"#;
        let request = decode_delivery_request(Some(&payload[..])).unwrap();

        assert_eq!(request.order_id, 42);
        assert_eq!(request.delivery_address, "1 Main St");
        assert_eq!(request.delivery_date, "2024-01-01");
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let payload = br#"{"orderId":1,"deliveryAddress":"a","deliveryDate":"d","courier":"x"}"#;
        assert!(decode_delivery_request(Some(&payload[..])).is_ok());
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let payload = br#"{"orderId":42,"deliveryAddress":"1 Main St"}"#;
        assert!(matches!(
            decode_delivery_request(Some(&payload[..])),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_null_fields() {
        let null_id = br#"{"orderId":null,"deliveryAddress":"a","deliveryDate":"d"}"#;
        let null_date = br#"{"orderId":1,"deliveryAddress":"a","deliveryDate":null}"#;

        assert!(decode_delivery_request(Some(&null_id[..])).is_err());
        assert!(decode_delivery_request(Some(&null_date[..])).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage_and_empty() {
        assert!(matches!(
            decode_delivery_request(Some(&b"not json"[..])),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            decode_delivery_request(Some(&b""[..])),
            Err(CodecError::EmptyPayload)
        ));
        assert!(matches!(
            decode_delivery_request(None),
            Err(CodecError::EmptyPayload)
        ));
    }

    #[test]
    fn test_encode_uses_wire_field_names() {
        let request = DeliveryRequest {
            order_id: 9,
            delivery_address: "2 High St".to_string(),
            delivery_date: "2024-02-02".to_string(),
        };
        let bytes = encode_delivery_request(&request).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["orderId"], 9);
        assert_eq!(value["deliveryAddress"], "2 High St");
        assert_eq!(decode_delivery_request(Some(bytes.as_slice())).unwrap(), request);
    }
}

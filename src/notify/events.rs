use serde::Serialize;

/// Server push events (§6): `{type, data}` with `type in {flash_sale_result,
/// order_status_change}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum PushEvent {
    #[serde(rename = "flash_sale_result")]
    FlashSaleResult {
        activity_id: i64,
        success: bool,
        order_no: Option<String>,
        ticket: String,
        message: String,
    },
    #[serde(rename = "order_status_change")]
    OrderStatusChange {
        order_no: String,
        old_status: String,
        new_status: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_sale_result_serializes_with_tagged_envelope() {
        let event = PushEvent::FlashSaleResult {
            activity_id: 1,
            success: true,
            order_no: Some("FS123".into()),
            ticket: "TK456".into(),
            message: "ok".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "flash_sale_result");
        assert_eq!(json["data"]["order_no"], "FS123");
    }
}

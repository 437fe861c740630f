//! Purpose: End-to-end coverage for typed decode, full encode, and diff encode.
//! Exports: Integration tests only.
//! Role: Drives envelope unwrap + serializer the way a client round-trips an order.
//! Invariants: Assertions compare parsed JSON, except where member order is the subject.
use serde::Deserialize;
use serde_json::{Value, json};
use time::PrimitiveDateTime;
use time::macros::datetime;
use uuid::Uuid;
use verbose_odata::api::{
    DateStyle, EncodeOptions, EntityType, FieldDescriptor, FieldValue, NoTracking, Record,
    TrackedEntities, decode, decode_list, encode, encode_diff, encode_with, legacy_date,
    unwrap_array, unwrap_object,
};

static SALES_ORDER: EntityType = EntityType::new(
    "SalesOrder",
    &[
        FieldDescriptor::new("OrderID").key(),
        FieldDescriptor::new("Description"),
        FieldDescriptor::new("OrderDate"),
        FieldDescriptor::new("AmountDC").read_only(),
        FieldDescriptor::new("SalesOrderLines").collection(),
    ],
);

static SALES_ORDER_LINE: EntityType = EntityType::new(
    "SalesOrderLine",
    &[
        FieldDescriptor::new("ID").key(),
        FieldDescriptor::new("Item"),
        FieldDescriptor::new("Quantity"),
        FieldDescriptor::new("Notes").collection(),
    ],
);

static LINE_NOTE: EntityType = EntityType::new(
    "LineNote",
    &[FieldDescriptor::new("ID").key(), FieldDescriptor::new("Text")],
);

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
struct SalesOrder {
    #[serde(rename = "OrderID", default)]
    order_id: Uuid,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "OrderDate", default, with = "legacy_date::serde::option")]
    order_date: Option<PrimitiveDateTime>,
    #[serde(rename = "AmountDC", default)]
    amount_dc: f64,
    #[serde(rename = "SalesOrderLines", default)]
    lines: Option<Vec<SalesOrderLine>>,
}

impl Record for SalesOrder {
    fn entity_type(&self) -> &'static EntityType {
        &SALES_ORDER
    }

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "OrderID" => self.order_id.into(),
            "Description" => self.description.as_deref().into(),
            "OrderDate" => self.order_date.into(),
            "AmountDC" => self.amount_dc.into(),
            "SalesOrderLines" => self.lines.as_ref().into(),
            _ => FieldValue::Null,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
struct SalesOrderLine {
    #[serde(rename = "ID", default)]
    id: Uuid,
    #[serde(rename = "Item", default)]
    item: Option<String>,
    #[serde(rename = "Quantity", default)]
    quantity: f64,
    #[serde(rename = "Notes", default)]
    notes: Option<Vec<LineNote>>,
}

impl Record for SalesOrderLine {
    fn entity_type(&self) -> &'static EntityType {
        &SALES_ORDER_LINE
    }

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "ID" => self.id.into(),
            "Item" => self.item.as_deref().into(),
            "Quantity" => self.quantity.into(),
            "Notes" => self.notes.as_ref().into(),
            _ => FieldValue::Null,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
struct LineNote {
    #[serde(rename = "ID", default)]
    id: Uuid,
    #[serde(rename = "Text", default)]
    text: Option<String>,
}

impl Record for LineNote {
    fn entity_type(&self) -> &'static EntityType {
        &LINE_NOTE
    }

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "ID" => self.id.into(),
            "Text" => self.text.as_deref().into(),
            _ => FieldValue::Null,
        }
    }
}

const ORDER_ID: &str = "6a0e9d7c-5b0d-4b3a-9b1e-2f1c3d4e5f60";
const LINE_1: &str = "00000000-0000-0000-0000-000000000001";
const LINE_2: &str = "00000000-0000-0000-0000-000000000002";
const NOTE_1: &str = "00000000-0000-0000-0000-0000000000a1";

fn order_response() -> String {
    json!({"d": {
        "__metadata": {"uri": "https://host/api/v1/1/salesorder/SalesOrders(guid'x')"},
        "OrderID": ORDER_ID,
        "Description": "Spring restock",
        "OrderDate": "/Date(1614834367089)/",
        "AmountDC": 125.5,
        "SalesOrderLines": {"results": [
            {"ID": LINE_1, "Item": "Bolts", "Quantity": 10.0},
            {"ID": LINE_2, "Item": "Nuts", "Quantity": 20.0},
        ]},
    }})
    .to_string()
}

fn load_order() -> SalesOrder {
    let json = unwrap_object(&order_response()).expect("unwrap");
    decode(&json).expect("decode")
}

/// Order whose first line carries one note, with every line and note tracked.
fn load_order_with_notes() -> (SalesOrder, TrackedEntities) {
    let mut order = load_order();
    if let Some(lines) = order.lines.as_mut() {
        lines[0].notes = Some(vec![LineNote {
            id: Uuid::parse_str(NOTE_1).expect("uuid"),
            text: Some("Check torque".to_string()),
        }]);
    }
    let mut tracked = TrackedEntities::new();
    for line in order.lines.as_deref().unwrap_or_default() {
        tracked.track(line);
        tracked.track_all(line.notes.as_deref().unwrap_or_default());
    }
    (order, tracked)
}

fn parse(text: &str) -> Value {
    serde_json::from_str(text).expect("json")
}

#[test]
fn decode_reads_flattened_lines_and_legacy_dates() {
    let order = load_order();
    assert_eq!(order.order_id, Uuid::parse_str(ORDER_ID).expect("uuid"));
    assert_eq!(order.order_date, Some(datetime!(2021-03-04 05:06:07.089)));
    assert_eq!(order.amount_dc, 125.5);
    let lines = order.lines.as_ref().expect("lines");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].item.as_deref(), Some("Nuts"));
}

#[test]
fn decode_accepts_iso_dates() {
    let order: SalesOrder =
        decode(r#"{"OrderDate":"2021-03-04T05:06:07Z"}"#).expect("decode");
    assert_eq!(order.order_date, Some(datetime!(2021-03-04 05:06:07)));
}

#[test]
fn decode_list_from_collection_envelope() {
    let body = json!({"d": {"results": [
        {"ID": LINE_1, "Item": "Bolts", "Quantity": 1},
        {"ID": LINE_2, "Item": "Nuts", "Quantity": 2},
    ]}});
    let json = unwrap_array(&body.to_string()).expect("unwrap");
    let lines: Vec<SalesOrderLine> = decode_list(Some(&json)).expect("decode");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].quantity, 1.0);
}

#[test]
fn full_encode_skips_identity_and_read_only_fields() {
    let order = SalesOrder {
        description: Some("New order".to_string()),
        order_date: Some(datetime!(2024-05-06 07:08:09)),
        amount_dc: 99.0,
        lines: Some(vec![SalesOrderLine {
            item: Some("Bolts".to_string()),
            quantity: 3.0,
            ..SalesOrderLine::default()
        }]),
        ..SalesOrder::default()
    };
    let text = encode(&order).expect("encoded");
    assert_eq!(
        parse(&text),
        json!({
            "Description": "New order",
            "OrderDate": "2024-05-06T07:08",
            "SalesOrderLines": [{"Item": "Bolts", "Quantity": 3.0}],
        })
    );
    assert!(text.starts_with(r#"{"Description":"#));
}

#[test]
fn full_encode_with_legacy_dates() {
    let order = SalesOrder {
        order_date: Some(datetime!(2021-03-04 05:06:07.089)),
        ..SalesOrder::default()
    };
    let options = EncodeOptions::default().with_date_style(DateStyle::Legacy);
    let text = encode_with(&order, &options).expect("encoded");
    assert_eq!(
        parse(&text),
        json!({"Description": null, "OrderDate": "/Date(1614834367089)/"})
    );
}

#[test]
fn null_collections_are_never_written() {
    let order = SalesOrder {
        description: Some("x".to_string()),
        ..SalesOrder::default()
    };
    let text = encode(&order).expect("encoded");
    assert!(parse(&text).get("SalesOrderLines").is_none());
}

#[test]
fn unchanged_entity_diffs_to_empty_object() {
    let original = load_order();
    let mut tracked = TrackedEntities::new();
    tracked.track_all(original.lines.as_deref().unwrap_or_default());
    let current = original.clone();
    assert_eq!(encode_diff(&original, &current, &tracked).as_deref(), Some("{}"));
}

#[test]
fn diff_writes_only_changed_scalars() {
    let original = load_order();
    let mut tracked = TrackedEntities::new();
    tracked.track_all(original.lines.as_deref().unwrap_or_default());

    let mut current = original.clone();
    current.description = Some("Summer restock".to_string());
    current.amount_dc = 1.0;

    let text = encode_diff(&original, &current, &tracked).expect("diff");
    assert_eq!(parse(&text), json!({"Description": "Summer restock"}));
}

#[test]
fn diff_writes_changed_lines_per_item() {
    let original = load_order();
    let mut tracked = TrackedEntities::new();
    assert_eq!(
        tracked.track_all(original.lines.as_deref().unwrap_or_default()),
        2
    );

    let mut current = original.clone();
    if let Some(lines) = current.lines.as_mut() {
        lines[1].quantity = 25.0;
    }

    let text = encode_diff(&original, &current, &tracked).expect("diff");
    assert_eq!(
        parse(&text),
        json!({"SalesOrderLines": [{"Quantity": 25.0}]})
    );
}

#[test]
fn untracked_new_lines_are_written_in_full() {
    let original = load_order();
    let mut tracked = TrackedEntities::new();
    tracked.track_all(original.lines.as_deref().unwrap_or_default());

    let mut current = original.clone();
    if let Some(lines) = current.lines.as_mut() {
        lines.push(SalesOrderLine {
            item: Some("Washers".to_string()),
            quantity: 5.0,
            ..SalesOrderLine::default()
        });
    }

    let text = encode_diff(&original, &current, &tracked).expect("diff");
    assert_eq!(
        parse(&text),
        json!({"SalesOrderLines": [{"Item": "Washers", "Quantity": 5.0}]})
    );
}

#[test]
fn lines_without_tracking_count_as_updated() {
    let original = load_order();
    let current = original.clone();
    let text = encode_diff(&original, &current, &NoTracking).expect("diff");
    let written = parse(&text);
    let lines = written["SalesOrderLines"].as_array().expect("lines");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["ID"], json!(LINE_1));
    assert_eq!(lines[0]["Item"], json!("Bolts"));
}

#[test]
fn encode_then_decode_keeps_writable_fields() {
    let order = SalesOrder {
        description: Some("Round trip".to_string()),
        order_date: Some(datetime!(2024-05-06 07:08:09.5)),
        amount_dc: 42.0,
        lines: Some(vec![SalesOrderLine {
            item: Some("Bolts".to_string()),
            quantity: 4.0,
            ..SalesOrderLine::default()
        }]),
        ..SalesOrder::default()
    };
    let decoded: SalesOrder = decode(&encode(&order).expect("encoded")).expect("decode");
    assert_eq!(decoded.description, order.description);
    assert_eq!(decoded.order_date, Some(datetime!(2024-05-06 07:08)));
    assert_eq!(decoded.amount_dc, 0.0);
    assert_eq!(decoded.lines, order.lines);
}

#[test]
fn cleared_identifier_is_never_sent_in_diff() {
    let original = load_order();
    let mut current = original.clone();
    current.order_id = Uuid::nil();
    current.description = Some("Changed".to_string());

    let text = encode_diff(&original, &current, &NoTracking).expect("diff");
    assert_eq!(parse(&text), json!({"Description": "Changed"}));
}

#[test]
fn cleared_lines_are_written_as_null() {
    let original = load_order();
    let mut current = original.clone();
    current.lines = None;

    let text = encode_diff(&original, &current, &NoTracking).expect("diff");
    assert_eq!(parse(&text), json!({"SalesOrderLines": null}));

    let mut empty = original.clone();
    empty.lines = None;
    assert_eq!(encode_diff(&empty, &current, &NoTracking).as_deref(), Some("{}"));
}

#[test]
fn edits_two_levels_down_reach_the_diff() {
    let (original, tracked) = load_order_with_notes();
    assert_eq!(
        encode_diff(&original, &original.clone(), &tracked).as_deref(),
        Some("{}")
    );

    let mut current = original.clone();
    if let Some(notes) = current
        .lines
        .as_mut()
        .and_then(|lines| lines[0].notes.as_mut())
    {
        notes[0].text = Some("Torque to 40 Nm".to_string());
    }

    let text = encode_diff(&original, &current, &tracked).expect("diff");
    assert_eq!(
        parse(&text),
        json!({"SalesOrderLines": [{"Notes": [{"Text": "Torque to 40 Nm"}]}]})
    );
}

#[test]
fn untracked_notes_on_tracked_lines_are_written() {
    let (original, tracked) = load_order_with_notes();
    let mut current = original.clone();
    if let Some(lines) = current.lines.as_mut() {
        lines[1].notes = Some(vec![LineNote {
            text: Some("Fragile".to_string()),
            ..LineNote::default()
        }]);
    }

    let text = encode_diff(&original, &current, &tracked).expect("diff");
    assert_eq!(
        parse(&text),
        json!({"SalesOrderLines": [{"Notes": [{"Text": "Fragile"}]}]})
    );
}

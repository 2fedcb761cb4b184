//! End-to-end tests for worksheet roundtrips (write -> close -> reopen -> read)

use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use sheetmap::prelude::*;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum Status {
    #[default]
    Pending,
    Shipped,
    Cancelled,
}
enum_field!(Status {
    Pending,
    Shipped,
    Cancelled
});

/// Stored as a one-letter code through converters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum Priority {
    Low,
    #[default]
    Normal,
    Urgent,
}
enum_field!(Priority { Low, Normal, Urgent });

impl Priority {
    fn code(self) -> &'static str {
        match self {
            Priority::Low => "L",
            Priority::Normal => "N",
            Priority::Urgent => "U",
        }
    }

    fn from_code(code: &str) -> Result<Self> {
        match code {
            "L" => Ok(Priority::Low),
            "N" => Ok(Priority::Normal),
            "U" => Ok(Priority::Urgent),
            other => Err(Error::other(format!("unknown priority code '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Order {
    id: u32,
    customer: String,
    total: Decimal,
    weight: f64,
    paid: bool,
    grade: char,
    placed: NaiveDateTime,
    shipped_on: Option<NaiveDate>,
    note: Option<String>,
    status: Status,
    priority: Priority,
    sequence: u64,
}

struct OrderMap;

impl ClassMapper for OrderMap {
    type Record = Order;

    fn configure(map: &mut ClassMap<Order>) {
        map.map(field!(Order, id)).name("Order Id");
        map.map(field!(Order, customer)).name("Customer");
        map.map(field!(Order, total)).name("Total");
        map.map(field!(Order, weight)).name("Weight (kg)");
        map.map(field!(Order, paid)).name("Paid");
        map.map(field!(Order, grade)).name("Grade");
        map.map(field!(Order, placed)).name("Placed");
        map.map(field!(Order, shipped_on)).name("Shipped On");
        map.map(field!(Order, note));
        map.map(field!(Order, status)).name("Status");
        map.map(field!(Order, priority))
            .name("Priority")
            .write_using(|o: &Order| o.priority.code())
            .read_using(|row: &ReaderRow<'_>| {
                Priority::from_code(row.value_by_header("Priority")?)
            });
        map.map(field!(Order, sequence)).name("Sequence");
    }
}

fn sample_orders() -> Vec<Order> {
    vec![
        Order {
            id: 1,
            customer: "Acme & Sons <Ltd>".into(),
            total: Decimal::from_str("1250.75").unwrap(),
            weight: 12.5,
            paid: true,
            grade: 'A',
            placed: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            shipped_on: NaiveDate::from_ymd_opt(2024, 3, 4),
            note: Some("  leading spaces kept".into()),
            status: Status::Shipped,
            priority: Priority::Urgent,
            sequence: u64::MAX,
        },
        Order {
            id: 2,
            customer: "Globex \u{1F600}".into(),
            total: Decimal::from_str("-3.10").unwrap(),
            weight: 0.001,
            paid: false,
            grade: 'C',
            placed: NaiveDate::from_ymd_opt(1999, 12, 31)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap(),
            shipped_on: None,
            note: None,
            status: Status::Cancelled,
            priority: Priority::Low,
            sequence: 0,
        },
        Order {
            id: 3,
            customer: "Acme & Sons <Ltd>".into(),
            total: Decimal::ZERO,
            weight: 1e6,
            paid: true,
            grade: 'B',
            placed: NaiveDate::from_ymd_opt(1900, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            shipped_on: None,
            note: Some("multi\nline".into()),
            status: Status::Pending,
            priority: Priority::Normal,
            sequence: 9_007_199_254_740_993,
        },
    ]
}

#[derive(Debug, Default)]
struct StoredCodes {
    priority: String,
}

struct StoredCodesMap;

impl ClassMapper for StoredCodesMap {
    type Record = StoredCodes;

    fn configure(map: &mut ClassMap<StoredCodes>) {
        map.map(field!(StoredCodes, priority)).name("Priority");
    }
}

#[test]
fn test_roundtrip_all_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.xlsx");
    let orders = sample_orders();

    let mut spreadsheet = Spreadsheet::open_or_create(&path).unwrap();
    spreadsheet
        .write_worksheet::<OrderMap, _>("Orders", &orders, WorksheetStyle::default())
        .unwrap();
    spreadsheet.close().unwrap();

    let spreadsheet = Spreadsheet::open_or_create(&path).unwrap();
    let read = spreadsheet.read_worksheet::<OrderMap>("Orders", 1).unwrap();
    assert_eq!(read, orders);
    assert_eq!(read[0].sequence, u64::MAX);

    // The converter wrote codes, not member names
    let codes: Vec<_> = spreadsheet
        .read_worksheet::<StoredCodesMap>("Orders", 1)
        .unwrap()
        .into_iter()
        .map(|c| c.priority)
        .collect();
    assert_eq!(codes, vec!["U", "L", "N"]);
}

#[test]
fn test_reader_exposes_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("headers.xlsx");

    let mut spreadsheet = Spreadsheet::open_or_create(&path).unwrap();
    spreadsheet
        .write_worksheet::<OrderMap, _>("Orders", &sample_orders(), WorksheetStyle::default())
        .unwrap();

    // Finished sheets are readable before the package is saved
    let mut reader = spreadsheet
        .create_worksheet_reader::<OrderMap>("orders", 1)
        .unwrap();
    let headers = reader.headers().unwrap();
    assert_eq!(headers.get(&1).map(String::as_str), Some("Order Id"));
    assert_eq!(headers.get_key(&"note".to_string()), Some(&9));
    assert_eq!(reader.current_row(), 1);

    let first = reader.read_row().unwrap().unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(reader.current_row(), 2);
    assert_eq!(reader.rows().count(), 2);
    assert!(reader.read_row().unwrap().is_none());
}

#[derive(Debug, Default, PartialEq)]
struct Contact {
    first: String,
    last: String,
    full_name: String,
    source: String,
    rating: u32,
}

struct ContactWriteMap;

impl ClassMapper for ContactWriteMap {
    type Record = Contact;

    fn configure(map: &mut ClassMap<Contact>) {
        map.map(field!(Contact, first)).name("First");
        map.map(field!(Contact, last)).name("Last");
        map.map(field!(Contact, rating)).name("Rating");
        map.map_constant().name("Imported").constant_write("yes");
        map.map_constant()
            .name("Initials")
            .write_using(|c: &Contact| format!("{}{}", &c.first[..1], &c.last[..1]));
    }
}

struct ContactReadMap;

impl ClassMapper for ContactReadMap {
    type Record = Contact;

    fn configure(map: &mut ClassMap<Contact>) {
        map.map(field!(Contact, first)).name("First");
        map.map(field!(Contact, last)).name("Last");
        map.map(field!(Contact, full_name)).read_using(|row: &ReaderRow<'_>| {
            Ok(format!(
                "{} {}",
                row.value_by_header("First")?,
                row.value_by_header("Last")?
            ))
        });
        map.map(field!(Contact, source)).constant_read("spreadsheet");
        map.map(field!(Contact, rating)).name("Rating").default_read(3u32);
    }
}

#[test]
fn test_constants_converters_and_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contacts.xlsx");
    let contacts = vec![
        Contact {
            first: "Grace".into(),
            last: "Hopper".into(),
            rating: 5,
            ..Default::default()
        },
        Contact {
            first: "Alan".into(),
            last: "Turing".into(),
            rating: 0,
            ..Default::default()
        },
    ];

    let mut spreadsheet = Spreadsheet::open_or_create(&path).unwrap();
    spreadsheet
        .write_worksheet::<ContactWriteMap, _>("Contacts", &contacts, WorksheetStyle::default())
        .unwrap();
    spreadsheet.close().unwrap();

    let spreadsheet = Spreadsheet::open_or_create(&path).unwrap();
    let read = spreadsheet
        .read_worksheet::<ContactReadMap>("Contacts", 1)
        .unwrap();

    assert_eq!(
        read,
        vec![
            Contact {
                first: "Grace".into(),
                last: "Hopper".into(),
                full_name: "Grace Hopper".into(),
                source: "spreadsheet".into(),
                rating: 5,
            },
            Contact {
                first: "Alan".into(),
                last: "Turing".into(),
                full_name: "Alan Turing".into(),
                source: "spreadsheet".into(),
                rating: 0,
            },
        ]
    );

    let mut reader = spreadsheet
        .create_worksheet_reader::<ContactReadMap>("Contacts", 1)
        .unwrap();
    let headers = reader.headers().unwrap();
    assert_eq!(headers.get(&4).map(String::as_str), Some("Imported"));
    assert_eq!(headers.get(&5).map(String::as_str), Some("Initials"));
    assert!(reader.read_row().unwrap().is_some());
}

#[derive(Debug, Default, PartialEq)]
struct Reading {
    sensor: String,
    value: f64,
}

struct ReadingByIndex;

impl ClassMapper for ReadingByIndex {
    type Record = Reading;

    fn configure(map: &mut ClassMap<Reading>) {
        map.map(field!(Reading, value)).index(3);
        map.map(field!(Reading, sensor)).index(1);
    }
}

#[test]
fn test_headerless_sheet_by_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("readings.xlsx");
    let readings = vec![
        Reading {
            sensor: "north".into(),
            value: 21.5,
        },
        Reading {
            sensor: "south".into(),
            value: -4.25,
        },
    ];

    let mut spreadsheet = Spreadsheet::open_or_create(&path).unwrap();
    spreadsheet
        .write_worksheet::<ReadingByIndex, _>(
            "Readings",
            &readings,
            WorksheetStyle::default().with_write_header_row(false),
        )
        .unwrap();
    spreadsheet.close().unwrap();

    let spreadsheet = Spreadsheet::open_or_create(&path).unwrap();
    let mut reader = spreadsheet
        .create_worksheet_reader::<ReadingByIndex>("Readings", 0)
        .unwrap();
    assert!(reader.headers().is_none());
    assert_eq!(reader.read_rows().unwrap(), readings);
}

//! Integration tests for schema/seed loading and script execution.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use navstore::loader::{load_schema, load_script, load_seed};
use navstore::{AppError, Session, Step};
use navstore_core::Store;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

const SCHEMA: &str = r#"
[[complex_types]]
name = "CTDimensions"
properties = [
    { name = "Width", type = { primitive = "Int32" } },
    { name = "Unit", type = { primitive = "String" } },
]

[[entity_types]]
name = "ETProduct"
keys = ["Id"]
properties = [
    { name = "Id", type = { primitive = "Int32" }, nullable = false },
    { name = "Name", type = { primitive = "String" } },
    { name = "Tags", type = { primitive = "String" }, collection = true },
    { name = "Size", type = { complex = "CTDimensions" } },
]
navigations = [
    { name = "Category", target = "ETCategory", partner = "Products" },
]

[[entity_types]]
name = "ETCategory"
keys = ["Code"]
properties = [
    { name = "Code", type = { primitive = "String" }, nullable = false },
    { name = "Title", type = { primitive = "String" } },
]
navigations = [
    { name = "Products", target = "ETProduct", collection = true, partner = "Category" },
]

[[entity_sets]]
name = "Products"
entity_type = "ETProduct"
bindings = [{ path = "Category", target = "Categories" }]

[[entity_sets]]
name = "Categories"
entity_type = "ETCategory"
bindings = [{ path = "Products", target = "Products" }]
"#;

const SEED: &str = r#"
{
  "sets": [
    { "name": "Categories", "records": [ { "Code": "lamps", "Title": "Lamps" } ] },
    { "name": "Products", "records": [
        { "Name": "Desk lamp", "Tags": ["desk"], "Size": { "Width": 20, "Unit": "cm" } },
        { "Name": "Floor lamp" }
    ] }
  ],
  "links": [
    { "from": "Products(1)", "navigation": "Category", "to": "Categories('lamps')" }
  ]
}
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn seeded(dir: &TempDir) -> Session {
    let schema = load_schema(&write(dir, "schema.toml", SCHEMA)).unwrap();
    let mut session = Session::new(Store::new(schema).unwrap(), navstore::DEFAULT_BASE_URI);
    session.seed(&load_seed(&write(dir, "seed.json", SEED)).unwrap()).unwrap();
    session
}

fn run(session: &mut Session, dir: &TempDir, script: &Value) -> Result<Vec<Value>, AppError> {
    let path = write(dir, "script.json", &script.to_string());
    load_script(&path)?
        .iter()
        .map(|step| session.execute(step))
        .collect()
}

#[test]
fn seed_creates_records_and_links() {
    let dir = tempdir().unwrap();
    let session = seeded(&dir);

    let products = session.render_all("Products").unwrap();
    assert_eq!(products.as_array().unwrap().len(), 2);
    assert_eq!(products[0]["@id"], json!("Products(1)"));
    assert_eq!(products[0]["Size"], json!({ "Width": 20, "Unit": "cm" }));
    assert_eq!(products[0]["Category@links"], json!(["Categories('lamps')"]));
    assert_eq!(products[1]["Tags"], json!([]));

    let categories = session.render_all("Categories").unwrap();
    assert_eq!(categories[0]["Products@links"], json!(["Products(1)"]));
}

#[test]
fn script_patch_replace_and_delete() {
    let dir = tempdir().unwrap();
    let mut session = seeded(&dir);

    let results = run(
        &mut session,
        &dir,
        &json!([
            { "op": "update", "link": "Products(2)", "record": { "Tags": ["floor"] } },
            { "op": "update", "link": "Products(2)", "record": {}, "patch": false },
            { "op": "delete", "link": "Products(1)" },
            { "op": "create", "set": "Products", "record": { "Name": "Reading lamp" } },
            { "op": "read", "link": "Categories('lamps')" }
        ]),
    )
    .unwrap();

    assert_eq!(results[0]["Name"], json!("Floor lamp"));
    assert_eq!(results[0]["Tags"], json!(["floor"]));
    assert_eq!(results[1]["Name"], Value::Null);
    assert_eq!(results[1]["Tags"], json!([]));
    assert_eq!(results[3]["@id"], json!("Products(1)"));
    assert!(results[4].get("Products@links").is_none());
}

#[test]
fn script_deep_insert_links_partner() {
    let dir = tempdir().unwrap();
    let mut session = seeded(&dir);

    let results = run(
        &mut session,
        &dir,
        &json!([
            {
                "op": "create",
                "set": "Categories",
                "record": {
                    "Title": "Shades",
                    "Products": [ { "Name": "Drum shade" }, { "Name": "Cone shade" } ]
                }
            }
        ]),
    )
    .unwrap();

    // "1" is free: the seeded category uses "lamps".
    assert_eq!(results[0]["@id"], json!("Categories('1')"));
    assert_eq!(results[0]["Products@links"], json!(["Products(3)", "Products(4)"]));

    let shade = session.execute(&Step::Read { link: "Products(4)".into() }).unwrap();
    assert_eq!(shade["Category@links"], json!(["Categories('1')"]));
}

#[test]
fn bad_binding_stops_with_bad_request() {
    let dir = tempdir().unwrap();
    let mut session = seeded(&dir);

    let err = run(
        &mut session,
        &dir,
        &json!([
            {
                "op": "update",
                "link": "Products(2)",
                "record": { "Category@odata.bind": "Categories('nope')" }
            }
        ]),
    )
    .unwrap_err();
    assert_eq!(err.status(), 400);
}

#[test]
fn unknown_set_in_script_is_not_found() {
    let dir = tempdir().unwrap();
    let mut session = seeded(&dir);

    let err = run(&mut session, &dir, &json!([{ "op": "create", "set": "Nowhere" }])).unwrap_err();
    assert_eq!(err.status(), 404);
}

#[test]
fn malformed_schema_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = write(&dir, "broken.toml", "[[entity_types]]\nname = 3\n");
    assert!(matches!(load_schema(&path), Err(AppError::Toml(_))));
    assert!(matches!(
        load_schema(Path::new("missing.toml")),
        Err(AppError::Io { .. })
    ));
}

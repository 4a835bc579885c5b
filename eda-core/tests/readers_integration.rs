//! Integration tests for the file readers and the factory that selects them.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::parquet::arrow::ArrowWriter;
use eda_core::prelude::*;
use eda_core::sources::{DataReader, ReaderFactory, SheetInfo, SourceKind};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Sales" sheetId="1" r:id="rId1"/><sheet name="Notes" sheetId="2" r:id="rId2"/></sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;

const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="6" uniqueCount="6">
<si><t>region</t></si><si><t>units</t></si><si><t>north</t></si><si><t>south</t></si><si><t>east</t></si><si><t>note</t></si>
</sst>"#;

const SALES_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="inlineStr"><is><t>price</t></is></c></row>
<row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>10</v></c><c r="C2"><v>2.5</v></c></row>
<row r="3"><c r="A3" t="s"><v>3</v></c><c r="B3"><v>20</v></c><c r="C3"><v>3</v></c></row>
<row r="4"><c r="A4" t="s"><v>4</v></c><c r="C4"><v>4</v></c></row>
</sheetData></worksheet>"#;

const HEADER_ONLY_WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Template" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

const HEADER_ONLY_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>id</t></is></c><c r="B1" t="inlineStr"><is><t>name</t></is></c></row>
</sheetData></worksheet>"#;

const NOTES_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>5</v></c></row>
<row r="2"><c r="A2" t="inlineStr"><is><t>hello</t></is></c></row>
</sheetData></worksheet>"#;

fn write_text(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    path_string(&path)
}

fn path_string(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

fn write_archive(path: &Path, options: SimpleFileOptions, parts: &[(&str, &str)]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, contents) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn sales_parts() -> [(&'static str, &'static str); 5] {
    [
        ("xl/workbook.xml", WORKBOOK_XML),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/sharedStrings.xml", SHARED_STRINGS),
        ("xl/worksheets/sheet1.xml", SALES_SHEET),
        ("xl/worksheets/sheet2.xml", NOTES_SHEET),
    ]
}

/// Creates a two-sheet workbook: `Sales` (region, units, price) and `Notes`.
fn create_workbook(dir: &TempDir) -> String {
    let path = dir.path().join("sales.xlsx");
    write_archive(&path, SimpleFileOptions::default(), &sales_parts());
    path_string(&path)
}

fn create_parquet(dir: &TempDir) -> String {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("score", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(StringArray::from(vec![Some("Alice"), None, Some("Carol")])),
            Arc::new(Float64Array::from(vec![Some(1.5), Some(2.5), None])),
        ],
    )
    .unwrap();

    let path = dir.path().join("scores.parquet");
    let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    path_string(&path)
}

fn factory() -> ReaderFactory {
    ReaderFactory::new(EdaConfig::default())
}

#[tokio::test]
async fn test_csv_through_factory() {
    let dir = TempDir::new().unwrap();
    let path = write_text(&dir, "data.csv", "A,B\n1,x\n2,y\n3,z\n");

    let reader = factory().select_reader(&path).unwrap();
    assert_eq!(reader.kind(), SourceKind::Delimited { delimiter: b',' });

    let table = reader.read_data(&path, 0).await.unwrap();
    assert_eq!(table.name(), "data");
    assert_eq!(table.shape(), (3, 2));
    assert_eq!(table.column("A").unwrap().kind(), DataKind::Integer);
    assert_eq!(table.column("B").unwrap().kind(), DataKind::Text);
    assert_eq!(table.column("A").unwrap().null_count(), 0);
}

#[tokio::test]
async fn test_header_only_csv_keeps_columns() {
    let dir = TempDir::new().unwrap();
    let path = write_text(&dir, "empty.csv", "A,B\n");

    let table = factory()
        .select_reader(&path)
        .unwrap()
        .read_data(&path, 0)
        .await
        .unwrap();

    assert_eq!(table.shape(), (0, 2));
    assert_eq!(table.column_names(), vec!["A", "B"]);
}

#[tokio::test]
async fn test_tsv_with_missing_values() {
    let dir = TempDir::new().unwrap();
    let path = write_text(&dir, "data.tsv", "id\tprice\n1\t2.5\n2\t\n3\t4.0\n");

    let table = factory()
        .select_reader(&path)
        .unwrap()
        .read_data(&path, 0)
        .await
        .unwrap();

    assert_eq!(table.shape(), (3, 2));
    let price = table.column("price").unwrap();
    assert_eq!(price.kind(), DataKind::Float);
    assert_eq!(price.null_count(), 1);
    assert_eq!(price.numeric_values(), vec![2.5, 4.0]);
}

#[tokio::test]
async fn test_json_lines_through_factory() {
    let dir = TempDir::new().unwrap();
    let path = write_text(
        &dir,
        "events.json",
        "{\"user\": \"a\", \"clicks\": 3}\n{\"user\": \"b\", \"clicks\": 5}\n",
    );

    let reader = factory().select_reader(&path).unwrap();
    assert_eq!(reader.kind(), SourceKind::JsonLines);

    let table = reader.read_data(&path, 0).await.unwrap();
    assert_eq!(table.shape(), (2, 2));
    assert_eq!(table.column("clicks").unwrap().kind(), DataKind::Integer);
    assert_eq!(table.column("user").unwrap().kind(), DataKind::Text);
}

#[tokio::test]
async fn test_parquet_through_factory() {
    let dir = TempDir::new().unwrap();
    let path = create_parquet(&dir);

    let reader = factory().select_reader(&path).unwrap();
    assert_eq!(reader.kind(), SourceKind::Columnar);

    let table = reader.read_data(&path, 0).await.unwrap();
    assert_eq!(table.name(), "scores");
    assert_eq!(table.shape(), (3, 3));
    assert_eq!(table.column("id").unwrap().kind(), DataKind::Integer);
    assert_eq!(table.column("name").unwrap().kind(), DataKind::Text);
    assert_eq!(table.column("name").unwrap().null_count(), 1);
    assert_eq!(table.column("score").unwrap().kind(), DataKind::Float);
    assert_eq!(table.column("score").unwrap().numeric_values(), vec![1.5, 2.5]);
}

#[tokio::test]
async fn test_workbook_first_sheet() {
    let dir = TempDir::new().unwrap();
    let path = create_workbook(&dir);

    let reader = factory().select_reader(&path).unwrap();
    assert_eq!(reader.kind(), SourceKind::Workbook);

    let table = reader.read_data(&path, 0).await.unwrap();
    assert_eq!(table.name(), "sales/Sales");
    assert_eq!(table.column_names(), vec!["region", "units", "price"]);
    assert_eq!(table.shape(), (3, 3));

    assert_eq!(table.column("region").unwrap().kind(), DataKind::Text);
    let units = table.column("units").unwrap();
    assert_eq!(units.kind(), DataKind::Integer);
    assert_eq!(units.null_count(), 1);
    let price = table.column("price").unwrap();
    assert_eq!(price.kind(), DataKind::Float);
    assert_eq!(price.numeric_values(), vec![2.5, 3.0, 4.0]);
}

#[tokio::test]
async fn test_workbook_second_sheet_and_listing() {
    let dir = TempDir::new().unwrap();
    let path = create_workbook(&dir);
    let reader = factory().select_reader(&path).unwrap();

    let sheets = reader.list_sheets(&path).await.unwrap();
    assert_eq!(
        sheets,
        vec![
            SheetInfo {
                index: 0,
                title: "Sales".into()
            },
            SheetInfo {
                index: 1,
                title: "Notes".into()
            },
        ]
    );

    let notes = reader.read_data(&path, 1).await.unwrap();
    assert_eq!(notes.shape(), (1, 1));
    assert_eq!(
        notes.column("note").unwrap().values(),
        &[CellValue::Text("hello".into())]
    );
}

#[tokio::test]
async fn test_workbook_sheet_index_out_of_range() {
    let dir = TempDir::new().unwrap();
    let path = create_workbook(&dir);

    let err = factory()
        .select_reader(&path)
        .unwrap()
        .read_data(&path, 5)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EdaError::SheetIndexOutOfRange { index: 5, count: 2 }
    ));
}

#[tokio::test]
async fn test_header_only_worksheet() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("template.xlsx");
    write_archive(
        &path,
        SimpleFileOptions::default(),
        &[
            ("xl/workbook.xml", HEADER_ONLY_WORKBOOK_XML),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", HEADER_ONLY_SHEET),
        ],
    );
    let path = path_string(&path);

    let table = factory()
        .select_reader(&path)
        .unwrap()
        .read_data(&path, 0)
        .await
        .unwrap();

    assert_eq!(table.shape(), (0, 2));
    assert_eq!(table.column_names(), vec!["id", "name"]);
}

#[tokio::test]
async fn test_workbook_with_bad_checksum_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("damaged.xlsx");
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    write_archive(&path, stored, &sales_parts());

    let mut bytes = std::fs::read(&path).unwrap();
    let needle = b"<v>2.5</v>";
    let at = bytes
        .windows(needle.len())
        .position(|window| window == needle)
        .unwrap();
    bytes[at + 3] = b'7';
    std::fs::write(&path, &bytes).unwrap();
    let path = path_string(&path);

    let reader = factory().select_reader(&path).unwrap();
    assert_eq!(reader.list_sheets(&path).await.unwrap().len(), 2);

    let err = reader.read_data(&path, 0).await.unwrap_err();
    assert!(matches!(err, EdaError::SourceRead { .. }), "{err:?}");
}

#[tokio::test]
async fn test_single_sheet_sources_list_one_entry() {
    let dir = TempDir::new().unwrap();
    let path = write_text(&dir, "data.csv", "A\n1\n");

    let sheets = factory()
        .select_reader(&path)
        .unwrap()
        .list_sheets(&path)
        .await
        .unwrap();

    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].title, "data");
}

#[tokio::test]
async fn test_missing_file_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let path = path_string(&dir.path().join("absent.csv"));

    let err = factory()
        .select_reader(&path)
        .unwrap()
        .read_data(&path, 0)
        .await
        .unwrap_err();

    assert!(matches!(err, EdaError::SourceRead { .. }));
}

#[tokio::test]
async fn test_not_a_workbook() {
    let dir = TempDir::new().unwrap();
    let path = write_text(&dir, "fake.xlsx", "plain text, not a zip archive");

    let err = factory()
        .select_reader(&path)
        .unwrap()
        .read_data(&path, 0)
        .await
        .unwrap_err();

    assert!(matches!(err, EdaError::SourceRead { .. }));
}

#[test]
fn test_unsupported_suffix() {
    let err = factory().select_reader("notes.txt").unwrap_err();
    assert!(matches!(err, EdaError::UnsupportedSourceKind { .. }));
}

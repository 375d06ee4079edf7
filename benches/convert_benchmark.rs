//! Benchmarks for workbook conversion.
//!
//! Run with: cargo bench
//!
//! These benchmarks measure the full pipeline over synthetic workbooks of
//! increasing row counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::{Cursor, Write};
use unxlsx::{ConvertOptions, WorkbookReader};

/// Creates a synthetic workbook with the given number of rows.
fn create_test_workbook(row_count: usize) -> Vec<u8> {
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let mut buffer = Vec::new();
    let mut zip = ZipWriter::new(Cursor::new(&mut buffer));

    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#,
    )
    .unwrap();

    zip.start_file("_rels/.rels", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
    )
    .unwrap();

    zip.start_file("xl/workbook.xml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
    )
    .unwrap();

    zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#,
    )
    .unwrap();

    zip.start_file("xl/sharedStrings.xml", options).unwrap();
    let mut sst = String::from(
        r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">"#,
    );
    for label in ["alpha", "beta", "gamma", "delta"] {
        sst.push_str(&format!("<si><t>{}</t></si>", label));
    }
    sst.push_str("</sst>");
    zip.write_all(sst.as_bytes()).unwrap();

    zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
    let mut sheet = String::with_capacity(row_count * 160);
    sheet.push_str(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for row in 1..=row_count {
        sheet.push_str(&format!(
            "<row r=\"{0}\"><c r=\"A{0}\" t=\"s\"><v>{1}</v></c><c r=\"B{0}\"><v>{2}</v></c><c r=\"C{0}\"><v>{3}.5</v></c></row>",
            row,
            row % 4,
            row,
            row
        ));
    }
    sheet.push_str("</sheetData></worksheet>");
    zip.write_all(sheet.as_bytes()).unwrap();

    zip.finish().unwrap();
    buffer
}

fn bench_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");

    for row_count in [100usize, 1_000, 10_000] {
        let data = create_test_workbook(row_count);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(row_count),
            &data,
            |b, data| {
                b.iter(|| {
                    let reader = WorkbookReader::from_bytes_with_options(
                        data.clone(),
                        ConvertOptions::default(),
                    )
                    .unwrap();
                    black_box(reader.to_text(-1).unwrap())
                });
            },
        );
    }

    group.finish();
}

fn bench_open_only(c: &mut Criterion) {
    let data = create_test_workbook(1_000);
    c.bench_function("open_1000_rows", |b| {
        b.iter(|| black_box(WorkbookReader::from_bytes(data.clone()).unwrap()));
    });
}

criterion_group!(benches, bench_conversion, bench_open_only);
criterion_main!(benches);

use std::path::Path;

use anyhow::bail;
use dotemit::metadata::{
    tables::{ColumnKind, TableId},
    view::MetadataView,
};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_metadata,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct TableEntry {
    table: String,
    id: String,
    rows: u32,
    row_size: usize,
    sorted: bool,
}

#[derive(Debug, Serialize)]
struct TablesOutput {
    tables: Vec<TableEntry>,
}

#[derive(Debug, Serialize)]
struct TableDetailOutput {
    table: String,
    row_count: u32,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Render one column value by its kind: heap entries are looked up, indices become tokens.
fn format_value(view: &MetadataView<'_>, kind: ColumnKind, value: u32) -> String {
    match kind {
        ColumnKind::U8 | ColumnKind::U16 => format!("0x{value:X}"),
        ColumnKind::U32 | ColumnKind::Rva => format!("0x{value:08X}"),
        ColumnKind::String => match view.string(value) {
            Ok(string) => format!("{string:?}"),
            Err(_) => format!("string@{value}"),
        },
        ColumnKind::Guid if value == 0 => "null".to_string(),
        ColumnKind::Guid => view
            .guid(value)
            .map_or_else(|_| format!("guid#{value}"), |guid| guid.to_string()),
        ColumnKind::Blob if value == 0 => "blob[0]".to_string(),
        ColumnKind::Blob => view.blob(value).map_or_else(
            |_| format!("blob@{value}"),
            |blob| format!("blob[{} bytes]", blob.len()),
        ),
        ColumnKind::Table(table) => format!("{table}[{value}]"),
        ColumnKind::Coded(_) if value == 0 => "null".to_string(),
        ColumnKind::Coded(coded_index) => coded_index
            .decode(value)
            .map_or_else(|_| format!("0x{value:X}?"), |token| token.to_string()),
    }
}

fn table_detail(view: &MetadataView<'_>, table: TableId) -> TableDetailOutput {
    let columns = table.columns();
    let mut header = vec!["Token".to_string()];
    header.extend(columns.iter().map(|column| column.name.to_string()));

    let rows = view
        .tables
        .rows_with_tokens(table)
        .map(|(token, row)| {
            let mut cells = vec![token.to_string()];
            cells.extend(
                columns
                    .iter()
                    .enumerate()
                    .map(|(index, column)| format_value(view, column.kind, row.value(index))),
            );
            cells
        })
        .collect();

    TableDetailOutput {
        table: table.to_string(),
        row_count: view.tables.row_count(table),
        columns: header,
        rows,
    }
}

pub fn run(path: &Path, table_filter: Option<&str>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let metadata = load_metadata(path)?;
    let view = MetadataView::from_bytes(&metadata)?;

    if view.tables.table_count() == 0 {
        bail!("no metadata tables found");
    }

    if let Some(filter) = table_filter {
        let Some(table) = view
            .tables
            .present_tables()
            .find(|table| table.to_string().eq_ignore_ascii_case(filter))
        else {
            bail!("no table matching '{filter}' found");
        };

        let detail = table_detail(&view, table);
        return print_output(&detail, opts, |detail| {
            println!("{} table ({} rows):\n", detail.table, detail.row_count);
            let columns: Vec<(&str, Align)> = detail
                .columns
                .iter()
                .map(|column| (column.as_str(), Align::Left))
                .collect();
            let mut tw = TabWriter::new(&columns);
            for row in &detail.rows {
                tw.row(row.clone());
            }
            tw.print();
        });
    }

    let output = TablesOutput {
        tables: view
            .tables
            .present_tables()
            .map(|table| TableEntry {
                table: table.to_string(),
                id: format!("0x{:02X}", table as u8),
                rows: view.tables.row_count(table),
                row_size: view.tables.info.row_size(table),
                sorted: view.tables.sorted & table.mask() != 0,
            })
            .collect(),
    };

    print_output(&output, opts, |output| {
        let mut tw = TabWriter::new(&[
            ("Id", Align::Right),
            ("Table", Align::Left),
            ("Rows", Align::Right),
            ("Row size", Align::Right),
            ("Sorted", Align::Left),
        ]);
        for entry in &output.tables {
            tw.row(vec![
                entry.id.clone(),
                entry.table.clone(),
                entry.rows.to_string(),
                entry.row_size.to_string(),
                if entry.sorted { "yes" } else { "" }.to_string(),
            ]);
        }
        tw.print();
    })
}

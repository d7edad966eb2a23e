use std::path::Path;

use dotemit::metadata::{tables::TableId, view::MetadataView};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_metadata,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct MetadataInfo {
    pub runtime_version: String,
    pub root_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mvid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly: Option<String>,
    pub tables_version: String,
    pub heap_sizes: String,
    pub valid: String,
    pub sorted: String,
    pub streams: Vec<StreamInfo>,
    pub tables: Vec<TableCount>,
}

#[derive(Debug, Serialize)]
pub struct StreamInfo {
    pub name: String,
    pub offset: String,
    pub size: u32,
}

#[derive(Debug, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: u32,
}

fn module_name(view: &MetadataView<'_>) -> Option<(String, String)> {
    let module = view.tables.tables.rows(TableId::Module).first()?;
    let name = view.string(module.value(1)).ok()?.to_string();
    let mvid = view
        .guid(module.value(2))
        .map_or_else(|_| "?".to_string(), |guid| guid.to_string());
    Some((name, mvid))
}

fn assembly_name(view: &MetadataView<'_>) -> Option<String> {
    let assembly = view.tables.tables.rows(TableId::Assembly).first()?;
    let name = view.string(assembly.value(7)).ok()?;
    Some(format!(
        "{name}, Version={}.{}.{}.{}",
        assembly.value(1),
        assembly.value(2),
        assembly.value(3),
        assembly.value(4)
    ))
}

pub fn run(path: &Path, opts: &GlobalOptions) -> anyhow::Result<()> {
    let metadata = load_metadata(path)?;
    let view = MetadataView::from_bytes(&metadata)?;
    let (module, mvid) = module_name(&view).unzip();

    let info = MetadataInfo {
        runtime_version: view.root.version.clone(),
        root_version: format!("{}.{}", view.root.major_version, view.root.minor_version),
        module,
        mvid,
        assembly: assembly_name(&view),
        tables_version: format!(
            "{}.{}",
            view.tables.major_version, view.tables.minor_version
        ),
        heap_sizes: format!("{:?}", view.tables.heap_sizes),
        valid: format!("0x{:016X}", view.tables.valid),
        sorted: format!("0x{:016X}", view.tables.sorted),
        streams: view
            .root
            .stream_headers
            .iter()
            .map(|header| StreamInfo {
                name: header.name.clone(),
                offset: format!("0x{:X}", header.offset),
                size: header.size,
            })
            .collect(),
        tables: view
            .tables
            .present_tables()
            .map(|table| TableCount {
                table: table.to_string(),
                rows: view.tables.row_count(table),
            })
            .collect(),
    };

    print_output(&info, opts, |info| {
        println!("Runtime:         {}", info.runtime_version);
        println!("Root version:    {}", info.root_version);
        if let Some(module) = &info.module {
            println!("Module:          {module}");
        }
        if let Some(mvid) = &info.mvid {
            println!("MVID:            {mvid}");
        }
        if let Some(assembly) = &info.assembly {
            println!("Assembly:        {assembly}");
        }
        println!("Tables version:  {}", info.tables_version);
        println!("Heap sizes:      {}", info.heap_sizes);
        println!("Valid:           {}", info.valid);
        println!("Sorted:          {}", info.sorted);

        println!("\nStreams:");
        let mut tw = TabWriter::new(&[
            ("Name", Align::Left),
            ("Offset", Align::Right),
            ("Size", Align::Right),
        ])
        .indent("  ");
        for stream in &info.streams {
            tw.row(vec![
                stream.name.clone(),
                stream.offset.clone(),
                stream.size.to_string(),
            ]);
        }
        tw.print();

        println!("\nTables:");
        let mut tw = TabWriter::new(&[("Table", Align::Left), ("Rows", Align::Right)]).indent("  ");
        for table in &info.tables {
            tw.row(vec![table.table.clone(), table.rows.to_string()]);
        }
        tw.print();
    })
}

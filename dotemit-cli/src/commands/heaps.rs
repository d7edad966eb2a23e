use std::path::Path;

use anyhow::bail;
use dotemit::metadata::view::MetadataView;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_metadata,
    output::{hex, print_output, Align, TabWriter},
};

/// Bytes of a blob shown in listings
const BLOB_PREVIEW: usize = 16;

#[derive(Debug, Serialize)]
struct HeapSummary {
    name: String,
    size: u32,
    entries: usize,
}

#[derive(Debug, Serialize)]
struct HeapEntry {
    offset: String,
    size: usize,
    value: String,
}

#[derive(Debug, Serialize)]
struct HeapDump {
    heap: String,
    entries: Vec<HeapEntry>,
}

fn entry(offset: usize, size: usize, value: String) -> HeapEntry {
    HeapEntry {
        offset: format!("0x{offset:X}"),
        size,
        value,
    }
}

fn stream_size(view: &MetadataView<'_>, name: &str) -> u32 {
    view.root.stream(name).map_or(0, |header| header.size)
}

fn summary(view: &MetadataView<'_>) -> anyhow::Result<Vec<HeapSummary>> {
    let mut heaps = Vec::new();
    if let Some(strings) = &view.strings {
        heaps.push(HeapSummary {
            name: "#Strings".to_string(),
            size: stream_size(view, "#Strings"),
            entries: strings.iter().collect::<Result<Vec<_>, _>>()?.len(),
        });
    }
    if let Some(user_strings) = &view.user_strings {
        heaps.push(HeapSummary {
            name: "#US".to_string(),
            size: stream_size(view, "#US"),
            entries: user_strings.iter().collect::<Result<Vec<_>, _>>()?.len(),
        });
    }
    if let Some(guids) = &view.guids {
        heaps.push(HeapSummary {
            name: "#GUID".to_string(),
            size: stream_size(view, "#GUID"),
            entries: guids.count(),
        });
    }
    if let Some(blobs) = &view.blobs {
        heaps.push(HeapSummary {
            name: "#Blob".to_string(),
            size: stream_size(view, "#Blob"),
            entries: blobs.iter().collect::<Result<Vec<_>, _>>()?.len(),
        });
    }
    Ok(heaps)
}

fn dump(view: &MetadataView<'_>, heap: &str) -> anyhow::Result<HeapDump> {
    let mut entries = Vec::new();
    let name = match heap.to_lowercase().as_str() {
        "strings" => {
            if let Some(strings) = &view.strings {
                for item in strings.iter() {
                    let (offset, value) = item?;
                    entries.push(entry(offset, value.len(), format!("{value:?}")));
                }
            }
            "#Strings"
        }
        "userstrings" | "us" => {
            if let Some(user_strings) = &view.user_strings {
                for item in user_strings.iter() {
                    let (offset, value) = item?;
                    entries.push(entry(
                        offset,
                        value.value.len() * 2,
                        format!("{:?}", value.value.to_string_lossy()),
                    ));
                }
            }
            "#US"
        }
        "guid" | "guids" => {
            if let Some(guids) = &view.guids {
                for (index, guid) in guids.iter() {
                    entries.push(entry(index, 16, guid.to_string()));
                }
            }
            "#GUID"
        }
        "blob" | "blobs" => {
            if let Some(blobs) = &view.blobs {
                for item in blobs.iter() {
                    let (offset, value) = item?;
                    let mut preview = hex(&value[..value.len().min(BLOB_PREVIEW)]);
                    if value.len() > BLOB_PREVIEW {
                        preview.push_str("..");
                    }
                    entries.push(entry(offset, value.len(), preview));
                }
            }
            "#Blob"
        }
        other => bail!("unknown heap '{other}' (expected: strings, userstrings, guid, blob)"),
    };

    Ok(HeapDump {
        heap: name.to_string(),
        entries,
    })
}

pub fn run(path: &Path, heap: Option<&str>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let metadata = load_metadata(path)?;
    let view = MetadataView::from_bytes(&metadata)?;

    let Some(heap) = heap else {
        let heaps = summary(&view)?;
        return print_output(&heaps, opts, |heaps| {
            let mut tw = TabWriter::new(&[
                ("Heap", Align::Left),
                ("Size", Align::Right),
                ("Entries", Align::Right),
            ]);
            for heap in heaps {
                tw.row(vec![
                    heap.name.clone(),
                    heap.size.to_string(),
                    heap.entries.to_string(),
                ]);
            }
            tw.print();
        });
    };

    let dump = dump(&view, heap)?;
    print_output(&dump, opts, |dump| {
        println!("{} ({} entries):\n", dump.heap, dump.entries.len());
        let mut tw = TabWriter::new(&[
            ("Offset", Align::Right),
            ("Size", Align::Right),
            ("Value", Align::Left),
        ]);
        for entry in &dump.entries {
            tw.row(vec![
                entry.offset.clone(),
                entry.size.to_string(),
                entry.value.clone(),
            ]);
        }
        tw.print();
    })
}

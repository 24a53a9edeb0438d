//! Amphora CLI - Tool for inspecting and maintaining region archives.

use std::fs::File;
use std::process::exit;

use amphora::container::{format, ContainerReader, ControlFile, EntryClass, EntryKind};
use amphora::filter::JsonAttributionStore;
use amphora::archiver::scan_asset_creators;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Parse global flags
    let mut level = "warn";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    match filtered_args[0] {
        // Info command - control file and entry census
        "info" | "i" => {
            let Some(file) = filtered_args.get(1) else {
                usage("info <archive>");
            };
            cmd_info(file);
        }

        // List command - entry table
        "list" | "l" => {
            let Some(file) = filtered_args.get(1) else {
                usage("list <archive>");
            };
            cmd_list(file);
        }

        // Scan command - harvest asset creators into an attribution file
        "scan" | "s" => {
            let (Some(file), Some(table)) = (filtered_args.get(1), filtered_args.get(2)) else {
                usage("scan <archive> <attribution.json>");
            };
            cmd_scan(file, table);
        }

        "help" | "-h" | "--help" => print_help(),

        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            exit(1);
        }
    }
}

fn usage(text: &str) -> ! {
    eprintln!("Usage: amphora {text}");
    exit(1)
}

fn open(path: &str) -> File {
    match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open {path}: {e}");
            exit(1)
        }
    }
}

fn cmd_info(path: &str) {
    let mut reader = ContainerReader::new(open(path));
    let entries = match reader.entries() {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error: {e}");
            exit(1)
        }
    };

    let mut control: Option<ControlFile> = None;
    let mut counts = [0usize; 5]; // assets, objects, terrains, settings, other
    let mut total_bytes = 0u64;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!("Stream error: {e}");
                exit(1)
            }
        };
        if entry.kind == EntryKind::Directory {
            continue;
        }
        total_bytes += entry.data.len() as u64;
        match format::classify(&entry.path) {
            EntryClass::Control => {
                match ControlFile::from_xml(&String::from_utf8_lossy(&entry.data)) {
                    Ok(c) => control = Some(c),
                    Err(e) => eprintln!("Bad control file: {e}"),
                }
            }
            EntryClass::Asset => counts[0] += 1,
            EntryClass::Object => counts[1] += 1,
            EntryClass::Terrain => counts[2] += 1,
            EntryClass::Settings => counts[3] += 1,
            EntryClass::Reserved | EntryClass::Unknown => counts[4] += 1,
        }
    }

    println!("Archive: {path}");
    match control {
        Some(c) => {
            println!("  Version:   {}.{}", c.major_version, c.minor_version);
            println!("  Region:    {} ({}x{}m)", c.region_id, c.size_x, c.size_y);
            println!("  Created:   {} (epoch seconds)", c.create_time);
            println!("  Assets:    {}", if c.assets_included { "included" } else { "omitted" });
        }
        None => println!("  No control file found"),
    }
    println!("  Entries:   {} assets, {} objects, {} terrain, {} settings, {} other",
        counts[0], counts[1], counts[2], counts[3], counts[4]);
    println!("  Payload:   {total_bytes} bytes");
}

fn cmd_list(path: &str) {
    let mut reader = ContainerReader::new(open(path));
    let entries = match reader.entries() {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error: {e}");
            exit(1)
        }
    };
    for entry in entries {
        match entry {
            Ok(entry) => {
                if entry.kind == EntryKind::Directory {
                    println!("{:>10}  {}", "dir", entry.path);
                } else {
                    println!("{:>10}  {}", entry.data.len(), entry.path);
                }
            }
            Err(e) => {
                eprintln!("Stream error: {e}");
                exit(1)
            }
        }
    }
}

fn cmd_scan(archive: &str, table: &str) {
    let store = JsonAttributionStore::new(table);
    match scan_asset_creators(&store, open(archive)) {
        Ok(discovered) => {
            println!("Discovered {discovered} new attribution(s) -> {table}");
        }
        Err(e) => {
            eprintln!("Scan failed: {e}");
            exit(1)
        }
    }
}

fn print_help() {
    println!("Amphora - region archive tool");
    println!();
    println!("Usage: amphora [flags] <command> [args]");
    println!();
    println!("Commands:");
    println!("  info, i <archive>                  Show control file and entry census");
    println!("  list, l <archive>                  List entries with sizes");
    println!("  scan, s <archive> <table.json>     Harvest asset creators into an attribution table");
    println!("  help                               Show this help");
    println!();
    println!("Flags:");
    println!("  -v, --verbose    Debug logging");
    println!("  -vv, --trace     Trace logging");
    println!("  -q, --quiet      Errors only");
}

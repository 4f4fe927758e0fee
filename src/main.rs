use std::env;
use std::path;
use std::process;

use mzimport::{BufferStorage, MzMLImporter, StoredSpectrumData};

fn main() {
    let args: Vec<String> = env::args().collect();
    let path: &path::Path;
    if args.len() > 1 {
        path = path::Path::new(&args[1]);
    } else {
        path = path::Path::new("./test/data/small.mzML");
    }
    println!("Path: {}", path.display());

    let mut importer = MzMLImporter::new(BufferStorage::new());
    if let Err(e) = importer.read_path(path) {
        eprintln!("Failed to import {}: {e}", path.display());
        process::exit(1);
    }

    println!(
        "Parsed {} / {} spectra",
        importer.parsed_scans(),
        importer.total_scans()
    );
    let (raw_file, storage) = importer.finish();
    for scan in &raw_file.scans {
        if let StoredSpectrumData::Mass { mzs, .. } = &scan.data {
            println!(
                "Scan #{} ({}) => {} points, RT {:.3} min, MS{}",
                scan.scan_number,
                scan.id,
                mzs.len(),
                scan.metadata.retention_time,
                scan.metadata.ms_level
            );
        }
    }
    for frame in &raw_file.frames {
        println!(
            "Frame @ RT {:.3} min => {} mobility scans, {} points",
            frame.metadata.retention_time,
            frame.scan_count(),
            frame.mzs.len()
        );
    }
    println!(
        "{} chromatograms, {} other spectra, {} doubles committed",
        raw_file.chromatograms.len(),
        raw_file.other_spectra.len(),
        storage.double_count()
    );
}

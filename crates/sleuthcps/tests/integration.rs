//! End-to-end tests over on-disk dumps, profiles and manifests.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use sleuthcps::config::Config;
use sleuthcps::manifest::{CheckOptions, IssueKind};
use sleuthcps::{Manifest, MemoryArea, Profile, Repl, Session};

const DUMP_NAME: &str = "ExtRAM_20240315093000.bin";
const FLAG: &[u8] = b"FLAG{sleuth}";

/// A full-size external RAM dump with a two-level pointer chain:
///
/// - `root` sits at 0x1000
/// - `root + 0x20` holds a record for `table` (0x2000, 16 bytes)
/// - `table + 0x8` holds a record for `flag` (0x3000, 12 bytes)
fn write_dump(dir: &Path) -> PathBuf {
    let mut data = vec![0u8; 512 * 1024];
    put_u32(&mut data, 0x101C, 0x10);
    put_u32(&mut data, 0x1020, 0x2000);
    put_u32(&mut data, 0x2004, 12);
    put_u32(&mut data, 0x2008, 0x3000);
    data[0x3000..0x3000 + FLAG.len()].copy_from_slice(FLAG);

    let path = dir.join(DUMP_NAME);
    std::fs::write(&path, data).unwrap();
    path
}

fn put_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_profile(dir: &Path) -> PathBuf {
    let path = dir.join("plc.csv");
    std::fs::write(
        &path,
        "name, offset, size, rOffset, parent\n\
         root, 0x1000, , ,\n\
         table, , 16, 0x20, root\n\
         flag, , 4, 8, table\n",
    )
    .unwrap();
    path
}

fn config_for(dir: &Path) -> Config {
    let mut config = Config::default();
    config.output.directory = Some(dir.join("out"));
    config
}

#[test]
fn test_list_follows_pointer_chain() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(&config_for(dir.path()));
    session.load_profile(write_profile(dir.path())).unwrap();
    let image = session.load_image(write_dump(dir.path())).unwrap();
    assert_eq!(image.area(), Some(MemoryArea::ExtRam));

    let rows = session.list().unwrap();
    let offsets: Vec<(&str, Option<i64>)> = rows
        .iter()
        .map(|row| (row.name.as_str(), row.offset))
        .collect();
    assert_eq!(
        offsets,
        [
            ("root", Some(0x1000)),
            ("table", Some(0x2000)),
            ("flag", Some(0x3000))
        ]
    );
}

#[test]
fn test_analyze_rel_corrects_profile_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let profile_path = write_profile(dir.path());
    let mut session = Session::new(&config_for(dir.path()));
    session.load_profile(&profile_path).unwrap();
    session.load_image(write_dump(dir.path())).unwrap();

    let analysis = session.analyze_rel("flag").unwrap();
    assert_eq!(analysis.offset, 0x3000);
    assert_eq!(analysis.size, 12);
    assert_eq!(analysis.data, FLAG);

    let update = analysis.profile_update.expect("size 4 should be corrected");
    assert_eq!(update.profile_size, Some(4));
    assert_eq!(update.profile_offset, None);

    let corrected = Profile::load(&update.path).unwrap();
    let flag = corrected.get("flag").unwrap();
    assert_eq!(flag.offset, "0x3000");
    assert_eq!(flag.size, "0xC");
    assert_eq!(corrected.len(), 3);

    // The original stays untouched.
    let original = Profile::load(&profile_path).unwrap();
    assert_eq!(original.get("flag").unwrap().size, "4");
}

#[test]
fn test_resolved_profile_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(&config_for(dir.path()));
    session.load_profile(write_profile(dir.path())).unwrap();
    session.load_image(write_dump(dir.path())).unwrap();

    let out = dir.path().join("resolved.csv");
    session.write_resolved(&out).unwrap();

    let resolved = Profile::load(&out).unwrap();
    let offsets: Vec<&str> = resolved.entries().iter().map(|e| e.offset.as_str()).collect();
    assert_eq!(offsets, ["0x1000", "0x2000", "0x3000"]);
    assert_eq!(resolved.get("flag").unwrap().parent, "table");
}

#[test]
fn test_scripted_shell_session() {
    let dir = tempfile::tempdir().unwrap();
    let profile = write_profile(dir.path());
    let dump = write_dump(dir.path());
    let config = config_for(dir.path());

    let script = format!(
        "loadcsv \"{}\"\nsetimg \"{}\"\nar flag extract\nhex 0x3000 4 w=4\nstatus\nexit\n",
        profile.display(),
        dump.display()
    );
    let mut repl = Repl::new(Session::new(&config), &config, Vec::new());
    repl.run(script.as_bytes()).unwrap();
    let (session, out) = repl.into_parts();
    let out = String::from_utf8(out).unwrap();

    assert!(out.contains("Loaded CSV profile:"), "{out}");
    assert!(out.contains("(3 entries)"));
    assert!(out.contains("(524288 bytes)"));
    assert!(out.contains("Size (from binary): C bytes"));
    assert!(out.contains("0x00003000 | 46 4C 41 47  | FLAG"));
    assert!(out.contains("Updated profile written to"));

    let extract = dir.path().join("out").join("flag_12288_12.img");
    assert_eq!(std::fs::read(extract).unwrap(), FLAG);
    assert_eq!(session.outputs().len(), 1);

    // Later commands see the corrected profile.
    let current = session.profile().unwrap().path().unwrap();
    assert!(current.to_string_lossy().ends_with("plc.csv_updated.csv"));
}

#[test]
fn test_manifest_verifies_dump_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let dump = write_dump(dir.path());
    let digest = hex::encode(Sha256::digest(std::fs::read(&dump).unwrap()));

    let document = format!(
        "## Artifacts\n\n\
         | # | Description | Path | SHA-256 |\n\
         |---|---|---|---|\n\
         | 1 | PLC's external RAM image dump | `{DUMP_NAME}` | `{digest}` |\n\
         | 2 | PLC's on-chip RAM image dump | `ExtRAM_20240315094500.bin` | `{digest}` |\n"
    );
    let manifest = Manifest::parse(&document).unwrap();
    let report = manifest.verify(dir.path(), CheckOptions::default()).unwrap();

    let kinds: Vec<(u32, &IssueKind)> = report.issues.iter().map(|i| (i.index, &i.kind)).collect();
    assert_eq!(
        kinds,
        [
            (2, &IssueKind::DescriptionMismatch),
            (2, &IssueKind::MissingFile)
        ]
    );
    assert!(report.has_errors());
}

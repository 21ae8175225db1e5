use crate::common::*;
use machscope::macho::types::CPU_TYPE_X86_64;
use machscope::{
    find_image, list_images, resolve, InspectConfig, InspectError, ProcessLayout, RemoteAddress,
    SparseTaskMemory, StaticLayout,
};

const TABLE: u64 = 0x10_0000;
const ARRAY: u64 = 0x11_0000;
const STRINGS: u64 = 0x12_0000;

fn foo_bar_task() -> SparseTaskMemory {
    let mut mem = SparseTaskMemory::new();
    map_image_table(
        &mut mem,
        TABLE,
        ARRAY,
        STRINGS,
        &[("/usr/lib/foo.dylib", 0x7000), ("/usr/lib/bar.dylib", 0x8000)],
    );
    mem
}

#[test]
fn finds_bar_and_misses_baz() {
    let mem = foo_bar_task();
    let config = InspectConfig::default();

    let bar = find_image(&mem, RemoteAddress(TABLE), "/usr/lib/bar.dylib", &config).unwrap();
    assert_eq!(bar.load_address, RemoteAddress(0x8000));

    let err = find_image(&mem, RemoteAddress(TABLE), "/usr/lib/baz.dylib", &config).unwrap_err();
    assert!(matches!(err, InspectError::NotFound(_)));
}

#[test]
fn lookup_through_resolved_executable() {
    let exe = default_executable(0x1000);
    let mut mem = foo_bar_task();
    mem.map(0x1000, live_header(CPU_TYPE_X86_64, false));
    let query = StaticLayout(ProcessLayout {
        header_address: RemoteAddress(0x1000),
        image_table_address: RemoteAddress(TABLE),
    });
    let config = InspectConfig::default();

    let info = resolve(&mem, &query, exe.path(), &config).unwrap();
    let foo = info.find_image("/usr/lib/foo.dylib", &config).unwrap();
    assert_eq!(foo.load_address, RemoteAddress(0x7000));
    assert_eq!(foo.index, 0);
}

#[test]
fn listing_returns_owned_paths() {
    let mem = foo_bar_task();
    let images = list_images(&mem, RemoteAddress(TABLE), &InspectConfig::default()).unwrap();
    drop(mem);

    assert_eq!(images.len(), 2);
    assert_eq!(images[0].path, "/usr/lib/foo.dylib");
    assert_eq!(images[1].path.address(), RemoteAddress(STRINGS + 19));
}

#[test]
fn hostile_path_without_terminator_is_unterminated() {
    let mut mem = SparseTaskMemory::new();
    map_image_table(&mut mem, TABLE, ARRAY, STRINGS, &[("/usr/lib/x.dylib", 0x9000)]);
    mem.map(STRINGS, vec![b'A'; 8192]);

    let err = find_image(
        &mem,
        RemoteAddress(TABLE),
        "/usr/lib/x.dylib",
        &InspectConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, InspectError::Unterminated { limit: 4096, .. }));
}

#[test]
fn paths_mapped_tight_to_their_terminators() {
    // Each path lives in its own mapping that ends at (or just past) its NUL.
    let mut mem = SparseTaskMemory::new();
    mem.map(0x40_0010, b"/usr/lib/dyld\0".to_vec())
        .map(0x41_0ff0, b"/usr/lib/libSystem.B.dylib\0".to_vec())
        .map(0x42_0003, b"/bin/zsh\0\x7f\xff\x00junk".to_vec());
    map_table_entries(
        &mut mem,
        TABLE,
        ARRAY,
        &[
            (0x40_0010, 0x1_8000_0000),
            (0x41_0ff0, 0x1_9000_0000),
            (0x42_0003, 0x1_0000_0000),
        ],
    );
    let config = InspectConfig::default();

    let zsh = find_image(&mem, RemoteAddress(TABLE), "/bin/zsh", &config).unwrap();
    assert_eq!(zsh.index, 2);
    assert_eq!(zsh.load_address, RemoteAddress(0x1_0000_0000));

    let paths: Vec<_> = list_images(&mem, RemoteAddress(TABLE), &config)
        .unwrap()
        .iter()
        .map(|i| i.path.to_string())
        .collect();
    assert_eq!(paths, ["/usr/lib/dyld", "/usr/lib/libSystem.B.dylib", "/bin/zsh"]);
}

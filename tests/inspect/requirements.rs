use crate::common::*;
use machscope::macho::types::CPU_TYPE_X86_64;
use machscope::{
    resolve, Endianness, ExpectedBytes, InspectConfig, InspectError, MemoryRequirement,
    ProcessLayout, RemoteAddress, SparseTaskMemory, StaticLayout,
};

const PREFERRED: u64 = 0x1_0000_0000;
const SLIDE: u64 = 0x2_4000;

/// A task whose executable was slid by `SLIDE`, with `data` placed at file
/// address `PREFERRED + 0x3f80`.
fn slid_task(swapped: bool, data: Vec<u8>) -> SparseTaskMemory {
    let mut mem = SparseTaskMemory::new();
    mem.map(PREFERRED + SLIDE, live_header(CPU_TYPE_X86_64, swapped))
        .map(PREFERRED + SLIDE + 0x3f80, data);
    mem
}

fn query() -> StaticLayout {
    StaticLayout(ProcessLayout {
        header_address: RemoteAddress(PREFERRED + SLIDE),
        image_table_address: RemoteAddress::NULL,
    })
}

#[test]
fn requirement_reads_at_slid_address() {
    let exe = default_executable(PREFERRED);
    let mem = slid_task(false, 0xfeed_0042u32.to_ne_bytes().to_vec());
    let info = resolve(&mem, &query(), exe.path(), &InspectConfig::default()).unwrap();

    let met = MemoryRequirement::new(PREFERRED + 0x3f80, ExpectedBytes::u32(0xfeed_0042));
    assert!(met.is_satisfied(&info).unwrap());

    let unmet = MemoryRequirement::new(PREFERRED + 0x3f80, ExpectedBytes::u32(0xfeed_0043));
    assert!(!unmet.is_satisfied(&info).unwrap());

    assert_eq!(
        info.read_at_file_address(PREFERRED + 0x3f80, 2).unwrap(),
        0xfeed_0042u32.to_ne_bytes()[..2].to_vec()
    );
}

#[test]
fn rendering_follows_executable_byte_order() {
    let exe = default_executable(PREFERRED);
    let foreign = Endianness::host().flipped();
    let value = 0x0102_0304u32;
    let rendered = match foreign {
        Endianness::Little => value.to_le_bytes(),
        Endianness::Big => value.to_be_bytes(),
    };
    let mem = slid_task(true, rendered.to_vec());
    let info = resolve(&mem, &query(), exe.path(), &InspectConfig::default()).unwrap();

    assert_eq!(info.byte_order(), foreign);
    let req = MemoryRequirement::new(PREFERRED + 0x3f80, ExpectedBytes::u32(value));
    assert!(req.is_satisfied(&info).unwrap());
}

#[test]
fn missing_rendering_is_unsupported() {
    let exe = default_executable(PREFERRED);
    let mem = slid_task(false, vec![0x55, 0x48, 0x89, 0xe5]);
    let info = resolve(&mem, &query(), exe.path(), &InspectConfig::default()).unwrap();

    let mut expected = ExpectedBytes::either(vec![0x55, 0x48, 0x89, 0xe5]);
    match Endianness::host() {
        Endianness::Little => expected.little = None,
        Endianness::Big => expected.big = None,
    }
    let err = MemoryRequirement::new(PREFERRED + 0x3f80, expected)
        .is_satisfied(&info)
        .unwrap_err();
    assert!(matches!(err, InspectError::UnsupportedByteOrder(o) if o == Endianness::host()));
}

#[test]
fn unmapped_requirement_is_access_error() {
    let exe = default_executable(PREFERRED);
    let mem = slid_task(false, vec![0; 4]);
    let info = resolve(&mem, &query(), exe.path(), &InspectConfig::default()).unwrap();

    let err = MemoryRequirement::new(PREFERRED + 0x9000, ExpectedBytes::either(vec![1, 2]))
        .is_satisfied(&info)
        .unwrap_err();
    assert!(matches!(err, InspectError::Access(_)));
}

#[test]
fn mismatched_renderings_are_rejected_before_reading() {
    let exe = default_executable(PREFERRED);
    let mem = slid_task(false, vec![0x55, 0x48, 0x89, 0xe5]);
    let info = resolve(&mem, &query(), exe.path(), &InspectConfig::default()).unwrap();
    let reads = mem.reads();

    let expected = ExpectedBytes {
        little: Some(vec![0x55, 0x48, 0x89, 0xe5]),
        big: Some(vec![0x55, 0x48]),
    };
    let err = MemoryRequirement::new(PREFERRED + 0x3f80, expected)
        .is_satisfied(&info)
        .unwrap_err();
    assert!(matches!(err, InspectError::MismatchedRenderings { little: 4, big: 2 }));
    assert_eq!(mem.reads(), reads);
}

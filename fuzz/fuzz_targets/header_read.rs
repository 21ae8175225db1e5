#![no_main]
use libfuzzer_sys::fuzz_target;
use machscope::{read_header, RemoteAddress, SparseTaskMemory};

fuzz_target!(|data: &[u8]| {
    let mem = SparseTaskMemory::new().with_region(0x1000, data.to_vec());
    let _ = read_header(&mem, RemoteAddress(0x1000));
});

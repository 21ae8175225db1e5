#![no_main]
use libfuzzer_sys::fuzz_target;
use machscope::{list_images, InspectConfig, RemoteAddress, SparseTaskMemory};

// The input is mapped at address 0 so pointers inside it can refer back into it.
fuzz_target!(|data: &[u8]| {
    let mut config = InspectConfig::default();
    config.images.max_images = 256;
    let mem = SparseTaskMemory::new().with_region(0, data.to_vec());
    let _ = list_images(&mem, RemoteAddress(0), &config);
});

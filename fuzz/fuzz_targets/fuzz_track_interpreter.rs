#![no_main]

use libfuzzer_sys::fuzz_target;

use mdx::interpreter::interpret_track;
use mdx::mappers::InstrumentMap;

use std::sync::OnceLock;

fn instruments() -> &'static InstrumentMap {
    static LOCK: OnceLock<InstrumentMap> = OnceLock::new();

    LOCK.get_or_init(InstrumentMap::default)
}

fuzz_target!(|data: &[u8]| {
    if let Some((&max_loops, track)) = data.split_first() {
        let _ = interpret_track(track, 0, 0, max_loops % 8, instruments());
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;

use mdx::interpreter::ConversionOptions;
use mdx::mappers::InstrumentMap;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = mdx::parse_header(data, true) {
        let options = ConversionOptions::default();

        if let Ok(score) = mdx::convert(data, &header.track_offsets, &options, &InstrumentMap::default()) {
            let _ = mdx::export::smf_bytes(&score);
        }
    }
});

#![no_main]
use libfuzzer_sys::fuzz_target;
use sandblast_config::arena::SharedArena;
use sandblast_config::validation::parse_and_validate;
use sandblast_config::{DocumentFormat, JailConf, JailConfRecord};

fuzz_target!(|data: &[u8]| {
    // Untrusted config bytes: parse + validate must return an error, never panic,
    // and anything accepted must pass parent-side verification.
    for format in [DocumentFormat::Toml, DocumentFormat::Json] {
        let Ok(mut arena) = SharedArena::create(64 * 1024) else {
            return;
        };
        if arena.reserve_root::<JailConfRecord>().is_err() {
            return;
        }
        if parse_and_validate(data, format, &mut arena).is_ok() {
            let conf = JailConf::from_arena(arena).expect("accepted record must verify");
            assert!(conf.limits().len() <= sandblast_config::record::LIMITS_LEN);
        }
    }
});

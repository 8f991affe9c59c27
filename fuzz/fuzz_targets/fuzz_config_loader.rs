#![no_main]
use libfuzzer_sys::fuzz_target;

// Any input may be rejected, by the parser or by validation, but neither may panic.
fuzz_target!(|data: &str| {
    if let Ok(cfg) = stepgen_config::load_toml(data) {
        let _ = cfg.validate();
        for a in &cfg.axis {
            let _ = cfg.axis_by_name(&a.name);
        }
    }
});

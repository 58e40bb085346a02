#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let engine = sluice::Engine::new();
    if let Ok(template) = engine.load(data) {
        let limits = sluice::Limits {
            render_length_limit: Some(1 << 16),
            render_score_limit: Some(1 << 12),
            assign_score_limit: Some(1 << 16),
        };
        let _ = template.renderer().with_limits(limits).to_string();
    }
});

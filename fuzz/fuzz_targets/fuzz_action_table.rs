#![no_main]
use libfuzzer_sys::fuzz_target;
use shade_core::ActionRegistry;

fuzz_target!(|data: &[u8]| {
    let Ok(actions) = shade_core::actions::parse(data) else {
        return;
    };
    // Every decoded action must be reachable through its own signature.
    let registry = ActionRegistry::new();
    registry.register(actions.clone());
    for a in &actions {
        assert!(registry.lookup_signature(&a.command_signature()).is_some());
        assert!(a.input_number < 16);
    }
});

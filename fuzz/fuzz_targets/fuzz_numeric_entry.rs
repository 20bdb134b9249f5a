#![no_main]

use hookbind_runtime::GatedControl;
use hookbind_widgets::{FloatEntry, IntegerEntry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let ints = GatedControl::new(IntegerEntry::new(0));
    ints.user_input(|e| {
        e.edit_text(text);
        e.finish_editing();
    });
    let shown = ints.read(|e| e.text().to_owned());
    assert_eq!(shown, ints.value().to_string());

    let floats = GatedControl::new(FloatEntry::new(0.0));
    floats.user_input(|e| {
        e.edit_text(text);
        e.finish_editing();
    });
    assert!(floats.value().is_finite());
});

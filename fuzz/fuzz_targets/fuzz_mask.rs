#![no_main]

use libfuzzer_sys::fuzz_target;
use sxlock_core::{PasswordMask, CREDENTIAL_CAPACITY};

fuzz_target!(|input: (String, bool, u8)| {
    let (passchars, hide_length, len) = input;
    let mask = PasswordMask::new(&passchars, hide_length);
    let len = usize::from(len);

    let shown = mask.display(len);
    assert!(shown.chars().count() < CREDENTIAL_CAPACITY);
    if !hide_length {
        assert_eq!(shown.chars().count(), len);
    }
});

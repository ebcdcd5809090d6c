#![no_main]

use libfuzzer_sys::fuzz_target;
use sxlock_core::Key;
use sxlock_x11::keymap::key_for;
use sxlock_x11::Keymap;

fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }

    let min_keycode = data[0];
    let per_keycode = data[1] % 8;
    let keycode = data[2];
    let state = u16::from_le_bytes([data[3], data[4]]);
    let keysyms: Vec<u32> = data[5..]
        .chunks(4)
        .map(|c| c.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
        .collect();

    // Short or malformed tables must never panic
    let keymap = Keymap::new(min_keycode, per_keycode, keysyms);
    let keysym = keymap.keysym(keycode, state);

    if let Key::Char(b) = key_for(keysym) {
        assert!((0x20..0x7f).contains(&b));
    }
});

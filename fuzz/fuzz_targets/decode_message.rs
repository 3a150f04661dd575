#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate beacon;

use beacon::wire::Message;

fuzz_target!(|data: &[u8]| {
    #[allow(unused_must_use)]
    {
        Message::decode(data);
    }
});

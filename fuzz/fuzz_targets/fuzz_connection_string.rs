#![no_main]

use libfuzzer_sys::fuzz_target;
use mongo_harakiri::ConnectionInfo;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(info) = ConnectionInfo::parse(s) {
        assert!(!info.hosts.is_empty());

        // Redaction must never leak the password and must parse back
        let redacted = info.redacted();
        let reparsed = ConnectionInfo::parse(&redacted).expect("redacted string parses");
        if info.password.is_some() {
            assert_eq!(reparsed.password.as_deref(), Some("****"));
        }
        assert_eq!(reparsed.hosts, info.hosts);
        assert_eq!(reparsed.database, info.database);
    }
});

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use collection_helper::filename::{self, ContentId, Version};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Some(parsed) = filename::extract(data) {
        // The identifier is always a substring of the input
        assert!(data.contains(parsed.content_id.as_str()));
        assert_eq!(ContentId::parse(parsed.content_id.as_str()).ok(), Some(parsed.content_id));

        if let Some(version) = parsed.version {
            let reparsed = Version::parse(version.as_str()).ok().flatten();
            assert_eq!(reparsed, Some(version));
        }
    }

    let _ = Version::parse(data);
    let _ = ContentId::parse(data);
});

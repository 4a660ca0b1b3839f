// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests for the connection guard.

use litesafe_core::{CacheMode, OpenMode};
use litesafe_sqlite::{guard_connection_string, ConnectionDescriptor, ConnectionGuard};
use proptest::prelude::*;

fn open_mode() -> impl Strategy<Value = OpenMode> {
    prop_oneof![
        Just(OpenMode::ReadOnly),
        Just(OpenMode::ReadWrite),
        Just(OpenMode::ReadWriteCreate),
    ]
}

fn cache_mode() -> impl Strategy<Value = CacheMode> {
    prop_oneof![
        Just(CacheMode::Default),
        Just(CacheMode::Private),
        Just(CacheMode::Shared),
    ]
}

prop_compose! {
    fn descriptor(provider: &'static str)(
        path in "[a-zA-Z0-9_/ .;=\"']{1,40}",
        mode in open_mode(),
        cache in cache_mode(),
        foreign_keys in proptest::option::of(any::<bool>()),
        timeout in proptest::option::of(0u64..3600),
        recursive_triggers in proptest::option::of(any::<bool>()),
    ) -> ConnectionDescriptor {
        ConnectionDescriptor {
            path,
            mode,
            provider_name: provider.to_string(),
            cache,
            foreign_keys,
            default_timeout: timeout.map(std::time::Duration::from_secs),
            pooling: None,
            recursive_triggers,
        }
    }
}

proptest! {
    #[test]
    fn embedded_provider_never_keeps_create(d in descriptor("sqlite")) {
        prop_assume!(d.is_configured());
        let original_mode = d.mode;
        let safe = ConnectionGuard::new().validate(d);
        prop_assert_ne!(safe.mode, OpenMode::ReadWriteCreate);
        if original_mode != OpenMode::ReadWriteCreate {
            prop_assert_eq!(safe.mode, original_mode);
        }
    }

    #[test]
    fn guard_is_idempotent(d in descriptor("sqlite")) {
        let guard = ConnectionGuard::new();
        let once = guard.validate(d).into_inner();
        let twice = guard.validate(once.clone()).into_inner();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn foreign_provider_is_identity(d in descriptor("postgres")) {
        let safe = ConnectionGuard::new().validate(d.clone());
        prop_assert_eq!(safe.into_inner(), d);
    }

    #[test]
    fn raw_string_guard_is_idempotent(d in descriptor("sqlite")) {
        prop_assume!(d.is_configured());
        let raw = d.to_string();
        let once = guard_connection_string(&raw, "sqlite").unwrap();
        let twice = guard_connection_string(&once, "sqlite").unwrap();
        prop_assert_eq!(&once, &twice);
        let reparsed = ConnectionDescriptor::parse(&once, "sqlite").unwrap();
        prop_assert_ne!(reparsed.mode, OpenMode::ReadWriteCreate);
    }

    #[test]
    fn raw_string_foreign_is_byte_identical(s in ".{0,60}") {
        prop_assert_eq!(guard_connection_string(&s, "postgres").unwrap(), s);
    }
}

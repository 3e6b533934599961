// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Mutex;

use membus_bb_log::error_hook::*;
use membus_bb_log::report_error;
use membus_bb_testing::assert_that;

#[derive(Debug)]
struct Entry {
    error_level: ErrorLevel,
    origin: String,
    description: String,
}

struct RecordingErrorHook {
    entries: Mutex<Vec<Entry>>,
}

impl ErrorHook for RecordingErrorHook {
    fn on_error(
        &self,
        error_level: ErrorLevel,
        origin: core::fmt::Arguments,
        description: core::fmt::Arguments,
    ) {
        self.entries.lock().unwrap().push(Entry {
            error_level,
            origin: origin.to_string(),
            description: description.to_string(),
        });
    }
}

static RECORDING_HOOK: RecordingErrorHook = RecordingErrorHook {
    entries: Mutex::new(Vec::new()),
};

// the hook can be set only once per process, every aspect is verified in one test
#[test]
fn error_hook_receives_every_reported_error() {
    assert_that!(set_error_hook(&RECORDING_HOOK), eq true);
    assert_that!(set_error_hook(&RECORDING_HOOK), eq false);

    report_error!(ErrorLevel::Moderate, "something {} happened", 42);
    report_error!(from "Some::Origin", ErrorLevel::Severe, "a list overflowed");

    let entries = RECORDING_HOOK.entries.lock().unwrap();
    assert_that!(*entries, len 2);

    assert_that!(entries[0].error_level, eq ErrorLevel::Moderate);
    assert_that!(entries[0].origin, eq "".to_string());
    assert_that!(entries[0].description, eq "something 42 happened".to_string());

    assert_that!(entries[1].error_level, eq ErrorLevel::Severe);
    assert_that!(entries[1].origin, eq "\"Some::Origin\"".to_string());
    assert_that!(entries[1].description, eq "a list overflowed".to_string());
}

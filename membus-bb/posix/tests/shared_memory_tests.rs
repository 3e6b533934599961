// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus_bb_posix::creation_mode::CreationMode;
use membus_bb_posix::permission::Permission;
use membus_bb_posix::shared_memory::*;
use membus_bb_testing::assert_that;

fn unique_name(tag: &str) -> String {
    format!(
        "membus_shm_test_{}_{}",
        std::process::id(),
        tag
    )
}

#[test]
fn shared_memory_create_works() {
    let name = unique_name("create");
    let sut = SharedMemoryBuilder::new(&name)
        .size(1024)
        .creation_mode(CreationMode::PurgeAndCreate)
        .permission(Permission::OWNER_ALL)
        .create()
        .unwrap();

    assert_that!(sut.size(), eq 1024);
    assert_that!(sut.name(), eq name.as_str());
    assert_that!(sut.has_ownership(), eq true);
}

#[test]
fn shared_memory_exclusive_creation_of_existing_object_fails() {
    let name = unique_name("exclusive");
    let _sut = SharedMemoryBuilder::new(&name)
        .size(1024)
        .creation_mode(CreationMode::PurgeAndCreate)
        .create()
        .unwrap();

    let result = SharedMemoryBuilder::new(&name)
        .size(1024)
        .creation_mode(CreationMode::CreateExclusive)
        .create();
    assert_that!(result.err(), eq Some(SharedMemoryCreationError::AlreadyExist));
}

#[test]
fn shared_memory_open_sees_the_written_content() {
    let name = unique_name("content");
    let creator = SharedMemoryBuilder::new(&name)
        .size(256)
        .creation_mode(CreationMode::PurgeAndCreate)
        .create()
        .unwrap();

    let base = creator.base_address().as_ptr();
    for i in 0..256 {
        unsafe { base.add(i).write((i % 256) as u8) };
    }

    let opened = SharedMemoryBuilder::new(&name).open().unwrap();
    assert_that!(opened.size(), eq 256);
    assert_that!(opened.has_ownership(), eq false);

    let opened_base = opened.base_address().as_ptr();
    for i in 0..256 {
        assert_that!(unsafe { *opened_base.add(i) }, eq (i % 256) as u8);
    }
}

#[test]
fn shared_memory_open_of_non_existing_object_fails() {
    let result = SharedMemoryBuilder::new(&unique_name("does_not_exist")).open();
    assert_that!(result.err(), eq Some(SharedMemoryCreationError::DoesNotExist));
}

#[test]
fn shared_memory_is_removed_when_the_owner_is_dropped() {
    let name = unique_name("cleanup");
    {
        let _sut = SharedMemoryBuilder::new(&name)
            .size(128)
            .creation_mode(CreationMode::PurgeAndCreate)
            .create()
            .unwrap();
    }

    let result = SharedMemoryBuilder::new(&name).open();
    assert_that!(result.err(), eq Some(SharedMemoryCreationError::DoesNotExist));
}

#[test]
fn shared_memory_remove_works() {
    let name = unique_name("remove");
    let mut sut = SharedMemoryBuilder::new(&name)
        .size(128)
        .creation_mode(CreationMode::PurgeAndCreate)
        .create()
        .unwrap();
    sut.release_ownership();
    drop(sut);

    assert_that!(SharedMemory::remove(&name), eq Ok(true));
    assert_that!(SharedMemory::remove(&name), eq Ok(false));
}

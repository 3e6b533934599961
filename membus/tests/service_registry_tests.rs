// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus::constants::MAX_SERVICES;
use membus::discovery::service_descriptor::ServiceDescriptor;
use membus::discovery::service_registry::{ServiceRegistry, ServiceRegistryError};
use membus_bb_testing::assert_that;

fn descriptor(service: &str, instance: &str) -> ServiceDescriptor {
    ServiceDescriptor::new(service.as_bytes(), instance.as_bytes(), b"event").unwrap()
}

#[test]
fn service_registry_add_and_find_works() {
    let mut sut = ServiceRegistry::new();

    assert_that!(sut.add(&descriptor("Radar", "FrontRight")), is_ok);
    assert_that!(sut.add(&descriptor("Radar", "FrontLeft")), is_ok);
    assert_that!(sut.add(&descriptor("Camera", "FrontRight")), is_ok);

    let result = sut.find(Some(b"Radar"), Some(b"FrontRight"));
    assert_that!(result, len 1);
    assert_that!(result[0], eq descriptor("Radar", "FrontRight"));
}

#[test]
fn service_registry_wildcard_searches_work() {
    let mut sut = ServiceRegistry::new();
    sut.add(&descriptor("Radar", "FrontRight")).unwrap();
    sut.add(&descriptor("Radar", "FrontLeft")).unwrap();
    sut.add(&descriptor("Camera", "FrontRight")).unwrap();

    assert_that!(sut.find(Some(b"Radar"), None), len 2);
    assert_that!(sut.find(None, Some(b"FrontRight")), len 2);
    assert_that!(sut.find(None, None), len 3);
    assert_that!(sut.find(Some(b"Lidar"), None), len 0);
}

#[test]
fn service_registry_reference_counting_works() {
    let mut sut = ServiceRegistry::new();
    let service = descriptor("Radar", "FrontRight");

    // n offers over time increment the counter, only the last removal erases
    const OFFERS: usize = 5;
    for _ in 0..OFFERS {
        assert_that!(sut.add(&service), is_ok);
    }
    assert_that!(sut, len 1);

    for _ in 0..OFFERS - 1 {
        assert_that!(sut.remove(&service), eq false);
        assert_that!(sut, len 1);
    }
    assert_that!(sut.remove(&service), eq true);
    assert_that!(sut, is_empty);
    assert_that!(sut.find(Some(b"Radar"), None), len 0);
}

#[test]
fn service_registry_remove_of_unknown_service_is_a_no_op() {
    let mut sut = ServiceRegistry::new();
    sut.add(&descriptor("Radar", "FrontRight")).unwrap();

    assert_that!(sut.remove(&descriptor("Lidar", "Roof")), eq false);
    assert_that!(sut, len 1);
}

#[test]
fn service_registry_search_works_after_removal_in_the_middle() {
    let mut sut = ServiceRegistry::new();
    sut.add(&descriptor("A", "1")).unwrap();
    sut.add(&descriptor("B", "2")).unwrap();
    sut.add(&descriptor("C", "3")).unwrap();

    assert_that!(sut.remove(&descriptor("B", "2")), eq true);

    // the index maps must be adjusted for the shifted entries
    let result = sut.find(Some(b"C"), Some(b"3"));
    assert_that!(result, len 1);
    assert_that!(result[0], eq descriptor("C", "3"));
    assert_that!(sut.find(Some(b"A"), None), len 1);
    assert_that!(sut.find(Some(b"B"), None), len 0);
}

#[test]
fn service_registry_capacity_is_bounded() {
    let mut sut = ServiceRegistry::new();

    for i in 0..MAX_SERVICES {
        let service = descriptor(&format!("service_{}", i), "instance");
        assert_that!(sut.add(&service), is_ok);
    }

    let result = sut.add(&descriptor("one_too_many", "instance"));
    assert_that!(result.err(), eq Some(ServiceRegistryError::ServiceRegistryFull));
}

// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Elementary building blocks: alignment math, allocator traits, pointer abstractions for
//! shared-memory capable containers and the process-local segment registry which resolves
//! segment-relative pointers.

pub mod allocator;
pub mod bump_allocator;
#[macro_use]
pub mod enum_gen;
pub mod lazy_singleton;
pub mod math;
pub mod owning_pointer;
pub mod placement_default;
pub mod pointer_trait;
pub mod relative_ptr;
pub mod relocatable_container;
pub mod relocatable_ptr;
pub mod segment_registry;
pub mod unique_id;

// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Index of all offered services, owned and mutated exclusively by the daemon's discovery
//! thread. Every entry carries a reference counter so a service which is offered multiple
//! times over its lifetime is not removed prematurely.

use std::collections::BTreeMap;

use membus_bb_log::fail;

use crate::constants::MAX_SERVICES;
use crate::discovery::service_descriptor::ServiceDescriptor;

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ServiceRegistryError {
    ServiceRegistryFull,
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    descriptor: ServiceDescriptor,
    reference_counter: u64,
}

/// Multi-index over the offered `(service, instance, event)` triples. Exact and wildcard
/// searches are served from two ordered multimaps, `service -> entry index` and
/// `instance -> entry index`, with an intersection step when both keys are concrete.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: Vec<RegistryEntry>,
    service_map: BTreeMap<Vec<u8>, Vec<usize>>,
    instance_map: BTreeMap<Vec<u8>, Vec<usize>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct registered services.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a service. When the identical descriptor is already registered only its
    /// reference counter is incremented.
    pub fn add(&mut self, descriptor: &ServiceDescriptor) -> Result<(), ServiceRegistryError> {
        for entry in &mut self.entries {
            if entry.descriptor == *descriptor {
                entry.reference_counter += 1;
                return Ok(());
            }
        }

        if self.entries.len() == MAX_SERVICES {
            fail!(from self, with ServiceRegistryError::ServiceRegistryFull,
                "Unable to add the service {} since the registry supports at most {} services.",
                descriptor, MAX_SERVICES);
        }

        self.entries.push(RegistryEntry {
            descriptor: descriptor.clone(),
            reference_counter: 1,
        });

        let index = self.entries.len() - 1;
        self.service_map
            .entry(descriptor.service().as_bytes().to_vec())
            .or_default()
            .push(index);
        self.instance_map
            .entry(descriptor.instance().as_bytes().to_vec())
            .or_default()
            .push(index);

        Ok(())
    }

    /// Decrements the reference counter of a service and removes the entry when it reaches
    /// zero. Returns true when an entry was removed.
    pub fn remove(&mut self, descriptor: &ServiceDescriptor) -> bool {
        let mut removed_index = None;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.descriptor == *descriptor {
                entry.reference_counter -= 1;
                if entry.reference_counter == 0 {
                    removed_index = Some(index);
                }
                break;
            }
        }

        let index = match removed_index {
            Some(index) => index,
            None => return false,
        };
        self.entries.remove(index);

        // all indices behind the removed entry shifted to the left
        let remove_index_from_map = |map: &mut BTreeMap<Vec<u8>, Vec<usize>>| {
            map.retain(|_, indices| {
                indices.retain_mut(|i| {
                    if *i == index {
                        return false;
                    }
                    if *i > index {
                        *i -= 1;
                    }
                    true
                });
                !indices.is_empty()
            });
        };

        remove_index_from_map(&mut self.service_map);
        remove_index_from_map(&mut self.instance_map);

        true
    }

    /// Finds all services matching the search keys, [`None`] behaves like the wildcard.
    pub fn find(&self, service: Option<&[u8]>, instance: Option<&[u8]>) -> Vec<ServiceDescriptor> {
        let mut result = Vec::new();

        match (service, instance) {
            (Some(service), Some(instance)) => {
                let possible_services = self.service_map.get(service);
                let possible_instances = self.instance_map.get(instance);

                if let (Some(possible_services), Some(possible_instances)) =
                    (possible_services, possible_instances)
                {
                    for index in possible_services {
                        if possible_instances.contains(index) {
                            result.push(self.entries[*index].descriptor.clone());
                        }
                    }
                }
            }
            (Some(service), None) => {
                if let Some(indices) = self.service_map.get(service) {
                    for index in indices {
                        result.push(self.entries[*index].descriptor.clone());
                    }
                }
            }
            (None, Some(instance)) => {
                if let Some(indices) = self.instance_map.get(instance) {
                    for index in indices {
                        result.push(self.entries[*index].descriptor.clone());
                    }
                }
            }
            (None, None) => {
                for entry in &self.entries {
                    result.push(entry.descriptor.clone());
                }
            }
        }

        result
    }

    /// Returns all registered services.
    pub fn services(&self) -> Vec<ServiceDescriptor> {
        self.find(None, None)
    }
}
